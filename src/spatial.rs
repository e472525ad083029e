use std::collections::HashMap;

use crate::types::Vec3;

pub type CellKey = (i32, i32, i32);

/// Uniform 3D grid hash for proximity queries.
///
/// Queries return a candidate superset: every id whose bucket overlaps the
/// query sphere is included, and callers apply the exact distance test.
/// Cell size should be a small multiple of the largest interaction radius;
/// a much smaller cell size makes queries scan more buckets than brute force
/// would cost.
#[derive(Clone, Debug)]
pub struct SpatialIndex {
    half_extent: f32,
    cell_size: f32,
    cells: HashMap<CellKey, Vec<u32>>,
    slots: HashMap<u32, CellKey>,
}

impl SpatialIndex {
    pub fn new(half_extent: f32, cell_size: f32) -> Self {
        Self {
            half_extent,
            cell_size: cell_size.max(0.001),
            cells: HashMap::new(),
            slots: HashMap::new(),
        }
    }

    fn cell_key(&self, position: &Vec3) -> Option<CellKey> {
        if !position.is_finite() {
            return None;
        }
        // Out-of-bounds positions map to negative/overflow keys on purpose.
        let kx = ((position.x + self.half_extent) / self.cell_size).floor() as i32;
        let ky = ((position.y + self.half_extent) / self.cell_size).floor() as i32;
        let kz = ((position.z + self.half_extent) / self.cell_size).floor() as i32;
        Some((kx, ky, kz))
    }

    pub fn insert(&mut self, id: u32, position: &Vec3) {
        let Some(key) = self.cell_key(position) else {
            return;
        };
        if let Some(old_key) = self.slots.insert(id, key) {
            if old_key == key {
                return;
            }
            self.detach(id, old_key);
        }
        self.cells.entry(key).or_default().push(id);
    }

    pub fn remove(&mut self, id: u32) {
        if let Some(key) = self.slots.remove(&id) {
            self.detach(id, key);
        }
    }

    /// No-op when both positions land in the same bucket. This is the hot
    /// path: it runs every tick for every moving entity.
    pub fn update(&mut self, id: u32, old_position: &Vec3, new_position: &Vec3) {
        let old_key = self.cell_key(old_position);
        let new_key = self.cell_key(new_position);
        if old_key == new_key && old_key.is_some() {
            return;
        }
        match new_key {
            Some(_) => self.insert(id, new_position),
            None => self.remove(id),
        }
    }

    pub fn query_radius(&self, center: &Vec3, radius: f32) -> Vec<u32> {
        if !center.is_finite() || !radius.is_finite() || radius < 0.0 {
            return Vec::new();
        }
        let Some((cx, cy, cz)) = self.cell_key(center) else {
            return Vec::new();
        };
        let reach = (radius / self.cell_size).ceil() as i32;

        let mut found = Vec::new();
        for dx in -reach..=reach {
            for dy in -reach..=reach {
                for dz in -reach..=reach {
                    if let Some(ids) = self.cells.get(&(cx + dx, cy + dy, cz + dz)) {
                        found.extend_from_slice(ids);
                    }
                }
            }
        }
        found
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn detach(&mut self, id: u32, key: CellKey) {
        if let Some(bucket) = self.cells.get_mut(&key) {
            bucket.retain(|entry| *entry != id);
            if bucket.is_empty() {
                self.cells.remove(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Rng;

    fn random_point(rng: &mut Rng, extent: f32) -> Vec3 {
        Vec3::new(
            rng.f32_in(-extent, extent),
            rng.f32_in(-extent, extent),
            rng.f32_in(-extent, extent),
        )
    }

    #[test]
    fn query_is_superset_of_exact_matches() {
        let mut index = SpatialIndex::new(250.0, 20.0);
        let mut rng = Rng::new(12_345);
        let mut points = Vec::new();
        for id in 0..2_000u32 {
            let point = random_point(&mut rng, 250.0);
            index.insert(id, &point);
            points.push(point);
        }

        for _ in 0..50 {
            let center = random_point(&mut rng, 250.0);
            let radius = rng.f32_in(5.0, 60.0);
            let candidates = index.query_radius(&center, radius);
            for (id, point) in points.iter().enumerate() {
                if center.distance(point) <= radius {
                    assert!(
                        candidates.contains(&(id as u32)),
                        "id {id} within {radius} of center missing from candidates"
                    );
                }
            }
        }
    }

    #[test]
    fn dense_population_query_stays_local() {
        // 50k points in a 500-unit cube with 20-unit cells: a radius-15
        // query touches at most 27 buckets, so the candidate set must be a
        // tiny fraction of the population.
        let mut index = SpatialIndex::new(250.0, 20.0);
        let mut rng = Rng::new(777);
        for id in 0..50_000u32 {
            index.insert(id, &random_point(&mut rng, 250.0));
        }

        let candidates = index.query_radius(&Vec3::ZERO, 15.0);
        assert!(!candidates.is_empty());
        assert!(
            candidates.len() < 1_000,
            "query returned {} candidates",
            candidates.len()
        );
    }

    #[test]
    fn update_moves_id_between_buckets() {
        let mut index = SpatialIndex::new(250.0, 20.0);
        let old = Vec3::new(0.0, 0.0, 0.0);
        let new = Vec3::new(100.0, 0.0, 0.0);
        index.insert(7, &old);
        index.update(7, &old, &new);

        let near_old = index.query_radius(&old, 5.0);
        let near_new = index.query_radius(&new, 5.0);
        assert!(!near_old.contains(&7));
        assert!(near_new.contains(&7));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn update_within_same_bucket_keeps_single_entry() {
        let mut index = SpatialIndex::new(250.0, 20.0);
        let old = Vec3::new(1.0, 1.0, 1.0);
        let new = Vec3::new(2.0, 1.5, 1.0);
        index.insert(3, &old);
        index.update(3, &old, &new);

        let found = index.query_radius(&new, 5.0);
        assert_eq!(found.iter().filter(|id| **id == 3).count(), 1);
    }

    #[test]
    fn remove_clears_id_from_queries() {
        let mut index = SpatialIndex::new(250.0, 20.0);
        let point = Vec3::new(10.0, -30.0, 44.0);
        index.insert(11, &point);
        index.remove(11);
        assert!(index.query_radius(&point, 10.0).is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn non_finite_query_returns_empty_set() {
        let mut index = SpatialIndex::new(250.0, 20.0);
        index.insert(1, &Vec3::new(0.0, 0.0, 0.0));
        assert!(index
            .query_radius(&Vec3::new(f32::NAN, 0.0, 0.0), 10.0)
            .is_empty());
        assert!(index
            .query_radius(&Vec3::new(0.0, f32::INFINITY, 0.0), 10.0)
            .is_empty());
        assert!(index
            .query_radius(&Vec3::new(0.0, 0.0, 0.0), f32::NAN)
            .is_empty());
    }

    #[test]
    fn out_of_bounds_positions_are_tolerated() {
        let mut index = SpatialIndex::new(250.0, 20.0);
        let far = Vec3::new(-9_000.0, 12_000.0, 3.0);
        index.insert(5, &far);
        assert!(index.query_radius(&far, 1.0).contains(&5));
    }

    #[test]
    fn reinserting_same_id_replaces_previous_bucket() {
        let mut index = SpatialIndex::new(250.0, 20.0);
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(-120.0, 60.0, 90.0);
        index.insert(9, &a);
        index.insert(9, &b);
        assert!(!index.query_radius(&a, 5.0).contains(&9));
        assert!(index.query_radius(&b, 5.0).contains(&9));
        assert_eq!(index.len(), 1);
    }
}
