use crate::constants::{
    get_pellet_count_by_player_count, ARENA_HALF_EXTENT, GRID_CELL_SIZE, PELLET_RADIUS_MAX,
    PELLET_RADIUS_MIN, POWER_UP_PROBABILITY,
};
use crate::rng::Rng;
use crate::spatial::SpatialIndex;
use crate::types::{ArenaInit, ConsumableKind, ConsumableView, Vec3};

#[derive(Clone, Debug)]
pub struct Consumable {
    pub position: Vec3,
    pub base_radius: f32,
    pub kind: ConsumableKind,
    pub active: bool,
}

/// Owns the consumable pool and its spatial index. Slots are stable for the
/// lifetime of the world; eaten consumables are re-rolled in place, never
/// freed.
#[derive(Clone, Debug)]
pub struct ArenaWorld {
    pub half_extent: f32,
    pub cell_size: f32,
    pub consumables: Vec<Consumable>,
    pub consumable_index: SpatialIndex,
}

impl ArenaWorld {
    pub fn active_count(&self) -> u32 {
        self.consumables.iter().filter(|c| c.active).count() as u32
    }
}

pub fn generate_world(player_count: usize, seed: u32) -> ArenaWorld {
    generate_world_with_pool(player_count, seed, None)
}

pub fn generate_world_with_pool(
    player_count: usize,
    seed: u32,
    pool_override: Option<usize>,
) -> ArenaWorld {
    let mut rng = Rng::new(seed.wrapping_mul(0x9e37_79b9).wrapping_add(1));
    let pool_size = pool_override.unwrap_or_else(|| get_pellet_count_by_player_count(player_count));

    let mut consumables = Vec::with_capacity(pool_size);
    let mut index = SpatialIndex::new(ARENA_HALF_EXTENT, GRID_CELL_SIZE);
    for slot in 0..pool_size {
        let base_radius = rng.f32_in(PELLET_RADIUS_MIN, PELLET_RADIUS_MAX);
        let position = random_consumable_position(&mut rng, ARENA_HALF_EXTENT, base_radius);
        let kind = roll_consumable_kind(&mut rng);
        index.insert(slot as u32, &position);
        consumables.push(Consumable {
            position,
            base_radius,
            kind,
            active: true,
        });
    }

    ArenaWorld {
        half_extent: ARENA_HALF_EXTENT,
        cell_size: GRID_CELL_SIZE,
        consumables,
        consumable_index: index,
    }
}

/// Uniform position with the full footprint inside the boundary.
pub fn random_consumable_position(rng: &mut Rng, half_extent: f32, radius: f32) -> Vec3 {
    let limit = (half_extent - radius).max(0.0);
    Vec3::new(
        rng.f32_in(-limit, limit),
        rng.f32_in(-limit, limit),
        rng.f32_in(-limit, limit),
    )
}

pub fn roll_consumable_kind(rng: &mut Rng) -> ConsumableKind {
    if rng.bool(POWER_UP_PROBABILITY) {
        ConsumableKind::PowerUp
    } else {
        ConsumableKind::Pellet
    }
}

pub fn to_arena_init(world: &ArenaWorld) -> ArenaInit {
    ArenaInit {
        half_extent: world.half_extent,
        cell_size: world.cell_size,
        consumables: world
            .consumables
            .iter()
            .enumerate()
            .map(|(slot, consumable)| ConsumableView {
                slot: slot as u32,
                position: consumable.position,
                base_radius: consumable.base_radius,
                kind: consumable.kind,
                active: consumable.active,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_size_follows_player_count() {
        let world = generate_world(1, 42);
        assert_eq!(world.consumables.len(), 20_000);
        assert_eq!(world.active_count(), 20_000);
        assert_eq!(world.consumable_index.len(), 20_000);
    }

    #[test]
    fn pool_override_wins_over_player_count() {
        let world = generate_world_with_pool(1, 42, Some(500));
        assert_eq!(world.consumables.len(), 500);
    }

    #[test]
    fn all_consumables_spawn_inside_bounds() {
        let world = generate_world_with_pool(1, 7, Some(2_000));
        for consumable in &world.consumables {
            let limit = world.half_extent - consumable.base_radius;
            assert!(consumable.position.x.abs() <= limit);
            assert!(consumable.position.y.abs() <= limit);
            assert!(consumable.position.z.abs() <= limit);
        }
    }

    #[test]
    fn kind_roll_produces_both_kinds_over_many_samples() {
        let mut rng = Rng::new(1_234);
        let mut power_ups = 0usize;
        let samples = 10_000;
        for _ in 0..samples {
            if roll_consumable_kind(&mut rng) == ConsumableKind::PowerUp {
                power_ups += 1;
            }
        }
        let ratio = power_ups as f32 / samples as f32;
        assert!(ratio > 0.05 && ratio < 0.15, "ratio {ratio}");
    }

    #[test]
    fn same_seed_generates_identical_worlds() {
        let a = generate_world_with_pool(2, 99, Some(1_000));
        let b = generate_world_with_pool(2, 99, Some(1_000));
        for (left, right) in a.consumables.iter().zip(b.consumables.iter()) {
            assert_eq!(left.position, right.position);
            assert_eq!(left.base_radius.to_bits(), right.base_radius.to_bits());
            assert_eq!(left.kind, right.kind);
        }
    }

    #[test]
    fn arena_init_carries_stable_slots() {
        let world = generate_world_with_pool(1, 3, Some(100));
        let init = to_arena_init(&world);
        assert_eq!(init.consumables.len(), 100);
        for (expected_slot, view) in init.consumables.iter().enumerate() {
            assert_eq!(view.slot, expected_slot as u32);
            assert!(view.active);
        }
    }
}
