use std::time::{SystemTime, UNIX_EPOCH};

use crate::rng::Rng;
use crate::types::Vec3;

pub(super) fn now_ms() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    now as u64
}

/// Keeps the actor's whole footprint inside the cube.
pub(super) fn clamp_to_bounds(position: &Vec3, half_extent: f32, radius: f32) -> Vec3 {
    let limit = (half_extent - radius).max(0.0);
    Vec3::new(
        position.x.clamp(-limit, limit),
        position.y.clamp(-limit, limit),
        position.z.clamp(-limit, limit),
    )
}

pub(super) fn random_unit_dir(rng: &mut Rng) -> Vec3 {
    // Rejection sampling keeps the distribution uniform over directions.
    for _ in 0..16 {
        let candidate = Vec3::new(
            rng.f32_in(-1.0, 1.0),
            rng.f32_in(-1.0, 1.0),
            rng.f32_in(-1.0, 1.0),
        );
        let len = candidate.length();
        if len > 0.05 && len <= 1.0 {
            return candidate.scaled(1.0 / len);
        }
    }
    Vec3::new(1.0, 0.0, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_keeps_footprint_inside_cube() {
        let clamped = clamp_to_bounds(&Vec3::new(300.0, -260.0, 0.0), 250.0, 5.0);
        assert_eq!(clamped.x, 245.0);
        assert_eq!(clamped.y, -245.0);
        assert_eq!(clamped.z, 0.0);
    }

    #[test]
    fn clamp_handles_radius_larger_than_arena() {
        let clamped = clamp_to_bounds(&Vec3::new(10.0, 10.0, 10.0), 5.0, 9.0);
        assert_eq!(clamped, Vec3::ZERO);
    }

    #[test]
    fn random_unit_dir_has_unit_length() {
        let mut rng = Rng::new(31);
        for _ in 0..200 {
            let dir = random_unit_dir(&mut rng);
            assert!((dir.length() - 1.0).abs() < 0.001);
        }
    }
}
