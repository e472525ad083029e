use std::f32::consts::PI;

/// Volumetric mass conservation. Mass is proportional to volume (radius
/// cubed), so eating accumulates volumes and converts back once. The
/// radius-additive variant (`sqrt(r1^2 + r2^2)`) is deliberately not used
/// anywhere in this crate.

pub fn volume_of(radius: f32) -> f32 {
    (4.0 / 3.0) * PI * radius * radius * radius
}

pub fn radius_of(volume: f32) -> f32 {
    ((3.0 * volume) / (4.0 * PI)).cbrt()
}

pub fn grow_radius(radius: f32, added_volume: f32) -> f32 {
    radius_of(volume_of(radius) + added_volume.max(0.0))
}

pub fn combined_radius(radius: f32, eaten_radii: &[f32]) -> f32 {
    let added: f32 = eaten_radii.iter().map(|r| volume_of(*r)).sum();
    grow_radius(radius, added)
}

/// Each half of a split keeps half the volume, never half the radius.
pub fn split_radius(radius: f32) -> f32 {
    radius_of(volume_of(radius) / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() <= eps
    }

    #[test]
    fn eating_three_unit_pellets_matches_cube_sum() {
        // r' = cbrt(5^3 + 1 + 1 + 1) = cbrt(128)
        let grown = combined_radius(5.0, &[1.0, 1.0, 1.0]);
        assert!(approx_eq(grown, 128.0f32.cbrt(), 0.0001), "grown {grown}");
        assert!(approx_eq(grown, 5.0397, 0.001));
    }

    #[test]
    fn cube_of_result_equals_sum_of_cubes() {
        let radii = [0.7, 1.3, 2.0, 0.4, 3.1];
        let grown = combined_radius(4.0, &radii);
        let expected_cubes: f32 = 4.0f32.powi(3) + radii.iter().map(|r| r.powi(3)).sum::<f32>();
        assert!(approx_eq(grown.powi(3), expected_cubes, 0.01));
    }

    #[test]
    fn accumulation_is_order_independent() {
        let forward = [0.5, 1.0, 1.5, 2.0, 0.8];
        let mut reversed = forward;
        reversed.reverse();
        let a = combined_radius(3.0, &forward);
        let b = combined_radius(3.0, &reversed);
        assert!(approx_eq(a, b, 0.0001));
    }

    #[test]
    fn growth_is_monotonic() {
        let base = combined_radius(2.0, &[]);
        let grown = combined_radius(2.0, &[0.1]);
        assert!(approx_eq(base, 2.0, 0.0001));
        assert!(grown > base);
    }

    #[test]
    fn split_halves_volume_and_merging_restores_it() {
        let radius = 6.0;
        let half = split_radius(radius);
        assert!(approx_eq(half, radius / 2.0f32.cbrt(), 0.0001));

        let merged = grow_radius(half, volume_of(half));
        assert!(approx_eq(merged, radius, 0.001));
    }

    #[test]
    fn volume_radius_round_trip() {
        for radius in [0.4, 1.0, 2.5, 17.3] {
            assert!(approx_eq(radius_of(volume_of(radius)), radius, 0.0005));
        }
    }
}
