pub const TICK_RATE: u32 = 20;
pub const TICK_MS: u64 = 1000 / TICK_RATE as u64;

pub const ARENA_HALF_EXTENT: f32 = 250.0;
pub const GRID_CELL_SIZE: f32 = 20.0;

pub const PELLET_RADIUS_MIN: f32 = 0.4;
pub const PELLET_RADIUS_MAX: f32 = 0.9;
// Flat re-roll chance replacing the legacy color-conditioned 1-in-3 rule.
pub const POWER_UP_PROBABILITY: f32 = 0.1;
pub const POWER_UP_VOLUME_BONUS: f32 = 4.0;

pub const START_RADIUS: f32 = 2.5;
pub const EAT_SIZE_RATIO: f32 = 1.1;

pub const BASE_SPEED: f32 = 24.0;
pub const MIN_SPEED: f32 = 6.0;

pub const RESPAWN_DELAY_MS: u64 = 2_000;
pub const SPAWN_MAX_ATTEMPTS: usize = 24;
pub const SPAWN_CLEARANCE: f32 = 4.0;
pub const RESPAWN_EATER_BUFFER: f32 = 3.0;

pub const SPLIT_IMPULSE: f32 = 28.0;
pub const SPLIT_IMPULSE_DECAY_PER_SEC: f32 = 2.4;
pub const MERGE_DELAY_MS: u64 = 6_000;
pub const MIN_SPLIT_RADIUS: f32 = 2.0;

pub const MOVE_EPSILON: f32 = 0.05;

pub const BOT_DANGER_RANGE: f32 = 40.0;
pub const BOT_HUNT_RANGE: f32 = 60.0;
pub const BOT_PELLET_SCAN_RANGE: f32 = 30.0;

pub fn get_pellet_count_by_player_count(player_count: usize) -> usize {
    if player_count <= 5 {
        return 20_000;
    }
    if player_count <= 15 {
        return 30_000;
    }
    if player_count <= 30 {
        return 40_000;
    }
    50_000
}

pub fn get_bot_count_by_player_count(player_count: usize) -> usize {
    if player_count <= 1 {
        return 8;
    }
    if player_count <= 5 {
        return 12;
    }
    if player_count <= 15 {
        return 20;
    }
    30
}

pub fn actor_speed(radius: f32) -> f32 {
    let scale = (START_RADIUS / radius.max(START_RADIUS)).powf(0.35);
    (BASE_SPEED * scale).max(MIN_SPEED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pellet_pool_scales_with_player_count() {
        assert_eq!(get_pellet_count_by_player_count(1), 20_000);
        assert_eq!(get_pellet_count_by_player_count(10), 30_000);
        assert_eq!(get_pellet_count_by_player_count(31), 50_000);
    }

    #[test]
    fn actor_speed_decreases_with_radius_but_never_below_floor() {
        let small = actor_speed(START_RADIUS);
        let big = actor_speed(40.0);
        assert!(small > big);
        assert!((small - BASE_SPEED).abs() < 0.0001);
        assert!(actor_speed(10_000.0) >= MIN_SPEED);
    }
}
