use super::*;

/// A consumable is eaten when its center is inside the eater's body. The
/// consumable's own radius is absorbed into the threshold.
pub fn can_eat_consumable(actor_radius: f32, distance: f32) -> bool {
    distance <= actor_radius
}

/// Actor-vs-actor eat gate: a strict 10% size advantage, then an asymmetric
/// reach that lets the larger actor absorb from beyond pure surface contact.
/// At most one direction of a pair can be true; radii within 10% of each
/// other form a no-kill deadzone.
pub fn can_eat_actor(eater_radius: f32, victim_radius: f32, distance: f32) -> bool {
    if eater_radius < victim_radius * EAT_SIZE_RATIO {
        return false;
    }
    let reach = 0.8 * victim_radius
        + (eater_radius * eater_radius - 0.36 * victim_radius * victim_radius).sqrt();
    distance <= reach
}

impl ArenaEngine {
    /// One resolution pass over every live actor, in ascending slot order.
    /// Ids marked eaten are skipped for the rest of the pass, so a single
    /// tick cannot produce cyclic "A ate B and B ate A" results, and mass is
    /// never double counted.
    pub(super) fn resolve_consumption(&mut self, now_ms: u64) {
        let slots: Vec<u32> = self
            .actors
            .iter()
            .filter(|(_, actor)| actor.view.state == ActorState::Alive)
            .map(|(slot, _)| *slot)
            .collect();
        let mut eaten_this_pass: HashSet<u32> = HashSet::new();

        for &slot in &slots {
            if eaten_this_pass.contains(&slot) {
                continue;
            }
            let (position, radius, family, eater_id, eater_name) = {
                let Some(actor) = self.actors.get(&slot) else {
                    continue;
                };
                (
                    actor.view.position,
                    actor.view.radius,
                    actor.family_root,
                    actor.view.id.clone(),
                    actor.view.name.clone(),
                )
            };

            let mut gained_volume = 0.0f32;

            let candidates = self
                .world
                .consumable_index
                .query_radius(&position, radius + PELLET_RADIUS_MAX);
            for candidate in candidates {
                let (consumable_position, base_radius, kind) = {
                    let Some(consumable) = self.world.consumables.get(candidate as usize) else {
                        continue;
                    };
                    if !consumable.active {
                        continue;
                    }
                    (consumable.position, consumable.base_radius, consumable.kind)
                };
                if !can_eat_consumable(radius, position.distance(&consumable_position)) {
                    continue;
                }

                let bonus = match kind {
                    ConsumableKind::PowerUp => POWER_UP_VOLUME_BONUS,
                    ConsumableKind::Pellet => 1.0,
                };
                gained_volume += growth::volume_of(base_radius) * bonus;
                self.world.consumables[candidate as usize].active = false;
                self.world.consumable_index.remove(candidate);
                self.events.push(RuntimeEvent::PelletEaten {
                    slot: candidate,
                    by: eater_id.clone(),
                });
                self.respawn_consumable(candidate, &position, radius);
            }

            // Reach is bounded by ~1.73x the eater radius (victim is at most
            // radius / 1.1), so 1.8x covers every possible victim.
            let mut rivals: Vec<u32> = self
                .actor_index
                .query_radius(&position, radius * 1.8)
                .into_iter()
                .filter(|rival| *rival != slot)
                .collect();
            rivals.sort_unstable();
            rivals.dedup();

            for rival_slot in rivals {
                if eaten_this_pass.contains(&rival_slot) {
                    continue;
                }
                let (rival_radius, rival_distance, rival_family) = {
                    let Some(rival) = self.actors.get(&rival_slot) else {
                        continue;
                    };
                    if rival.view.state != ActorState::Alive {
                        continue;
                    }
                    (
                        rival.view.radius,
                        position.distance(&rival.view.position),
                        rival.family_root,
                    )
                };
                if rival_family == family {
                    continue;
                }
                if !can_eat_actor(radius, rival_radius, rival_distance) {
                    continue;
                }

                gained_volume += growth::volume_of(rival_radius);
                eaten_this_pass.insert(rival_slot);
                self.mark_actor_eaten(rival_slot, &eater_id, &eater_name, now_ms);
            }

            if gained_volume > 0.0 {
                if let Some(actor) = self.actors.get_mut(&slot) {
                    actor.view.radius = growth::grow_radius(actor.view.radius, gained_volume);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadzone_blocks_both_directions() {
        // Any ratio in [1/1.1, 1.1] means neither side can eat, even when
        // the spheres fully overlap.
        for ratio in [0.91f32, 0.95, 1.0, 1.05, 1.099] {
            let a = 10.0;
            let b = 10.0 * ratio;
            assert!(!can_eat_actor(a, b, 0.0), "ratio {ratio}: a should not eat b");
            assert!(!can_eat_actor(b, a, 0.0), "ratio {ratio}: b should not eat a");
        }
    }

    #[test]
    fn at_most_one_direction_can_eat() {
        let a = 12.0;
        let b = 8.0;
        for distance in [0.0f32, 4.0, 9.0, 14.0, 20.0] {
            let forward = can_eat_actor(a, b, distance);
            let backward = can_eat_actor(b, a, distance);
            assert!(!(forward && backward), "distance {distance}");
            assert!(!backward);
        }
    }

    #[test]
    fn ten_versus_eight_at_nine_is_a_kill() {
        // threshold = 0.8*8 + sqrt(100 - 0.36*64) = 6.4 + sqrt(76.96) ~ 15.17
        assert!(can_eat_actor(10.0, 8.0, 9.0));
        assert!(can_eat_actor(10.0, 8.0, 15.0));
        assert!(!can_eat_actor(10.0, 8.0, 15.2));
    }

    #[test]
    fn eat_gate_is_monotonic_in_distance() {
        let eater = 10.0;
        let victim = 8.0;
        let mut threshold = None;
        let mut distance = 0.0f32;
        while distance <= 30.0 {
            let eats = can_eat_actor(eater, victim, distance);
            match threshold {
                None => {
                    if !eats {
                        threshold = Some(distance);
                    }
                }
                Some(_) => assert!(!eats, "eat regained at distance {distance}"),
            }
            distance += 0.05;
        }
        assert!(threshold.is_some(), "gate never closed within scan range");
    }

    #[test]
    fn consumable_rule_is_center_within_body() {
        assert!(can_eat_consumable(5.0, 4.99));
        assert!(can_eat_consumable(5.0, 5.0));
        assert!(!can_eat_consumable(5.0, 5.01));
    }
}
