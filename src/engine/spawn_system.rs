use super::*;

impl ArenaEngine {
    pub(super) fn spawn_initial_bots(&mut self, count: usize) {
        for idx in 0..count {
            let name = format!("Bot-{:02}", idx + 1);
            let id = self.make_id("bot");
            self.spawn_actor(id, name, ActorKind::Bot, START_RADIUS);
        }
    }

    pub(super) fn spawn_actor(
        &mut self,
        id: String,
        name: String,
        kind: ActorKind,
        radius: f32,
    ) -> u32 {
        let position = self.pick_actor_spawn_position(radius);
        let slot = self.next_actor_slot;
        self.next_actor_slot += 1;

        self.actor_index.insert(slot, &position);
        self.actors.insert(
            slot,
            ActorInternal {
                view: ActorView {
                    id,
                    name,
                    kind,
                    state: ActorState::Alive,
                    position,
                    radius,
                    owner_id: None,
                },
                family_root: slot,
                input_dir: Vec3::ZERO,
                split_requested: false,
                velocity: Vec3::ZERO,
                owner_slot: None,
                merge_eligible_at: 0,
                eaten_at: 0,
                joined_at_ms: self.started_at_ms.saturating_add(self.elapsed_ms),
                ai_think_at: 0,
            },
        );
        slot
    }

    /// Bounded search for a clear spawn point; falls back to an unchecked
    /// random position so a crowded arena can never stall the tick.
    pub(super) fn pick_actor_spawn_position(&mut self, radius: f32) -> Vec3 {
        let half_extent = self.world.half_extent;
        for _ in 0..SPAWN_MAX_ATTEMPTS {
            let candidate = random_consumable_position(&mut self.rng, half_extent, radius);
            if self.is_clear_spawn_point(&candidate, radius) {
                return candidate;
            }
        }
        random_consumable_position(&mut self.rng, half_extent, radius)
    }

    pub(super) fn is_clear_spawn_point(&self, candidate: &Vec3, radius: f32) -> bool {
        let scan = radius + SPAWN_CLEARANCE + self.largest_live_radius();
        for slot in self.actor_index.query_radius(candidate, scan) {
            let Some(actor) = self.actors.get(&slot) else {
                continue;
            };
            if actor.view.state != ActorState::Alive {
                continue;
            }
            let clearance = radius + actor.view.radius + SPAWN_CLEARANCE;
            if candidate.distance(&actor.view.position) < clearance {
                return false;
            }
        }
        true
    }

    fn largest_live_radius(&self) -> f32 {
        self.actors
            .values()
            .filter(|actor| actor.view.state == ActorState::Alive)
            .map(|actor| actor.view.radius)
            .fold(0.0f32, f32::max)
    }

    /// Re-rolls an eaten consumable in place: new position away from the
    /// eater, fresh kind, same stable slot. The slot is logically live again
    /// immediately; any scale-in animation is a client concern.
    pub(super) fn respawn_consumable(&mut self, slot: u32, eater_position: &Vec3, eater_radius: f32) {
        let Some(base_radius) = self
            .world
            .consumables
            .get(slot as usize)
            .map(|consumable| consumable.base_radius)
        else {
            return;
        };
        let half_extent = self.world.half_extent;
        let keep_out = eater_radius + base_radius + RESPAWN_EATER_BUFFER;

        let mut position = random_consumable_position(&mut self.rng, half_extent, base_radius);
        for _ in 0..SPAWN_MAX_ATTEMPTS {
            if position.distance(eater_position) >= keep_out {
                break;
            }
            position = random_consumable_position(&mut self.rng, half_extent, base_radius);
        }
        let kind = roll_consumable_kind(&mut self.rng);

        let consumable = &mut self.world.consumables[slot as usize];
        consumable.position = position;
        consumable.kind = kind;
        consumable.active = true;
        self.world.consumable_index.insert(slot, &position);
        self.events.push(RuntimeEvent::PelletRespawned {
            slot,
            position,
            base_radius,
            kind,
        });
    }

    pub(super) fn respawn_actor(&mut self, slot: u32) {
        let Some(actor) = self.actors.get_mut(&slot) else {
            return;
        };
        actor.view.state = ActorState::Respawning;
        let position = self.pick_actor_spawn_position(START_RADIUS);

        let Some(actor) = self.actors.get_mut(&slot) else {
            return;
        };
        actor.view.position = position;
        actor.view.radius = START_RADIUS;
        actor.view.state = ActorState::Alive;
        actor.input_dir = Vec3::ZERO;
        actor.velocity = Vec3::ZERO;
        actor.split_requested = false;
        actor.joined_at_ms = self.started_at_ms.saturating_add(self.elapsed_ms);
        let actor_id = actor.view.id.clone();
        self.actor_index.insert(slot, &position);
        self.events.push(RuntimeEvent::ActorRespawned {
            actor_id,
            position,
        });
    }
}
