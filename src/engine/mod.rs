use std::collections::{BTreeMap, HashSet};
use std::mem;

use crate::constants::{
    actor_speed, get_bot_count_by_player_count, EAT_SIZE_RATIO, BOT_DANGER_RANGE, BOT_HUNT_RANGE,
    BOT_PELLET_SCAN_RANGE, MERGE_DELAY_MS, MIN_SPLIT_RADIUS, MOVE_EPSILON, PELLET_RADIUS_MAX,
    POWER_UP_VOLUME_BONUS, RESPAWN_DELAY_MS, RESPAWN_EATER_BUFFER, SPAWN_CLEARANCE,
    SPAWN_MAX_ATTEMPTS, SPLIT_IMPULSE, SPLIT_IMPULSE_DECAY_PER_SEC, START_RADIUS, TICK_RATE,
};
use crate::rng::Rng;
use crate::spatial::SpatialIndex;
use crate::types::{
    ActorKind, ActorState, ActorView, ArenaConfig, ArenaInit, ArenaSummary, ConsumableKind,
    DeathNotice, LeaderboardEntry, RuntimeEvent, Snapshot, Vec3,
};
use crate::world::{
    generate_world_with_pool, random_consumable_position, roll_consumable_kind, ArenaWorld,
    to_arena_init,
};

mod consumption;
pub mod growth;
mod spawn_system;
mod utils;

pub use self::consumption::{can_eat_actor, can_eat_consumable};
use self::utils::{clamp_to_bounds, now_ms, random_unit_dir};

#[derive(Clone, Debug, Default)]
pub struct ArenaEngineOptions {
    pub time_limit_ms: Option<u64>,
    pub bot_count: Option<usize>,
    pub pellet_pool: Option<usize>,
}

#[derive(Clone, Debug)]
struct ActorInternal {
    view: ActorView,
    /// Root slot of the family (self for players/bots, owner root for split
    /// cells). Actors never prey on their own family.
    family_root: u32,
    input_dir: Vec3,
    split_requested: bool,
    velocity: Vec3,
    owner_slot: Option<u32>,
    merge_eligible_at: u64,
    eaten_at: u64,
    joined_at_ms: u64,
    ai_think_at: u64,
}

#[derive(Clone, Debug)]
pub struct ArenaEngine {
    pub started_at_ms: u64,
    pub config: ArenaConfig,
    pub world: ArenaWorld,

    rng: Rng,
    seed: u32,
    actors: BTreeMap<u32, ActorInternal>,
    actor_index: SpatialIndex,
    events: Vec<RuntimeEvent>,
    death_notices: Vec<DeathNotice>,

    elapsed_ms: u64,
    tick_counter: u64,
    ended: bool,
    next_actor_slot: u32,
    next_id_counter: u64,
}

impl ArenaEngine {
    pub fn new(expected_players: usize, seed: u32, options: ArenaEngineOptions) -> Self {
        let world = generate_world_with_pool(expected_players, seed, options.pellet_pool);
        let config = ArenaConfig {
            tick_rate: TICK_RATE,
            half_extent: world.half_extent,
            cell_size: world.cell_size,
            start_radius: START_RADIUS,
            eat_size_ratio: EAT_SIZE_RATIO,
            power_up_probability: crate::constants::POWER_UP_PROBABILITY,
            respawn_delay_ms: RESPAWN_DELAY_MS,
            move_epsilon: MOVE_EPSILON,
            time_limit_ms: options.time_limit_ms,
        };
        let actor_index = SpatialIndex::new(world.half_extent, world.cell_size);

        let mut engine = Self {
            started_at_ms: now_ms(),
            config,
            world,
            rng: Rng::new(seed),
            seed,
            actors: BTreeMap::new(),
            actor_index,
            events: Vec::new(),
            death_notices: Vec::new(),
            elapsed_ms: 0,
            tick_counter: 0,
            ended: false,
            next_actor_slot: 0,
            next_id_counter: 1,
        };

        let bot_count = options
            .bot_count
            .unwrap_or_else(|| get_bot_count_by_player_count(expected_players));
        engine.spawn_initial_bots(bot_count);
        engine
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn current_now_ms(&self) -> u64 {
        self.started_at_ms.saturating_add(self.elapsed_ms)
    }

    pub fn get_arena_init(&self) -> ArenaInit {
        to_arena_init(&self.world)
    }

    pub fn add_player(&mut self, id: &str, name: &str) -> u32 {
        self.spawn_actor(id.to_string(), name.to_string(), ActorKind::Player, START_RADIUS)
    }

    pub fn has_player(&self, player_id: &str) -> bool {
        self.find_actor_slot(player_id).is_some()
    }

    /// Removes the player's actor and every split cell in its family.
    pub fn remove_player(&mut self, player_id: &str) {
        let Some(root) = self.find_actor_slot(player_id) else {
            return;
        };
        let family: Vec<u32> = self
            .actors
            .iter()
            .filter(|(_, actor)| actor.family_root == root)
            .map(|(slot, _)| *slot)
            .collect();
        for slot in family {
            self.actor_index.remove(slot);
            self.actors.remove(&slot);
        }
    }

    /// Movement intent from a client: camera-relative unit direction plus an
    /// optional split request. Non-finite directions never reach the
    /// simulation.
    pub fn receive_input(&mut self, player_id: &str, dir: Option<Vec3>, split: bool) {
        let Some(slot) = self.find_actor_slot(player_id) else {
            return;
        };
        let Some(actor) = self.actors.get_mut(&slot) else {
            return;
        };
        if let Some(dir) = dir {
            if dir.is_finite() {
                actor.input_dir = dir.normalized();
            }
        }
        if split {
            actor.split_requested = true;
        }
    }

    /// Local-actor status for the HUD: position, effective radius, mass.
    pub fn player_status(&self, player_id: &str) -> Option<(Vec3, f32, f32)> {
        let slot = self.find_actor_slot(player_id)?;
        let actor = self.actors.get(&slot)?;
        Some((
            actor.view.position,
            actor.view.radius,
            growth::volume_of(actor.view.radius),
        ))
    }

    pub fn step(&mut self, dt_ms: u64) {
        if self.ended {
            return;
        }
        self.tick_counter += 1;
        self.elapsed_ms = self.elapsed_ms.saturating_add(dt_ms);
        let now_ms = self.started_at_ms.saturating_add(self.elapsed_ms);

        self.update_bot_ai(now_ms);
        self.apply_splits(now_ms);
        self.move_actors(dt_ms);
        self.resolve_consumption(now_ms);
        self.merge_split_cells(now_ms);
        self.update_lifecycle(now_ms);

        if let Some(limit) = self.config.time_limit_ms {
            if self.elapsed_ms >= limit {
                self.ended = true;
            }
        }
    }

    pub fn build_snapshot(&mut self, include_events: bool) -> Snapshot {
        let snapshot = Snapshot {
            tick: self.tick_counter,
            now_ms: self.current_now_ms(),
            actors: self.actors.values().map(|actor| actor.view.clone()).collect(),
            active_consumables: self.world.active_count(),
            events: if include_events {
                self.events.clone()
            } else {
                Vec::new()
            },
            leaderboard: self.leaderboard(),
        };
        if include_events {
            self.events.clear();
        }
        snapshot
    }

    pub fn build_summary(&self) -> ArenaSummary {
        ArenaSummary {
            duration_ms: self.elapsed_ms,
            ticks: self.tick_counter,
            leaderboard: self.leaderboard(),
        }
    }

    /// Family mass (root actor plus its split cells), sorted descending.
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut family_volume: BTreeMap<u32, f32> = BTreeMap::new();
        for actor in self.actors.values() {
            if actor.view.state != ActorState::Alive {
                continue;
            }
            *family_volume.entry(actor.family_root).or_insert(0.0) +=
                growth::volume_of(actor.view.radius);
        }

        let mut entries: Vec<LeaderboardEntry> = family_volume
            .into_iter()
            .filter_map(|(root, mass)| {
                self.actors.get(&root).map(|actor| LeaderboardEntry {
                    name: actor.view.name.clone(),
                    mass,
                })
            })
            .collect();
        entries.sort_by(|a, b| b.mass.total_cmp(&a.mass));
        entries
    }

    pub fn drain_death_notices(&mut self) -> Vec<DeathNotice> {
        mem::take(&mut self.death_notices)
    }

    fn find_actor_slot(&self, actor_id: &str) -> Option<u32> {
        self.actors
            .iter()
            .find(|(_, actor)| actor.view.id == actor_id)
            .map(|(slot, _)| *slot)
    }

    fn update_bot_ai(&mut self, now_ms: u64) {
        let bot_slots: Vec<u32> = self
            .actors
            .iter()
            .filter(|(_, actor)| {
                actor.view.kind == ActorKind::Bot
                    && actor.view.state == ActorState::Alive
                    && now_ms >= actor.ai_think_at
            })
            .map(|(slot, _)| *slot)
            .collect();

        for slot in bot_slots {
            let (position, radius, family) = {
                let Some(actor) = self.actors.get(&slot) else {
                    continue;
                };
                (actor.view.position, actor.view.radius, actor.family_root)
            };

            let dir = self.choose_bot_direction(slot, &position, radius, family);
            let think_delay = self.rng.int(300, 700) as u64;
            if let Some(actor) = self.actors.get_mut(&slot) {
                actor.input_dir = dir;
                actor.ai_think_at = now_ms + think_delay;
            }
        }
    }

    fn choose_bot_direction(&mut self, slot: u32, position: &Vec3, radius: f32, family: u32) -> Vec3 {
        let mut nearest_threat: Option<(f32, Vec3)> = None;
        let mut nearest_prey: Option<(f32, Vec3)> = None;
        for rival_slot in self.actor_index.query_radius(position, BOT_HUNT_RANGE) {
            if rival_slot == slot {
                continue;
            }
            let Some(rival) = self.actors.get(&rival_slot) else {
                continue;
            };
            if rival.view.state != ActorState::Alive || rival.family_root == family {
                continue;
            }
            let distance = position.distance(&rival.view.position);
            if rival.view.radius >= radius * EAT_SIZE_RATIO && distance <= BOT_DANGER_RANGE {
                if nearest_threat.map(|(d, _)| distance < d).unwrap_or(true) {
                    nearest_threat = Some((distance, rival.view.position));
                }
            } else if radius >= rival.view.radius * EAT_SIZE_RATIO {
                if nearest_prey.map(|(d, _)| distance < d).unwrap_or(true) {
                    nearest_prey = Some((distance, rival.view.position));
                }
            }
        }

        if let Some((_, threat)) = nearest_threat {
            let flee = position.minus(&threat).normalized();
            return if flee == Vec3::ZERO {
                random_unit_dir(&mut self.rng)
            } else {
                flee
            };
        }
        if let Some((_, prey)) = nearest_prey {
            return prey.minus(position).normalized();
        }

        let mut nearest_pellet: Option<(f32, Vec3)> = None;
        for candidate in self
            .world
            .consumable_index
            .query_radius(position, BOT_PELLET_SCAN_RANGE)
        {
            let Some(consumable) = self.world.consumables.get(candidate as usize) else {
                continue;
            };
            if !consumable.active {
                continue;
            }
            let distance = position.distance(&consumable.position);
            if nearest_pellet.map(|(d, _)| distance < d).unwrap_or(true) {
                nearest_pellet = Some((distance, consumable.position));
            }
        }
        if let Some((_, pellet)) = nearest_pellet {
            let dir = pellet.minus(position).normalized();
            if dir != Vec3::ZERO {
                return dir;
            }
        }
        random_unit_dir(&mut self.rng)
    }

    fn apply_splits(&mut self, now_ms: u64) {
        let requested: Vec<u32> = self
            .actors
            .iter()
            .filter(|(_, actor)| actor.split_requested && actor.view.state == ActorState::Alive)
            .map(|(slot, _)| *slot)
            .collect();

        for slot in requested {
            let (position, radius, family, name, owner_id, input_dir) = {
                let Some(actor) = self.actors.get_mut(&slot) else {
                    continue;
                };
                actor.split_requested = false;
                // Split cells never split again.
                if actor.view.kind == ActorKind::SplitCell {
                    continue;
                }
                (
                    actor.view.position,
                    actor.view.radius,
                    actor.family_root,
                    actor.view.name.clone(),
                    actor.view.id.clone(),
                    actor.input_dir,
                )
            };

            let half_radius = growth::split_radius(radius);
            if half_radius < MIN_SPLIT_RADIUS {
                continue;
            }

            let dir = if input_dir == Vec3::ZERO {
                random_unit_dir(&mut self.rng)
            } else {
                input_dir
            };
            let cell_position = clamp_to_bounds(
                &position.plus(&dir.scaled(half_radius + 0.5)),
                self.world.half_extent,
                half_radius,
            );

            let cell_slot = self.next_actor_slot;
            self.next_actor_slot += 1;
            let cell_id = self.make_id("cell");
            self.actor_index.insert(cell_slot, &cell_position);
            self.actors.insert(
                cell_slot,
                ActorInternal {
                    view: ActorView {
                        id: cell_id.clone(),
                        name,
                        kind: ActorKind::SplitCell,
                        state: ActorState::Alive,
                        position: cell_position,
                        radius: half_radius,
                        owner_id: Some(owner_id.clone()),
                    },
                    family_root: family,
                    input_dir: dir,
                    split_requested: false,
                    velocity: dir.scaled(SPLIT_IMPULSE),
                    owner_slot: Some(slot),
                    merge_eligible_at: now_ms + MERGE_DELAY_MS,
                    eaten_at: 0,
                    joined_at_ms: now_ms,
                    ai_think_at: 0,
                },
            );

            if let Some(actor) = self.actors.get_mut(&slot) {
                actor.view.radius = half_radius;
            }
            self.events.push(RuntimeEvent::ActorSplit {
                actor_id: owner_id,
                cell_id,
            });
        }
    }

    fn move_actors(&mut self, dt_ms: u64) {
        let dt_sec = dt_ms as f32 / 1000.0;
        let half_extent = self.world.half_extent;
        let slots: Vec<u32> = self
            .actors
            .iter()
            .filter(|(_, actor)| actor.view.state == ActorState::Alive)
            .map(|(slot, _)| *slot)
            .collect();

        for slot in slots {
            let (old_position, dir, radius, velocity, owner_slot) = {
                let Some(actor) = self.actors.get(&slot) else {
                    continue;
                };
                (
                    actor.view.position,
                    actor.input_dir,
                    actor.view.radius,
                    actor.velocity,
                    actor.owner_slot,
                )
            };

            // Split cells steer with their owner's intent while the launch
            // impulse decays.
            let steer = match owner_slot {
                Some(owner) => self
                    .actors
                    .get(&owner)
                    .map(|actor| actor.input_dir)
                    .unwrap_or(dir),
                None => dir,
            };

            let mut new_position = old_position
                .plus(&steer.scaled(actor_speed(radius) * dt_sec))
                .plus(&velocity.scaled(dt_sec));
            new_position = clamp_to_bounds(&new_position, half_extent, radius);

            let decay = (1.0 - SPLIT_IMPULSE_DECAY_PER_SEC * dt_sec).max(0.0);
            if let Some(actor) = self.actors.get_mut(&slot) {
                actor.view.position = new_position;
                actor.velocity = velocity.scaled(decay);
            }
            self.actor_index.update(slot, &old_position, &new_position);
        }
    }

    fn merge_split_cells(&mut self, now_ms: u64) {
        let cell_slots: Vec<u32> = self
            .actors
            .iter()
            .filter(|(_, actor)| {
                actor.view.kind == ActorKind::SplitCell
                    && actor.view.state == ActorState::Alive
                    && now_ms >= actor.merge_eligible_at
            })
            .map(|(slot, _)| *slot)
            .collect();

        for cell_slot in cell_slots {
            let (cell_position, cell_radius, cell_id, owner_slot) = {
                let Some(cell) = self.actors.get(&cell_slot) else {
                    continue;
                };
                let Some(owner_slot) = cell.owner_slot else {
                    continue;
                };
                (
                    cell.view.position,
                    cell.view.radius,
                    cell.view.id.clone(),
                    owner_slot,
                )
            };

            let merged = {
                let Some(owner) = self.actors.get_mut(&owner_slot) else {
                    continue;
                };
                if owner.view.state != ActorState::Alive {
                    continue;
                }
                let touching = cell_position.distance(&owner.view.position)
                    < cell_radius + owner.view.radius;
                if touching {
                    owner.view.radius =
                        growth::grow_radius(owner.view.radius, growth::volume_of(cell_radius));
                    Some(owner.view.id.clone())
                } else {
                    None
                }
            };

            if let Some(owner_id) = merged {
                self.actor_index.remove(cell_slot);
                self.actors.remove(&cell_slot);
                self.events.push(RuntimeEvent::CellsMerged {
                    owner_id,
                    cell_id,
                });
            }
        }
    }

    pub(crate) fn mark_actor_eaten(
        &mut self,
        slot: u32,
        _eater_id: &str,
        eater_name: &str,
        now_ms: u64,
    ) {
        let Some(actor) = self.actors.get_mut(&slot) else {
            return;
        };
        if actor.view.state != ActorState::Alive {
            return;
        }
        actor.view.state = ActorState::Eaten;
        actor.eaten_at = now_ms;
        actor.velocity = Vec3::ZERO;
        actor.input_dir = Vec3::ZERO;
        let actor_id = actor.view.id.clone();
        let kind = actor.view.kind;
        let radius = actor.view.radius;
        let survived_ms = now_ms.saturating_sub(actor.joined_at_ms);

        self.actor_index.remove(slot);
        self.events.push(RuntimeEvent::ActorEaten {
            actor_id: actor_id.clone(),
            by: eater_name.to_string(),
        });
        if kind == ActorKind::Player {
            self.death_notices.push(DeathNotice {
                player_id: actor_id,
                killer_name: Some(eater_name.to_string()),
                survival_time_seconds: survived_ms / 1000,
                final_mass: growth::volume_of(radius),
            });
        }
    }

    fn update_lifecycle(&mut self, now_ms: u64) {
        let due: Vec<(u32, ActorKind)> = self
            .actors
            .iter()
            .filter(|(_, actor)| {
                actor.view.state == ActorState::Eaten
                    && now_ms.saturating_sub(actor.eaten_at) >= RESPAWN_DELAY_MS
            })
            .map(|(slot, actor)| (*slot, actor.view.kind))
            .collect();

        for (slot, kind) in due {
            match kind {
                ActorKind::Player | ActorKind::Bot => self.respawn_actor(slot),
                ActorKind::SplitCell => {
                    self.actors.remove(&slot);
                }
            }
        }
    }

    fn make_id(&mut self, prefix: &str) -> String {
        let id = format!("{}_{}", prefix, self.next_id_counter);
        self.next_id_counter = self.next_id_counter.saturating_add(1);
        id
    }
}
