use std::collections::BTreeMap;
use std::fmt;

use crate::types::Vec3;

/// What a client knows about one remote actor.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteActorEntry {
    pub name: String,
    pub position: Vec3,
    pub radius: f32,
}

/// Updates a client receives from the relay. Arrival order within a tick is
/// not guaranteed, so the roster buffers them and applies the batch at a
/// deterministic point.
#[derive(Clone, Debug)]
pub enum RemoteUpdate {
    Roster(BTreeMap<String, RemoteActorEntry>),
    Joined {
        id: String,
        entry: RemoteActorEntry,
    },
    Moved {
        id: String,
        position: Vec3,
        radius: f32,
    },
    Left {
        id: String,
    },
    YouWereEaten {
        killer_name: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MalformedUpdate {
    pub reason: &'static str,
}

impl fmt::Display for MalformedUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed remote update: {}", self.reason)
    }
}

impl std::error::Error for MalformedUpdate {}

/// Client-side mirror of the remote population. `buffer` validates and
/// queues; `apply_pending` folds the queue into the roster at tick start so
/// rendering never observes a half-applied batch.
#[derive(Debug, Default)]
pub struct RemoteRoster {
    actors: BTreeMap<String, RemoteActorEntry>,
    pending: Vec<RemoteUpdate>,
    malformed_count: u64,
    eaten_notice: Option<Option<String>>,
}

impl RemoteRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&mut self, update: RemoteUpdate) -> Result<(), MalformedUpdate> {
        if let Err(err) = validate_update(&update) {
            self.malformed_count += 1;
            return Err(err);
        }
        self.pending.push(update);
        Ok(())
    }

    /// Folds every buffered update into the roster, in arrival order.
    /// Duplicate joins overwrite, moves for unknown ids are dropped, and
    /// duplicate leaves are no-ops.
    pub fn apply_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        for update in pending {
            match update {
                RemoteUpdate::Roster(actors) => {
                    self.actors = actors;
                }
                RemoteUpdate::Joined { id, entry } => {
                    self.actors.insert(id, entry);
                }
                RemoteUpdate::Moved {
                    id,
                    position,
                    radius,
                } => {
                    if let Some(entry) = self.actors.get_mut(&id) {
                        entry.position = position;
                        entry.radius = radius;
                    }
                }
                RemoteUpdate::Left { id } => {
                    self.actors.remove(&id);
                }
                RemoteUpdate::YouWereEaten { killer_name } => {
                    self.eaten_notice = Some(killer_name);
                }
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&RemoteActorEntry> {
        self.actors.get(id)
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn malformed_count(&self) -> u64 {
        self.malformed_count
    }

    pub fn take_eaten_notice(&mut self) -> Option<Option<String>> {
        self.eaten_notice.take()
    }
}

fn validate_update(update: &RemoteUpdate) -> Result<(), MalformedUpdate> {
    match update {
        RemoteUpdate::Roster(actors) => {
            for entry in actors.values() {
                validate_entry(entry)?;
            }
            Ok(())
        }
        RemoteUpdate::Joined { entry, .. } => validate_entry(entry),
        RemoteUpdate::Moved {
            position, radius, ..
        } => {
            if !position.is_finite() {
                return Err(MalformedUpdate {
                    reason: "non-finite position",
                });
            }
            validate_radius(*radius)
        }
        RemoteUpdate::Left { .. } | RemoteUpdate::YouWereEaten { .. } => Ok(()),
    }
}

fn validate_entry(entry: &RemoteActorEntry) -> Result<(), MalformedUpdate> {
    if !entry.position.is_finite() {
        return Err(MalformedUpdate {
            reason: "non-finite position",
        });
    }
    validate_radius(entry.radius)
}

fn validate_radius(radius: f32) -> Result<(), MalformedUpdate> {
    if !radius.is_finite() || radius <= 0.0 {
        return Err(MalformedUpdate {
            reason: "non-positive or non-finite radius",
        });
    }
    Ok(())
}

/// Outbound move suppression: a client only sends a new move message once
/// its position or radius drifts past the epsilon agreed with the server.
#[derive(Debug)]
pub struct MoveGate {
    epsilon: f32,
    last_sent: Option<(Vec3, f32)>,
}

impl MoveGate {
    pub fn new(epsilon: f32) -> Self {
        Self {
            epsilon,
            last_sent: None,
        }
    }

    pub fn should_send(&mut self, position: &Vec3, radius: f32) -> bool {
        let send = match self.last_sent {
            None => true,
            Some((last_position, last_radius)) => {
                position.distance(&last_position) > self.epsilon
                    || (radius - last_radius).abs() > self.epsilon
            }
        };
        if send {
            self.last_sent = Some((*position, radius));
        }
        send
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(x: f32, radius: f32) -> RemoteActorEntry {
        RemoteActorEntry {
            name: "Remote".to_string(),
            position: Vec3::new(x, 0.0, 0.0),
            radius,
        }
    }

    #[test]
    fn updates_stay_pending_until_applied() {
        let mut roster = RemoteRoster::new();
        roster
            .buffer(RemoteUpdate::Joined {
                id: "p1".to_string(),
                entry: entry(1.0, 2.5),
            })
            .unwrap();

        assert_eq!(roster.pending_count(), 1);
        assert!(roster.get("p1").is_none());

        roster.apply_pending();
        assert_eq!(roster.pending_count(), 0);
        assert_eq!(roster.get("p1"), Some(&entry(1.0, 2.5)));
    }

    #[test]
    fn non_finite_updates_are_rejected_and_counted() {
        let mut roster = RemoteRoster::new();
        let bad = RemoteUpdate::Moved {
            id: "p1".to_string(),
            position: Vec3::new(f32::NAN, 0.0, 0.0),
            radius: 2.0,
        };
        assert!(roster.buffer(bad).is_err());

        let bad_radius = RemoteUpdate::Joined {
            id: "p2".to_string(),
            entry: entry(0.0, f32::INFINITY),
        };
        assert!(roster.buffer(bad_radius).is_err());

        assert_eq!(roster.malformed_count(), 2);
        assert_eq!(roster.pending_count(), 0);
        roster.apply_pending();
        assert!(roster.is_empty());
    }

    #[test]
    fn duplicate_join_overwrites_and_duplicate_leave_is_a_noop() {
        let mut roster = RemoteRoster::new();
        roster
            .buffer(RemoteUpdate::Joined {
                id: "p1".to_string(),
                entry: entry(1.0, 2.0),
            })
            .unwrap();
        roster
            .buffer(RemoteUpdate::Joined {
                id: "p1".to_string(),
                entry: entry(4.0, 3.0),
            })
            .unwrap();
        roster.apply_pending();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.get("p1"), Some(&entry(4.0, 3.0)));

        roster.buffer(RemoteUpdate::Left { id: "p1".to_string() }).unwrap();
        roster.buffer(RemoteUpdate::Left { id: "p1".to_string() }).unwrap();
        roster.apply_pending();
        assert!(roster.is_empty());
    }

    #[test]
    fn move_for_unknown_id_is_dropped() {
        let mut roster = RemoteRoster::new();
        roster
            .buffer(RemoteUpdate::Moved {
                id: "ghost".to_string(),
                position: Vec3::new(1.0, 2.0, 3.0),
                radius: 2.0,
            })
            .unwrap();
        roster.apply_pending();
        assert!(roster.is_empty());
    }

    #[test]
    fn full_roster_replaces_previous_state() {
        let mut roster = RemoteRoster::new();
        roster
            .buffer(RemoteUpdate::Joined {
                id: "old".to_string(),
                entry: entry(1.0, 2.0),
            })
            .unwrap();
        roster.apply_pending();

        let mut replacement = BTreeMap::new();
        replacement.insert("new".to_string(), entry(9.0, 4.0));
        roster.buffer(RemoteUpdate::Roster(replacement)).unwrap();
        roster.apply_pending();

        assert!(roster.get("old").is_none());
        assert!(roster.get("new").is_some());
    }

    #[test]
    fn eaten_notice_is_delivered_once() {
        let mut roster = RemoteRoster::new();
        roster
            .buffer(RemoteUpdate::YouWereEaten {
                killer_name: Some("Goliath".to_string()),
            })
            .unwrap();
        roster.apply_pending();
        assert_eq!(
            roster.take_eaten_notice(),
            Some(Some("Goliath".to_string()))
        );
        assert_eq!(roster.take_eaten_notice(), None);
    }

    #[test]
    fn move_gate_suppresses_sub_epsilon_drift() {
        let mut gate = MoveGate::new(0.05);
        let origin = Vec3::ZERO;
        assert!(gate.should_send(&origin, 2.5));
        assert!(!gate.should_send(&Vec3::new(0.03, 0.0, 0.0), 2.5));
        assert!(!gate.should_send(&origin, 2.54));
        assert!(gate.should_send(&Vec3::new(0.1, 0.0, 0.0), 2.5));
        // Baseline advanced with the last sent update.
        assert!(!gate.should_send(&Vec3::new(0.12, 0.0, 0.0), 2.5));
    }
}
