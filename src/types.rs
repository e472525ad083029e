use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn distance(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn normalized(&self) -> Vec3 {
        let len = self.length();
        if len < 0.0001 {
            Vec3::ZERO
        } else {
            Vec3::new(self.x / len, self.y / len, self.z / len)
        }
    }

    pub fn scaled(&self, factor: f32) -> Vec3 {
        Vec3::new(self.x * factor, self.y * factor, self.z * factor)
    }

    pub fn plus(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn minus(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumableKind {
    Pellet,
    PowerUp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Player,
    Bot,
    SplitCell,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorState {
    Alive,
    Eaten,
    Respawning,
}

#[derive(Clone, Debug, Serialize)]
pub struct ConsumableView {
    pub slot: u32,
    pub position: Vec3,
    #[serde(rename = "baseRadius")]
    pub base_radius: f32,
    pub kind: ConsumableKind,
    pub active: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct ActorView {
    pub id: String,
    pub name: String,
    pub kind: ActorKind,
    pub state: ActorState,
    pub position: Vec3,
    pub radius: f32,
    #[serde(rename = "ownerId", skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ArenaConfig {
    #[serde(rename = "tickRate")]
    pub tick_rate: u32,
    #[serde(rename = "halfExtent")]
    pub half_extent: f32,
    #[serde(rename = "cellSize")]
    pub cell_size: f32,
    #[serde(rename = "startRadius")]
    pub start_radius: f32,
    #[serde(rename = "eatSizeRatio")]
    pub eat_size_ratio: f32,
    #[serde(rename = "powerUpProbability")]
    pub power_up_probability: f32,
    #[serde(rename = "respawnDelayMs")]
    pub respawn_delay_ms: u64,
    #[serde(rename = "moveEpsilon")]
    pub move_epsilon: f32,
    #[serde(rename = "timeLimitMs", skip_serializing_if = "Option::is_none")]
    pub time_limit_ms: Option<u64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ArenaInit {
    #[serde(rename = "halfExtent")]
    pub half_extent: f32,
    #[serde(rename = "cellSize")]
    pub cell_size: f32,
    pub consumables: Vec<ConsumableView>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    PelletEaten {
        slot: u32,
        by: String,
    },
    PelletRespawned {
        slot: u32,
        position: Vec3,
        #[serde(rename = "baseRadius")]
        base_radius: f32,
        kind: ConsumableKind,
    },
    ActorEaten {
        #[serde(rename = "actorId")]
        actor_id: String,
        by: String,
    },
    ActorRespawned {
        #[serde(rename = "actorId")]
        actor_id: String,
        position: Vec3,
    },
    ActorSplit {
        #[serde(rename = "actorId")]
        actor_id: String,
        #[serde(rename = "cellId")]
        cell_id: String,
    },
    CellsMerged {
        #[serde(rename = "ownerId")]
        owner_id: String,
        #[serde(rename = "cellId")]
        cell_id: String,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub mass: f32,
}

#[derive(Clone, Debug, Serialize)]
pub struct DeathNotice {
    #[serde(rename = "playerId")]
    pub player_id: String,
    #[serde(rename = "killerName")]
    pub killer_name: Option<String>,
    #[serde(rename = "survivalTimeSeconds")]
    pub survival_time_seconds: u64,
    #[serde(rename = "finalMass")]
    pub final_mass: f32,
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    #[serde(rename = "nowMs")]
    pub now_ms: u64,
    pub actors: Vec<ActorView>,
    #[serde(rename = "activeConsumables")]
    pub active_consumables: u32,
    pub events: Vec<RuntimeEvent>,
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ArenaSummary {
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    pub ticks: u64,
    pub leaderboard: Vec<LeaderboardEntry>,
}
