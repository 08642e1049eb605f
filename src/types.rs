use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoodCategory {
    Blue,
    Green,
    Pink,
}

impl FoodCategory {
    pub const ALL: [FoodCategory; 3] = [FoodCategory::Blue, FoodCategory::Green, FoodCategory::Pink];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    Left,
    Right,
    RollLeft,
    RollRight,
    Boost,
    Pause,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Left,
        Action::Right,
        Action::RollLeft,
        Action::RollRight,
        Action::Boost,
        Action::Pause,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "rollLeft" => Some(Self::RollLeft),
            "rollRight" => Some(Self::RollRight),
            "boost" => Some(Self::Boost),
            "pause" => Some(Self::Pause),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOverReason {
    Wall,
    SelfCollision,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Playing,
    Paused,
    GameOver,
}

/// Serializable `{x, y, z}` vector used by the replay payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WireVec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl WireVec3 {
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// Nearest grid cell. Recorded positions are integral, so this is exact
    /// for anything the recorder produced.
    pub fn to_cell(self) -> IVec3 {
        IVec3::new(
            self.x.round() as i32,
            self.y.round() as i32,
            self.z.round() as i32,
        )
    }
}

impl From<IVec3> for WireVec3 {
    fn from(v: IVec3) -> Self {
        Self {
            x: v.x as f32,
            y: v.y as f32,
            z: v.z as f32,
        }
    }
}

impl From<Vec3> for WireVec3 {
    fn from(v: Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryChange {
    pub position: WireVec3,
    pub direction: WireVec3,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StartParams {
    pub seed: u32,
    #[serde(rename = "spawnIndex")]
    pub spawn_index: usize,
    #[serde(rename = "initialSpeed")]
    pub initial_speed: f32,
    #[serde(rename = "startPosition", default, skip_serializing_if = "Option::is_none")]
    pub start_position: Option<WireVec3>,
    #[serde(rename = "startDirection", default, skip_serializing_if = "Option::is_none")]
    pub start_direction: Option<WireVec3>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayData {
    pub id: String,
    #[serde(rename = "playerId")]
    pub player_id: String,
    #[serde(rename = "playerName", default = "default_player_name")]
    pub player_name: String,
    pub timestamp: i64,
    #[serde(rename = "startParams")]
    pub start_params: StartParams,
    #[serde(rename = "finalScore")]
    pub final_score: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elo: Option<i32>,
    #[serde(rename = "deathPosition")]
    pub death_position: WireVec3,
    #[serde(rename = "trajectoryLog")]
    pub trajectory_log: Vec<TrajectoryChange>,
}

fn default_player_name() -> String {
    "Unknown".to_string()
}

/// Phantom line-up for one seed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoomData {
    pub seed: u32,
    pub phantoms: Vec<ReplayData>,
    #[serde(rename = "playerSpawnIndex")]
    pub player_spawn_index: usize,
}

#[derive(Clone, Debug)]
pub struct PlayerIdentity {
    pub id: String,
    pub name: String,
}

impl Default for PlayerIdentity {
    fn default() -> Self {
        Self {
            id: "local".to_string(),
            name: "Player".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FoodCounts {
    pub green: u32,
    pub blue: u32,
    pub pink: u32,
    pub total: u32,
}

impl FoodCounts {
    pub fn add(&mut self, category: FoodCategory) {
        match category {
            FoodCategory::Green => self.green += 1,
            FoodCategory::Blue => self.blue += 1,
            FoodCategory::Pink => self.pink += 1,
        }
        self.total += 1;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct GameStats {
    pub score: u32,
    pub length: usize,
    /// Seconds of unpaused play.
    pub time: f32,
    /// Grid steps taken.
    pub distance: u32,
    #[serde(rename = "avgSpeed")]
    pub avg_speed: f32,
    #[serde(rename = "maxSpeed")]
    pub max_speed: f32,
    #[serde(rename = "foodCount")]
    pub food_count: FoodCounts,
}
