use glam::IVec3;
use thiserror::Error;
use tracing::{debug, info};

use crate::constants::{DEFAULT_SPM, REPLAY_MATCH_EPSILON_SQ};
use crate::types::{PlayerIdentity, ReplayData, StartParams, TrajectoryChange, WireVec3};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("replay json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("trajectory change {index} has a non-axis direction")]
    InvalidDirection { index: usize },
    #[error("start direction is not a unit grid axis")]
    InvalidStartDirection,
    #[error("initial speed must be positive, got {0}")]
    InvalidSpeed(f32),
}

pub fn to_json(replay: &ReplayData) -> Result<String, ReplayError> {
    Ok(serde_json::to_string(replay)?)
}

pub fn to_json_pretty(replay: &ReplayData) -> Result<String, ReplayError> {
    Ok(serde_json::to_string_pretty(replay)?)
}

/// Parses and validates a replay payload.
pub fn from_json(raw: &str) -> Result<ReplayData, ReplayError> {
    let replay: ReplayData = serde_json::from_str(raw)?;
    validate(&replay)?;
    Ok(replay)
}

pub fn validate(replay: &ReplayData) -> Result<(), ReplayError> {
    let speed = replay.start_params.initial_speed;
    if !speed.is_finite() || speed <= 0.0 {
        return Err(ReplayError::InvalidSpeed(speed));
    }
    if let Some(dir) = replay.start_params.start_direction {
        if !is_unit_axis(dir) {
            return Err(ReplayError::InvalidStartDirection);
        }
    }
    for (index, change) in replay.trajectory_log.iter().enumerate() {
        if !is_unit_axis(change.direction) {
            return Err(ReplayError::InvalidDirection { index });
        }
    }
    Ok(())
}

fn is_unit_axis(v: WireVec3) -> bool {
    let cell = v.to_cell();
    let d = cell.abs();
    d.x + d.y + d.z == 1 && v.to_vec3().distance_squared(cell.as_vec3()) < 1e-4
}

/// Observes the live snake and keeps only the steps where its heading changed.
#[derive(Clone, Debug)]
pub struct ReplayRecorder {
    start_params: StartParams,
    log: Vec<TrajectoryChange>,
    last_direction: IVec3,
    recording: bool,
}

impl ReplayRecorder {
    pub fn new(seed: u32, spawn_index: usize, initial_speed: f32) -> Self {
        Self {
            start_params: StartParams {
                seed,
                spawn_index,
                initial_speed,
                start_position: None,
                start_direction: None,
            },
            log: Vec::new(),
            last_direction: IVec3::ZERO,
            recording: false,
        }
    }

    pub fn start(&mut self, direction: IVec3, position: IVec3) {
        self.log.clear();
        self.last_direction = direction;
        self.start_params.start_direction = Some(direction.into());
        self.start_params.start_position = Some(position.into());
        self.recording = true;
        info!(
            seed = self.start_params.seed,
            spawn = self.start_params.spawn_index,
            "recording started"
        );
    }

    pub fn stop(&mut self) {
        if !self.recording {
            return;
        }
        self.recording = false;
        info!(changes = self.log.len(), "recording stopped");
    }

    pub fn reset(&mut self, seed: u32, spawn_index: usize, initial_speed: f32) {
        *self = Self::new(seed, spawn_index, initial_speed);
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// `position` is the head before the step that takes `direction`.
    pub fn record_direction_change(&mut self, position: IVec3, direction: IVec3) {
        if !self.recording || direction == self.last_direction {
            return;
        }
        self.log.push(TrajectoryChange {
            position: position.into(),
            direction: direction.into(),
        });
        self.last_direction = direction;
        debug!(?position, ?direction, "direction change recorded");
    }

    pub fn change_count(&self) -> usize {
        self.log.len()
    }

    pub fn log(&self) -> &[TrajectoryChange] {
        &self.log
    }

    pub fn start_params(&self) -> &StartParams {
        &self.start_params
    }

    /// Freezes the session so far into a self-contained payload.
    pub fn replay_data(
        &self,
        id: String,
        player: &PlayerIdentity,
        final_score: u32,
        death_position: IVec3,
        timestamp: i64,
    ) -> ReplayData {
        ReplayData {
            id,
            player_id: player.id.clone(),
            player_name: player.name.clone(),
            timestamp,
            start_params: self.start_params.clone(),
            final_score,
            elo: None,
            death_position: death_position.into(),
            trajectory_log: self.log.clone(),
        }
    }
}

impl Default for ReplayRecorder {
    fn default() -> Self {
        Self::new(0, 0, DEFAULT_SPM)
    }
}

/// Cursor over a recorded trajectory, keyed by head position.
#[derive(Clone, Debug)]
pub struct ReplayPlayer {
    replay: ReplayData,
    cursor: usize,
    dead: bool,
    current_direction: IVec3,
}

impl ReplayPlayer {
    pub fn new(replay: ReplayData) -> Self {
        Self {
            replay,
            cursor: 0,
            dead: false,
            current_direction: IVec3::ZERO,
        }
    }

    /// Called once per phantom step with the head about to move.
    ///
    /// Reaching the death position is terminal and returns `None`.
    /// Otherwise every consecutive change recorded at this cell is consumed
    /// and the last of them is returned.
    pub fn check_direction_change(&mut self, position: IVec3) -> Option<IVec3> {
        if self.dead {
            return None;
        }
        let here = position.as_vec3();
        if here.distance_squared(self.replay.death_position.to_vec3()) < REPLAY_MATCH_EPSILON_SQ {
            self.dead = true;
            debug!(replay = %self.replay.id, ?position, "phantom reached death position");
            return None;
        }

        let mut found = None;
        while let Some(change) = self.replay.trajectory_log.get(self.cursor) {
            if here.distance_squared(change.position.to_vec3()) >= REPLAY_MATCH_EPSILON_SQ {
                break;
            }
            let dir = change.direction.to_cell();
            self.current_direction = dir;
            self.cursor += 1;
            found = Some(dir);
            debug!(replay = %self.replay.id, ?position, ?dir, "phantom applied change");
        }
        found
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
        self.dead = false;
        self.current_direction = IVec3::ZERO;
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn remaining_changes(&self) -> usize {
        self.replay.trajectory_log.len().saturating_sub(self.cursor)
    }

    pub fn current_direction(&self) -> IVec3 {
        self.current_direction
    }

    pub fn set_initial_direction(&mut self, direction: IVec3) {
        self.current_direction = direction;
    }

    pub fn replay(&self) -> &ReplayData {
        &self.replay
    }

    pub fn start_params(&self) -> &StartParams {
        &self.replay.start_params
    }

    pub fn death_position(&self) -> IVec3 {
        self.replay.death_position.to_cell()
    }

    pub fn replay_id(&self) -> &str {
        &self.replay.id
    }

    pub fn player_id(&self) -> &str {
        &self.replay.player_id
    }

    pub fn player_name(&self) -> &str {
        &self.replay.player_name
    }

    pub fn final_score(&self) -> u32 {
        self.replay.final_score
    }

    pub fn initial_speed(&self) -> f32 {
        self.replay.start_params.initial_speed
    }
}

#[cfg(test)]
mod tests {
    use glam::IVec3;

    use super::{from_json, to_json, ReplayError, ReplayPlayer, ReplayRecorder};
    use crate::types::{PlayerIdentity, WireVec3};

    fn recorder_at_spawn_zero() -> ReplayRecorder {
        let mut recorder = ReplayRecorder::new(42, 0, 300.0);
        recorder.start(IVec3::Z, IVec3::new(5, 5, 5));
        recorder
    }

    #[test]
    fn recorder_keeps_only_changes() {
        let mut recorder = recorder_at_spawn_zero();
        recorder.record_direction_change(IVec3::new(5, 5, 5), IVec3::Z);
        recorder.record_direction_change(IVec3::new(5, 5, 6), IVec3::Z);
        recorder.record_direction_change(IVec3::new(5, 5, 7), IVec3::X);
        recorder.record_direction_change(IVec3::new(6, 5, 7), IVec3::X);
        recorder.record_direction_change(IVec3::new(7, 5, 7), IVec3::Y);
        assert_eq!(recorder.change_count(), 2);
        assert_eq!(recorder.log()[0].position, WireVec3::from(IVec3::new(5, 5, 7)));
        assert_eq!(recorder.log()[1].direction, WireVec3::from(IVec3::Y));
    }

    #[test]
    fn recorder_ignores_input_when_stopped() {
        let mut recorder = recorder_at_spawn_zero();
        recorder.stop();
        recorder.record_direction_change(IVec3::new(5, 5, 6), IVec3::X);
        assert_eq!(recorder.change_count(), 0);
        assert!(!recorder.is_recording());

        let mut idle = ReplayRecorder::new(1, 1, 300.0);
        idle.record_direction_change(IVec3::ZERO, IVec3::X);
        assert_eq!(idle.change_count(), 0);
    }

    #[test]
    fn replay_data_carries_exact_start() {
        let recorder = recorder_at_spawn_zero();
        let replay = recorder.replay_data(
            "r".to_string(),
            &PlayerIdentity::default(),
            25,
            IVec3::new(5, 5, 51),
            1_700_000_000_000,
        );
        assert_eq!(
            replay.start_params.start_position,
            Some(WireVec3::from(IVec3::new(5, 5, 5)))
        );
        assert_eq!(replay.start_params.start_direction, Some(WireVec3::from(IVec3::Z)));
        assert_eq!(replay.final_score, 25);
        assert_eq!(replay.player_name, "Player");
    }

    #[test]
    fn player_applies_all_changes_at_same_cell() {
        let mut recorder = recorder_at_spawn_zero();
        recorder.record_direction_change(IVec3::new(5, 5, 7), IVec3::X);
        let mut replay = recorder.replay_data(
            "r".to_string(),
            &PlayerIdentity::default(),
            0,
            IVec3::new(51, 5, 7),
            0,
        );
        replay.trajectory_log.push(crate::types::TrajectoryChange {
            position: IVec3::new(5, 5, 7).into(),
            direction: IVec3::Y.into(),
        });

        let mut player = ReplayPlayer::new(replay);
        assert_eq!(player.check_direction_change(IVec3::new(5, 5, 6)), None);
        assert_eq!(player.check_direction_change(IVec3::new(5, 5, 7)), Some(IVec3::Y));
        assert_eq!(player.remaining_changes(), 0);
        assert_eq!(player.current_direction(), IVec3::Y);
    }

    #[test]
    fn death_check_runs_before_changes_and_is_terminal() {
        let mut recorder = recorder_at_spawn_zero();
        recorder.record_direction_change(IVec3::new(5, 5, 8), IVec3::X);
        let replay = recorder.replay_data(
            "r".to_string(),
            &PlayerIdentity::default(),
            0,
            IVec3::new(5, 5, 8),
            0,
        );
        let mut player = ReplayPlayer::new(replay);
        assert_eq!(player.check_direction_change(IVec3::new(5, 5, 8)), None);
        assert!(player.is_dead());
        assert_eq!(player.check_direction_change(IVec3::new(9, 9, 9)), None);

        player.reset();
        assert!(!player.is_dead());
        assert_eq!(player.cursor(), 0);
    }

    #[test]
    fn json_round_trip_validates_directions() {
        let mut recorder = recorder_at_spawn_zero();
        recorder.record_direction_change(IVec3::new(5, 5, 9), IVec3::NEG_X);
        let replay = recorder.replay_data(
            "r".to_string(),
            &PlayerIdentity::default(),
            5,
            IVec3::new(-1, 5, 9),
            3,
        );
        let text = to_json(&replay).expect("serialize");
        let parsed = from_json(&text).expect("parse");
        assert_eq!(parsed, replay);

        let broken = text.replace(
            "\"direction\":{\"x\":-1.0,\"y\":0.0,\"z\":0.0}",
            "\"direction\":{\"x\":0.7,\"y\":0.7,\"z\":0.0}",
        );
        assert!(matches!(
            from_json(&broken),
            Err(ReplayError::InvalidDirection { index: 0 })
        ));
        assert!(matches!(from_json("{"), Err(ReplayError::Json(_))));
    }
}
