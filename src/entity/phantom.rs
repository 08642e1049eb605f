use glam::{IVec3, Quat, Vec3};

use super::{look_rotation, snap_to_axis, GridBody, GridEntity};
use crate::constants::{MIN_SPM, PHANTOM_COLORS};
use crate::replay::ReplayPlayer;
use crate::spawn::get_spawn_point;
use crate::types::ReplayData;

/// A ghost of a past session, steered by its trajectory log.
#[derive(Clone, Debug)]
pub struct Phantom {
    body: GridBody,
    player: ReplayPlayer,
    move_direction: IVec3,
    world_size: i32,
    color_index: usize,
    score: u32,
    dead: bool,
}

impl Phantom {
    pub fn new(replay: ReplayData, color_index: usize, world_size: i32) -> Self {
        let mut phantom = Self {
            body: GridBody::new(IVec3::ZERO, Quat::IDENTITY, IVec3::NEG_Z),
            player: ReplayPlayer::new(replay),
            move_direction: IVec3::NEG_Z,
            world_size,
            color_index,
            score: 0,
            dead: false,
        };
        phantom.reset();
        phantom
    }

    /// Back to the recorded start. An exact start position and direction win
    /// over the spawn index when both were recorded.
    pub fn reset(&mut self) {
        let params = self.player.start_params();
        let (position, orientation, direction) =
            match (params.start_position, params.start_direction) {
                (Some(position), Some(direction)) => {
                    let dir = snap_to_axis(direction.to_vec3());
                    (position.to_cell(), look_rotation(dir), dir)
                }
                _ => {
                    let spawn = get_spawn_point(params.spawn_index, self.world_size);
                    let dir = snap_to_axis(spawn.orientation * Vec3::NEG_Z);
                    (spawn.position, spawn.orientation, dir)
                }
            };
        let spm = self.player.initial_speed();

        self.body = GridBody::new(position, orientation, direction);
        self.body.set_steps_per_minute(spm);
        self.move_direction = direction;
        self.score = 0;
        self.dead = false;
        self.player.reset();
        self.player.set_initial_direction(direction);
    }

    fn set_move_direction(&mut self, dir: IVec3) {
        self.move_direction = dir;
        self.body.set_orientation(look_rotation(dir));
    }

    /// Food speed effect, floored at the minimum speed.
    pub fn apply_food_effect(&mut self, spm_change: f32) {
        let spm = (self.body.steps_per_minute() + spm_change).max(MIN_SPM);
        self.body.set_steps_per_minute(spm);
    }

    pub fn kill(&mut self) {
        self.dead = true;
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn add_score(&mut self, points: u32) {
        self.score += points;
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn steps_per_minute(&self) -> f32 {
        self.body.steps_per_minute()
    }

    pub fn step_progress(&self) -> f32 {
        self.body.step_progress()
    }

    pub fn move_direction(&self) -> IVec3 {
        self.move_direction
    }

    pub fn color(&self) -> u32 {
        PHANTOM_COLORS[self.color_index % PHANTOM_COLORS.len()]
    }

    pub fn color_hex(&self) -> String {
        format!("#{:06x}", self.color())
    }

    pub fn player(&self) -> &ReplayPlayer {
        &self.player
    }

    pub fn player_id(&self) -> &str {
        self.player.player_id()
    }

    pub fn player_name(&self) -> &str {
        self.player.player_name()
    }

    /// Head cell after each step, one step per call, until the phantom dies
    /// or `max_steps` is reached. Food is not simulated.
    pub fn trace(&mut self, max_steps: usize) -> Vec<IVec3> {
        let mut heads = Vec::new();
        while heads.len() < max_steps {
            let interval = self.body.move_interval();
            if !self.update(interval) {
                break;
            }
            heads.push(self.body.head());
        }
        heads
    }
}

impl GridEntity for Phantom {
    fn body(&self) -> &GridBody {
        &self.body
    }

    fn body_mut(&mut self) -> &mut GridBody {
        &mut self.body
    }

    fn is_active(&self) -> bool {
        !self.dead
    }

    fn next_step_direction(&mut self) -> Option<IVec3> {
        let change = self.player.check_direction_change(self.body.head());
        if self.player.is_dead() {
            self.dead = true;
            return None;
        }
        if let Some(dir) = change {
            self.set_move_direction(dir);
        }
        Some(self.move_direction)
    }
}
