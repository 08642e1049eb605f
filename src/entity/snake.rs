use glam::{IVec3, Quat, Vec3};

use super::{snap_to_axis, GridBody, GridEntity};
use crate::spawn::get_spawn_point;

/// Reversal threshold against the last committed step.
const REVERSAL_DOT: f32 = -0.5;

/// The player-controlled body. Direction comes from its own orientation.
#[derive(Clone, Debug)]
pub struct Snake {
    body: GridBody,
}

impl Snake {
    pub fn new(position: IVec3, orientation: Quat) -> Self {
        let orientation = orientation.normalize();
        let forward = snap_to_axis(orientation * Vec3::NEG_Z);
        Self {
            body: GridBody::new(position, orientation, forward),
        }
    }

    pub fn from_spawn(index: usize, world_size: i32) -> Self {
        let spawn = get_spawn_point(index, world_size);
        Self::new(spawn.position, spawn.orientation)
    }

    pub fn reset(&mut self, position: IVec3, orientation: Quat) {
        let spm = self.body.steps_per_minute();
        *self = Self::new(position, orientation);
        self.body.set_steps_per_minute(spm);
    }

    /// Grid axis the next step will take.
    pub fn forward(&self) -> IVec3 {
        snap_to_axis(self.body.orientation() * Vec3::NEG_Z)
    }

    pub fn up(&self) -> Vec3 {
        self.body.orientation() * Vec3::Y
    }

    /// Yaw about local up. Returns false when the turn would point back
    /// against the last step and was ignored.
    pub fn rotate(&mut self, angle: f32) -> bool {
        let next = (self.body.orientation() * Quat::from_axis_angle(Vec3::Y, angle)).normalize();
        let next_forward = next * Vec3::NEG_Z;
        if next_forward.dot(self.body.last_step().as_vec3()) < REVERSAL_DOT {
            return false;
        }
        self.body.set_orientation(next);
        true
    }

    /// Roll about local forward. The heading is unchanged.
    pub fn roll(&mut self, angle: f32) {
        let next = self.body.orientation() * Quat::from_axis_angle(Vec3::NEG_Z, angle);
        self.body.set_orientation(next);
    }

    pub fn set_speed(&mut self, spm: f32) {
        self.body.set_steps_per_minute(spm);
    }

    /// Rounded steps per minute.
    pub fn steps_per_minute(&self) -> u32 {
        self.body.steps_per_minute().round() as u32
    }

    pub fn step_progress(&self) -> f32 {
        self.body.step_progress()
    }

    pub fn skip_step(&mut self) {
        self.body.skip_step();
    }
}

impl GridEntity for Snake {
    fn body(&self) -> &GridBody {
        &self.body
    }

    fn body_mut(&mut self) -> &mut GridBody {
        &mut self.body
    }

    fn next_step_direction(&mut self) -> Option<IVec3> {
        Some(self.forward())
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::{FRAC_PI_2, PI};

    use glam::IVec3;

    use super::Snake;
    use crate::entity::GridEntity;
    use crate::rng::Rng;

    fn assert_grid_aligned(snake: &Snake) {
        let cells: Vec<IVec3> = snake.segments().iter().copied().collect();
        for pair in cells.windows(2) {
            let d = (pair[0] - pair[1]).abs();
            assert_eq!(d.x + d.y + d.z, 1, "segments {:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn spawn_zero_heads_along_positive_z() {
        let snake = Snake::from_spawn(0, 50);
        assert_eq!(snake.head(), IVec3::new(5, 5, 5));
        assert_eq!(snake.forward(), IVec3::Z);
        assert_eq!(snake.segments().len(), 3);
        assert_eq!(snake.segments()[1], IVec3::new(5, 5, 4));
    }

    #[test]
    fn turns_change_forward_by_quarter() {
        let mut snake = Snake::from_spawn(0, 50);
        assert!(snake.rotate(FRAC_PI_2));
        assert_eq!(snake.forward(), IVec3::X);
        assert!(snake.rotate(-FRAC_PI_2));
        assert_eq!(snake.forward(), IVec3::Z);
    }

    #[test]
    fn half_turn_against_last_step_is_ignored() {
        let mut snake = Snake::from_spawn(0, 50);
        assert!(!snake.rotate(PI));
        assert_eq!(snake.forward(), IVec3::Z);
    }

    #[test]
    fn double_turn_before_step_cannot_reverse() {
        let mut snake = Snake::from_spawn(1, 50);
        let start = snake.forward();
        assert!(snake.rotate(FRAC_PI_2));
        assert!(!snake.rotate(FRAC_PI_2));
        assert!(snake.update(0.2));
        assert_ne!(snake.body().last_step(), -start);
    }

    #[test]
    fn roll_keeps_heading_but_changes_up() {
        let mut snake = Snake::from_spawn(0, 50);
        let up_before = snake.up();
        snake.roll(FRAC_PI_2);
        assert_eq!(snake.forward(), IVec3::Z);
        assert!(snake.up().dot(up_before).abs() < 1e-4);
    }

    #[test]
    fn random_inputs_keep_grid_alignment_and_no_reversal() {
        for seed in 0..100u32 {
            let mut rng = Rng::new(seed);
            let mut snake = Snake::from_spawn(seed as usize, 50);
            for _ in 0..300 {
                match rng.int(0, 5) {
                    0 => {
                        snake.rotate(FRAC_PI_2);
                    }
                    1 => {
                        snake.rotate(-FRAC_PI_2);
                    }
                    2 => snake.roll(FRAC_PI_2),
                    3 => snake.roll(-FRAC_PI_2),
                    _ => {}
                }
                if rng.int(0, 9) == 0 {
                    snake.grow();
                }
                let before = snake.body().last_step();
                if snake.update(0.2) {
                    assert_ne!(snake.body().last_step(), -before, "seed={seed}");
                }
                assert_grid_aligned(&snake);
            }
        }
    }

    #[test]
    fn step_progress_and_skip_step() {
        let mut snake = Snake::from_spawn(0, 50);
        snake.set_speed(300.0);
        assert!(!snake.update(0.1));
        assert!((snake.step_progress() - 0.5).abs() < 1e-4);
        snake.skip_step();
        assert_eq!(snake.step_progress(), 0.0);
        assert_eq!(snake.steps_per_minute(), 300);
    }
}
