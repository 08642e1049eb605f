use std::collections::VecDeque;

use glam::{IVec3, Mat3, Quat, Vec3};

use crate::constants::{get_move_interval, DEFAULT_SPM, INITIAL_LENGTH, MIN_SPM};

mod phantom;
mod snake;

pub use self::phantom::Phantom;
pub use self::snake::Snake;

/// Body and step clock shared by the player snake and phantoms.
#[derive(Clone, Debug)]
pub struct GridBody {
    segments: VecDeque<IVec3>,
    orientation: Quat,
    growth_pending: u32,
    accumulated: f32,
    spm: f32,
    last_step: IVec3,
}

impl GridBody {
    /// Lays out `INITIAL_LENGTH` segments trailing behind `head` along
    /// `-forward`.
    pub fn new(head: IVec3, orientation: Quat, forward: IVec3) -> Self {
        let segments = (0..INITIAL_LENGTH as i32)
            .map(|i| head - forward * i)
            .collect();
        Self {
            segments,
            orientation,
            growth_pending: 0,
            accumulated: 0.0,
            spm: DEFAULT_SPM,
            last_step: forward,
        }
    }

    pub fn segments(&self) -> &VecDeque<IVec3> {
        &self.segments
    }

    pub fn head(&self) -> IVec3 {
        self.segments.front().copied().unwrap_or(IVec3::ZERO)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn orientation(&self) -> Quat {
        self.orientation
    }

    pub fn set_orientation(&mut self, orientation: Quat) {
        self.orientation = orientation.normalize();
    }

    /// Unit axis of the most recent committed step.
    pub fn last_step(&self) -> IVec3 {
        self.last_step
    }

    pub fn growth_pending(&self) -> u32 {
        self.growth_pending
    }

    pub fn grow(&mut self) {
        self.growth_pending += 1;
    }

    pub fn steps_per_minute(&self) -> f32 {
        self.spm
    }

    pub fn set_steps_per_minute(&mut self, spm: f32) {
        self.spm = spm.max(MIN_SPM);
    }

    pub fn move_interval(&self) -> f32 {
        get_move_interval(self.spm)
    }

    /// Fraction of the current interval already elapsed, for interpolation.
    pub fn step_progress(&self) -> f32 {
        (self.accumulated / self.move_interval()).clamp(0.0, 1.0)
    }

    pub fn skip_step(&mut self) {
        self.accumulated -= self.move_interval();
    }

    /// Makes the next `accumulate` call cross the threshold.
    pub fn hurry(&mut self) {
        self.accumulated = self.accumulated.max(self.move_interval());
    }

    /// Adds `delta` and consumes one interval if the threshold was reached.
    pub fn accumulate(&mut self, delta: f32) -> bool {
        self.accumulated += delta;
        let interval = self.move_interval();
        if self.accumulated >= interval {
            self.accumulated -= interval;
            return true;
        }
        false
    }

    /// Moves one cell along `dir`. The tail cell is recycled as the new head
    /// unless growth is pending, in which case the body gets longer.
    pub fn step(&mut self, dir: IVec3) {
        let next = self.head() + dir;
        if self.growth_pending > 0 {
            self.growth_pending -= 1;
        } else {
            self.segments.pop_back();
        }
        self.segments.push_front(next);
        self.last_step = dir;
    }
}

/// Something that walks the grid one cell per interval.
pub trait GridEntity {
    fn body(&self) -> &GridBody;

    fn body_mut(&mut self) -> &mut GridBody;

    /// Direction for the step about to be committed. `None` halts the entity
    /// without stepping.
    fn next_step_direction(&mut self) -> Option<IVec3>;

    fn is_active(&self) -> bool {
        true
    }

    /// Returns whether a step was committed this call.
    fn update(&mut self, delta: f32) -> bool {
        if !self.is_active() {
            return false;
        }
        if !self.body_mut().accumulate(delta) {
            return false;
        }
        match self.next_step_direction() {
            Some(dir) => {
                self.body_mut().step(dir);
                true
            }
            None => false,
        }
    }

    fn head(&self) -> IVec3 {
        self.body().head()
    }

    fn segments(&self) -> &VecDeque<IVec3> {
        self.body().segments()
    }

    fn grow(&mut self) {
        self.body_mut().grow();
    }
}

/// Snaps to the dominant axis, checking x, then y, then z.
pub fn snap_to_axis(v: Vec3) -> IVec3 {
    if v.x.abs() > 0.5 {
        return IVec3::new(v.x.signum() as i32, 0, 0);
    }
    if v.y.abs() > 0.5 {
        return IVec3::new(0, v.y.signum() as i32, 0);
    }
    IVec3::new(0, 0, v.z.signum() as i32)
}

/// Orientation whose local forward (`-Z`) points along `dir`, keeping world
/// `+Y` as up where possible.
pub fn look_rotation(dir: IVec3) -> Quat {
    let back = -dir.as_vec3().normalize_or_zero();
    if back == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    let up_hint = if back.y.abs() > 0.9 { Vec3::Z } else { Vec3::Y };
    let right = up_hint.cross(back).normalize();
    let up = back.cross(right);
    Quat::from_mat3(&Mat3::from_cols(right, up, back)).normalize()
}
