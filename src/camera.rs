use std::f32::consts::PI;

use glam::{Quat, Vec3};
use rand::rngs::SmallRng;
use rand::{Rng as _, SeedableRng};
use serde::Serialize;

use crate::settings::CameraConfig;

pub const MANUAL_SENSITIVITY: f32 = 0.002;
const MANUAL_DECAY_RATE: f32 = 5.0;
const PITCH_LIMIT: f32 = PI / 3.0;
const YAW_LIMIT: f32 = PI / 1.5;

const ORBIT_TRANSITION_SECS: f32 = 0.8;
const ORBIT_SPIN_SPEED: f32 = 0.2;
const ORBIT_YAW_DEG: f32 = 125.0;
const ORBIT_ROLL_DEG: f32 = 25.0;

pub const DEFAULT_SHAKE_DECAY: f32 = 0.6;

/// What a renderer needs to place the camera for this frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CameraPose {
    pub position: Vec3,
    pub up: Vec3,
    #[serde(rename = "lookAt")]
    pub look_at: Vec3,
    pub fov: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum CameraMode {
    Follow,
    Orbit { time: f32, base: Quat },
}

#[derive(Clone, Debug)]
pub struct CameraController {
    config: CameraConfig,
    mode: CameraMode,
    rig_position: Vec3,
    rig_rotation: Quat,
    smoothed_rotation: Quat,
    manual_yaw: f32,
    manual_pitch: f32,
    manual_active: bool,
    shake_intensity: f32,
    shake_decay: f32,
    shake_rng: SmallRng,
    pose: CameraPose,
}

impl CameraController {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            mode: CameraMode::Follow,
            rig_position: Vec3::ZERO,
            rig_rotation: Quat::IDENTITY,
            smoothed_rotation: Quat::IDENTITY,
            manual_yaw: 0.0,
            manual_pitch: 0.0,
            manual_active: false,
            shake_intensity: 0.0,
            shake_decay: DEFAULT_SHAKE_DECAY,
            shake_rng: SmallRng::from_rng(&mut rand::rng()),
            pose: CameraPose {
                position: Vec3::ZERO,
                up: Vec3::Y,
                look_at: Vec3::NEG_Z,
                fov: config.fov,
            },
        }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn update_config(&mut self, config: CameraConfig) {
        self.config = config;
        self.pose.fov = config.fov;
    }

    pub fn reset(&mut self) {
        self.rig_position = Vec3::ZERO;
        self.rig_rotation = Quat::IDENTITY;
        self.smoothed_rotation = Quat::IDENTITY;
        self.manual_yaw = 0.0;
        self.manual_pitch = 0.0;
        self.manual_active = false;
        self.mode = CameraMode::Follow;
    }

    /// Jumps the rig onto the target so the first frame does not sweep in
    /// from the origin.
    pub fn snap_to(&mut self, target: Vec3, rotation: Quat) {
        self.rig_position = target;
        self.rig_rotation = rotation;
        self.smoothed_rotation = rotation;
        self.write_pose(0.0);
    }

    pub fn trigger_shake(&mut self, amount: f32, decay: f32) {
        self.shake_intensity = amount;
        self.shake_decay = decay;
    }

    pub fn shake_intensity(&self) -> f32 {
        self.shake_intensity
    }

    pub fn set_manual_control_active(&mut self, active: bool) {
        self.manual_active = active;
    }

    pub fn is_manual_active(&self) -> bool {
        self.manual_active
    }

    /// Pointer movement in pixels.
    pub fn apply_manual_movement(&mut self, dx: f32, dy: f32, sensitivity: f32) {
        self.manual_yaw = (self.manual_yaw - dx * sensitivity).clamp(-YAW_LIMIT, YAW_LIMIT);
        self.manual_pitch = (self.manual_pitch - dy * sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    pub fn manual_angles(&self) -> (f32, f32) {
        (self.manual_yaw, self.manual_pitch)
    }

    pub fn set_orbit_mode(&mut self) {
        self.mode = CameraMode::Orbit {
            time: 0.0,
            base: self.rig_rotation,
        };
    }

    pub fn stop_orbit_mode(&mut self) {
        self.mode = CameraMode::Follow;
    }

    pub fn is_orbiting(&self) -> bool {
        matches!(self.mode, CameraMode::Orbit { .. })
    }

    pub fn rig(&self) -> (Vec3, Quat) {
        (self.rig_position, self.rig_rotation)
    }

    pub fn pose(&self) -> CameraPose {
        self.pose
    }

    /// `progress` is the head's fraction of the way into its next cell.
    pub fn update(&mut self, delta: f32, head: Vec3, heading: Quat, progress: f32) -> CameraPose {
        if let CameraMode::Orbit { time, base } = self.mode {
            let time = time + delta;
            self.mode = CameraMode::Orbit { time, base };
            self.rig_rotation = orbit_rotation(base, time);
            self.write_pose(delta);
            return self.pose;
        }

        let target = head + (heading * Vec3::NEG_Z) * progress;
        let t = (delta * self.config.lerp_speed).min(1.0);
        self.rig_position = self.rig_position.lerp(target, t);

        if !self.manual_active {
            self.smoothed_rotation = self.smoothed_rotation.slerp(heading, t).normalize();
            let decay = (delta * MANUAL_DECAY_RATE).min(1.0);
            self.manual_yaw += (0.0 - self.manual_yaw) * decay;
            self.manual_pitch += (0.0 - self.manual_pitch) * decay;
        }

        self.rig_rotation = self.smoothed_rotation
            * Quat::from_axis_angle(Vec3::Y, self.manual_yaw)
            * Quat::from_axis_angle(Vec3::X, self.manual_pitch);

        self.write_pose(delta);
        self.pose
    }

    fn write_pose(&mut self, delta: f32) {
        let up = self.rig_rotation * Vec3::Y;
        let back = self.rig_rotation * Vec3::Z;
        let mut position =
            self.rig_position + up * self.config.distance_up + back * self.config.distance_back;
        let look_at = self.rig_position + up * self.config.horizon_offset;

        if self.shake_intensity > 0.0 {
            let amount = self.shake_intensity;
            let offset = Vec3::new(
                self.shake_rng.random_range(-amount..=amount),
                self.shake_rng.random_range(-amount..=amount),
                self.shake_rng.random_range(-amount..=amount),
            );
            position += offset;
            self.shake_intensity = (self.shake_intensity - delta * self.shake_decay).max(0.0);
        }

        self.pose = CameraPose {
            position,
            up,
            look_at,
            fov: self.config.fov,
        };
    }
}

/// Eased swoop to a fixed yaw and roll, then a slow constant spin.
fn orbit_rotation(base: Quat, time: f32) -> Quat {
    let linear = (time / ORBIT_TRANSITION_SECS).min(1.0);
    let eased = 1.0 - (1.0 - linear).powi(3);
    let yaw = ORBIT_YAW_DEG.to_radians() * eased + time * ORBIT_SPIN_SPEED;
    let roll = ORBIT_ROLL_DEG.to_radians() * eased;
    base * Quat::from_axis_angle(Vec3::Y, yaw) * Quat::from_axis_angle(Vec3::NEG_Z, roll)
}
