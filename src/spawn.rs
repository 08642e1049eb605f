use std::f32::consts::{FRAC_PI_2, PI};

use glam::{IVec3, Quat, Vec3};
use rand::Rng as _;

use crate::constants::SPAWN_OFFSET;

pub const SPAWN_COUNT: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnPoint {
    pub position: IVec3,
    pub orientation: Quat,
}

/// Four spawns near the bottom corners, each heading away from the nearest
/// wall.
pub fn spawn_points(world_size: i32) -> [SpawnPoint; SPAWN_COUNT] {
    let near = SPAWN_OFFSET;
    let far = world_size - SPAWN_OFFSET;
    [
        SpawnPoint {
            position: IVec3::new(near, near, near),
            orientation: Quat::from_axis_angle(Vec3::Y, PI),
        },
        SpawnPoint {
            position: IVec3::new(far, near, near),
            orientation: Quat::from_axis_angle(Vec3::Y, FRAC_PI_2),
        },
        SpawnPoint {
            position: IVec3::new(near, near, far),
            orientation: Quat::from_axis_angle(Vec3::Y, -FRAC_PI_2),
        },
        SpawnPoint {
            position: IVec3::new(far, near, far),
            orientation: Quat::IDENTITY,
        },
    ]
}

/// Any index is accepted; it wraps around the spawn table.
pub fn get_spawn_point(index: usize, world_size: i32) -> SpawnPoint {
    spawn_points(world_size)[index % SPAWN_COUNT]
}

pub fn random_spawn_index() -> usize {
    rand::rng().random_range(0..SPAWN_COUNT)
}
