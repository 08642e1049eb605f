use chrono::Utc;
use glam::{IVec3, Quat, Vec3};

use crate::entity::snap_to_axis;
use crate::types::Action;

pub(super) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Grid axes of the local frame: forward, left, right, up.
pub(super) fn local_axes(orientation: Quat) -> (IVec3, IVec3, IVec3, IVec3) {
    (
        snap_to_axis(orientation * Vec3::NEG_Z),
        snap_to_axis(orientation * Vec3::NEG_X),
        snap_to_axis(orientation * Vec3::X),
        snap_to_axis(orientation * Vec3::Y),
    )
}

/// Single input that brings `desired` closer to being the heading. Vertical
/// targets need a roll first so they become a left or right turn.
pub(super) fn action_towards(orientation: Quat, desired: IVec3) -> Option<Action> {
    let (forward, left, right, up) = local_axes(orientation);
    if desired == forward {
        return None;
    }
    if desired == left {
        return Some(Action::Left);
    }
    if desired == right {
        return Some(Action::Right);
    }
    if desired == up || desired == -up {
        return Some(Action::RollLeft);
    }
    // Straight behind: any quarter turn starts the U-turn.
    Some(Action::Left)
}
