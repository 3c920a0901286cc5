//! Movement helpers: intent derivation from `moveFlags`, speed selection,
//! and the liquid-evaluation wiring consumed by `physics::step`.

use crate::abi::{
    MOVEFLAG_BACKWARD, MOVEFLAG_FORWARD, MOVEFLAG_STRAFE_LEFT, MOVEFLAG_STRAFE_RIGHT,
    MOVEFLAG_SWIMMING, MOVEFLAG_WALK_MODE,
};
use crate::geometry::{normalize_or_zero, Vec3};

/// Desired horizontal direction, derived from the forward/backward/strafe
/// bits and the actor's orientation (yaw about +Z, 0 = +X).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MovementIntent {
    pub dir: Vec3,
    pub is_moving: bool,
}

pub fn intent_from_flags(move_flags: u32, orientation: f32) -> MovementIntent {
    let forward = Vec3::new(orientation.cos(), orientation.sin(), 0.0);
    let right = Vec3::new((-orientation).sin(), orientation.cos(), 0.0);

    let mut local = Vec3::zeros();
    if move_flags & MOVEFLAG_FORWARD != 0 {
        local += forward;
    }
    if move_flags & MOVEFLAG_BACKWARD != 0 {
        local -= forward;
    }
    if move_flags & MOVEFLAG_STRAFE_RIGHT != 0 {
        local += right;
    }
    if move_flags & MOVEFLAG_STRAFE_LEFT != 0 {
        local -= right;
    }

    let dir = normalize_or_zero(local);
    MovementIntent {
        dir,
        is_moving: dir.norm_squared() > 0.0,
    }
}

/// Picks the horizontal speed for the current `moveFlags`/state.
pub fn select_speed(
    move_flags: u32,
    is_swimming: bool,
    is_moving_backward: bool,
    walk_speed: f32,
    run_speed: f32,
    run_back_speed: f32,
    swim_speed: f32,
    swim_back_speed: f32,
) -> f32 {
    if is_swimming {
        return if is_moving_backward {
            swim_back_speed
        } else {
            swim_speed
        };
    }
    if move_flags & MOVEFLAG_WALK_MODE != 0 {
        return walk_speed;
    }
    if is_moving_backward {
        run_back_speed
    } else {
        run_speed
    }
}

pub fn is_moving_backward(move_flags: u32) -> bool {
    move_flags & MOVEFLAG_BACKWARD != 0 && move_flags & MOVEFLAG_FORWARD == 0
}

pub fn with_swimming_flag(move_flags: u32, is_swimming: bool) -> u32 {
    if is_swimming {
        move_flags | MOVEFLAG_SWIMMING
    } else {
        move_flags & !MOVEFLAG_SWIMMING
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_intent_matches_orientation() {
        let intent = intent_from_flags(MOVEFLAG_FORWARD, 0.0);
        assert!(intent.is_moving);
        assert!((intent.dir.x - 1.0).abs() < 1e-5);
        assert!(intent.dir.y.abs() < 1e-5);
    }

    #[test]
    fn no_flags_means_not_moving() {
        let intent = intent_from_flags(0, 0.0);
        assert!(!intent.is_moving);
    }

    #[test]
    fn forward_and_backward_cancel() {
        let intent = intent_from_flags(MOVEFLAG_FORWARD | MOVEFLAG_BACKWARD, 0.0);
        assert!(!intent.is_moving);
    }
}
