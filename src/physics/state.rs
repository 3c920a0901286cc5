//! `MovementState`: one per actor per tick, built from `PhysicsInput`,
//! mutated by the orchestrator, and discarded at tick end.

use crate::geometry::Vec3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotionMode {
    Grounded,
    Airborne,
    Swimming,
}

#[derive(Clone, Copy, Debug)]
pub struct MovementState {
    pub position: Vec3,
    pub orientation: f32,
    pub pitch: f32,
    pub velocity: Vec3,
    pub fall_time: f32,
    pub fall_start_z: f32,
    pub ground_normal: Vec3,
    pub grounded: bool,
    pub swimming: bool,
    pub mode: MotionMode,
    /// Widens the downward ground search for up to
    /// `Tolerances::step_down_hysteresis_frames` ticks after a step-down.
    pub frames_since_step_down: u8,
    pub pending_depenetration: Vec3,
}

impl MovementState {
    pub fn initial(position: Vec3, orientation: f32, pitch: f32, velocity: Vec3, grounded: bool) -> Self {
        Self {
            position,
            orientation,
            pitch,
            velocity,
            fall_time: 0.0,
            fall_start_z: position.z,
            ground_normal: Vec3::new(0.0, 0.0, 1.0),
            grounded,
            swimming: false,
            mode: if grounded {
                MotionMode::Grounded
            } else {
                MotionMode::Airborne
            },
            frames_since_step_down: 0,
            pending_depenetration: Vec3::zeros(),
        }
    }
}
