//! Actor-facing ABI boundary: plain data in, plain data out.
//!
//! These structs are the only thing a caller needs to know about to drive
//! the engine. No networking or persistence is implied; `step()` is a pure
//! function of `(PhysicsWorld, PhysicsInput)`.

/// Sentinel for "not currently falling" in `fall_start_z`.
pub const NOT_FALLING_Z: f32 = -200_000.0;

pub const MOVEFLAG_FORWARD: u32 = 0x1;
pub const MOVEFLAG_BACKWARD: u32 = 0x2;
pub const MOVEFLAG_STRAFE_LEFT: u32 = 0x4;
pub const MOVEFLAG_STRAFE_RIGHT: u32 = 0x8;
pub const MOVEFLAG_WALK_MODE: u32 = 0x100;
pub const MOVEFLAG_JUMPING: u32 = 0x2000;
pub const MOVEFLAG_FALLINGFAR: u32 = 0x4000;
pub const MOVEFLAG_SWIMMING: u32 = 0x200000;
pub const MOVEFLAG_FLYING: u32 = 0x1000000;
pub const MOVEFLAG_ONTRANSPORT: u32 = 0x2000000;
pub const MOVEFLAG_HOVER: u32 = 0x40000000;

/// Bit 0: use `vx`/`vy` as the authoritative horizontal velocity instead of
/// deriving it from `moveFlags` + orientation.
pub const PHYSICS_FLAG_TRUST_INPUT_VELOCITY: u32 = 0x1;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DynamicObjectInfo {
    pub guid: u64,
    pub display_id: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub orientation: f32,
    pub scale: f32,
    pub go_state: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PhysicsInput<'a> {
    // kinematic
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub orientation: f32,
    pub pitch: f32,
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
    // dimensions
    pub height: f32,
    pub radius: f32,
    // movement
    pub move_flags: u32,
    pub walk_speed: f32,
    pub run_speed: f32,
    pub run_back_speed: f32,
    pub swim_speed: f32,
    pub swim_back_speed: f32,
    pub flight_speed: f32,
    pub turn_speed: f32,
    // fall tracking
    pub fall_time: u32,
    pub fall_start_z: f32,
    // carried-back ground context
    pub prev_ground_z: f32,
    pub prev_ground_nx: f32,
    pub prev_ground_ny: f32,
    pub prev_ground_nz: f32,
    // carried-back depenetration
    pub pending_depen_x: f32,
    pub pending_depen_y: f32,
    pub pending_depen_z: f32,
    // carried-back step-down hysteresis window: widens the downward ground
    // search for a few ticks after a step-down. The engine has no
    // process-wide state, so this counter round-trips through the ABI the
    // same way fall_time/prev_ground_* do.
    pub frames_since_step_down: u8,
    // standing-on (for moving bases, carried through only, see DESIGN.md)
    pub standing_on_instance_id: u32,
    pub standing_on_local_x: f32,
    pub standing_on_local_y: f32,
    pub standing_on_local_z: f32,
    // spline (optional path follow, carried through only)
    pub has_spline_path: bool,
    pub spline_speed: f32,
    pub spline_points: &'a [[f32; 3]],
    pub current_spline_index: i32,
    // context
    pub map_id: u32,
    pub delta_time: f32,
    pub frame_counter: u32,
    // behaviour flags
    pub physics_flags: u32,
    // nearby dynamic objects (carried through only, see DESIGN.md)
    pub nearby_objects: &'a [DynamicObjectInfo],
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhysicsOutput {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub orientation: f32,
    pub pitch: f32,
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
    pub move_flags: u32,
    pub ground_z: f32,
    pub liquid_z: f32,
    pub liquid_type: u32,
    pub ground_nx: f32,
    pub ground_ny: f32,
    pub ground_nz: f32,
    pub pending_depen_x: f32,
    pub pending_depen_y: f32,
    pub pending_depen_z: f32,
    pub frames_since_step_down: u8,
    pub standing_on_instance_id: u32,
    pub standing_on_local_x: f32,
    pub standing_on_local_y: f32,
    pub standing_on_local_z: f32,
    pub fall_distance: f32,
    pub fall_start_z: f32,
    pub fall_time: f32,
    pub current_spline_index: i32,
    pub spline_progress: f32,
}
