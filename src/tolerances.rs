//! Scale-dependent epsilon policy.
//!
//! Distances are in world units, time in seconds. Favor practical
//! world-space tolerances over machine epsilon: a capsule that is 1e-7
//! units from a wall is "touching" it for every purpose that matters here.

/// Tunable thresholds and tick constants, owned by the caller (typically as
/// part of a `PhysicsWorld`) rather than living as process-global consts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tolerances {
    /// Per-capsule contact margin; `contact_offset(radius)` scales this by
    /// the capsule radius so thin and thick capsules keep a proportional
    /// skin width.
    pub skin: f32,
    /// Maximum sweep-and-slide iterations per `collideAndSlide` call.
    /// Values at or below 4 are known to get stuck in concave geometry;
    /// 10 is the floor that clears the corner/crease test scenarios.
    pub max_iterations: u32,
    /// Below this remaining distance, `collideAndSlide` stops advancing.
    pub min_move_distance: f32,
    /// cos(max walkable slope). Default corresponds to ~60 degrees.
    pub walkable_min_normal_z: f32,
    /// Surfaces steeper than this (downward-facing, normal.z <= threshold)
    /// are treated as ceilings.
    pub ceiling_normal_z_threshold: f32,
    /// Vertical window within which a grounded actor may step up without
    /// entering the airborne branch.
    pub step_height: f32,
    /// Vertical window within which a grounded actor may step down without
    /// entering the airborne branch.
    pub step_down_height: f32,
    /// Gravity magnitude applied to vertical velocity while airborne.
    pub gravity: f32,
    /// Downward speed clamp while falling.
    pub terminal_velocity: f32,
    /// Maximum frames a step-down hysteresis window stays open.
    pub step_down_hysteresis_frames: u8,
    /// Extra downward search distance granted during the hysteresis window.
    pub step_down_hysteresis_extra: f32,
    /// Fraction of the capsule radius a single tick's depenetration
    /// correction may consume; recovery over multiple ticks avoids popping.
    pub depenetration_rate: f32,
    /// Minimum immersion depth that counts as swimming, expressed as a
    /// fraction of capsule height: an actor only starts swimming once
    /// `level - z` exceeds `swim_immersion_fraction * height`, not the
    /// instant the liquid surface is merely crossed.
    pub swim_immersion_fraction: f32,
    /// Reflection-and-friction slide defaults.
    pub slide_friction: f32,
    pub slide_bump: f32,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            skin: 0.02,
            max_iterations: 10,
            min_move_distance: 1e-3,
            walkable_min_normal_z: 0.5,
            ceiling_normal_z_threshold: -0.5,
            step_height: 0.75,
            step_down_height: 0.75,
            gravity: 19.29,
            terminal_velocity: 54.0,
            step_down_hysteresis_frames: 10,
            step_down_hysteresis_extra: 1.0,
            depenetration_rate: 0.25,
            swim_immersion_fraction: 0.75,
            slide_friction: 1.0,
            slide_bump: 0.0,
        }
    }
}

impl Tolerances {
    /// Contact offset (skin width) scaled by capsule radius.
    #[inline]
    pub const fn contact_offset(&self, radius: f32) -> f32 {
        // Keep a floor so very thin capsules still keep a usable margin.
        if self.skin > radius * 0.5 {
            radius * 0.5
        } else {
            self.skin
        }
    }
}

pub const DIST_EPS: f32 = 1e-6;
pub const ACCEPTANCE_BUFFER: f32 = 0.05;
