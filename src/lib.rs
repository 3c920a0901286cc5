//! Deterministic kinematic character controller: sweep-and-slide collision
//! against an instanced static map plus a heightfield terrain grid.
//!
//! Public API policy
//! -----------------
//! Expose only what a caller needs to:
//! - build a per-map `StaticMapTree` + `TerrainGrid` and register it on a
//!   `PhysicsWorld`, and
//! - drive it one actor-tick at a time via `step`.

pub mod abi;
pub mod bih;
pub mod bitmask_flags;
pub mod collide;
pub mod coords;
pub mod error;
pub mod geometry;
pub mod log_sink;
pub mod map_tree;
pub mod movement;
pub mod physics;
pub mod scene_query;
pub mod terrain;
pub mod tolerances;

pub use abi::{DynamicObjectInfo, PhysicsInput, PhysicsOutput};
pub use error::PhysicsError;
pub use physics::{step, MotionMode, MovementState, PhysicsWorld};
pub use tolerances::Tolerances;
