//! 3D primitives, plane math, barycentrics, and the capsule/triangle
//! geometric kernel. This module intentionally contains no broad-phase or
//! world-level concepts; those live in `bih`, `map_tree`, `terrain`.

pub mod capsule;
pub mod kernel;
pub mod primitives;
pub mod triangle;

pub use capsule::Capsule;
pub use kernel::{CapsuleRegion, Hit, SweepHit};
pub use primitives::{normalize_or_zero, AABox, Ray, Vec3};
pub use triangle::Triangle;
