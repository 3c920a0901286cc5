//! Fatal error paths.
//!
//! Most of this engine never fails: geometric pathology (degenerate
//! triangles, stuck corners, query misses) is represented as data
//! (`None`, empty `Vec`, a `hit_corner` flag) rather than as `Result::Err`.
//! `PhysicsError` exists for the small set of conditions that really are
//! programming errors at the ABI boundary.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PhysicsError {
    /// Non-finite (`NaN`/`inf`) coordinate or velocity arrived at the ABI
    /// boundary. The core does not attempt to sanitize; this is the one
    /// invariant breach that is surfaced to the caller instead of being
    /// absorbed locally.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("tile ({tile_x}, {tile_y}) is not loaded")]
    TileNotLoaded { tile_x: u32, tile_y: u32 },

    #[error("model instance {id} not found")]
    InstanceNotFound { id: u32 },
}
