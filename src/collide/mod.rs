//! Contact response: the collide-and-slide resolver plus its small
//! diagnostics helpers.

pub mod diagnostics;
pub mod slide;

pub use diagnostics::*;
pub use slide::{collide_and_slide, SlideResult};
