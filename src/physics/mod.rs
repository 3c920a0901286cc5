//! PhysicsEngine Step: per-tick orchestration (motion-mode state machine,
//! gravity integration, step-up/step-down discipline, depenetration).

pub mod state;
pub mod step;

pub use state::{MotionMode, MovementState};
pub use step::{step, PhysicsWorld};
