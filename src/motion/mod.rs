//! Continuous motion control with inertia and wall-clock angular integration

pub mod controller;
pub mod fleet;
pub mod state;

pub use controller::MotionCommands;
pub use fleet::{MotionFleet, RemoteMotion};
pub use state::{MotionFrame, MotionState};
