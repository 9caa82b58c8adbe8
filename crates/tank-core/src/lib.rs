//! tank-core — Control loop for a face-following tank robot.
//!
//! Ties a frame source, a vision oracle and a motor actuator together in a
//! read → detect → decide → act cycle running on a dedicated worker thread.
//! The collaborators are traits; `tank-hw` and `tank-vision` provide the
//! hardware-backed implementations.

pub mod actuator;
pub mod control;
pub mod lifecycle;
pub mod oracle;
pub mod policy;
pub mod source;
pub mod types;

#[cfg(test)]
mod testing;

pub use actuator::{Actuator, Motor};
pub use control::{ControlConfig, ControlError, ControlLoop, WorkerExit, WorkerOutcome, WorkerReport};
pub use lifecycle::Lifecycle;
pub use oracle::{normalize_face, VisionOracle};
pub use policy::{BehaviorPolicy, FollowDecision, PolicyTimings};
pub use source::FrameSource;
pub use types::{DetectedFace, Frame, FrameError, MotionCommand, RecognitionResult, SystemState};
