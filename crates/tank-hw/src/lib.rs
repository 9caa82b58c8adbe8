//! tank-hw — Hardware collaborators for the control loop.
//!
//! Provides a V4L2 camera feeder that always hands out the most recent frame,
//! and a sysfs GPIO driver for a dual H-bridge motor board.

pub mod camera;
pub mod frame;
pub mod motor;
pub mod wiring;

pub use camera::{CameraError, CameraFeeder, PixelFormat};
pub use motor::{GpioMotor, MotorError};
pub use wiring::{MotorWiring, WheelPins};
