//! Motor actuator seam and the lifecycle-gated handle the control loop drives.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::lifecycle::Lifecycle;
use crate::types::MotionCommand;

/// Low-level motor driver.
///
/// Motion commands are fire-and-forget; only `initialize` reports failure.
pub trait Actuator: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    fn initialize(&mut self) -> Result<(), Self::Error>;
    fn move_forward(&mut self);
    fn turn_clockwise(&mut self);
    fn turn_counterclockwise(&mut self);
    fn stop(&mut self);
}

/// Shared handle to an [`Actuator`].
///
/// Serializes access between the worker and the shutdown path, and refuses
/// every command except `Stop` unless the lifecycle is `Running`.
pub struct Motor<A> {
    actuator: Mutex<A>,
    lifecycle: Arc<Lifecycle>,
}

impl<A: Actuator> Motor<A> {
    pub fn new(actuator: A, lifecycle: Arc<Lifecycle>) -> Self {
        Self {
            actuator: Mutex::new(actuator),
            lifecycle,
        }
    }

    pub fn initialize(&self) -> Result<(), A::Error> {
        self.lock().initialize()
    }

    /// Issue `command`, returning whether it reached the actuator.
    pub fn command(&self, command: MotionCommand) -> bool {
        if command != MotionCommand::Stop && !self.lifecycle.is_running() {
            tracing::debug!(%command, state = %self.lifecycle.get(), "motion refused outside running state");
            return false;
        }

        let mut actuator = self.lock();
        tracing::trace!(%command, "motor command");
        match command {
            MotionCommand::Forward => actuator.move_forward(),
            MotionCommand::RotateClockwise => actuator.turn_clockwise(),
            MotionCommand::RotateCounterClockwise => actuator.turn_counterclockwise(),
            MotionCommand::Stop => actuator.stop(),
        }
        true
    }

    // A panic mid-command must not prevent the final stop.
    fn lock(&self) -> MutexGuard<'_, A> {
        self.actuator.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
