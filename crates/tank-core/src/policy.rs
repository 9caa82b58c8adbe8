//! Behavior policy: maps a detection outcome to a timed motion.
//!
//! Every action is closed: issue a command, wait, then stop. The caller blocks
//! for the whole action, so the robot never drifts between decisions.

use std::thread;
use std::time::Duration;

use rand::Rng;

use crate::actuator::{Actuator, Motor};
use crate::types::MotionCommand;

/// Durations and tolerance used by [`BehaviorPolicy`].
#[derive(Debug, Clone)]
pub struct PolicyTimings {
    /// Clockwise sweep while searching.
    pub search_turn: Duration,
    /// Forward approach when the target is centered.
    pub follow_forward: Duration,
    /// Turn when the target is off center.
    pub follow_turn: Duration,
    /// Randomized rotation performed once after the first frame.
    pub initial_rotate: Duration,
    /// Offsets strictly inside this band (in pixels) count as centered.
    pub center_tolerance: f32,
}

impl Default for PolicyTimings {
    fn default() -> Self {
        Self {
            search_turn: Duration::from_millis(700),
            follow_forward: Duration::from_secs(1),
            follow_turn: Duration::from_millis(700),
            initial_rotate: Duration::from_secs(10),
            center_tolerance: 20.0,
        }
    }
}

/// Where the target sits relative to the frame's midline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowDecision {
    Center,
    /// Positive offset: the face is left of the midline.
    Left,
    /// Negative offset: the face is right of the midline.
    Right,
}

impl FollowDecision {
    /// Classify a horizontal offset. `|offset| == tolerance` is not centered.
    pub fn classify(offset: f32, tolerance: f32) -> Self {
        if offset.abs() < tolerance {
            FollowDecision::Center
        } else if offset > 0.0 {
            FollowDecision::Left
        } else {
            FollowDecision::Right
        }
    }

    /// Motion used for this decision.
    ///
    /// Both off-center sides turn clockwise; the robot rotates until the
    /// target drifts into the center band from either side.
    pub fn command(self) -> MotionCommand {
        match self {
            FollowDecision::Center => MotionCommand::Forward,
            FollowDecision::Left => MotionCommand::RotateClockwise,
            FollowDecision::Right => MotionCommand::RotateClockwise,
        }
    }
}

/// Stateless set of timed actions over a [`Motor`].
#[derive(Debug, Clone, Default)]
pub struct BehaviorPolicy {
    timings: PolicyTimings,
}

impl BehaviorPolicy {
    pub fn new(timings: PolicyTimings) -> Self {
        Self { timings }
    }

    /// Rotate clockwise a little, then stop.
    pub fn search<A: Actuator>(&self, motor: &Motor<A>) {
        tracing::debug!("searching for faces");
        self.timed(motor, MotionCommand::RotateClockwise, self.timings.search_turn);
    }

    /// Approach a centered target, otherwise turn toward it.
    pub fn follow<A: Actuator>(&self, motor: &Motor<A>, offset: f32) -> FollowDecision {
        let decision = FollowDecision::classify(offset, self.timings.center_tolerance);
        let duration = match decision {
            FollowDecision::Center => self.timings.follow_forward,
            FollowDecision::Left | FollowDecision::Right => self.timings.follow_turn,
        };
        tracing::debug!(offset, ?decision, "following target");
        self.timed(motor, decision.command(), duration);
        decision
    }

    /// Rotate in a random direction for the long initial duration, then stop.
    pub fn one_rotate<A: Actuator, R: Rng + ?Sized>(
        &self,
        motor: &Motor<A>,
        rng: &mut R,
    ) -> MotionCommand {
        let command = if rng.gen_bool(0.5) {
            MotionCommand::RotateClockwise
        } else {
            MotionCommand::RotateCounterClockwise
        };
        tracing::info!(%command, secs = self.timings.initial_rotate.as_secs_f32(), "initial rotation");
        self.timed(motor, command, self.timings.initial_rotate);
        command
    }

    fn timed<A: Actuator>(&self, motor: &Motor<A>, command: MotionCommand, duration: Duration) {
        // Skip the wait when the motor refused the command (shutdown in progress).
        if motor.command(command) && !duration.is_zero() {
            thread::sleep(duration);
        }
        motor.command(MotionCommand::Stop);
    }
}
