//! Atomic lifecycle cell shared between the main context and the worker.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::types::SystemState;

/// Holds the current [`SystemState`] as a single atomic byte, so both
/// contexts read and write it without tearing.
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(SystemState::Created as u8),
        }
    }

    pub fn get(&self) -> SystemState {
        SystemState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.get() == SystemState::Running
    }

    /// Move from `from` to `to` only if the current state is `from`.
    ///
    /// On failure returns the state that was actually observed.
    pub fn transition(&self, from: SystemState, to: SystemState) -> Result<(), SystemState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| {
                tracing::debug!(%from, %to, "lifecycle transition");
            })
            .map_err(SystemState::from_u8)
    }

    /// Unconditionally store `to`, returning the previous state.
    pub fn set(&self, to: SystemState) -> SystemState {
        let from = SystemState::from_u8(self.state.swap(to as u8, Ordering::AcqRel));
        if from != to {
            tracing::debug!(%from, %to, "lifecycle transition");
        }
        from
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_created() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.get(), SystemState::Created);
        assert!(!lifecycle.is_running());
    }

    #[test]
    fn test_transition_success() {
        let lifecycle = Lifecycle::new();
        lifecycle
            .transition(SystemState::Created, SystemState::Initializing)
            .unwrap();
        lifecycle
            .transition(SystemState::Initializing, SystemState::Running)
            .unwrap();
        assert!(lifecycle.is_running());
    }

    #[test]
    fn test_transition_reports_actual_state() {
        let lifecycle = Lifecycle::new();
        lifecycle.set(SystemState::Stopping);
        let err = lifecycle
            .transition(SystemState::Initializing, SystemState::Running)
            .unwrap_err();
        assert_eq!(err, SystemState::Stopping);
        assert_eq!(lifecycle.get(), SystemState::Stopping);
    }

    #[test]
    fn test_set_returns_previous() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.set(SystemState::Running), SystemState::Created);
        assert_eq!(lifecycle.set(SystemState::Stopped), SystemState::Running);
    }
}
