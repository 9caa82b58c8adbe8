//! The detect-decide-act control loop and its lifecycle.
//!
//! `start` initializes the actuator and frame source, waits for the camera to
//! settle, then runs the loop on a dedicated worker thread. Cancellation is
//! cooperative: the worker checks the shared lifecycle at the top of every
//! iteration, and an in-progress action always runs to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

use crate::actuator::{Actuator, Motor};
use crate::lifecycle::Lifecycle;
use crate::oracle::{normalize_face, VisionOracle};
use crate::policy::{BehaviorPolicy, PolicyTimings};
use crate::source::FrameSource;
use crate::types::{Frame, FrameError, MotionCommand, SystemState};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("control loop cannot start from state {0}")]
    AlreadyStarted(SystemState),
    #[error("startup interrupted (state: {0})")]
    Interrupted(SystemState),
    #[error("actuator initialization failed: {0}")]
    Actuator(#[source] BoxError),
    #[error("frame source failed to start: {0}")]
    FrameSource(#[source] BoxError),
    #[error("face detection failed: {0}")]
    Detect(#[source] BoxError),
    #[error("face recognition failed: {0}")]
    Recognize(#[source] BoxError),
    #[error("face crop failed: {0}")]
    Frame(#[from] FrameError),
    #[error("failed to spawn control worker: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("control worker panicked")]
    WorkerPanicked,
}

/// Tunables for [`ControlLoop`].
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// Label of the person to follow.
    pub target_label: String,
    /// Recognition confidence must be strictly below this to count as a match.
    pub confidence_threshold: f32,
    /// Wait between starting the frame source and launching the worker.
    pub settle_delay: Duration,
    pub timings: PolicyTimings,
    /// Seed for the initial rotation direction; `None` draws from the OS.
    pub rng_seed: Option<u64>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            target_label: "me".to_string(),
            confidence_threshold: 60.0,
            settle_delay: Duration::from_secs(3),
            timings: PolicyTimings::default(),
            rng_seed: None,
        }
    }
}

/// Why the worker loop ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The frame source ran dry.
    EndOfStream,
    /// The lifecycle left `Running`.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    pub exit: WorkerExit,
    pub frames_processed: u64,
}

pub type WorkerOutcome = Result<WorkerReport, ControlError>;

/// Owns the lifecycle and the worker thread.
///
/// All methods take `&self` so the loop can be shared (behind an `Arc`) with
/// the signal path while the main context waits on it.
pub struct ControlLoop<F, V, A> {
    config: ControlConfig,
    lifecycle: Arc<Lifecycle>,
    source: Arc<F>,
    motor: Arc<Motor<A>>,
    oracle: Mutex<Option<V>>,
    worker: Mutex<Option<JoinHandle<WorkerOutcome>>>,
    shutdown_requested: AtomicBool,
}

impl<F, V, A> ControlLoop<F, V, A>
where
    F: FrameSource + 'static,
    V: VisionOracle + 'static,
    A: Actuator + 'static,
{
    pub fn new(config: ControlConfig, source: F, oracle: V, actuator: A) -> Self {
        let lifecycle = Arc::new(Lifecycle::new());
        Self {
            motor: Arc::new(Motor::new(actuator, lifecycle.clone())),
            lifecycle,
            source: Arc::new(source),
            oracle: Mutex::new(Some(oracle)),
            worker: Mutex::new(None),
            shutdown_requested: AtomicBool::new(false),
            config,
        }
    }

    pub fn state(&self) -> SystemState {
        self.lifecycle.get()
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    /// True while a launched worker thread has not yet finished.
    pub fn is_worker_active(&self) -> bool {
        lock(&self.worker)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Initialize the actuator, start the frame source, wait for the camera to
    /// settle and launch the worker.
    ///
    /// On failure the error is logged and returned. The frame source and the
    /// actuator are stopped and the loop ends in `Stopped`; the worker is
    /// never launched.
    pub fn start(&self) -> Result<(), ControlError> {
        self.lifecycle
            .transition(SystemState::Created, SystemState::Initializing)
            .map_err(ControlError::AlreadyStarted)?;

        match self.initialize_and_launch() {
            Ok(()) => {
                tracing::info!(target_label = %self.config.target_label, "system started");
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "system encountered error on startup");
                self.source.stop();
                self.motor.command(MotionCommand::Stop);
                self.lifecycle.set(SystemState::Stopped);
                Err(err)
            }
        }
    }

    fn initialize_and_launch(&self) -> Result<(), ControlError> {
        self.motor
            .initialize()
            .map_err(|e| ControlError::Actuator(Box::new(e)))?;
        tracing::info!("actuator initialized");

        self.source
            .start()
            .map_err(|e| ControlError::FrameSource(Box::new(e)))?;
        tracing::info!("frame source started");

        if !self.config.settle_delay.is_zero() {
            tracing::debug!(
                secs = self.config.settle_delay.as_secs_f32(),
                "waiting for camera pipeline to settle"
            );
            thread::sleep(self.config.settle_delay);
        }

        self.launch()
    }

    fn launch(&self) -> Result<(), ControlError> {
        let mut slot = lock(&self.worker);
        let oracle = lock(&self.oracle)
            .take()
            .ok_or(ControlError::AlreadyStarted(self.lifecycle.get()))?;

        self.lifecycle
            .transition(SystemState::Initializing, SystemState::Running)
            .map_err(ControlError::Interrupted)?;

        let worker = Worker {
            policy: BehaviorPolicy::new(self.config.timings.clone()),
            target_label: self.config.target_label.clone(),
            confidence_threshold: self.config.confidence_threshold,
            rng_seed: self.config.rng_seed,
            lifecycle: self.lifecycle.clone(),
            source: self.source.clone(),
            motor: self.motor.clone(),
            oracle,
        };

        let handle = thread::Builder::new()
            .name("tank-control".into())
            .spawn(move || worker.run())
            .map_err(ControlError::Spawn)?;
        *slot = Some(handle);
        Ok(())
    }

    /// Block until the worker exits on its own, without requesting shutdown.
    ///
    /// Returns the worker's outcome, or `None` if no worker is (still) owned
    /// by this loop.
    pub fn join(&self) -> Option<WorkerOutcome> {
        let mut slot = lock(&self.worker);
        let handle = slot.take()?;
        let outcome = handle.join().unwrap_or(Err(ControlError::WorkerPanicked));
        drop(slot);

        match &outcome {
            Ok(report) => tracing::info!(exit = ?report.exit, frames = report.frames_processed, "control worker joined"),
            Err(err) => tracing::error!(error = %err, "control worker failed"),
        }
        Some(outcome)
    }

    /// Stop the robot and wait for the worker to exit.
    ///
    /// Always issues `Stop` to the actuator and stops the frame source, so it
    /// is safe to call more than once and from the signal path. An action the
    /// worker is executing is allowed to finish first.
    pub fn stop(&self) -> Option<WorkerOutcome> {
        let previous = self.lifecycle.get();
        if previous != SystemState::Stopped {
            self.lifecycle.set(SystemState::Stopping);
        }
        tracing::info!(from = %previous, "stopping control loop");

        self.source.stop();
        let outcome = self.join();

        self.motor.command(MotionCommand::Stop);
        self.lifecycle.set(SystemState::Stopped);
        tracing::info!("control loop stopped");
        outcome
    }

    /// Shutdown entry point for termination signals.
    ///
    /// Only the first call performs the shutdown; later calls are logged and
    /// ignored. Returns whether this call ran [`stop`](Self::stop).
    pub fn shutdown_on_signal(&self, signal: &str) -> bool {
        if self
            .shutdown_requested
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(signal, "shutdown already in progress; ignoring signal");
            return false;
        }

        tracing::info!(signal, "signal received");
        self.stop();
        true
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State moved onto the worker thread.
struct Worker<F, V, A> {
    policy: BehaviorPolicy,
    target_label: String,
    confidence_threshold: f32,
    rng_seed: Option<u64>,
    lifecycle: Arc<Lifecycle>,
    source: Arc<F>,
    motor: Arc<Motor<A>>,
    oracle: V,
}

/// Leaves the robot motionless on every worker exit path, including panics.
struct HaltOnExit<'a, A: Actuator> {
    motor: &'a Motor<A>,
    lifecycle: &'a Lifecycle,
}

impl<A: Actuator> Drop for HaltOnExit<'_, A> {
    fn drop(&mut self) {
        let was_running = self
            .lifecycle
            .transition(SystemState::Running, SystemState::Stopping)
            .is_ok();
        self.motor.command(MotionCommand::Stop);
        if was_running {
            let _ = self
                .lifecycle
                .transition(SystemState::Stopping, SystemState::Stopped);
        }
        tracing::debug!(state = %self.lifecycle.get(), "control worker halted motors");
    }
}

impl<F, V, A> Worker<F, V, A>
where
    F: FrameSource,
    V: VisionOracle,
    A: Actuator,
{
    fn run(mut self) -> WorkerOutcome {
        let motor = self.motor.clone();
        let lifecycle = self.lifecycle.clone();
        let _halt = HaltOnExit {
            motor: &motor,
            lifecycle: &lifecycle,
        };

        tracing::info!("control worker started");
        self.drive()
    }

    fn drive(&mut self) -> WorkerOutcome {
        let mut rng = match self.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut next = self.source.read();
        if let Some(frame) = &next {
            tracing::info!(width = frame.width, height = frame.height, "first frame received");
            self.policy.one_rotate(&self.motor, &mut rng);
        }

        let mut frames_processed = 0u64;
        loop {
            if !self.lifecycle.is_running() {
                return Ok(WorkerReport {
                    exit: WorkerExit::Cancelled,
                    frames_processed,
                });
            }
            let Some(frame) = next.take() else {
                tracing::info!(frames = frames_processed, "frame source exhausted");
                return Ok(WorkerReport {
                    exit: WorkerExit::EndOfStream,
                    frames_processed,
                });
            };

            self.process(&frame)?;
            frames_processed += 1;
            next = self.source.read();
        }
    }

    fn process(&mut self, frame: &Frame) -> Result<(), ControlError> {
        let faces = self
            .oracle
            .detect(frame)
            .map_err(|e| ControlError::Detect(Box::new(e)))?;

        if faces.is_empty() {
            tracing::debug!(seq = frame.sequence, "no faces");
            self.policy.search(&self.motor);
            return Ok(());
        }

        tracing::debug!(seq = frame.sequence, count = faces.len(), "faces detected");
        let face_size = self.oracle.face_size();

        for face in &faces {
            let normalized = normalize_face(frame, face, face_size)?;
            let result = self
                .oracle
                .recognize(&normalized)
                .map_err(|e| ControlError::Recognize(Box::new(e)))?;
            tracing::debug!(label = %result.label, confidence = result.confidence, "face recognized");

            if result.is_target(&self.target_label, self.confidence_threshold) {
                let offset = face.horizontal_offset(frame.width);
                self.policy.follow(&self.motor, offset);
            } else {
                self.policy.search(&self.motor);
            }
        }
        Ok(())
    }
}
