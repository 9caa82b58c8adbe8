//! In-memory collaborators for exercising the control loop without hardware.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use image::GrayImage;
use thiserror::Error;

use crate::actuator::Actuator;
use crate::oracle::VisionOracle;
use crate::policy::PolicyTimings;
use crate::source::FrameSource;
use crate::types::{DetectedFace, Frame, MotionCommand, RecognitionResult};

#[derive(Debug, Error)]
#[error("{0}")]
pub struct FakeError(pub &'static str);

pub fn instant_timings() -> PolicyTimings {
    PolicyTimings {
        search_turn: Duration::ZERO,
        follow_forward: Duration::ZERO,
        follow_turn: Duration::ZERO,
        initial_rotate: Duration::ZERO,
        center_tolerance: 20.0,
    }
}

pub fn blank_frame(width: u32, height: u32, sequence: u32) -> Frame {
    Frame::new(vec![90u8; (width * height * 3) as usize], width, height, sequence).unwrap()
}

/// Commands seen by a [`RecordingActuator`], readable after the actuator moved.
#[derive(Clone, Default)]
pub struct CommandLog(Arc<Mutex<Vec<MotionCommand>>>);

impl CommandLog {
    pub fn commands(&self) -> Vec<MotionCommand> {
        self.0.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    fn push(&self, command: MotionCommand) {
        self.0.lock().unwrap().push(command);
    }
}

pub struct RecordingActuator {
    log: CommandLog,
    fail_init: bool,
    init_delay: Duration,
}

impl RecordingActuator {
    pub fn new() -> (Self, CommandLog) {
        let log = CommandLog::default();
        (
            Self {
                log: log.clone(),
                fail_init: false,
                init_delay: Duration::ZERO,
            },
            log,
        )
    }

    pub fn failing_init() -> (Self, CommandLog) {
        let (mut actuator, log) = Self::new();
        actuator.fail_init = true;
        (actuator, log)
    }

    /// Initialization succeeds after blocking for `delay`.
    pub fn slow_init(delay: Duration) -> (Self, CommandLog) {
        let (mut actuator, log) = Self::new();
        actuator.init_delay = delay;
        (actuator, log)
    }
}

impl Actuator for RecordingActuator {
    type Error = FakeError;

    fn initialize(&mut self) -> Result<(), FakeError> {
        thread::sleep(self.init_delay);
        if self.fail_init {
            Err(FakeError("gpio unavailable"))
        } else {
            Ok(())
        }
    }

    fn move_forward(&mut self) {
        self.log.push(MotionCommand::Forward);
    }

    fn turn_clockwise(&mut self) {
        self.log.push(MotionCommand::RotateClockwise);
    }

    fn turn_counterclockwise(&mut self) {
        self.log.push(MotionCommand::RotateCounterClockwise);
    }

    fn stop(&mut self) {
        self.log.push(MotionCommand::Stop);
    }
}

/// Frame source fed from a queue, or repeating one frame until stopped.
#[derive(Default)]
pub struct ScriptedSource {
    frames: Mutex<VecDeque<Frame>>,
    repeat: Option<(Frame, Duration)>,
    stopped: AtomicBool,
    fail_start: bool,
    first_read: Mutex<Option<Instant>>,
    pub start_calls: AtomicUsize,
    pub stop_calls: AtomicUsize,
    pub read_calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn with_frames(frames: Vec<Frame>) -> Self {
        Self {
            frames: Mutex::new(frames.into()),
            ..Self::default()
        }
    }

    pub fn repeating(frame: Frame, interval: Duration) -> Self {
        Self {
            repeat: Some((frame, interval)),
            ..Self::default()
        }
    }

    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    /// When `read` was first called, if ever.
    pub fn first_read_at(&self) -> Option<Instant> {
        *self.first_read.lock().unwrap()
    }

    /// Started and not stopped since.
    pub fn is_streaming(&self) -> bool {
        self.start_calls.load(Ordering::SeqCst) > 0 && !self.stopped.load(Ordering::SeqCst)
    }
}

impl FrameSource for ScriptedSource {
    type Error = FakeError;

    fn start(&self) -> Result<(), FakeError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(FakeError("camera pipeline refused to start"));
        }
        self.stopped.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn read(&self) -> Option<Frame> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.first_read.lock().unwrap().get_or_insert_with(Instant::now);
        if self.stopped.load(Ordering::SeqCst) {
            return None;
        }
        if let Some((frame, interval)) = &self.repeat {
            thread::sleep(*interval);
            return Some(frame.clone());
        }
        self.frames.lock().unwrap().pop_front()
    }
}

/// Oracle answering from scripted per-frame detections and per-face results.
#[derive(Default)]
pub struct ScriptedOracle {
    detections: VecDeque<Vec<DetectedFace>>,
    recognitions: VecDeque<RecognitionResult>,
    fail_detect: bool,
    pub detect_calls: Arc<AtomicUsize>,
}

impl ScriptedOracle {
    /// Every frame yields no faces.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(detections: Vec<Vec<DetectedFace>>, recognitions: Vec<RecognitionResult>) -> Self {
        Self {
            detections: detections.into(),
            recognitions: recognitions.into(),
            ..Self::default()
        }
    }

    pub fn failing_detect() -> Self {
        Self {
            fail_detect: true,
            ..Self::default()
        }
    }
}

impl VisionOracle for ScriptedOracle {
    type Error = FakeError;

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<DetectedFace>, FakeError> {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_detect {
            return Err(FakeError("inference backend crashed"));
        }
        Ok(self.detections.pop_front().unwrap_or_default())
    }

    fn recognize(&mut self, face: &GrayImage) -> Result<RecognitionResult, FakeError> {
        assert_eq!(face.dimensions(), self.face_size());
        Ok(self
            .recognitions
            .pop_front()
            .unwrap_or_else(|| RecognitionResult::new("unknown", f32::INFINITY)))
    }

    fn face_size(&self) -> (u32, u32) {
        (32, 32)
    }
}
