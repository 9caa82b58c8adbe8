use std::fmt;
use std::time::Instant;

use image::{ImageBuffer, Rgb};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid RGB frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("face region ({x}, {y}, {width}x{height}) lies outside the {frame_width}x{frame_height} frame")]
    EmptyRegion {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        frame_width: u32,
        frame_height: u32,
    },
}

/// A captured RGB24 camera frame.
#[derive(Clone)]
pub struct Frame {
    /// Interleaved RGB pixel data (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
    pub sequence: u32,
}

impl Frame {
    /// Wrap raw RGB24 data, validating its length against the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u32) -> Result<Self, FrameError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(FrameError::InvalidLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            timestamp: Instant::now(),
            sequence,
        })
    }

    /// Borrow the pixel data as an `image` buffer without copying.
    pub fn view(&self) -> Result<ImageBuffer<Rgb<u8>, &[u8]>, FrameError> {
        ImageBuffer::from_raw(self.width, self.height, self.data.as_slice()).ok_or(
            FrameError::InvalidLength {
                expected: self.width as usize * self.height as usize * 3,
                actual: self.data.len(),
            },
        )
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

/// Bounding rectangle of a candidate face, in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedFace {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Detector score in [0, 1]. Not used by the control loop.
    pub score: f32,
}

impl DetectedFace {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            score: 1.0,
        }
    }

    /// Center point of the rectangle.
    pub fn center(&self) -> (f32, f32) {
        (
            self.x as f32 + self.width as f32 / 2.0,
            self.y as f32 + self.height as f32 / 2.0,
        )
    }

    /// Horizontal distance from the frame's vertical midline to the face center.
    ///
    /// Positive when the face sits left of the midline.
    pub fn horizontal_offset(&self, frame_width: u32) -> f32 {
        frame_width as f32 / 2.0 - self.center().0
    }
}

/// Identity label and confidence for one recognized face. Lower confidence
/// values mean a closer match.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    pub label: String,
    pub confidence: f32,
}

impl RecognitionResult {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }

    /// True when this is the target identity and the match is strictly below `threshold`.
    pub fn is_target(&self, target_label: &str, threshold: f32) -> bool {
        self.label == target_label && self.confidence < threshold
    }
}

/// Discrete command accepted by the motor actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionCommand {
    Forward,
    RotateClockwise,
    RotateCounterClockwise,
    Stop,
}

impl fmt::Display for MotionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MotionCommand::Forward => "forward",
            MotionCommand::RotateClockwise => "rotate-cw",
            MotionCommand::RotateCounterClockwise => "rotate-ccw",
            MotionCommand::Stop => "stop",
        };
        f.write_str(name)
    }
}

/// Lifecycle of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SystemState {
    Created = 0,
    Initializing = 1,
    Running = 2,
    Stopping = 3,
    Stopped = 4,
}

impl SystemState {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => SystemState::Created,
            1 => SystemState::Initializing,
            2 => SystemState::Running,
            3 => SystemState::Stopping,
            _ => SystemState::Stopped,
        }
    }
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SystemState::Created => "created",
            SystemState::Initializing => "initializing",
            SystemState::Running => "running",
            SystemState::Stopping => "stopping",
            SystemState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
