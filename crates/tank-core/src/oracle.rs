//! Vision oracle seam and the face normalization the control loop performs
//! before recognition.

use image::imageops::{self, FilterType};
use image::GrayImage;

use crate::types::{DetectedFace, Frame, FrameError, RecognitionResult};

/// Face detection and recognition backend.
pub trait VisionOracle: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Detect candidate faces, in the order the backend ranks them.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectedFace>, Self::Error>;

    /// Recognize a grayscale face already resized to [`face_size`](Self::face_size).
    fn recognize(&mut self, face: &GrayImage) -> Result<RecognitionResult, Self::Error>;

    /// Fixed (width, height) the recognizer expects.
    fn face_size(&self) -> (u32, u32);
}

/// Crop `face` out of `frame`, convert it to grayscale and resize it to `size`.
///
/// The rectangle is clamped to the frame; a rectangle with no overlap is an error.
pub fn normalize_face(
    frame: &Frame,
    face: &DetectedFace,
    size: (u32, u32),
) -> Result<GrayImage, FrameError> {
    let x0 = face.x.min(frame.width);
    let y0 = face.y.min(frame.height);
    let x1 = face.x.saturating_add(face.width).min(frame.width);
    let y1 = face.y.saturating_add(face.height).min(frame.height);

    if x1 <= x0 || y1 <= y0 {
        return Err(FrameError::EmptyRegion {
            x: face.x,
            y: face.y,
            width: face.width,
            height: face.height,
            frame_width: frame.width,
            frame_height: frame.height,
        });
    }

    let view = frame.view()?;
    let crop = imageops::crop_imm(&view, x0, y0, x1 - x0, y1 - y0);
    let gray = imageops::grayscale(&*crop);

    Ok(imageops::resize(&gray, size.0, size.1, FilterType::Triangle))
}
