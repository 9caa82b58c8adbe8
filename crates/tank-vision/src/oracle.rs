use image::GrayImage;
use std::path::Path;
use tank_core::{DetectedFace, Frame, RecognitionResult, VisionOracle};
use thiserror::Error;

use crate::detector::{DetectorError, FaceDetector};
use crate::gallery::{similarity_to_confidence, Gallery, GalleryError};
use crate::recognizer::{FaceRecognizer, RecognizerError, ARCFACE_INPUT_SIZE};

/// Label reported when the gallery has nothing to compare against.
pub const UNKNOWN_LABEL: &str = "unknown";

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
    #[error("gallery error: {0}")]
    Gallery(#[from] GalleryError),
}

/// [`VisionOracle`] backed by SCRFD + ArcFace and a labeled gallery.
pub struct OnnxOracle {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
    gallery: Gallery,
}

impl OnnxOracle {
    /// Load both models from `model_dir` and the gallery from `gallery_path`.
    pub fn load(model_dir: &Path, gallery_path: &Path) -> Result<Self, OracleError> {
        let detector_path = model_dir.join(crate::DETECTOR_MODEL_FILE);
        let detector = FaceDetector::load(&detector_path.to_string_lossy())?;
        tracing::info!(path = %detector_path.display(), "SCRFD detector loaded");

        let recognizer_path = model_dir.join(crate::RECOGNIZER_MODEL_FILE);
        let recognizer = FaceRecognizer::load(&recognizer_path.to_string_lossy())?;
        tracing::info!(path = %recognizer_path.display(), "ArcFace recognizer loaded");

        let gallery = Gallery::load(gallery_path)?;
        if gallery.is_empty() {
            tracing::warn!(path = %gallery_path.display(), "face gallery is empty; nobody will be recognized");
        }

        Ok(Self {
            detector,
            recognizer,
            gallery,
        })
    }
}

impl VisionOracle for OnnxOracle {
    type Error = OracleError;

    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectedFace>, OracleError> {
        Ok(self.detector.detect(frame)?)
    }

    fn recognize(&mut self, face: &GrayImage) -> Result<RecognitionResult, OracleError> {
        let embedding = self.recognizer.extract(face)?;
        let result = match self.gallery.best_match(&embedding) {
            Some((label, similarity)) => {
                RecognitionResult::new(label, similarity_to_confidence(similarity))
            }
            None => RecognitionResult::new(UNKNOWN_LABEL, f32::INFINITY),
        };
        Ok(result)
    }

    fn face_size(&self) -> (u32, u32) {
        (ARCFACE_INPUT_SIZE, ARCFACE_INPUT_SIZE)
    }
}
