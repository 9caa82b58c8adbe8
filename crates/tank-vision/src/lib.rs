//! tank-vision — Vision oracle for the tank control loop.
//!
//! SCRFD finds faces in RGB frames, ArcFace turns normalized grayscale crops
//! into embeddings, and a gallery of labeled embeddings names them. Both
//! models run on ONNX Runtime on the CPU.

use std::path::PathBuf;

pub mod detector;
pub mod gallery;
pub mod oracle;
pub mod recognizer;

pub use detector::FaceDetector;
pub use gallery::{Embedding, Gallery, GalleryEntry};
pub use oracle::{OnnxOracle, OracleError};
pub use recognizer::FaceRecognizer;

/// File name of the SCRFD detection model inside the model directory.
pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
/// File name of the ArcFace recognition model inside the model directory.
pub const RECOGNIZER_MODEL_FILE: &str = "w600k_r50.onnx";

/// Directory searched for model files when none is configured.
pub fn default_model_dir() -> PathBuf {
    PathBuf::from("/var/lib/tank/models")
}
