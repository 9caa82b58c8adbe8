//! ArcFace face recognizer via ONNX Runtime.
//!
//! Turns a 112×112 grayscale face crop into an L2-normalized 512-dimensional
//! embedding using the w600k_r50 model.

use crate::gallery::Embedding;
use image::GrayImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

pub const ARCFACE_INPUT_SIZE: u32 = 112;
const ARCFACE_MEAN: f32 = 127.5;
const ARCFACE_STD: f32 = 127.5; // ArcFace uses symmetric normalization, unlike SCRFD's 128
const ARCFACE_EMBEDDING_DIM: usize = 512;

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("model file not found: {0} — download from insightface and place in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("face crop is {0}x{1}, expected 112x112")]
    WrongSize(u32, u32),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// ArcFace-based face recognizer.
pub struct FaceRecognizer {
    session: Session,
}

impl FaceRecognizer {
    /// Load the ArcFace ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, RecognizerError> {
        if !Path::new(model_path).exists() {
            return Err(RecognizerError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)
            .map_err(ort::Error::from)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| i.name()).collect::<Vec<_>>(),
            "loaded ArcFace model"
        );

        Ok(Self { session })
    }

    /// Extract an embedding from a normalized grayscale face crop.
    pub fn extract(&mut self, face: &GrayImage) -> Result<Embedding, RecognizerError> {
        let (width, height) = face.dimensions();
        if (width, height) != (ARCFACE_INPUT_SIZE, ARCFACE_INPUT_SIZE) {
            return Err(RecognizerError::WrongSize(width, height));
        }

        let input = preprocess(face.as_raw());
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RecognizerError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw.len() != ARCFACE_EMBEDDING_DIM {
            return Err(RecognizerError::InferenceFailed(format!(
                "expected {ARCFACE_EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(Embedding::normalized(raw.to_vec()))
    }
}

/// Grayscale crop → NCHW float tensor, replicating Y into all three channels.
fn preprocess(face: &[u8]) -> Array4<f32> {
    let size = ARCFACE_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

    for y in 0..size {
        for x in 0..size {
            let pixel = face.get(y * size + x).copied().unwrap_or(0) as f32;
            let normalized = (pixel - ARCFACE_MEAN) / ARCFACE_STD;
            for c in 0..3 {
                tensor[[0, c, y, x]] = normalized;
            }
        }
    }

    tensor
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: usize = ARCFACE_INPUT_SIZE as usize;

    #[test]
    fn test_preprocess_output_shape() {
        let tensor = preprocess(&vec![128u8; SIZE * SIZE]);
        assert_eq!(tensor.shape(), &[1, 3, SIZE, SIZE]);
    }

    #[test]
    fn test_preprocess_normalization() {
        let tensor = preprocess(&vec![0u8; SIZE * SIZE]);
        assert!((tensor[[0, 0, 0, 0]] + 1.0).abs() < 1e-6);

        let tensor = preprocess(&vec![255u8; SIZE * SIZE]);
        assert!((tensor[[0, 2, SIZE - 1, SIZE - 1]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_preprocess_channels_identical() {
        let face: Vec<u8> = (0..SIZE * SIZE).map(|i| (i % 251) as u8).collect();
        let tensor = preprocess(&face);
        for y in 0..SIZE {
            for x in 0..SIZE {
                let r = tensor[[0, 0, y, x]];
                assert_eq!(r, tensor[[0, 1, y, x]]);
                assert_eq!(r, tensor[[0, 2, y, x]]);
            }
        }
    }

    #[test]
    fn test_preprocess_short_buffer_pads_black() {
        let tensor = preprocess(&[255u8; 4]);
        assert!((tensor[[0, 0, 0, 3]] - 1.0).abs() < 1e-6);
        assert!((tensor[[0, 0, 0, 4]] + 1.0).abs() < 1e-6);
    }
}
