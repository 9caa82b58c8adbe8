//! SCRFD face detector via ONNX Runtime.
//!
//! Letterboxes the RGB frame into the 640×640 model input, decodes the three
//! anchor-free stride levels, suppresses overlaps and maps the surviving boxes
//! back into frame coordinates.

use image::imageops::{self, FilterType};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use tank_core::{DetectedFace, Frame};
use thiserror::Error;

const SCRFD_INPUT_SIZE: u32 = 640;
const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_CONFIDENCE_THRESHOLD: f32 = 0.5;
const SCRFD_NMS_THRESHOLD: f32 = 0.4;
const SCRFD_STRIDES: [usize; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — download from insightface and place in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Placement of the resized frame inside the square model input.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    new_w: u32,
    new_h: u32,
    pad_x: u32,
    pad_y: u32,
}

impl Letterbox {
    fn fit(width: u32, height: u32, size: u32) -> Self {
        let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
        let new_w = ((width as f32 * scale).round() as u32).clamp(1, size);
        let new_h = ((height as f32 * scale).round() as u32).clamp(1, size);
        Self {
            scale,
            new_w,
            new_h,
            pad_x: (size - new_w) / 2,
            pad_y: (size - new_h) / 2,
        }
    }

    /// Map a point in model-input space back to frame space.
    fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.pad_x as f32) / self.scale,
            (y - self.pad_y as f32) / self.scale,
        )
    }
}

/// Box in frame space before clamping, as corner coordinates.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
}

impl Candidate {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    /// Clamp to the frame; `None` if nothing of the box remains.
    fn into_face(self, width: u32, height: u32) -> Option<DetectedFace> {
        let x1 = self.x1.clamp(0.0, width as f32);
        let y1 = self.y1.clamp(0.0, height as f32);
        let x2 = self.x2.clamp(0.0, width as f32);
        let y2 = self.y2.clamp(0.0, height as f32);
        let w = (x2 - x1).round() as u32;
        let h = (y2 - y1).round() as u32;
        if w == 0 || h == 0 {
            return None;
        }
        Some(DetectedFace {
            x: x1.floor() as u32,
            y: y1.floor() as u32,
            width: w,
            height: h,
            score: self.score,
        })
    }
}

/// Output tensor indices for one stride: (score_idx, bbox_idx).
type StrideOutputIndices = (usize, usize);

/// SCRFD-based face detector.
pub struct FaceDetector {
    session: Session,
    /// Per-stride output indices for strides [8, 16, 32].
    stride_indices: [StrideOutputIndices; 3],
}

impl FaceDetector {
    /// Load the SCRFD ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)
            .map_err(ort::Error::from)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();
        tracing::info!(path = model_path, outputs = ?output_names, "loaded SCRFD model");

        if output_names.len() < 6 {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD model requires at least 6 outputs (3 strides × score/bbox), got {}",
                output_names.len()
            )));
        }

        let stride_indices = discover_output_indices(&output_names);
        tracing::debug!(?stride_indices, "SCRFD output tensor mapping");

        Ok(Self {
            session,
            stride_indices,
        })
    }

    /// Detect faces in an RGB frame, highest score first.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectedFace>, DetectorError> {
        if frame.width == 0 || frame.height == 0 {
            return Ok(Vec::new());
        }
        let (input, letterbox) = preprocess(frame)?;

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        for (stride_pos, &stride) in SCRFD_STRIDES.iter().enumerate() {
            let (score_idx, bbox_idx) = self.stride_indices[stride_pos];

            let (_, scores) = outputs[score_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
            let (_, bboxes) = outputs[bbox_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("bboxes stride {stride}: {e}")))?;

            candidates.extend(decode_stride(
                scores,
                bboxes,
                stride,
                &letterbox,
                SCRFD_CONFIDENCE_THRESHOLD,
            ));
        }

        let faces: Vec<DetectedFace> = nms(candidates, SCRFD_NMS_THRESHOLD)
            .into_iter()
            .filter_map(|c| c.into_face(frame.width, frame.height))
            .collect();
        tracing::trace!(count = faces.len(), "SCRFD detections");
        Ok(faces)
    }
}

/// Letterbox an RGB frame into a normalized NCHW tensor.
///
/// Padding stays at zero, which is where the mean normalizes to.
fn preprocess(frame: &Frame) -> Result<(Array4<f32>, Letterbox), DetectorError> {
    let view = frame
        .view()
        .map_err(|e| DetectorError::InvalidFrame(e.to_string()))?;
    let letterbox = Letterbox::fit(frame.width, frame.height, SCRFD_INPUT_SIZE);
    let resized = imageops::resize(&view, letterbox.new_w, letterbox.new_h, FilterType::Triangle);

    let size = SCRFD_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let tx = (x + letterbox.pad_x) as usize;
        let ty = (y + letterbox.pad_y) as usize;
        for c in 0..3 {
            tensor[[0, c, ty, tx]] = (pixel.0[c] as f32 - SCRFD_MEAN) / SCRFD_STD;
        }
    }

    Ok((tensor, letterbox))
}

/// Discover score/bbox tensor ordering by name ("score_8", "bbox_16", ...),
/// falling back to the standard positional layout [scores 8/16/32, bboxes 8/16/32, ...].
fn discover_output_indices(names: &[String]) -> [StrideOutputIndices; 3] {
    let find = |prefix: &str, stride: usize| -> Option<usize> {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| n == &target)
    };

    let mut named = [(0, 0); 3];
    for (slot, &stride) in named.iter_mut().zip(SCRFD_STRIDES.iter()) {
        match (find("score", stride), find("bbox", stride)) {
            (Some(score), Some(bbox)) => *slot = (score, bbox),
            _ => {
                tracing::info!(?names, "SCRFD: output names not recognized, using positional mapping");
                return [(0, 3), (1, 4), (2, 5)];
            }
        }
    }
    named
}

/// Decode detections above `threshold` for a single stride level.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    stride: usize,
    letterbox: &Letterbox,
    threshold: f32,
) -> Vec<Candidate> {
    let grid = SCRFD_INPUT_SIZE as usize / stride;
    let num_anchors = grid * grid * SCRFD_ANCHORS_PER_CELL;
    let step = stride as f32;

    let mut candidates = Vec::new();
    for idx in 0..num_anchors {
        let score = scores.get(idx).copied().unwrap_or(0.0);
        if score <= threshold {
            continue;
        }
        let Some(offsets) = bboxes.get(idx * 4..idx * 4 + 4) else {
            continue;
        };

        let cell = idx / SCRFD_ANCHORS_PER_CELL;
        let anchor_x = (cell % grid) as f32 * step;
        let anchor_y = (cell / grid) as f32 * step;

        let (x1, y1) = letterbox.unmap(anchor_x - offsets[0] * step, anchor_y - offsets[1] * step);
        let (x2, y2) = letterbox.unmap(anchor_x + offsets[2] * step, anchor_y + offsets[3] * step);
        candidates.push(Candidate { x1, y1, x2, y2, score });
    }
    candidates
}

/// Non-maximum suppression; the result is sorted by descending score.
fn nms(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if keep.iter().all(|kept| iou(kept, &candidate) <= iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

fn iou(a: &Candidate, b: &Candidate) -> f32 {
    let inter = Candidate {
        x1: a.x1.max(b.x1),
        y1: a.y1.max(b.y1),
        x2: a.x2.min(b.x2),
        y2: a.y2.min(b.y2),
        score: 0.0,
    }
    .area();
    let union = a.area() + b.area() - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(x: f32, y: f32, w: f32, h: f32, score: f32) -> Candidate {
        Candidate { x1: x, y1: y, x2: x + w, y2: y + h, score }
    }

    #[test]
    fn test_iou_identical() {
        let a = cand(0.0, 0.0, 100.0, 100.0, 1.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_no_overlap() {
        let a = cand(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = cand(20.0, 20.0, 10.0, 10.0, 1.0);
        assert!(iou(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_iou_partial() {
        let a = cand(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = cand(5.0, 0.0, 10.0, 10.0, 1.0);
        // Overlap 50, union 150.
        assert!((iou(&a, &b) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_nms_keeps_best_of_overlapping() {
        let result = nms(
            vec![
                cand(5.0, 5.0, 100.0, 100.0, 0.8),
                cand(200.0, 200.0, 50.0, 50.0, 0.7),
                cand(0.0, 0.0, 100.0, 100.0, 0.9),
            ],
            0.4,
        );
        let scores: Vec<f32> = result.iter().map(|c| c.score).collect();
        assert_eq!(scores, vec![0.9, 0.7]);
    }

    #[test]
    fn test_nms_empty() {
        assert!(nms(vec![], 0.4).is_empty());
    }

    #[test]
    fn test_letterbox_landscape() {
        let lb = Letterbox::fit(640, 480, 640);
        assert_eq!((lb.new_w, lb.new_h), (640, 480));
        assert_eq!((lb.pad_x, lb.pad_y), (0, 80));
        assert_eq!(lb.unmap(100.0, 130.0), (100.0, 50.0));
    }

    #[test]
    fn test_letterbox_upscales_small_frames() {
        let lb = Letterbox::fit(320, 240, 640);
        assert_eq!((lb.new_w, lb.new_h), (640, 480));
        let (x, y) = lb.unmap(200.0, 80.0 + 100.0);
        assert!((x - 100.0).abs() < 1e-4 && (y - 50.0).abs() < 1e-4, "({x}, {y})");
    }

    #[test]
    fn test_candidate_clamped_to_frame() {
        let face = cand(-10.0, 20.0, 60.0, 500.0, 0.9).into_face(640, 480).unwrap();
        assert_eq!((face.x, face.y, face.width, face.height), (0, 20, 50, 460));
    }

    #[test]
    fn test_candidate_outside_frame_dropped() {
        assert!(cand(700.0, 10.0, 20.0, 20.0, 0.9).into_face(640, 480).is_none());
    }

    #[test]
    fn test_decode_single_anchor() {
        let lb = Letterbox::fit(640, 640, 640);
        let grid = 640 / 32;
        let anchors = grid * grid * SCRFD_ANCHORS_PER_CELL;
        let mut scores = vec![0.0f32; anchors];
        let mut bboxes = vec![0.0f32; anchors * 4];

        // Cell (x=2, y=1), first anchor: center (64, 32), 1 stride each way.
        let idx = (grid + 2) * SCRFD_ANCHORS_PER_CELL;
        scores[idx] = 0.9;
        bboxes[idx * 4..idx * 4 + 4].copy_from_slice(&[1.0, 1.0, 1.0, 1.0]);

        let decoded = decode_stride(&scores, &bboxes, 32, &lb, 0.5);
        assert_eq!(decoded.len(), 1);
        let c = decoded[0];
        assert_eq!((c.x1, c.y1, c.x2, c.y2), (32.0, 0.0, 96.0, 64.0));
    }

    #[test]
    fn test_preprocess_shape_and_padding() {
        let frame = Frame::new(vec![255u8; 64 * 32 * 3], 64, 32, 0).unwrap();
        let (tensor, lb) = preprocess(&frame).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert_eq!(lb.pad_y, 160);
        // Padding normalizes to zero, image area to (255 - 127.5) / 128.
        assert_eq!(tensor[[0, 0, 0, 0]], 0.0);
        let inside = tensor[[0, 1, 320, 320]];
        assert!((inside - (255.0 - SCRFD_MEAN) / SCRFD_STD).abs() < 1e-6);
    }

    #[test]
    fn test_discover_output_indices_named() {
        let names: Vec<String> = [
            "score_8", "score_16", "score_32",
            "bbox_8",  "bbox_16",  "bbox_32",
            "kps_8",   "kps_16",   "kps_32",
        ].iter().map(|s| s.to_string()).collect();
        assert_eq!(discover_output_indices(&names), [(0, 3), (1, 4), (2, 5)]);
    }

    #[test]
    fn test_discover_output_indices_shuffled_named() {
        let names: Vec<String> = [
            "bbox_8", "kps_8", "score_8",
            "bbox_16", "kps_16", "score_16",
            "bbox_32", "kps_32", "score_32",
        ].iter().map(|s| s.to_string()).collect();
        assert_eq!(discover_output_indices(&names), [(2, 0), (5, 3), (8, 6)]);
    }

    #[test]
    fn test_discover_output_indices_positional_fallback() {
        let names: Vec<String> = (0..9).map(|i: usize| i.to_string()).collect();
        assert_eq!(discover_output_indices(&names), [(0, 3), (1, 4), (2, 5)]);
    }
}
