//! Labeled face embeddings the recognizer compares against.
//!
//! Stored as a JSON document:
//! `{"entries": [{"label": "me", "embedding": [0.01, ...]}]}`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("failed to read gallery {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed gallery {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    /// Build an embedding scaled to unit length (zero vectors are kept as-is).
    pub fn normalized(values: Vec<f32>) -> Self {
        let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            Self {
                values: values.into_iter().map(|v| v / norm).collect(),
            }
        } else {
            Self { values }
        }
    }

    /// Cosine similarity in [-1, 1]. Higher = more similar.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 {
            dot / denom
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryEntry {
    pub label: String,
    pub embedding: Embedding,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Gallery {
    pub entries: Vec<GalleryEntry>,
}

impl Gallery {
    pub fn load(path: &Path) -> Result<Self, GalleryError> {
        let src = std::fs::read_to_string(path).map_err(|source| GalleryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let gallery: Gallery = serde_json::from_str(&src).map_err(|source| GalleryError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), entries = gallery.entries.len(), "loaded face gallery");
        Ok(gallery)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Label and similarity of the closest entry.
    pub fn best_match(&self, probe: &Embedding) -> Option<(&str, f32)> {
        self.entries
            .iter()
            .map(|entry| (entry.label.as_str(), probe.similarity(&entry.embedding)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}

/// Map a cosine similarity to a distance-style confidence: 0 for identical,
/// growing as faces diverge, never negative.
pub fn similarity_to_confidence(similarity: f32) -> f32 {
    ((1.0 - similarity) * 100.0).max(0.0)
}
