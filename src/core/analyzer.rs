use serde::{Deserialize, Serialize};
use crate::common::Result;
use crate::core::embedding::{validate_embedding, Embedding};
use crate::core::geometry::BoundingBox;

/// One face found in a frame by the detector. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    /// Detector confidence in `[0, 1]`.
    pub detection_score: f32,
    pub embedding: Embedding,
}

impl Detection {
    /// Rejects degenerate or non-finite boxes and malformed embeddings.
    pub fn validate(&self) -> Result<()> {
        self.bbox.validate()?;
        validate_embedding(&self.embedding)
    }
}

/// The face detection and embedding model the pipeline consumes.
///
/// Implementations are expected to be loaded and warm before the first call.
/// A failure for one frame must be reported as an error, not an empty list, so
/// the caller can tell "no faces" apart from "no answer".
pub trait FaceAnalyzer {
    type Frame;

    fn detect_and_embed(&mut self, frame: &Self::Frame) -> Result<Vec<Detection>>;
}
