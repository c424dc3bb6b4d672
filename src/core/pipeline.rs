use crate::common::{FaceRollError, Result};
use crate::core::analyzer::{Detection, FaceAnalyzer};
use crate::core::geometry::BoundingBox;
use crate::core::tracker::{TrackId, TrackState, Tracker};
use crate::storage::identity_store::{IdentityStore, IdentitySummary};

/// What the pipeline knows about one detection of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub track_id: Option<TrackId>,
    pub track_state: TrackState,
    pub bbox: BoundingBox,
    pub detection_score: f32,
    pub best_identity: Option<IdentitySummary>,
    pub similarity: Option<f32>,
}

impl Resolution {
    pub fn is_confirmed(&self) -> bool {
        self.track_state == TrackState::Confirmed
    }
}

/// Per-frame orchestration of tracking and recognition.
///
/// Track ids and identities are computed independently and only share the
/// detection index. Nothing is written to the attendance ledger here.
pub struct IdentityResolver {
    tracker: Tracker,
    store: IdentityStore,
}

impl IdentityResolver {
    pub fn new(tracker: Tracker, store: IdentityStore) -> Self {
        Self { tracker, store }
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Runs the analyzer on `frame` and resolves its detections.
    ///
    /// When the analyzer fails, the frame counts as empty for tracking and
    /// `DetectionUnavailable` is returned.
    pub fn process_frame<A: FaceAnalyzer>(
        &mut self,
        analyzer: &mut A,
        frame: &A::Frame,
    ) -> Result<Vec<Resolution>> {
        match analyzer.detect_and_embed(frame) {
            Ok(detections) => self.resolve(&detections),
            Err(e) => {
                tracing::warn!("Detection failed, treating frame as empty: {}", e);
                self.tracker.update(&[]);
                Err(match e {
                    FaceRollError::DetectionUnavailable(msg) => FaceRollError::DetectionUnavailable(msg),
                    other => FaceRollError::DetectionUnavailable(other.to_string()),
                })
            }
        }
    }

    /// One result per detection, in input order.
    pub fn resolve(&mut self, detections: &[Detection]) -> Result<Vec<Resolution>> {
        if let Err(e) = detections.iter().try_for_each(Detection::validate) {
            tracing::warn!("Dropping malformed frame: {}", e);
            self.tracker.update(&[]);
            return Err(e);
        }

        let boxes: Vec<BoundingBox> = detections.iter().map(|d| d.bbox).collect();
        let assignments = self.tracker.assign(&boxes);

        let mut results = Vec::with_capacity(detections.len());
        for (detection, assignment) in detections.iter().zip(assignments) {
            let best = self.store.find_similar(&detection.embedding, 1)?.into_iter().next();
            let (best_identity, similarity) = match best {
                Some(hit) => (
                    Some(IdentitySummary {
                        identity_id: hit.identity.identity_id,
                        display_name: hit.identity.display_name,
                        reference_image_path: hit.identity.reference_image_path,
                    }),
                    Some(hit.similarity),
                ),
                None => (None, None),
            };

            results.push(Resolution {
                track_id: assignment.track_id,
                track_state: assignment.state,
                bbox: detection.bbox,
                detection_score: detection.detection_score,
                best_identity,
                similarity,
            });
        }

        Ok(results)
    }
}
