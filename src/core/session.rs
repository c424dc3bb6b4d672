use std::collections::HashSet;
use crate::common::AttendanceConfig;
use crate::core::pipeline::Resolution;
use crate::storage::attendance::AttendanceEvent;

/// Caller-side arrival policy for one attendance session.
///
/// A resolution counts as an arrival when it names an identity, its similarity
/// reaches the threshold, its track is confirmed (unless that requirement is
/// switched off) and the identity has not been logged earlier in the session.
pub struct AttendanceSession {
    config: AttendanceConfig,
    logged: HashSet<String>,
}

impl AttendanceSession {
    pub fn new(config: AttendanceConfig) -> Self {
        Self {
            config,
            logged: HashSet::new(),
        }
    }

    pub fn qualifies(&self, resolution: &Resolution) -> bool {
        let similar_enough = resolution
            .similarity
            .map_or(false, |s| s >= self.config.similarity_threshold);
        let tracked = !self.config.require_confirmed_track || resolution.is_confirmed();
        resolution.best_identity.is_some() && similar_enough && tracked
    }

    /// Events for identities arriving in this frame; each identity at most once per session.
    pub fn arrivals(&mut self, results: &[Resolution], evidence_frame_path: &str) -> Vec<AttendanceEvent> {
        let mut events = Vec::new();
        for resolution in results {
            if !self.qualifies(resolution) {
                continue;
            }
            let Some(identity) = &resolution.best_identity else {
                continue;
            };
            if self.logged.insert(identity.identity_id.clone()) {
                events.push(AttendanceEvent::new(identity.identity_id.clone(), evidence_frame_path));
            }
        }
        events
    }

    /// Lets an identity arrive again, e.g. after its ledger write failed.
    pub fn forget(&mut self, identity_id: &str) -> bool {
        self.logged.remove(identity_id)
    }

    pub fn logged_count(&self) -> usize {
        self.logged.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::BoundingBox;
    use crate::core::tracker::TrackState;
    use crate::storage::identity_store::IdentitySummary;

    fn resolution(id: Option<&str>, similarity: f32, state: TrackState) -> Resolution {
        Resolution {
            track_id: Some(1),
            track_state: state,
            bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            detection_score: 0.99,
            best_identity: id.map(|id| IdentitySummary {
                identity_id: id.to_string(),
                display_name: id.to_uppercase(),
                reference_image_path: String::new(),
            }),
            similarity: id.map(|_| similarity),
        }
    }

    #[test]
    fn logs_each_identity_once() {
        let mut session = AttendanceSession::new(AttendanceConfig::default());
        let frame = [
            resolution(Some("ada"), 0.9, TrackState::Confirmed),
            resolution(Some("ada"), 0.8, TrackState::Confirmed),
        ];

        let events = session.arrivals(&frame, "/frames/1.jpg");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].identity_id, "ada");
        assert_eq!(events[0].evidence_frame_path, "/frames/1.jpg");
        assert!(session.arrivals(&frame, "/frames/2.jpg").is_empty());
        assert_eq!(session.logged_count(), 1);

        assert!(session.forget("ada"));
        assert_eq!(session.arrivals(&frame, "/frames/3.jpg").len(), 1);
    }

    #[test]
    fn filters_weak_unknown_and_tentative() {
        let mut session = AttendanceSession::new(AttendanceConfig::default());
        let frame = [
            resolution(Some("low"), 0.2, TrackState::Confirmed),
            resolution(None, 0.0, TrackState::Confirmed),
            resolution(Some("new"), 0.9, TrackState::Tentative),
        ];
        assert!(session.arrivals(&frame, "f").is_empty());
    }

    #[test]
    fn tentative_tracks_allowed_when_configured() {
        let mut session = AttendanceSession::new(AttendanceConfig {
            require_confirmed_track: false,
            ..AttendanceConfig::default()
        });
        let frame = [resolution(Some("new"), 0.5, TrackState::Tentative)];
        assert_eq!(session.arrivals(&frame, "f").len(), 1);
    }
}
