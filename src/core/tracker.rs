//! Frame-to-frame association of face boxes to stable track ids.
//!
//! Matching is greedy: detections are visited in input order and each takes
//! the still-unclaimed track with the highest IoU, provided it is strictly
//! above the configured threshold. This is not an optimal assignment and is
//! not meant to be one; track-id continuity under ambiguous overlaps depends
//! on this exact order.
//!
//! A `Tracker` is single-owner state. Feed it one frame at a time.

use crate::common::TrackerConfig;
use crate::core::geometry::BoundingBox;

pub type TrackId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Tentative,
    Confirmed,
    /// Missed in the most recent frame.
    Lost,
}

#[derive(Debug, Clone)]
pub struct Track {
    pub track_id: TrackId,
    pub bbox: BoundingBox,
    /// Frames since creation.
    pub age: u32,
    /// Total matched frames, including the one that created the track.
    pub hits: u32,
    pub time_since_update: u32,
    pub state: TrackState,
}

impl Track {
    fn new(track_id: TrackId, bbox: BoundingBox, min_hits: u32) -> Self {
        let mut track = Self {
            track_id,
            bbox,
            age: 0,
            hits: 1,
            time_since_update: 0,
            state: TrackState::Tentative,
        };
        track.refresh_state(min_hits);
        track
    }

    /// Constant-position model: a face is expected where it was last seen.
    pub fn predicted_bbox(&self) -> BoundingBox {
        self.bbox
    }

    fn mark_hit(&mut self, bbox: BoundingBox, min_hits: u32) {
        self.bbox = bbox;
        self.age += 1;
        self.hits += 1;
        self.time_since_update = 0;
        self.refresh_state(min_hits);
    }

    fn mark_missed(&mut self) {
        self.age += 1;
        self.time_since_update += 1;
        self.state = TrackState::Lost;
    }

    fn refresh_state(&mut self, min_hits: u32) {
        self.state = if self.hits >= min_hits {
            TrackState::Confirmed
        } else {
            TrackState::Tentative
        };
    }
}

/// Outcome for one input detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    /// `None` only when tentative tracks are configured as unreported.
    pub track_id: Option<TrackId>,
    pub state: TrackState,
}

pub struct Tracker {
    config: TrackerConfig,
    tracks: Vec<Track>,
    next_id: TrackId,
    frame_count: u64,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_id: 1,
            frame_count: 0,
        }
    }

    /// Tracks still in the registry, oldest first.
    pub fn active_tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Track ids for `detections`, in input order.
    pub fn update(&mut self, detections: &[BoundingBox]) -> Vec<Option<TrackId>> {
        self.assign(detections)
            .into_iter()
            .map(|a| a.track_id)
            .collect()
    }

    /// Like [`Tracker::update`], also reporting the state of each assigned track.
    pub fn assign(&mut self, detections: &[BoundingBox]) -> Vec<Assignment> {
        self.frame_count += 1;
        let min_hits = self.config.min_hits;

        let matches = self.greedy_match(detections);

        let mut matched = vec![false; self.tracks.len()];
        for (detection, track_idx) in detections.iter().zip(&matches) {
            if let Some(idx) = *track_idx {
                self.tracks[idx].mark_hit(*detection, min_hits);
                matched[idx] = true;
            }
        }
        for (track, was_matched) in self.tracks.iter_mut().zip(&matched) {
            if !was_matched {
                track.mark_missed();
            }
        }

        let mut assignments = Vec::with_capacity(detections.len());
        let mut spawned = 0usize;
        for (detection, track_idx) in detections.iter().zip(&matches) {
            let idx = match *track_idx {
                Some(idx) => idx,
                None => {
                    let track = Track::new(self.next_id, *detection, min_hits);
                    self.next_id += 1;
                    self.tracks.push(track);
                    spawned += 1;
                    self.tracks.len() - 1
                }
            };
            let track = &self.tracks[idx];
            let reported = self.config.report_tentative || track.state == TrackState::Confirmed;
            assignments.push(Assignment {
                track_id: reported.then_some(track.track_id),
                state: track.state,
            });
        }

        let before = self.tracks.len();
        let max_age = self.config.max_age;
        self.tracks.retain(|t| t.time_since_update <= max_age);

        tracing::debug!(
            "frame {}: {} detections, {} matched, {} new, {} expired, {} active",
            self.frame_count,
            detections.len(),
            matches.iter().filter(|m| m.is_some()).count(),
            spawned,
            before - self.tracks.len(),
            self.tracks.len()
        );

        assignments
    }

    /// Track index claimed by each detection, scanning detections left to right.
    fn greedy_match(&self, detections: &[BoundingBox]) -> Vec<Option<usize>> {
        let mut available = vec![true; self.tracks.len()];
        let mut matches = Vec::with_capacity(detections.len());

        for detection in detections {
            let mut best: Option<(usize, f32)> = None;
            for (idx, track) in self.tracks.iter().enumerate() {
                if !available[idx] {
                    continue;
                }
                let iou = track.predicted_bbox().iou(detection);
                if best.map_or(true, |(_, best_iou)| iou > best_iou) {
                    best = Some((idx, iou));
                }
            }

            match best {
                Some((idx, iou)) if iou > self.config.iou_threshold => {
                    available[idx] = false;
                    matches.push(Some(idx));
                }
                _ => matches.push(None),
            }
        }

        matches
    }
}
