//! Pre-computed detector output, replayed frame by frame.
//!
//! Each non-empty line of a replay file is one frame:
//!
//! ```json
//! {"frame": "frames/0001.jpg", "detections": [{"bbox": [10, 20, 110, 140], "detection_score": 0.98, "embedding": [0.01, ...]}]}
//! {"frame": "frames/0002.jpg", "error": "camera timeout"}
//! ```

use crate::common::{FaceRollError, Result};
use crate::core::{AttendanceSession, BoundingBox, Detection, Embedding, FaceAnalyzer, IdentityResolver, Resolution};
use crate::storage::{AttendanceEvent, AttendanceLedger};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::mpsc;
use std::thread;

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayDetection {
    pub bbox: [f32; 4],
    pub detection_score: f32,
    pub embedding: Embedding,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayFrame {
    /// Where the frame image was saved; used as attendance evidence.
    pub frame: String,
    #[serde(default)]
    pub detections: Vec<ReplayDetection>,
    /// Set when the detector produced nothing usable for this frame.
    #[serde(default)]
    pub error: Option<String>,
}

pub fn read_frames(path: &Path) -> Result<Vec<ReplayFrame>> {
    let contents = fs::read_to_string(path)?;
    parse_frames(&contents)
}

pub fn parse_frames(contents: &str) -> Result<Vec<ReplayFrame>> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).map_err(|e| {
                FaceRollError::InvalidArgument(format!("Replay line {}: {}", n + 1, e))
            })
        })
        .collect()
}

/// Reads a JSON array of floats, as written by the embedding exporter.
pub fn read_embedding_file(path: &Path) -> Result<Embedding> {
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| {
        FaceRollError::InvalidArgument(format!("Bad embedding file {}: {}", path.display(), e))
    })
}

/// Stands in for the live detector by handing back what each frame recorded.
pub struct ReplayAnalyzer;

impl FaceAnalyzer for ReplayAnalyzer {
    type Frame = ReplayFrame;

    fn detect_and_embed(&mut self, frame: &ReplayFrame) -> Result<Vec<Detection>> {
        if let Some(reason) = &frame.error {
            return Err(FaceRollError::DetectionUnavailable(format!("{}: {}", frame.frame, reason)));
        }

        Ok(frame
            .detections
            .iter()
            .map(|d| Detection {
                bbox: BoundingBox::from(d.bbox),
                detection_score: d.detection_score,
                embedding: d.embedding.clone(),
            })
            .collect())
    }
}

/// What happened to one replayed frame.
pub enum FrameOutcome<'a> {
    Resolved {
        results: &'a [Resolution],
        arrivals: &'a [AttendanceEvent],
    },
    /// The frame was treated as empty; tracks aged and the session went on.
    Dropped(&'a FaceRollError),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    pub frames: usize,
    pub dropped: usize,
    pub arrivals: usize,
    pub recorded: usize,
    pub failed_writes: usize,
}

/// Drives `frames` through the resolver and the arrival policy.
///
/// With a ledger, arrivals are written by a dedicated worker thread. Identities
/// whose write failed are forgotten by the session so they can arrive again.
/// The worker is always drained and joined before this returns.
pub fn replay_session<F>(
    frames: &[ReplayFrame],
    resolver: &mut IdentityResolver,
    session: &mut AttendanceSession,
    evidence_dir: &Path,
    ledger: Option<AttendanceLedger>,
    mut on_frame: F,
) -> Result<ReplaySummary>
where
    F: FnMut(usize, &ReplayFrame, FrameOutcome<'_>),
{
    let (failed_tx, failed_rx) = mpsc::channel::<String>();
    let writer = ledger.map(|ledger| {
        let (tx, rx) = mpsc::channel::<AttendanceEvent>();
        let handle = thread::spawn(move || {
            let mut recorded = 0usize;
            for event in rx {
                match ledger.record(&event) {
                    Ok(()) => recorded += 1,
                    Err(e) => {
                        tracing::warn!("Dropping attendance for {}: {}", event.identity_id, e);
                        // The receiver outlives this thread.
                        let _ = failed_tx.send(event.identity_id);
                    }
                }
            }
            recorded
        });
        (tx, handle)
    });

    let mut summary = ReplaySummary::default();
    let mut analyzer = ReplayAnalyzer;
    let outcome = (|| -> Result<()> {
        for (index, frame) in frames.iter().enumerate() {
            for identity_id in failed_rx.try_iter() {
                session.forget(&identity_id);
                summary.failed_writes += 1;
            }
            summary.frames += 1;

            let results = match resolver.process_frame(&mut analyzer, frame) {
                Ok(results) => results,
                Err(e @ (FaceRollError::DetectionUnavailable(_) | FaceRollError::InvalidArgument(_))) => {
                    summary.dropped += 1;
                    on_frame(index, frame, FrameOutcome::Dropped(&e));
                    continue;
                }
                Err(e) => return Err(e),
            };

            let evidence = evidence_dir.join(&frame.frame);
            let arrivals = session.arrivals(&results, &evidence.to_string_lossy());
            summary.arrivals += arrivals.len();
            on_frame(index, frame, FrameOutcome::Resolved { results: &results, arrivals: &arrivals });

            if let Some((tx, _)) = &writer {
                for event in arrivals {
                    tx.send(event).map_err(|_| {
                        FaceRollError::StoreUnavailable("attendance writer stopped".into())
                    })?;
                }
            }
        }
        Ok(())
    })();

    if let Some((tx, handle)) = writer {
        drop(tx);
        summary.recorded = handle
            .join()
            .map_err(|_| FaceRollError::StoreUnavailable("attendance writer panicked".into()))?;
    }
    for identity_id in failed_rx.try_iter() {
        session.forget(&identity_id);
        summary.failed_writes += 1;
    }

    outcome.map(|()| summary)
}
