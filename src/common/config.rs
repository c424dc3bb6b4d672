use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::common::error::{FaceRollError, Result};

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub attendance: AttendanceConfig,
}

/// Thresholds for the track association engine.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TrackerConfig {
    /// A detection matches a track only when their IoU is strictly above this.
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,
    /// Hits required before a tentative track is confirmed.
    #[serde(default = "default_min_hits")]
    pub min_hits: u32,
    /// Frames a track may go unmatched before it is deleted.
    #[serde(default = "default_max_age")]
    pub max_age: u32,
    /// When false, detections assigned to tentative tracks are reported without an id.
    #[serde(default = "default_true")]
    pub report_tentative: bool,
}

fn default_iou_threshold() -> f32 { 0.3 }
fn default_min_hits() -> u32 { 3 }
fn default_max_age() -> u32 { 20 }
fn default_true() -> bool { true }

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            iou_threshold: default_iou_threshold(),
            min_hits: default_min_hits(),
            max_age: default_max_age(),
            report_tentative: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StoreConfig {
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// Scale enrolled and query embeddings to unit length so similarity stays in [-1, 1].
    #[serde(default = "default_true")]
    pub normalize_embeddings: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            normalize_embeddings: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AttendanceConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_true")]
    pub require_confirmed_track: bool,
    #[serde(default)]
    pub evidence_dir: Option<PathBuf>,
}

fn default_similarity_threshold() -> f32 { 0.5 }

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            require_confirmed_track: true,
            evidence_dir: None,
        }
    }
}

impl Config {
    /// Loads `path` when given, otherwise falls back to the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FaceRollError::InvalidArgument(format!(
                "Config file not found: {}", path.display()
            )));
        }

        tracing::info!("Loading config from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| FaceRollError::InvalidArgument(format!("Config parse error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let tracker = &self.tracker;
        if !(tracker.iou_threshold > 0.0 && tracker.iou_threshold <= 1.0) {
            return Err(FaceRollError::InvalidArgument(format!(
                "IoU threshold must be in (0.0, 1.0], got {}", tracker.iou_threshold
            )));
        }
        if tracker.min_hits == 0 {
            return Err(FaceRollError::InvalidArgument(
                "min_hits must be at least 1, got 0".into()
            ));
        }
        if tracker.max_age == 0 {
            return Err(FaceRollError::InvalidArgument(
                "max_age must be at least 1, got 0".into()
            ));
        }

        let threshold = self.attendance.similarity_threshold;
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(FaceRollError::InvalidArgument(format!(
                "Similarity threshold must be between -1.0 and 1.0, got {}", threshold
            )));
        }

        Ok(())
    }
}
