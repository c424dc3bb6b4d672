// Core modules
pub mod core;
pub mod storage;
pub mod cli;
pub mod common;

// Re-export commonly used types
pub use common::{Config, DevMode, FaceRollError, Result};
pub use core::{
    AttendanceSession, BoundingBox, Detection, Embedding, FaceAnalyzer, IdentityResolver,
    Resolution, TrackId, TrackState, Tracker, EMBEDDING_DIM,
};
pub use storage::{
    AttendanceEvent, AttendanceLedger, Database, Identity, IdentityStore, IdentitySummary,
    OrderBy, SimilarIdentity,
};
