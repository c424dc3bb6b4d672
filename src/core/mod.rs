pub mod analyzer;
pub mod embedding;
pub mod geometry;
pub mod pipeline;
pub mod session;
pub mod tracker;

pub use analyzer::{Detection, FaceAnalyzer};
pub use embedding::{Embedding, EMBEDDING_DIM, similarity_from_distance};
pub use geometry::BoundingBox;
pub use pipeline::{IdentityResolver, Resolution};
pub use session::AttendanceSession;
pub use tracker::{Track, TrackId, TrackState, Tracker};
