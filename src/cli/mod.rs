pub mod export;
pub mod replay;

pub use export::write_attendance_csv;
pub use replay::{
    read_embedding_file, read_frames, replay_session, FrameOutcome, ReplayAnalyzer, ReplayFrame,
    ReplaySummary,
};
