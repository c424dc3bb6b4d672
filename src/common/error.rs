use thiserror::Error;

#[derive(Error, Debug)]
pub enum FaceRollError {
    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    #[error("Unknown identity: {0}")]
    UnknownIdentity(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Identity {0} is referenced by attendance events")]
    IdentityReferenced(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Detection unavailable: {0}")]
    DetectionUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for FaceRollError {
    fn from(e: rusqlite::Error) -> Self {
        FaceRollError::StoreUnavailable(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FaceRollError>;
