use directories::ProjectDirs;
use std::path::PathBuf;
use crate::common::error::{FaceRollError, Result};

pub const DATABASE_FILE: &str = "faceroll.db";

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("com", "faceroll", "FaceRoll")
        .ok_or_else(|| FaceRollError::StoreUnavailable("Failed to get project dirs".into()))
}

pub fn system_data_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}

pub fn system_config_file() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("faceroll.toml"))
}
