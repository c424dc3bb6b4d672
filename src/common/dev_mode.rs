use std::path::PathBuf;
use std::fs;
use crate::common::config::Config;
use crate::common::error::Result;
use crate::common::paths;

/// Chooses between the local `./dev_data` tree and the per-user system directories.
#[derive(Debug, Clone)]
pub struct DevMode {
    enabled: bool,
    base_dir: PathBuf,
}

impl DevMode {
    pub fn new(enabled: bool) -> Result<Self> {
        let base_dir = if enabled {
            PathBuf::from("./dev_data")
        } else {
            paths::system_data_dir()?
        };
        Self::with_base_dir(enabled, base_dir)
    }

    pub fn with_base_dir(enabled: bool, base_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_dir)?;
        fs::create_dir_all(base_dir.join("evidence"))?;
        fs::create_dir_all(base_dir.join("exports"))?;

        if enabled {
            tracing::info!("Development mode enabled - data will be saved to: {}", base_dir.display());
        }

        Ok(Self { enabled, base_dir })
    }

    /// Database location, honouring an explicit `store.database_path`.
    pub fn database_path(&self, config: &Config) -> PathBuf {
        config
            .store
            .database_path
            .clone()
            .unwrap_or_else(|| self.base_dir.join(paths::DATABASE_FILE))
    }

    pub fn evidence_dir(&self, config: &Config) -> PathBuf {
        config
            .attendance
            .evidence_dir
            .clone()
            .unwrap_or_else(|| self.base_dir.join("evidence"))
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.base_dir.join("exports")
    }

    pub fn config_path(&self) -> Result<PathBuf> {
        if self.enabled {
            Ok(self.base_dir.join("faceroll.toml"))
        } else {
            paths::system_config_file()
        }
    }

    pub fn get_export_path(&self, prefix: &str) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        self.exports_dir().join(format!("{}_{}.csv", prefix, timestamp))
    }
}
