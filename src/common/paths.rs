use std::path::PathBuf;
use std::fs;
use directories::ProjectDirs;
use crate::common::{Config, DevMode, FaceAppError, Result};

const DATABASE_FILE: &str = "faceapp.db";
const SESSION_FILE: &str = "session.json";

/// Where the database, captured frames and the login session live.
///
/// Explicit `[storage]` entries win, then the dev-mode directory, then the
/// per-user data directory.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub database: PathBuf,
    pub captures_dir: PathBuf,
    pub session_file: PathBuf,
}

impl AppPaths {
    pub fn resolve(config: &Config, dev_mode: &DevMode) -> Result<Self> {
        let base_dir = match dev_mode.base_dir() {
            Some(base) => base.clone(),
            None => ProjectDirs::from("org", "faceapp", "FaceApp")
                .ok_or_else(|| FaceAppError::Config("Failed to get project dirs".into()))?
                .data_dir()
                .to_path_buf(),
        };
        Ok(Self::under(base_dir, config))
    }

    pub fn under(base_dir: PathBuf, config: &Config) -> Self {
        let storage = &config.storage;
        Self {
            database: storage.database_path.clone()
                .unwrap_or_else(|| base_dir.join(DATABASE_FILE)),
            captures_dir: storage.captures_dir.clone()
                .unwrap_or_else(|| base_dir.join("captures")),
            session_file: storage.session_file.clone()
                .unwrap_or_else(|| base_dir.join(SESSION_FILE)),
        }
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.captures_dir)?;
        for file in [&self.database, &self.session_file] {
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    pub fn capture_path(&self, prefix: &str) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        self.captures_dir.join(format!("{}_{}.jpg", prefix, timestamp))
    }
}
