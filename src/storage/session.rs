use crate::common::Result;
use crate::core::matcher::MatchResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// `"Full Name (username)"`
    pub user: String,
    pub username: String,
    pub full_name: String,
    pub started_at: String,
}

/// Single login session kept as a JSON file.
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = fs::read(&self.path)?;
        match serde_json::from_slice(&data) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!("Discarding unreadable session file {}: {}", self.path.display(), e);
                Ok(None)
            }
        }
    }

    pub fn establish(&self, result: &MatchResult) -> Result<Session> {
        let session = Session {
            user: result.account.display_name(),
            username: result.account.username.clone(),
            full_name: result.account.full_name.clone(),
            started_at: chrono::Local::now().to_rfc3339(),
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(&session)?)?;
        tracing::info!("Session established for {}", session.user);
        Ok(session)
    }

    /// Removes the session; returns whether one existed.
    pub fn clear(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path)?;
        Ok(true)
    }
}
