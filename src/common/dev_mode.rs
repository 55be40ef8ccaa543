use std::path::PathBuf;
use std::fs;
use crate::common::error::Result;

const DEV_BASE_DIR: &str = "./dev_data";

#[derive(Debug, Clone)]
pub struct DevMode {
    enabled: bool,
    base_dir: PathBuf,
}

impl DevMode {
    pub fn new(enabled: bool) -> Result<Self> {
        Self::with_base_dir(enabled, PathBuf::from(DEV_BASE_DIR))
    }

    pub fn with_base_dir(enabled: bool, base_dir: PathBuf) -> Result<Self> {
        if enabled {
            fs::create_dir_all(base_dir.join("captures"))?;
            fs::create_dir_all(base_dir.join("debug"))?;

            println!("📁 Development mode enabled - data will be saved to: {}",
                     base_dir.display());
        }

        Ok(Self { enabled, base_dir })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Base directory for dev data, `None` when dev mode is off.
    pub fn base_dir(&self) -> Option<&PathBuf> {
        self.enabled.then_some(&self.base_dir)
    }

    pub fn debug_dir(&self) -> Option<PathBuf> {
        self.base_dir().map(|base| base.join("debug"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_dev_mode_creates_directories() {
        let tmp = tempfile::TempDir::new().unwrap();
        let base = tmp.path().join("dev");
        let dev = DevMode::with_base_dir(true, base.clone()).unwrap();

        assert!(dev.is_enabled());
        assert!(base.join("captures").is_dir());
        assert_eq!(dev.debug_dir(), Some(base.join("debug")));
    }

    #[test]
    fn disabled_dev_mode_has_no_dirs() {
        let dev = DevMode::new(false).unwrap();
        assert!(dev.base_dir().is_none());
        assert!(dev.debug_dir().is_none());
    }
}
