use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::common::error::{FaceAppError, Result};
use crate::core::extractor::ExtractionMode;
use crate::core::matcher::DEFAULT_MATCH_THRESHOLD;

pub const DEFAULT_CONFIG_PATH: &str = "configs/faceapp.toml";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub models: ModelConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CameraConfig {
    #[serde(default)]
    pub device_index: u32,
    #[serde(default = "default_probe_limit")]
    pub probe_limit: u32,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_warmup_frames")]
    pub warmup_frames: u32,
    #[serde(default = "default_warmup_delay")]
    pub warmup_delay_ms: u64,
    #[serde(default = "default_true")]
    pub mirror: bool,
}

fn default_probe_limit() -> u32 { 5 }
fn default_width() -> u32 { 640 }
fn default_height() -> u32 { 480 }
fn default_warmup_frames() -> u32 { 3 }
fn default_warmup_delay() -> u64 { 50 }
fn default_true() -> bool { true }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            probe_limit: default_probe_limit(),
            width: default_width(),
            height: default_height(),
            warmup_frames: default_warmup_frames(),
            warmup_delay_ms: default_warmup_delay(),
            mirror: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_detector_path")]
    pub detector_path: PathBuf,
    #[serde(default = "default_encoder_path")]
    pub encoder_path: PathBuf,
}

fn default_detector_path() -> PathBuf { PathBuf::from("models/face_detector.onnx") }
fn default_encoder_path() -> PathBuf { PathBuf::from("models/face_encoder.onnx") }

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            detector_path: default_detector_path(),
            encoder_path: default_encoder_path(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DetectorConfig {
    #[serde(default = "default_detector_input")]
    pub input_width: u32,
    #[serde(default = "default_detector_input")]
    pub input_height: u32,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default = "default_nms_iou")]
    pub nms_iou: f32,
    #[serde(default = "default_max_faces")]
    pub max_faces: usize,
}

fn default_detector_input() -> u32 { 640 }
fn default_confidence() -> f32 { 0.5 }
fn default_nms_iou() -> f32 { 0.45 }
fn default_max_faces() -> usize { 5 }

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            input_width: default_detector_input(),
            input_height: default_detector_input(),
            confidence: default_confidence(),
            nms_iou: default_nms_iou(),
            max_faces: default_max_faces(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EncoderConfig {
    #[serde(default = "default_encoder_input")]
    pub input_size: u32,
    #[serde(default = "default_norm")]
    pub normalization_mean: f32,
    #[serde(default = "default_norm")]
    pub normalization_std: f32,
    #[serde(default = "default_true")]
    pub l2_normalize: bool,
}

fn default_encoder_input() -> u32 { 112 }
fn default_norm() -> f32 { 127.5 }

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            input_size: default_encoder_input(),
            normalization_mean: default_norm(),
            normalization_std: default_norm(),
            l2_normalize: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MatcherConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

fn default_threshold() -> f32 { DEFAULT_MATCH_THRESHOLD }

impl Default for MatcherConfig {
    fn default() -> Self {
        Self { threshold: default_threshold() }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_signup_mode")]
    pub signup_mode: ExtractionMode,
    #[serde(default = "default_login_mode")]
    pub login_mode: ExtractionMode,
}

fn default_signup_mode() -> ExtractionMode { ExtractionMode::First }
fn default_login_mode() -> ExtractionMode { ExtractionMode::All }

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            signup_mode: default_signup_mode(),
            login_mode: default_login_mode(),
        }
    }
}

/// Unset paths are resolved by [`crate::common::paths::AppPaths`].
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub captures_dir: Option<PathBuf>,
    #[serde(default)]
    pub session_file: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PreviewConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub width: Option<usize>,
    #[serde(default)]
    pub height: Option<usize>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self { enabled: true, width: None, height: None }
    }
}

impl Config {
    /// Loads `path`, falling back to defaults when the file is absent and
    /// `required` is false.
    pub fn load_or_default(path: &Path, required: bool) -> Result<Self> {
        if !path.exists() && !required {
            tracing::warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(path)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FaceAppError::Config(format!(
                "Config file not found: {}. Please create it from the example.", path.display()
            )));
        }

        tracing::info!("Loading config from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| FaceAppError::Config(format!("Config parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| FaceAppError::Config(format!("Config serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.width > 4096 {
            return Err(FaceAppError::Config(format!(
                "Camera width must be between 1 and 4096, got {}", self.camera.width
            )));
        }
        if self.camera.height == 0 || self.camera.height > 4096 {
            return Err(FaceAppError::Config(format!(
                "Camera height must be between 1 and 4096, got {}", self.camera.height
            )));
        }
        if self.camera.probe_limit == 0 || self.camera.probe_limit > 64 {
            return Err(FaceAppError::Config(format!(
                "Camera probe limit must be between 1 and 64, got {}", self.camera.probe_limit
            )));
        }

        if !self.matcher.threshold.is_finite() || self.matcher.threshold <= 0.0 {
            return Err(FaceAppError::Config(format!(
                "Match threshold must be a positive number, got {}", self.matcher.threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.detector.confidence) {
            return Err(FaceAppError::Config(format!(
                "Detection confidence must be between 0.0 and 1.0, got {}",
                self.detector.confidence
            )));
        }
        if !(0.0..=1.0).contains(&self.detector.nms_iou) {
            return Err(FaceAppError::Config(format!(
                "NMS IoU must be between 0.0 and 1.0, got {}", self.detector.nms_iou
            )));
        }

        if self.detector.input_width == 0 || self.detector.input_width > 4096 {
            return Err(FaceAppError::Config(format!(
                "Detector input width must be between 1 and 4096, got {}",
                self.detector.input_width
            )));
        }
        if self.detector.input_height == 0 || self.detector.input_height > 4096 {
            return Err(FaceAppError::Config(format!(
                "Detector input height must be between 1 and 4096, got {}",
                self.detector.input_height
            )));
        }
        if self.detector.max_faces == 0 {
            return Err(FaceAppError::Config("Detector max_faces must be at least 1".into()));
        }

        if self.encoder.input_size == 0 || self.encoder.input_size > 1024 {
            return Err(FaceAppError::Config(format!(
                "Encoder input size must be between 1 and 1024, got {}",
                self.encoder.input_size
            )));
        }
        if self.encoder.normalization_std == 0.0 {
            return Err(FaceAppError::Config("Encoder normalization_std must be non-zero".into()));
        }

        Ok(())
    }
}
