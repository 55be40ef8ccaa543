// Core modules
pub mod core;
pub mod camera;
pub mod storage;
pub mod cli;
pub mod common;

// Re-export commonly used types
pub use crate::common::{AppPaths, Config, DevMode, FaceAppError, Result};
pub use crate::core::{
    Account, Descriptor, DescriptorExtractor, EnrollmentRecord, ExtractionMode, FaceBox,
    FaceLogin, LoginOutcome, LoginState, MatchResult, MatchSet, Matcher, OnnxExtractor,
};
pub use crate::camera::{Camera, CameraCapture, CameraSelection, FaceCapture};
pub use crate::storage::{EnrollOutcome, EnrollmentStore, Session, SessionStore, SqliteEnrollmentStore};
