use thiserror::Error;

#[derive(Error, Debug)]
pub enum FaceAppError {
    #[error("Camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("Capture cancelled")]
    CaptureCancelled,

    #[error("No face detected")]
    NoFaceDetected,

    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    #[error("Persistence read failed: {0}")]
    PersistenceRead(String),

    #[error("Persistence write conflict: {0}")]
    PersistenceWriteConflict(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Already logged in as {0}")]
    AlreadyLoggedIn(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("ORT error: {0}")]
    Ort(#[from] ort::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl FaceAppError {
    /// Message shown to the user when an operation is abandoned.
    pub fn user_message(&self) -> String {
        match self {
            FaceAppError::CameraUnavailable(_) => "Could not access camera.".to_string(),
            FaceAppError::CaptureCancelled => "Face capture failed.".to_string(),
            FaceAppError::NoFaceDetected => "No face detected. Try again.".to_string(),
            FaceAppError::PersistenceUnavailable(_) => "Database connection failed.".to_string(),
            FaceAppError::PersistenceRead(_) => "Database fetch error.".to_string(),
            FaceAppError::PersistenceWriteConflict(_) => {
                "Username already exists or DB error.".to_string()
            }
            FaceAppError::MissingField(_) => "All fields are required.".to_string(),
            FaceAppError::AlreadyLoggedIn(user) => {
                format!("Already logged in as {}. Log out first.", user)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FaceAppError>;
