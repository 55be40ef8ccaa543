pub mod auth;
pub mod descriptor;
pub mod detector;
pub mod encoder;
pub mod extractor;
pub mod matcher;
pub mod record;

pub use auth::{FaceLogin, LoginOutcome, LoginState};
pub use descriptor::{Descriptor, euclidean_distance};
pub use detector::{FaceBox, FaceDetector, FaceLocator};
pub use encoder::FaceEncoder;
pub use extractor::{DescriptorExtractor, ExtractionMode, OnnxExtractor};
pub use matcher::{Matcher, MatchResult, MatchSet, DEFAULT_MATCH_THRESHOLD};
pub use record::{Account, EnrollmentRecord};
