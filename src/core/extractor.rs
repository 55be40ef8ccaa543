use crate::common::{Config, Result};
use crate::core::descriptor::Descriptor;
use crate::core::detector::{FaceBox, FaceDetector, FaceLocator};
use crate::core::encoder::FaceEncoder;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Produces one descriptor per face found in an image.
///
/// A faceless image yields an empty list, not an error. The order of the
/// returned descriptors follows the detector and is not stable.
pub trait DescriptorExtractor {
    fn extract(&self, image: &DynamicImage) -> Result<Vec<Descriptor>>;

    fn extract_file(&self, path: &Path) -> Result<Vec<Descriptor>> {
        let image = image::open(path)?;
        self.extract(&image)
    }
}

/// How many of the extracted descriptors a caller keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    First,
    All,
}

impl ExtractionMode {
    pub fn select(self, mut descriptors: Vec<Descriptor>) -> Vec<Descriptor> {
        if self == ExtractionMode::First {
            descriptors.truncate(1);
        }
        descriptors
    }
}

/// Detector + encoder pair backed by ONNX models.
pub struct OnnxExtractor {
    detector: FaceDetector,
    encoder: FaceEncoder,
}

impl OnnxExtractor {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            detector: FaceDetector::new(config)?,
            encoder: FaceEncoder::new(config)?,
        })
    }

    pub fn detector(&self) -> &FaceDetector {
        &self.detector
    }

    pub fn encode_faces(&self, image: &DynamicImage, faces: &[FaceBox]) -> Result<Vec<Descriptor>> {
        faces.iter().map(|face| self.encoder.encode(image, face)).collect()
    }
}

impl DescriptorExtractor for OnnxExtractor {
    fn extract(&self, image: &DynamicImage) -> Result<Vec<Descriptor>> {
        let faces = self.detector.detect(image)?;
        self.encode_faces(image, &faces)
    }
}

impl FaceLocator for OnnxExtractor {
    fn locate(&self, image: &DynamicImage) -> Result<Vec<FaceBox>> {
        self.detector.detect(image)
    }
}
