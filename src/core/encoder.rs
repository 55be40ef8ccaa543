use crate::common::{FaceAppError, Result, Config};
use crate::common::config::EncoderConfig;
use crate::core::descriptor::Descriptor;
use crate::core::detector::FaceBox;
use ort::{inputs, GraphOptimizationLevel, Session, SessionOutputs};
use std::path::Path;
use image::{DynamicImage, imageops::FilterType};
use ndarray::Array4;

/// Runs the embedding network over one cropped face.
pub struct FaceEncoder {
    session: Session,
    config: EncoderConfig,
}

impl FaceEncoder {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_model(&config.models.encoder_path, config)
    }

    pub fn with_model(model_path: &Path, config: &Config) -> Result<Self> {
        if !model_path.exists() {
            return Err(FaceAppError::Model(
                format!("Encoder model not found at: {:?}", model_path)
            ));
        }

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path)?;

        Ok(Self {
            session,
            config: config.encoder.clone(),
        })
    }

    pub fn encode(&self, image: &DynamicImage, face: &FaceBox) -> Result<Descriptor> {
        let face_img = crop_face(image, face);
        let size = self.config.input_size;
        let resized = face_img.resize_exact(size, size, FilterType::Triangle);

        let input_array = preprocess_face(&resized, &self.config);
        let input_name = self.session.inputs.first()
            .map(|input| input.name.clone())
            .ok_or_else(|| FaceAppError::Model("Encoder model has no inputs".into()))?;
        let output_name = self.session.outputs.first()
            .map(|output| output.name.clone())
            .ok_or_else(|| FaceAppError::Model("Encoder produced no output".into()))?;

        let outputs: SessionOutputs = self.session.run(inputs![input_name => input_array.view()]?)?;
        let values = outputs[output_name.as_str()].try_extract_tensor::<f32>()?
            .iter().copied().collect::<Vec<f32>>();

        let mut descriptor = Descriptor::from_vec(values);
        if self.config.l2_normalize {
            descriptor.normalize();
        }
        Ok(descriptor)
    }
}

/// Crops `face` out of `image`, clamped to the image bounds.
pub fn crop_face(image: &DynamicImage, face: &FaceBox) -> DynamicImage {
    let max_x = image.width().saturating_sub(1) as f32;
    let max_y = image.height().saturating_sub(1) as f32;
    let x = face.x1.clamp(0.0, max_x) as u32;
    let y = face.y1.clamp(0.0, max_y) as u32;
    let width = (face.x2.min(image.width() as f32) - x as f32).max(1.0) as u32;
    let height = (face.y2.min(image.height() as f32) - y as f32).max(1.0) as u32;

    image.crop_imm(x, y, width, height)
}

fn preprocess_face(img: &DynamicImage, config: &EncoderConfig) -> Array4<f32> {
    let rgb = img.to_rgb8();
    let size = config.input_size as usize;
    let mut array = Array4::<f32>::zeros((1, 3, size, size));

    for (x, y, pixel) in rgb.enumerate_pixels() {
        for channel in 0..3 {
            array[[0, channel, y as usize, x as usize]] =
                (pixel[channel] as f32 - config.normalization_mean) / config.normalization_std;
        }
    }

    array
}
