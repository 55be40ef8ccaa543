use crate::common::{FaceAppError, Result, Config};
use crate::common::config::DetectorConfig;
use ort::{inputs, GraphOptimizationLevel, Session, SessionOutputs};
use std::path::Path;
use image::{DynamicImage, imageops::FilterType};
use ndarray::Array4;

/// Face bounding box in image pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

impl FaceBox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn iou(&self, other: &FaceBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// Anything that can find face regions in a frame. The capture loop only
/// needs this much to decide whether SPACE may take the shot.
pub trait FaceLocator {
    fn locate(&self, image: &DynamicImage) -> Result<Vec<FaceBox>>;
}

pub struct FaceDetector {
    session: Session,
    config: DetectorConfig,
}

impl FaceDetector {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_model(&config.models.detector_path, config)
    }

    pub fn with_model(model_path: &Path, config: &Config) -> Result<Self> {
        if !model_path.exists() {
            return Err(FaceAppError::Model(
                format!("Detector model not found at: {:?}", model_path)
            ));
        }

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path)?;

        Ok(Self {
            session,
            config: config.detector.clone(),
        })
    }

    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceBox>> {
        let orig_width = image.width() as f32;
        let orig_height = image.height() as f32;
        let (input_width, input_height) = (self.config.input_width, self.config.input_height);

        let img_array = if image.width() == input_width && image.height() == input_height {
            image_to_array(image)
        } else {
            let resized = image.resize_exact(input_width, input_height, FilterType::Triangle);
            image_to_array(&resized)
        };

        let input_name = self.session.inputs.first()
            .map(|input| input.name.clone())
            .ok_or_else(|| FaceAppError::Model("Detector model has no inputs".into()))?;
        let output_name = self.session.outputs.first()
            .map(|output| output.name.clone())
            .ok_or_else(|| FaceAppError::Model("Detector model has no outputs".into()))?;

        let outputs: SessionOutputs = self.session.run(inputs![input_name => img_array.view()]?)?;
        let tensor = outputs[output_name.as_str()].try_extract_tensor::<f32>()?;
        let shape = tensor.shape().to_vec();
        let data: Vec<f32> = tensor.iter().copied().collect();

        let candidates = decode_predictions(&data, &shape, input_width as f32, input_height as f32);
        let mut faces = filter_detections(candidates, &self.config);

        // Back to original image coordinates
        let scale_x = orig_width / input_width as f32;
        let scale_y = orig_height / input_height as f32;
        for face in &mut faces {
            face.x1 *= scale_x;
            face.x2 *= scale_x;
            face.y1 *= scale_y;
            face.y2 *= scale_y;
        }

        tracing::debug!("Detected {} face(s)", faces.len());
        Ok(faces)
    }
}

impl FaceLocator for FaceDetector {
    fn locate(&self, image: &DynamicImage) -> Result<Vec<FaceBox>> {
        self.detect(image)
    }
}

fn image_to_array(img: &DynamicImage) -> Array4<f32> {
    let rgb = img.to_rgb8();
    let (width, height) = (rgb.width() as usize, rgb.height() as usize);
    let mut array = Array4::<f32>::zeros((1, 3, height, width));

    for (x, y, pixel) in rgb.enumerate_pixels() {
        for channel in 0..3 {
            array[[0, channel, y as usize, x as usize]] = pixel[channel] as f32 / 255.0;
        }
    }

    array
}

/// Turns raw YOLO-style output into boxes in model input coordinates.
///
/// Accepts `[1, N, 5+]`, the transposed `[1, 5+, N]`, or `[N, 5+]`. Each
/// prediction is `x_center, y_center, width, height, confidence`; normalized
/// coordinates are scaled up to the input size.
pub fn decode_predictions(data: &[f32], shape: &[usize], input_width: f32, input_height: f32) -> Vec<FaceBox> {
    let (num_predictions, prediction_length, is_transposed) = match shape {
        [_, a, b] if b > a && *a <= 16 => (*b, *a, true),
        [_, a, b] => (*a, *b, false),
        [a, b] => (*a, *b, false),
        _ => {
            tracing::warn!("Unexpected detector output shape: {:?}", shape);
            return Vec::new();
        }
    };

    if prediction_length < 5 || data.len() < num_predictions * prediction_length {
        tracing::warn!("Detector output too short for shape {:?}", shape);
        return Vec::new();
    }

    let value = |i: usize, field: usize| {
        if is_transposed {
            data[field * num_predictions + i]
        } else {
            data[i * prediction_length + field]
        }
    };

    let mut faces = Vec::new();
    for i in 0..num_predictions {
        let confidence = value(i, 4);
        if confidence <= 0.001 {
            continue;
        }

        let (mut cx, mut cy, mut w, mut h) = (value(i, 0), value(i, 1), value(i, 2), value(i, 3));
        if cx <= 1.0 && cy <= 1.0 && w <= 1.0 && h <= 1.0 {
            cx *= input_width;
            w *= input_width;
            cy *= input_height;
            h *= input_height;
        }

        let x1 = (cx - w / 2.0).max(0.0);
        let y1 = (cy - h / 2.0).max(0.0);
        let x2 = (cx + w / 2.0).min(input_width);
        let y2 = (cy + h / 2.0).min(input_height);

        // Drop inverted and tiny boxes
        if x2 - x1 > 10.0 && y2 - y1 > 10.0 {
            faces.push(FaceBox { x1, y1, x2, y2, confidence });
        }
    }

    faces
}

/// NMS over every candidate first, then the confidence cut and the cap.
pub fn filter_detections(candidates: Vec<FaceBox>, config: &DetectorConfig) -> Vec<FaceBox> {
    let mut faces = non_max_suppression(candidates, config.nms_iou);
    faces.retain(|face| face.confidence >= config.confidence);
    faces.truncate(config.max_faces);
    faces
}

/// Greedy NMS; the result is sorted by descending confidence.
pub fn non_max_suppression(mut boxes: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<FaceBox> = Vec::new();
    for candidate in boxes {
        if keep.iter().all(|kept| kept.iou(&candidate) < iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> FaceBox {
        FaceBox { x1, y1, x2, y2, confidence }
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = face(0.0, 0.0, 10.0, 10.0, 0.9);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        let b = face(20.0, 20.0, 30.0, 30.0, 0.9);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn nms_drops_overlapping_lower_confidence() {
        let boxes = vec![
            face(0.0, 0.0, 100.0, 100.0, 0.6),
            face(2.0, 2.0, 102.0, 102.0, 0.9),
            face(300.0, 300.0, 400.0, 400.0, 0.7),
        ];
        let kept = non_max_suppression(boxes, 0.45);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].confidence, 0.7);
    }

    #[test]
    fn decodes_standard_layout_in_pixels() {
        // Six predictions of [cx, cy, w, h, conf]; only the first is confident
        let mut data = vec![100.0, 100.0, 50.0, 60.0, 0.8];
        data.extend(vec![0.0; 25]);
        let faces = decode_predictions(&data, &[1, 6, 5], 640.0, 640.0);
        assert_eq!(faces, vec![face(75.0, 70.0, 125.0, 130.0, 0.8)]);
    }

    #[test]
    fn decodes_transposed_normalized_layout() {
        // Layout [1, 5, 6]: one row per field
        let data = vec![
            0.5, 0.1, 0.9, 0.0, 0.0, 0.0,
            0.5, 0.1, 0.9, 0.0, 0.0, 0.0,
            0.25, 0.1, 0.1, 0.0, 0.0, 0.0,
            0.25, 0.1, 0.1, 0.0, 0.0, 0.0,
            0.95, 0.0, 0.4, 0.0, 0.0, 0.0,
        ];
        let faces = decode_predictions(&data, &[1, 5, 6], 640.0, 640.0);
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0], face(240.0, 240.0, 400.0, 400.0, 0.95));
        assert_eq!(faces[1].confidence, 0.4);
    }

    #[test]
    fn unexpected_shape_yields_no_faces() {
        assert!(decode_predictions(&[0.0; 8], &[8], 640.0, 640.0).is_empty());
        assert!(decode_predictions(&[0.0; 4], &[1, 1, 4], 640.0, 640.0).is_empty());
    }

    #[test]
    fn filter_applies_confidence_and_cap() {
        let config = DetectorConfig { confidence: 0.5, max_faces: 1, ..DetectorConfig::default() };
        let faces = filter_detections(vec![
            face(0.0, 0.0, 50.0, 50.0, 0.3),
            face(100.0, 100.0, 150.0, 150.0, 0.7),
            face(200.0, 200.0, 250.0, 250.0, 0.6),
        ], &config);
        assert_eq!(faces, vec![face(100.0, 100.0, 150.0, 150.0, 0.7)]);
    }
}
