use crate::core::detector::FaceBox;
use image::{DynamicImage, Rgb};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

const HIGH_CONFIDENCE: Rgb<u8> = Rgb([0, 255, 0]);
const LOW_CONFIDENCE: Rgb<u8> = Rgb([255, 165, 0]);

/// Copy of `image` with every face outlined. Confident detections get a
/// two pixel border.
pub fn draw_face_boxes(image: &DynamicImage, faces: &[FaceBox]) -> DynamicImage {
    let mut img = image.to_rgb8();

    for face in faces {
        if face.width() <= 0.0 || face.height() <= 0.0 {
            continue;
        }

        let x1 = face.x1.max(0.0) as i32;
        let y1 = face.y1.max(0.0) as i32;
        let x2 = face.x2.min(img.width() as f32) as i32;
        let y2 = face.y2.min(img.height() as f32) as i32;

        let rect_width = (x2 - x1).max(1) as u32;
        let rect_height = (y2 - y1).max(1) as u32;

        let color = if face.confidence > 0.7 { HIGH_CONFIDENCE } else { LOW_CONFIDENCE };
        draw_hollow_rect_mut(&mut img, Rect::at(x1, y1).of_size(rect_width, rect_height), color);

        if face.confidence > 0.7 && rect_width > 2 && rect_height > 2 {
            let inner = Rect::at(x1 + 1, y1 + 1).of_size(rect_width - 2, rect_height - 2);
            draw_hollow_rect_mut(&mut img, inner, color);
        }
    }

    DynamicImage::ImageRgb8(img)
}
