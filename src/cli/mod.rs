pub mod annotate;
pub mod ascii_preview;

pub use annotate::draw_face_boxes;
pub use ascii_preview::{AsciiRenderer, clear_screen};
