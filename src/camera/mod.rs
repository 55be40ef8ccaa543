pub mod capture;
pub mod v4l2;

pub use capture::{CameraCapture, CaptureLoop, FaceCapture, FrameSource, KeyAction, KeySource, TerminalKeys};
pub use v4l2::{Camera, CameraSelection, DeviceInfo};
