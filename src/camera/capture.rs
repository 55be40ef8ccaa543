use crate::camera::v4l2::{Camera, CameraSelection};
use crate::cli::annotate::draw_face_boxes;
use crate::cli::ascii_preview::{clear_screen, AsciiRenderer};
use crate::common::{Config, FaceAppError, Result};
use crate::core::detector::{FaceBox, FaceLocator};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal;
use image::DynamicImage;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

const CAPTURE_HINT: &str = "SPACE capture | ESC cancel";

pub trait FrameSource {
    fn next_frame(&mut self) -> Result<DynamicImage>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Capture,
    Cancel,
}

/// User triggers, polled once per frame without blocking.
pub trait KeySource {
    fn poll_action(&mut self) -> Result<Option<KeyAction>>;
}

/// Supplies one frame with a face in it, or fails. Cancellation is an error
/// (`CaptureCancelled`) so callers abandon the operation the same way they
/// do for a missing camera.
pub trait FaceCapture {
    fn capture(&mut self) -> Result<DynamicImage>;
}

#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub image: DynamicImage,
    pub faces: Vec<FaceBox>,
}

/// Reads keys from the terminal in raw mode; raw mode ends on drop.
pub struct TerminalKeys;

impl TerminalKeys {
    pub fn new() -> Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for TerminalKeys {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            tracing::warn!("Failed to leave raw mode: {}", e);
        }
    }
}

impl KeySource for TerminalKeys {
    fn poll_action(&mut self) -> Result<Option<KeyAction>> {
        if !event::poll(Duration::from_millis(1))? {
            return Ok(None);
        }
        if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
            if kind == KeyEventKind::Release {
                return Ok(None);
            }
            return Ok(match code {
                KeyCode::Char(' ') => Some(KeyAction::Capture),
                KeyCode::Esc | KeyCode::Char('q') => Some(KeyAction::Cancel),
                _ => None,
            });
        }
        Ok(None)
    }
}

/// Shows frames until the user captures one with a visible face or cancels.
pub struct CaptureLoop<'a, L: FaceLocator + ?Sized> {
    locator: &'a L,
    mirror: bool,
    preview: Option<AsciiRenderer>,
}

impl<'a, L: FaceLocator + ?Sized> CaptureLoop<'a, L> {
    pub fn new(locator: &'a L, mirror: bool) -> Self {
        Self { locator, mirror, preview: None }
    }

    pub fn with_preview(mut self, renderer: AsciiRenderer) -> Self {
        self.preview = Some(renderer);
        self
    }

    pub fn run(&self, frames: &mut dyn FrameSource, keys: &mut dyn KeySource) -> Result<CapturedFrame> {
        loop {
            let frame = frames.next_frame()?;
            let frame = if self.mirror { frame.fliph() } else { frame };

            let faces = match self.locator.locate(&frame) {
                Ok(faces) => faces,
                Err(e) => {
                    tracing::warn!("Face detection failed: {}", e);
                    Vec::new()
                }
            };

            if let Some(renderer) = &self.preview {
                show_preview(renderer, &frame, &faces);
            }

            match keys.poll_action()? {
                Some(KeyAction::Cancel) => {
                    tracing::info!("Capture cancelled by user");
                    return Err(FaceAppError::CaptureCancelled);
                }
                Some(KeyAction::Capture) if !faces.is_empty() => {
                    tracing::info!("Captured frame with {} face(s)", faces.len());
                    return Ok(CapturedFrame { image: frame, faces });
                }
                Some(KeyAction::Capture) => tracing::debug!("Capture ignored: no face in view"),
                None => {}
            }
        }
    }
}

fn show_preview(renderer: &AsciiRenderer, frame: &DynamicImage, faces: &[FaceBox]) {
    let status = if faces.is_empty() { "No face detected" } else { "Face detected" };
    let ascii = renderer.render_frame(frame, faces, &format!("{} | {}", status, CAPTURE_HINT));
    if clear_screen().is_ok() {
        print!("{}\r\n", ascii);
        io::stdout().flush().ok();
    }
}

/// Interactive capture from the configured (or probed) camera.
pub struct CameraCapture<'a, L: FaceLocator + ?Sized> {
    config: &'a Config,
    locator: &'a L,
    save_to: Option<PathBuf>,
    selection: Option<CameraSelection>,
}

impl<'a, L: FaceLocator + ?Sized> CameraCapture<'a, L> {
    pub fn new(config: &'a Config, locator: &'a L) -> Self {
        Self { config, locator, save_to: None, selection: None }
    }

    /// Also writes the captured frame, faces outlined, to `path`.
    pub fn save_to(mut self, path: PathBuf) -> Self {
        self.save_to = Some(path);
        self
    }

    /// The device the last capture used; `None` before the first capture.
    pub fn selection(&self) -> Option<CameraSelection> {
        self.selection
    }
}

impl<L: FaceLocator + ?Sized> FaceCapture for CameraCapture<'_, L> {
    fn capture(&mut self) -> Result<DynamicImage> {
        let (camera, selection) = Camera::open(&self.config.camera)?;
        self.selection = Some(selection);
        let mut stream = camera.start_stream()?;

        let mut capture_loop = CaptureLoop::new(self.locator, self.config.camera.mirror);
        if self.config.preview.enabled {
            capture_loop = capture_loop.with_preview(AsciiRenderer::new(
                self.config.preview.width,
                self.config.preview.height,
            ));
        }

        let captured = {
            let mut keys = TerminalKeys::new()?;
            capture_loop.run(&mut stream, &mut keys)?
        };

        if let Some(path) = &self.save_to {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            draw_face_boxes(&captured.image, &captured.faces).save(path)?;
            tracing::info!("Saved capture to {}", path.display());
        }

        Ok(captured.image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::collections::VecDeque;

    /// Frames tagged by width; a face is "found" in frames wider than 4px.
    struct WidthLocator;

    impl FaceLocator for WidthLocator {
        fn locate(&self, image: &DynamicImage) -> Result<Vec<FaceBox>> {
            if image.width() > 4 {
                Ok(vec![FaceBox { x1: 0.0, y1: 0.0, x2: 4.0, y2: 4.0, confidence: 0.9 }])
            } else {
                Ok(Vec::new())
            }
        }
    }

    struct ScriptedFrames(VecDeque<u32>);

    impl FrameSource for ScriptedFrames {
        fn next_frame(&mut self) -> Result<DynamicImage> {
            let width = self.0.pop_front()
                .ok_or_else(|| FaceAppError::CameraUnavailable("stream ended".into()))?;
            Ok(DynamicImage::ImageRgb8(RgbImage::new(width, 4)))
        }
    }

    struct ScriptedKeys(VecDeque<Option<KeyAction>>);

    impl KeySource for ScriptedKeys {
        fn poll_action(&mut self) -> Result<Option<KeyAction>> {
            Ok(self.0.pop_front().flatten())
        }
    }

    fn frames(widths: &[u32]) -> ScriptedFrames {
        ScriptedFrames(widths.iter().copied().collect())
    }

    fn keys(actions: &[Option<KeyAction>]) -> ScriptedKeys {
        ScriptedKeys(actions.iter().copied().collect())
    }

    #[test]
    fn capture_waits_for_a_visible_face() {
        let capture_loop = CaptureLoop::new(&WidthLocator, false);
        let mut frames = frames(&[2, 3, 8]);
        let mut keys = keys(&[Some(KeyAction::Capture), None, Some(KeyAction::Capture)]);

        let captured = capture_loop.run(&mut frames, &mut keys).unwrap();
        assert_eq!(captured.image.width(), 8);
        assert_eq!(captured.faces.len(), 1);
    }

    #[test]
    fn cancel_abandons_capture() {
        let capture_loop = CaptureLoop::new(&WidthLocator, true);
        let mut frames = frames(&[8, 8]);
        let mut keys = keys(&[None, Some(KeyAction::Cancel)]);

        let err = capture_loop.run(&mut frames, &mut keys).unwrap_err();
        assert!(matches!(err, FaceAppError::CaptureCancelled));
    }

    #[test]
    fn camera_failure_ends_the_loop() {
        let capture_loop = CaptureLoop::new(&WidthLocator, false);
        let mut frames = frames(&[8]);
        let mut keys = keys(&[None]);

        let err = capture_loop.run(&mut frames, &mut keys).unwrap_err();
        assert!(matches!(err, FaceAppError::CameraUnavailable(_)));
    }

    #[test]
    fn no_selection_before_first_capture() {
        let config = Config::default();
        let capture = CameraCapture::new(&config, &WidthLocator);
        assert_eq!(capture.selection(), None);
    }
}
