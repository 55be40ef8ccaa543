use crate::common::{FaceAppError, Result};
use crate::common::config::CameraConfig;
use crate::camera::capture::FrameSource;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Rgb, RgbImage};
use std::fs;

/// Which device ended up being used, and whether it took probing to find it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraSelection {
    pub device_index: u32,
    pub probed: bool,
}

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub index: u32,
    pub name: String,
    pub formats: Vec<String>,
    pub video_capture: bool,
}

pub struct Camera {
    device: Device,
    index: u32,
    config: CameraConfig,
}

pub struct CameraStream<'a> {
    stream: Stream<'a>,
    format: v4l::Format,
    camera: &'a Camera,
}

impl Camera {
    /// Opens the configured device, or the first of `0..probe_limit` that
    /// delivers a frame when the configured one does not.
    pub fn open(config: &CameraConfig) -> Result<(Self, CameraSelection)> {
        match Self::open_verified(config.device_index, config) {
            Ok(camera) => {
                let selection = CameraSelection { device_index: config.device_index, probed: false };
                return Ok((camera, selection));
            }
            Err(e) => tracing::warn!("Configured camera {} unusable: {}", config.device_index, e),
        }

        for index in (0..config.probe_limit).filter(|i| *i != config.device_index) {
            match Self::open_verified(index, config) {
                Ok(camera) => {
                    tracing::info!("Using camera /dev/video{} found by probing", index);
                    return Ok((camera, CameraSelection { device_index: index, probed: true }));
                }
                Err(e) => tracing::debug!("Probe of /dev/video{} failed: {}", index, e),
            }
        }

        Err(FaceAppError::CameraUnavailable(format!(
            "No working camera (configured /dev/video{}, probed 0..{})",
            config.device_index, config.probe_limit
        )))
    }

    fn open_verified(index: u32, config: &CameraConfig) -> Result<Self> {
        let camera = Self::open_index(index, config)?;
        {
            let mut stream = camera.start_stream()?;
            stream.next_frame()?;
        }
        Ok(camera)
    }

    pub fn open_index(index: u32, config: &CameraConfig) -> Result<Self> {
        tracing::debug!("Opening camera device {}", index);

        let device = Device::new(index as usize)
            .map_err(|e| FaceAppError::CameraUnavailable(format!("Failed to open camera {}: {}", index, e)))?;

        let caps = device.query_caps()
            .map_err(|e| FaceAppError::CameraUnavailable(format!("Failed to query capabilities: {}", e)))?;
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(FaceAppError::CameraUnavailable(format!(
                "Device {} ({}) does not support video capture", index, caps.card
            )));
        }

        let mut fmt = device.format()
            .map_err(|e| FaceAppError::CameraUnavailable(format!("Failed to get format: {}", e)))?;
        fmt.width = config.width;
        fmt.height = config.height;
        fmt.fourcc = FourCC::new(b"MJPG");

        // Drivers may refuse the exact format; keep whatever they settle on
        if let Err(e) = device.set_format(&fmt) {
            tracing::warn!("Could not set {}x{} MJPG on camera {}: {}", config.width, config.height, index, e);
        }

        let actual = device.format()
            .map_err(|e| FaceAppError::CameraUnavailable(format!("Failed to get final format: {}", e)))?;
        tracing::debug!("Camera {} format: {}x{} {}",
            index, actual.width, actual.height, actual.fourcc.str().unwrap_or("????"));

        Ok(Self { device, index, config: config.clone() })
    }

    /// Starts streaming and discards the configured number of warmup frames.
    pub fn start_stream(&self) -> Result<CameraStream<'_>> {
        let format = self.device.format()
            .map_err(|e| FaceAppError::CameraUnavailable(format!("Failed to get format: {}", e)))?;

        let mut stream = Stream::with_buffers(&self.device, Type::VideoCapture, 4)
            .map_err(|e| FaceAppError::CameraUnavailable(format!("Failed to create stream: {}", e)))?;

        for i in 0..self.config.warmup_frames {
            stream.next()
                .map_err(|e| FaceAppError::CameraUnavailable(format!("Failed to capture warmup frame {}: {}", i, e)))?;
            std::thread::sleep(std::time::Duration::from_millis(self.config.warmup_delay_ms));
        }

        Ok(CameraStream { stream, format, camera: self })
    }

    pub fn list_devices() -> Result<Vec<DeviceInfo>> {
        let mut devices = Vec::new();

        for entry in fs::read_dir("/dev")? {
            let path = entry?.path();
            let Some(index) = path.file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix("video"))
                .and_then(|n| n.parse::<u32>().ok())
            else {
                continue;
            };

            let Ok(device) = Device::new(index as usize) else { continue };
            let Ok(caps) = device.query_caps() else { continue };

            let formats = device.enum_formats()
                .unwrap_or_default()
                .iter()
                .map(|fmt| fmt.fourcc.str().unwrap_or("????").to_string())
                .collect();

            devices.push(DeviceInfo {
                index,
                name: caps.card.clone(),
                formats,
                video_capture: caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE),
            });
        }

        devices.sort_by_key(|d| d.index);
        Ok(devices)
    }
}

impl FrameSource for CameraStream<'_> {
    fn next_frame(&mut self) -> Result<DynamicImage> {
        let (buf, meta) = self.stream.next()
            .map_err(|e| FaceAppError::CameraUnavailable(format!(
                "Failed to capture from camera {}: {}", self.camera.index, e
            )))?;

        let used = (meta.bytesused as usize).min(buf.len());
        let data = if used > 0 { &buf[..used] } else { buf };
        decode_frame(data, &self.format.fourcc.repr, self.format.width, self.format.height)
    }
}

/// Converts one raw frame into an image. MJPG, YUYV and GREY are supported.
pub fn decode_frame(data: &[u8], fourcc: &[u8; 4], width: u32, height: u32) -> Result<DynamicImage> {
    match fourcc {
        b"MJPG" | b"JPEG" => image::load_from_memory_with_format(data, ImageFormat::Jpeg)
            .map_err(|e| FaceAppError::CameraUnavailable(format!("Failed to decode MJPG frame: {}", e))),
        b"YUYV" => yuyv_to_rgb(data, width, height).map(DynamicImage::ImageRgb8),
        b"GREY" => ImageBuffer::<Luma<u8>, _>::from_raw(width, height, data.to_vec())
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(|| FaceAppError::CameraUnavailable("Short GREY frame".into())),
        other => Err(FaceAppError::CameraUnavailable(format!(
            "Unsupported pixel format {}", String::from_utf8_lossy(other)
        ))),
    }
}

fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Result<RgbImage> {
    let expected = (width * height * 2) as usize;
    if data.len() < expected {
        return Err(FaceAppError::CameraUnavailable(format!(
            "Short YUYV frame: {} bytes, expected {}", data.len(), expected
        )));
    }

    let mut image = RgbImage::new(width, height);
    for (i, chunk) in data[..expected].chunks_exact(4).enumerate() {
        let (y0, u, y1, v) = (chunk[0] as f32, chunk[1] as f32 - 128.0, chunk[2] as f32, chunk[3] as f32 - 128.0);
        let pixel = (i * 2) as u32;
        for (offset, y) in [(0, y0), (1, y1)] {
            let index = pixel + offset;
            image.put_pixel(index % width, index / width, Rgb([
                (y + 1.402 * v).clamp(0.0, 255.0) as u8,
                (y - 0.344_136 * u - 0.714_136 * v).clamp(0.0, 255.0) as u8,
                (y + 1.772 * u).clamp(0.0, 255.0) as u8,
            ]));
        }
    }
    Ok(image)
}
