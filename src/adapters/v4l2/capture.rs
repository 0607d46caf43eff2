use anyhow::{anyhow, Result};
use image::{ImageFormat, RgbImage};
use tracing::{debug, info};
use v4l::format::FourCC;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::Device;

use crate::application::ports::{CameraSourcePort, FrameSource, SourceInfo};
use crate::domain::camera::{CameraId, CameraMode};
use crate::domain::errors::{DomainError, DomainResult};

/// Device and mode requested for a capture.
pub struct CaptureConfig {
    pub camera_path: String,
    pub fourcc: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl CaptureConfig {
    pub fn new(camera: &CameraId, mode: &CameraMode) -> Self {
        Self {
            camera_path: camera.path.clone(),
            fourcc: mode.format.clone(),
            width: mode.size.width,
            height: mode.size.height,
            fps: mode.fps,
        }
    }
}

/// Memory-mapped V4L2 capture yielding RGB frames.
/// Dropping it stops streaming and closes the device.
pub struct V4l2Capture {
    stream: Stream<'static>,
    fourcc: FourCC,
    width: u32,
    height: u32,
    fps: u32,
    camera_path: String,
}

impl V4l2Capture {
    /// Opens the device, negotiates the format and frame rate, and starts an MMAP stream.
    pub fn open(cfg: &CaptureConfig) -> Result<Self> {
        let dev = Device::with_path(&cfg.camera_path)?;

        let mut fmt = dev.format()?;
        let b = cfg.fourcc.as_bytes();
        if b.len() != 4 {
            return Err(anyhow!("FourCC must be 4 characters, got '{}'", cfg.fourcc));
        }
        fmt.fourcc = FourCC::new(&[b[0], b[1], b[2], b[3]]);
        fmt.width = cfg.width;
        fmt.height = cfg.height;

        // The driver may snap to the closest supported mode.
        let actual_fmt = dev.set_format(&fmt)?;

        let mut params = dev.params()?;
        params.interval.numerator = 1;
        params.interval.denominator = cfg.fps;
        let _ = dev.set_params(&params);

        // The stream keeps its own handle on the device.
        let stream = Stream::with_buffers(&dev, v4l::buffer::Type::VideoCapture, 4)?;

        info!(
            "camera {} open: {}x{} [{}] at {} fps",
            cfg.camera_path, actual_fmt.width, actual_fmt.height, actual_fmt.fourcc, cfg.fps
        );

        Ok(Self {
            stream,
            fourcc: actual_fmt.fourcc,
            width: actual_fmt.width,
            height: actual_fmt.height,
            fps: cfg.fps,
            camera_path: cfg.camera_path.clone(),
        })
    }

    /// Dequeues the next buffer and converts it to RGB.
    pub fn next_rgb(&mut self) -> Result<RgbImage> {
        let (data, _) = self.stream.next()?;
        let fcc_str = self.fourcc.str().map_err(|_| anyhow!("invalid FourCC"))?;

        match fcc_str {
            "MJPG" => {
                let img = image::load_from_memory_with_format(data, ImageFormat::Jpeg)?;
                Ok(img.to_rgb8())
            }
            "YUYV" => Ok(yuyv_to_rgb(data, self.width, self.height)),
            _ => Err(anyhow!("camera format {} not supported", fcc_str)),
        }
    }
}

impl FrameSource for V4l2Capture {
    fn next_frame(&mut self) -> Option<RgbImage> {
        match self.next_rgb() {
            Ok(frame) => Some(frame),
            Err(e) => {
                debug!("camera {} read failed: {e}", self.camera_path);
                None
            }
        }
    }

    fn info(&self) -> SourceInfo {
        SourceInfo {
            width: self.width,
            height: self.height,
            fps: Some(self.fps as f32),
            frame_count: None,
        }
    }
}

/// Opens V4L2 devices for the webcam stream.
#[derive(Debug, Default)]
pub struct V4l2Cameras;

impl V4l2Cameras {
    pub fn new() -> Self { Self }
}

impl CameraSourcePort for V4l2Cameras {
    fn open_camera(&self, camera: &CameraId, mode: &CameraMode) -> DomainResult<Box<dyn FrameSource>> {
        let capture = V4l2Capture::open(&CaptureConfig::new(camera, mode))
            .map_err(|e| DomainError::SourceOpen(format!("{}: {e:#}", camera.path)))?;
        Ok(Box::new(capture))
    }
}

/// Converts a packed YUYV (4:2:2) buffer to RGB.
fn yuyv_to_rgb(yuyv: &[u8], w: u32, h: u32) -> RgbImage {
    let mut out = RgbImage::new(w, h);

    // Each 4-byte macropixel holds two pixels: [Y0, U, Y1, V]
    for (i, chunk) in yuyv.chunks_exact(4).enumerate() {
        let y0 = chunk[0] as f32;
        let u  = chunk[1] as f32 - 128.0;
        let y1 = chunk[2] as f32;
        let v  = chunk[3] as f32 - 128.0;

        // BT.601
        let to_rgb = |y: f32| {
            image::Rgb([
                (y + 1.402 * v).clamp(0.0, 255.0) as u8,
                (y - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8,
                (y + 1.772 * u).clamp(0.0, 255.0) as u8,
            ])
        };

        let pixel_idx = i as u32 * 2;
        let x = pixel_idx % w;
        let y = pixel_idx / w;

        if y < h {
            out.put_pixel(x, y, to_rgb(y0));
            if x + 1 < w {
                out.put_pixel(x + 1, y, to_rgb(y1));
            }
        }
    }
    out
}
