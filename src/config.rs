use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use crate::application::imaging::Annotator;
use crate::domain::{
    camera::{CameraMode, FrameSize},
    model::YoloParams,
    sampling::DEFAULT_FRAME_INTERVAL,
};

/// Dashboard server settings. Every flag can also come from the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "yolo-studio", version, about = "YOLOv8 detection dashboard")]
pub struct ServerConfig {
    #[arg(long, env = "YOLO_STUDIO_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "YOLO_STUDIO_PORT", default_value_t = 8090)]
    pub port: u16,

    /// Directory holding the selectable ONNX weights.
    #[arg(long, env = "YOLO_WEIGHTS_DIR", default_value = "weights/detection")]
    pub weights_dir: PathBuf,

    /// Model loaded at startup, if any.
    #[arg(long, env = "YOLO_DEFAULT_MODEL")]
    pub default_model: Option<String>,

    #[arg(long, default_value = "static")]
    pub static_dir: PathBuf,

    #[arg(long, default_value_t = 640)]
    pub imgsz: u32,

    #[arg(long, default_value_t = 0.45)]
    pub iou: f32,

    #[arg(long, default_value_t = 100)]
    pub max_det: usize,

    /// TTF/OTF font used for box captions.
    #[arg(long, env = "YOLO_STUDIO_FONT")]
    pub font: Option<PathBuf>,

    #[arg(long, default_value = "MJPG")]
    pub camera_fourcc: String,

    #[arg(long, default_value_t = 1280)]
    pub camera_width: u32,

    #[arg(long, default_value_t = 720)]
    pub camera_height: u32,

    #[arg(long, default_value_t = 30)]
    pub camera_fps: u32,

    #[arg(long, default_value_t = 80)]
    pub jpeg_quality: u8,

    /// Largest accepted upload, in MiB.
    #[arg(long, default_value_t = 512)]
    pub upload_limit_mb: usize,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn yolo_params(&self) -> YoloParams {
        YoloParams {
            input_size: self.imgsz,
            iou_threshold: self.iou,
            max_detections: self.max_det,
        }
    }

    pub fn camera_mode(&self) -> CameraMode {
        CameraMode {
            format: self.camera_fourcc.clone(),
            size: FrameSize { width: self.camera_width, height: self.camera_height },
            fps: self.camera_fps,
        }
    }

    pub fn upload_limit_bytes(&self) -> usize {
        self.upload_limit_mb * 1024 * 1024
    }

    pub fn annotator(&self) -> Result<Annotator> {
        match &self.font {
            Some(path) => {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("reading font {}", path.display()))?;
                Ok(Annotator::from_font_bytes(bytes)?)
            }
            None => Ok(Annotator::default()),
        }
    }
}

/// Offline frame sampler settings.
#[derive(Debug, Clone, Parser)]
#[command(name = "frame-sampler", version, about = "Write every Nth video frame as a JPEG")]
pub struct SamplerConfig {
    #[arg(long, short, default_value = "data/raw/supermario.mp4")]
    pub input: PathBuf,

    #[arg(long, short, default_value = "data/processed")]
    pub output: PathBuf,

    /// Keep frames whose index is a multiple of this value; must be >= 1.
    #[arg(long, short = 'n', default_value_t = DEFAULT_FRAME_INTERVAL, allow_negative_numbers = true)]
    pub interval: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults() {
        let cfg = ServerConfig::try_parse_from(["yolo-studio"]).unwrap();
        assert_eq!(cfg.bind_addr(), "0.0.0.0:8090");
        assert_eq!(cfg.weights_dir, PathBuf::from("weights/detection"));
        assert_eq!(cfg.yolo_params().input_size, 640);
        assert_eq!(cfg.camera_mode().size, FrameSize { width: 1280, height: 720 });
    }

    #[test]
    fn sampler_defaults_match_dataset_layout() {
        let cfg = SamplerConfig::try_parse_from(["frame-sampler"]).unwrap();
        assert_eq!(cfg.input, PathBuf::from("data/raw/supermario.mp4"));
        assert_eq!(cfg.output, PathBuf::from("data/processed"));
        assert_eq!(cfg.interval, 20);
    }

    #[test]
    fn negative_interval_reaches_validation() {
        let cfg = SamplerConfig::try_parse_from(["frame-sampler", "--interval", "-5"]).unwrap();
        assert_eq!(cfg.interval, -5);
    }
}
