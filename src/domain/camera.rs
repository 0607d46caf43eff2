// src/domain/camera.rs
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CameraId { pub path: String }

impl CameraId {
    pub fn from_index(index: u32) -> Self {
        Self { path: format!("/dev/video{index}") }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraInfo {
    pub id: CameraId,
    pub name: String,
    pub card: String,
    pub driver: String,
    pub bus: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraMode {
    pub format: String,
    pub size: FrameSize,
    pub fps: u32,
}

impl Default for CameraMode {
    fn default() -> Self {
        Self {
            format: "MJPG".into(),
            size: FrameSize { width: 1280, height: 720 },
            fps: 30,
        }
    }
}
