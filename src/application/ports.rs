use async_trait::async_trait;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::domain::{
    camera::{CameraId, CameraInfo, CameraMode},
    detection::Detection,
    errors::DomainResult,
    model::{ConfidenceThreshold, ModelId},
    stream::{CancellationToken, FrameMeta, SourceKind},
};

/// A loaded detection model. Running a session mutates internal buffers,
/// hence `&mut self`.
pub trait Detector: Send {
    fn detect(&mut self, image: &RgbImage, confidence: ConfidenceThreshold) -> DomainResult<Vec<Detection>>;
}

pub type SharedDetector = Arc<Mutex<Box<dyn Detector>>>;

pub trait DetectorLoader: Send + Sync {
    fn load(&self, path: &Path) -> DomainResult<Box<dyn Detector>>;
}

/// Metadata a source may know about itself up front.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    pub fps: Option<f32>,
    pub frame_count: Option<u64>,
}

/// Lazy sequence of RGB frames. `None` covers both a clean end of stream and
/// a failed read; callers do not distinguish the two. Dropping the source
/// releases the underlying file or device.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Option<RgbImage>;

    fn info(&self) -> SourceInfo {
        SourceInfo::default()
    }
}

/// Display surface fed by the stream loop; each frame replaces the previous one.
pub trait FrameSink {
    fn show(&mut self, meta: &FrameMeta, annotated: &RgbImage);
}

/// Persists sampled frames.
pub trait FrameWriter {
    fn write(&mut self, file_name: &str, frame: &RgbImage) -> DomainResult<PathBuf>;
}

pub trait VideoSourcePort: Send + Sync {
    fn open_video(&self, path: &Path) -> DomainResult<Box<dyn FrameSource>>;
    /// Opens an uploaded video held in memory; the bytes are spooled for as long
    /// as the returned source lives.
    fn open_video_bytes(&self, bytes: &[u8]) -> DomainResult<Box<dyn FrameSource>>;
}

pub trait CameraSourcePort: Send + Sync {
    fn open_camera(&self, camera: &CameraId, mode: &CameraMode) -> DomainResult<Box<dyn FrameSource>>;
}

#[async_trait]
pub trait CameraCatalogPort: Send + Sync {
    async fn list_cameras(&self) -> DomainResult<Vec<CameraInfo>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    pub path: PathBuf,
    pub available: bool,
}

#[async_trait]
pub trait ModelCatalogPort: Send + Sync {
    async fn list_models(&self) -> DomainResult<Vec<ModelEntry>>;
    async fn resolve(&self, name: &str) -> DomainResult<ModelId>;
    async fn validate_model(&self, model: &ModelId) -> DomainResult<()>;
}

/// Everything a stream worker needs to run one session.
pub struct StreamJob {
    pub kind: SourceKind,
    pub source: Box<dyn FrameSource>,
    pub detector: SharedDetector,
    pub confidence: ConfidenceThreshold,
    pub token: CancellationToken,
}

#[derive(Debug, Clone)]
pub enum StreamEvent {
    Frame(FrameMeta, Vec<u8>),
    End {
        kind: SourceKind,
        frames: u64,
        cancelled: bool,
        error: Option<String>,
    },
}

#[async_trait]
pub trait StreamPort: Send + Sync {
    async fn start(&self, job: StreamJob) -> DomainResult<()>;
    async fn stop(&self) -> DomainResult<bool>;
    async fn subscribe(&self) -> DomainResult<broadcast::Receiver<StreamEvent>>;
}
