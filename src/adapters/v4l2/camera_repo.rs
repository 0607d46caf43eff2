use async_trait::async_trait;
use v4l::Device;
use crate::application::ports::CameraCatalogPort;
use crate::domain::camera::*;
use crate::domain::errors::{DomainError, DomainResult};

pub struct V4l2CameraCatalog;
impl V4l2CameraCatalog { pub fn new() -> Self { Self } }

#[async_trait]
impl CameraCatalogPort for V4l2CameraCatalog {
    async fn list_cameras(&self) -> DomainResult<Vec<CameraInfo>> {
        tokio::task::spawn_blocking(enumerate_cameras)
            .await
            .map_err(|e| DomainError::OperationFailed(e.to_string()))
    }
}

fn enumerate_cameras() -> Vec<CameraInfo> {
    let mut out = Vec::new();
    for node in v4l::context::enum_devices() {
        let path = node.path().to_string_lossy().to_string();
        if let Ok(dev) = Device::with_path(&path) {
            if let Ok(caps) = dev.query_caps() {
                out.push(CameraInfo {
                    id: CameraId { path },
                    name: node.name().unwrap_or_else(|| "Unknown".to_string()),
                    driver: caps.driver,
                    card: caps.card,
                    bus: caps.bus,
                });
            }
        }
    }
    out.sort_by(|a, b| a.id.path.cmp(&b.id.path));
    out
}
