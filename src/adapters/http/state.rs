use std::sync::Arc;
use crate::application::services::{CameraService, PipelineService, SessionService};

/// Shared state for the axum handlers: the application services only.
#[derive(Clone)]
pub struct HttpState {
    /// Model selection and single-image inference.
    pub session: Arc<SessionService>,
    /// Video and webcam streams.
    pub pipeline: Arc<PipelineService>,
    /// V4L2 camera inventory.
    pub camera: Arc<CameraService>,
}
