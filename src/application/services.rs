use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    application::{
        imaging::{decode_image, encode_jpeg, Annotator},
        inference::infer_image,
        ports::{
            CameraCatalogPort, CameraSourcePort, DetectorLoader, FrameSource, ModelCatalogPort, ModelEntry,
            SharedDetector, StreamEvent, StreamJob, StreamPort, VideoSourcePort,
        },
    },
    domain::{
        camera::{CameraId, CameraInfo, CameraMode},
        detection::DetectionResult,
        errors::{DomainError, DomainResult},
        model::{ConfidenceThreshold, ModelId},
        stream::{CancellationToken, SourceKind},
    },
};

const IMAGE_JPEG_QUALITY: u8 = 90;

/// Loads detectors and keeps them for the life of the process.
/// Entries are never evicted; the selectable model list bounds the map.
pub struct ModelService {
    loader: Arc<dyn DetectorLoader>,
    cache: Mutex<HashMap<PathBuf, SharedDetector>>,
}

impl ModelService {
    pub fn new(loader: Arc<dyn DetectorLoader>) -> Self {
        Self { loader, cache: Mutex::new(HashMap::new()) }
    }

    /// Returns the cached detector for `path`, loading it on first use.
    /// Failed loads are not cached. Blocking.
    pub fn load(&self, path: &Path) -> DomainResult<SharedDetector> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| DomainError::OperationFailed("model cache lock poisoned".into()))?;
        if let Some(detector) = cache.get(path) {
            return Ok(detector.clone());
        }

        info!("loading detector from {}", path.display());
        let detector: SharedDetector = Arc::new(Mutex::new(self.loader.load(path)?));
        cache.insert(path.to_path_buf(), detector.clone());
        Ok(detector)
    }

    pub fn cached_models(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}

/// Model selection and single-image inference for the interactive session.
pub struct SessionService {
    catalog: Arc<dyn ModelCatalogPort>,
    models: Arc<ModelService>,
    annotator: Annotator,
    active: RwLock<Option<(ModelId, SharedDetector)>>,
}

impl SessionService {
    pub fn new(catalog: Arc<dyn ModelCatalogPort>, models: Arc<ModelService>, annotator: Annotator) -> Self {
        Self { catalog, models, annotator, active: RwLock::new(None) }
    }

    pub async fn list_models(&self) -> DomainResult<Vec<ModelEntry>> {
        self.catalog.list_models().await
    }

    /// Makes `name` the active model. On failure the session keeps running
    /// with no model, so inference is withheld until a load succeeds.
    pub async fn select_model(&self, name: &str) -> DomainResult<ModelId> {
        let result = self.load_model(name).await;
        let mut active = self
            .active
            .write()
            .map_err(|_| DomainError::OperationFailed("session lock poisoned".into()))?;
        match result {
            Ok((id, detector)) => {
                info!("active model: {}", id.name);
                *active = Some((id.clone(), detector));
                Ok(id)
            }
            Err(e) => {
                warn!("model '{name}' unavailable: {e}");
                *active = None;
                Err(e)
            }
        }
    }

    async fn load_model(&self, name: &str) -> DomainResult<(ModelId, SharedDetector)> {
        let id = self.catalog.resolve(name).await?;
        self.catalog.validate_model(&id).await?;

        let models = self.models.clone();
        let path = id.onnx_path.clone();
        let detector = tokio::task::spawn_blocking(move || models.load(&path))
            .await
            .map_err(|e| DomainError::OperationFailed(format!("loader task failed: {e}")))??;
        Ok((id, detector))
    }

    pub fn active_model(&self) -> Option<ModelId> {
        self.active.read().ok()?.as_ref().map(|(id, _)| id.clone())
    }

    pub fn detector(&self) -> DomainResult<SharedDetector> {
        self.active
            .read()
            .map_err(|_| DomainError::OperationFailed("session lock poisoned".into()))?
            .as_ref()
            .map(|(_, d)| d.clone())
            .ok_or(DomainError::NoModelLoaded)
    }

    /// Decodes an uploaded image, runs it through the active model and encodes
    /// the annotated copy as JPEG, all off the async executor.
    pub async fn infer_image(
        &self,
        bytes: Vec<u8>,
        confidence: ConfidenceThreshold,
    ) -> DomainResult<(DetectionResult, Vec<u8>)> {
        let detector = self.detector()?;
        let annotator = self.annotator.clone();
        tokio::task::spawn_blocking(move || {
            let image = decode_image(&bytes)?;
            let result = infer_image(&detector, &annotator, &image, confidence)?;
            let jpeg = encode_jpeg(&result.annotated, IMAGE_JPEG_QUALITY)?;
            Ok((result, jpeg))
        })
        .await
        .map_err(|e| DomainError::OperationFailed(format!("inference task failed: {e}")))?
    }
}

/// Inventory of the physical capture devices.
#[derive(Clone)]
pub struct CameraService {
    catalog: Arc<dyn CameraCatalogPort>,
}

impl CameraService {
    pub fn new(catalog: Arc<dyn CameraCatalogPort>) -> Self {
        Self { catalog }
    }

    pub async fn list_cameras(&self) -> DomainResult<Vec<CameraInfo>> {
        self.catalog.list_cameras().await
    }
}

/// Starts and stops streams: opens the source, then hands it to the stream port.
#[derive(Clone)]
pub struct PipelineService {
    stream: Arc<dyn StreamPort>,
    session: Arc<SessionService>,
    videos: Arc<dyn VideoSourcePort>,
    cameras: Arc<dyn CameraSourcePort>,
    camera_mode: CameraMode,
}

impl PipelineService {
    pub fn new(
        stream: Arc<dyn StreamPort>,
        session: Arc<SessionService>,
        videos: Arc<dyn VideoSourcePort>,
        cameras: Arc<dyn CameraSourcePort>,
        camera_mode: CameraMode,
    ) -> Self {
        Self { stream, session, videos, cameras, camera_mode }
    }

    /// Streams an uploaded video through the active model.
    pub async fn start_video(&self, bytes: Vec<u8>, confidence: ConfidenceThreshold) -> DomainResult<()> {
        let detector = self.session.detector()?;
        if bytes.is_empty() {
            return Err(DomainError::InvalidInput("empty video upload".into()));
        }
        // The previous stream must release its source before a new one opens.
        self.stream.stop().await?;
        let videos = self.videos.clone();
        let source = tokio::task::spawn_blocking(move || videos.open_video_bytes(&bytes))
            .await
            .map_err(|e| DomainError::OperationFailed(format!("open task failed: {e}")))??;
        self.start(SourceKind::Video, source, detector, confidence).await
    }

    /// Streams a live camera until [`PipelineService::stop`] is called.
    pub async fn start_webcam(&self, camera: CameraId, confidence: ConfidenceThreshold) -> DomainResult<()> {
        let detector = self.session.detector()?;
        self.stream.stop().await?;
        let cameras = self.cameras.clone();
        let mode = self.camera_mode.clone();
        let source = tokio::task::spawn_blocking(move || cameras.open_camera(&camera, &mode))
            .await
            .map_err(|e| DomainError::OperationFailed(format!("open task failed: {e}")))??;
        self.start(SourceKind::Webcam, source, detector, confidence).await
    }

    async fn start(
        &self,
        kind: SourceKind,
        source: Box<dyn FrameSource>,
        detector: SharedDetector,
        confidence: ConfidenceThreshold,
    ) -> DomainResult<()> {
        self.stream
            .start(StreamJob { kind, source, detector, confidence, token: CancellationToken::new() })
            .await
    }

    /// Returns whether a running stream was stopped.
    pub async fn stop(&self) -> DomainResult<bool> {
        self.stream.stop().await
    }

    pub async fn subscribe(&self) -> DomainResult<broadcast::Receiver<StreamEvent>> {
        self.stream.subscribe().await
    }
}
