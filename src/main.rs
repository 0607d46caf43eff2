use clap::Parser;
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

use yolo_studio::adapters::{
    http::{router, state::HttpState},
    onnx::{model_catalog::OnnxModelCatalog, pipeline::PipelineAdapter, yolo_engine::OnnxDetectorLoader},
    v4l2::{camera_repo::V4l2CameraCatalog, capture::V4l2Cameras},
    video::ffmpeg::FfmpegVideos,
};
use yolo_studio::application::services::{CameraService, ModelService, PipelineService, SessionService};
use yolo_studio::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logging and configuration
    yolo_studio::init_tracing();
    let cfg = ServerConfig::parse();

    tracing::info!("🔧 Initialising adapters...");

    // 2. Adapters (infrastructure)
    let annotator = cfg.annotator()?;
    let model_cat = Arc::new(OnnxModelCatalog::new(&cfg.weights_dir));
    let loader = Arc::new(OnnxDetectorLoader::new(cfg.yolo_params()));
    let camera_cat = Arc::new(V4l2CameraCatalog::new());
    let cameras = Arc::new(V4l2Cameras::new());
    let videos = Arc::new(FfmpegVideos::new());
    let pipeline_adapter = Arc::new(PipelineAdapter::new(annotator.clone(), cfg.jpeg_quality));

    // 3. Services (use cases)
    let models = Arc::new(ModelService::new(loader));
    let session = Arc::new(SessionService::new(model_cat, models, annotator));
    let pipeline = Arc::new(PipelineService::new(
        pipeline_adapter,
        session.clone(),
        videos,
        cameras,
        cfg.camera_mode(),
    ));
    let camera = Arc::new(CameraService::new(camera_cat));

    if let Some(name) = &cfg.default_model {
        // A failed load leaves the session running without a model.
        if let Err(e) = session.select_model(name).await {
            tracing::error!("could not load default model '{name}': {e}");
        }
    }

    // 4. Router and static files
    let state = HttpState { session, pipeline, camera };
    let app = router(state, cfg.upload_limit_bytes())
        .fallback_service(ServeDir::new(&cfg.static_dir))
        .layer(TraceLayer::new_for_http());

    // 5. Server
    let addr = cfg.bind_addr();
    tracing::info!("🚀 YOLO dashboard on http://{}", addr);
    tracing::info!("📂 Static files from '{}'", cfg.static_dir.display());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
