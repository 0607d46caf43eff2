pub mod routes;
pub mod state;
pub mod ws;

use axum::{extract::DefaultBodyLimit, routing::{get, post}, Router};
use crate::adapters::http::state::HttpState;
use crate::adapters::http::ws::ws_handler;

pub fn router(state: HttpState, upload_limit: usize) -> Router {
    Router::new()
        .route("/api/config", get(routes::get_config))
        .route("/api/models", get(routes::list_models))
        .route("/api/model", post(routes::select_model))
        .route("/api/cameras", get(routes::list_cameras))
        .route("/api/infer/image", post(routes::infer_image))
        .route("/api/stream/video", post(routes::start_video))
        .route("/api/stream/webcam", post(routes::start_webcam))
        .route("/api/stream/stop", post(routes::stop_stream))
        .route("/ws/stream", get(ws_handler))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}
