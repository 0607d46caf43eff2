use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use base64::{prelude::BASE64_STANDARD, Engine};
use tracing::{info, warn};

use crate::adapters::http::state::HttpState;
use crate::application::dto::{
    CamerasResponse, ConfigResponse, ErrorResponse, ImageInferenceResponse, InferenceQuery,
    ModelsResponse, OkResponse, SelectModelRequest, SelectModelResponse,
};
use crate::domain::{camera::CameraId, errors::DomainError, stream::summarize_detections};

/// Converts domain errors into JSON responses, one status per error kind.
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            DomainError::InvalidInput(_) | DomainError::Config(_) => StatusCode::BAD_REQUEST,
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::NoModelLoaded => StatusCode::CONFLICT,
            DomainError::Load(_) | DomainError::SourceOpen(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DomainError::OperationFailed(_) | DomainError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("request failed: {}", self.0);
        }
        let body = ErrorResponse { error: self.0.to_string(), kind: self.0.kind().to_string() };
        (status, Json(body)).into_response()
    }
}

pub async fn get_config(State(st): State<HttpState>) -> impl IntoResponse {
    Json(ConfigResponse::new(st.session.active_model().map(|m| m.name)))
}

pub async fn list_models(State(st): State<HttpState>) -> Result<Json<ModelsResponse>, ApiError> {
    let models = st.session.list_models().await?;
    Ok(Json(ModelsResponse { models }))
}

pub async fn select_model(
    State(st): State<HttpState>,
    Json(req): Json<SelectModelRequest>,
) -> Result<Json<SelectModelResponse>, ApiError> {
    let id = st.session.select_model(&req.model).await?;
    Ok(Json(SelectModelResponse { model: id.name, path: id.onnx_path.to_string_lossy().to_string() }))
}

pub async fn list_cameras(State(st): State<HttpState>) -> Result<Json<CamerasResponse>, ApiError> {
    let cameras = st.camera.list_cameras().await?;
    Ok(Json(CamerasResponse { cameras }))
}

pub async fn infer_image(
    State(st): State<HttpState>,
    Query(query): Query<InferenceQuery>,
    body: Bytes,
) -> Result<Json<ImageInferenceResponse>, ApiError> {
    let confidence = query.threshold()?;
    if body.is_empty() {
        return Err(DomainError::InvalidInput("no image uploaded".into()).into());
    }

    let (result, jpeg) = st.session.infer_image(body.to_vec(), confidence).await?;
    info!("image inference: {} boxes", result.detections.len());

    Ok(Json(ImageInferenceResponse {
        width: result.annotated.width(),
        height: result.annotated.height(),
        summary: summarize_detections(&result.detections),
        boxes: result.summaries(),
        image: BASE64_STANDARD.encode(jpeg),
    }))
}

pub async fn start_video(
    State(st): State<HttpState>,
    Query(query): Query<InferenceQuery>,
    body: Bytes,
) -> Result<Json<OkResponse>, ApiError> {
    let confidence = query.threshold()?;
    st.pipeline.start_video(body.to_vec(), confidence).await?;
    Ok(Json(OkResponse { ok: true }))
}

pub async fn start_webcam(
    State(st): State<HttpState>,
    Query(query): Query<InferenceQuery>,
) -> Result<Json<OkResponse>, ApiError> {
    let confidence = query.threshold()?;
    let camera = CameraId::from_index(query.camera.unwrap_or(0));
    st.pipeline.start_webcam(camera, confidence).await?;
    Ok(Json(OkResponse { ok: true }))
}

pub async fn stop_stream(State(st): State<HttpState>) -> Result<Json<OkResponse>, ApiError> {
    let stopped = st.pipeline.stop().await?;
    Ok(Json(OkResponse { ok: stopped }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_error_kind_has_its_own_status() {
        let status = |e: DomainError| ApiError(e).status();
        assert_eq!(status(DomainError::Config("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(DomainError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(DomainError::NoModelLoaded), StatusCode::CONFLICT);
        assert_eq!(status(DomainError::Load("x".into())), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status(DomainError::OperationFailed("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
