use serde::{Deserialize, Serialize};

use crate::application::ports::ModelEntry;
use crate::domain::{
    camera::CameraInfo,
    detection::BoxSummary,
    errors::DomainResult,
    model::{
        ConfidenceThreshold, TaskType, CONFIDENCE_DEFAULT_PERCENT, CONFIDENCE_MAX_PERCENT,
        CONFIDENCE_MIN_PERCENT, DETECTION_MODEL_LIST,
    },
    stream::{SourceKind, SOURCES_LIST},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliderConfig {
    pub min: u32,
    pub max: u32,
    pub default: u32,
    pub step: u32,
}

impl Default for SliderConfig {
    fn default() -> Self {
        Self {
            min: CONFIDENCE_MIN_PERCENT,
            max: CONFIDENCE_MAX_PERCENT,
            default: CONFIDENCE_DEFAULT_PERCENT,
            step: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub tasks: Vec<TaskType>,
    pub models: Vec<String>,
    pub sources: Vec<SourceKind>,
    pub confidence: SliderConfig,
    pub active_model: Option<String>,
}

impl ConfigResponse {
    pub fn new(active_model: Option<String>) -> Self {
        Self {
            tasks: vec![TaskType::Detection],
            models: DETECTION_MODEL_LIST.iter().map(|m| m.to_string()).collect(),
            sources: SOURCES_LIST.to_vec(),
            confidence: SliderConfig::default(),
            active_model,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectModelRequest {
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectModelResponse {
    pub model: String,
    pub path: String,
}

/// Query string shared by the inference endpoints; confidence is the slider percentage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InferenceQuery {
    pub confidence: Option<u32>,
    pub camera: Option<u32>,
}

impl InferenceQuery {
    pub fn threshold(&self) -> DomainResult<ConfidenceThreshold> {
        ConfidenceThreshold::from_percent(self.confidence.unwrap_or(CONFIDENCE_DEFAULT_PERCENT))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInferenceResponse {
    pub width: u32,
    pub height: u32,
    pub summary: String,
    pub boxes: Vec<BoxSummary>,
    /// Annotated image, JPEG, base64.
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CamerasResponse {
    pub cameras: Vec<CameraInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::DomainError;

    #[test]
    fn query_defaults_to_fifty_percent() {
        assert_eq!(InferenceQuery::default().threshold().unwrap().value(), 0.5);
    }

    #[test]
    fn query_outside_slider_is_config_error() {
        let q = InferenceQuery { confidence: Some(10), camera: None };
        assert!(matches!(q.threshold(), Err(DomainError::Config(_))));
    }

    #[test]
    fn config_lists_sources_in_ui_order() {
        let json = serde_json::to_value(ConfigResponse::new(None)).unwrap();
        assert_eq!(json["sources"], serde_json::json!(["Image", "Video", "Webcam"]));
        assert_eq!(json["tasks"], serde_json::json!(["Detection"]));
        assert_eq!(json["confidence"]["min"], 30);
    }
}
