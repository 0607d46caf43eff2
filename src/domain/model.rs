use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::errors::{DomainError, DomainResult};

/// Model files the dashboard offers. Selection is restricted to this list;
/// the weights directory is never scanned.
pub const DETECTION_MODEL_LIST: [&str; 6] = [
    "yolov8n.onnx",
    "yolov8s.onnx",
    "yolov8m.onnx",
    "yolov8l.onnx",
    "yolov8x.onnx",
    "mario.onnx",
];

pub const CONFIDENCE_MIN_PERCENT: u32 = 30;
pub const CONFIDENCE_MAX_PERCENT: u32 = 100;
pub const CONFIDENCE_DEFAULT_PERCENT: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskType {
    Detection,
}

/// A model picked from the allow-list, already resolved against the weights directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelId {
    pub name: String,      // e.g. "yolov8n.onnx"
    pub onnx_path: PathBuf,
}

impl ModelId {
    pub fn resolve(weights_dir: &Path, name: &str) -> DomainResult<Self> {
        if !DETECTION_MODEL_LIST.contains(&name) {
            return Err(DomainError::InvalidInput(format!(
                "model '{name}' is not in the selectable list"
            )));
        }
        Ok(Self {
            name: name.to_string(),
            onnx_path: weights_dir.join(name),
        })
    }
}

/// Minimum score a candidate box needs, in 0..=1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceThreshold(f32);

impl ConfidenceThreshold {
    /// Builds the threshold from the slider percentage (30..=100).
    pub fn from_percent(percent: u32) -> DomainResult<Self> {
        if !(CONFIDENCE_MIN_PERCENT..=CONFIDENCE_MAX_PERCENT).contains(&percent) {
            return Err(DomainError::Config(format!(
                "confidence {percent}% outside {CONFIDENCE_MIN_PERCENT}..={CONFIDENCE_MAX_PERCENT}"
            )));
        }
        Ok(Self(percent as f32 / 100.0))
    }

    pub fn value(self) -> f32 {
        self.0
    }
}

impl Default for ConfidenceThreshold {
    fn default() -> Self {
        Self(CONFIDENCE_DEFAULT_PERCENT as f32 / 100.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YoloParams {
    pub input_size: u32,        // 640 typical
    pub iou_threshold: f32,     // 0..1
    pub max_detections: usize,  // e.g. 300
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            input_size: 640,
            iou_threshold: 0.45,
            max_detections: 100,
        }
    }
}
