use async_trait::async_trait;
use std::path::PathBuf;

use crate::application::ports::{ModelCatalogPort, ModelEntry};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::model::{ModelId, DETECTION_MODEL_LIST};

/// Allow-listed ONNX weights under a fixed directory.
pub struct OnnxModelCatalog {
    weights_dir: PathBuf,
}

impl OnnxModelCatalog {
    pub fn new(weights_dir: impl Into<PathBuf>) -> Self {
        Self { weights_dir: weights_dir.into() }
    }
}

#[async_trait]
impl ModelCatalogPort for OnnxModelCatalog {
    async fn list_models(&self) -> DomainResult<Vec<ModelEntry>> {
        let mut out = Vec::with_capacity(DETECTION_MODEL_LIST.len());
        for name in DETECTION_MODEL_LIST {
            let path = self.weights_dir.join(name);
            let available = tokio::fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false);
            out.push(ModelEntry { name: name.to_string(), path, available });
        }
        Ok(out)
    }

    async fn resolve(&self, name: &str) -> DomainResult<ModelId> {
        ModelId::resolve(&self.weights_dir, name.trim())
    }

    async fn validate_model(&self, model: &ModelId) -> DomainResult<()> {
        match tokio::fs::metadata(&model.onnx_path).await {
            Ok(m) if m.is_file() => Ok(()),
            Ok(_) => Err(DomainError::Load(format!("{} is not a file", model.onnx_path.display()))),
            Err(_) => Err(DomainError::NotFound(format!(
                "model file not found: {}",
                model.onnx_path.display()
            ))),
        }
    }
}
