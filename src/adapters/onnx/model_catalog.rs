use async_trait::async_trait;
use std::path::Path;

use crate::application::ports::ModelCatalogPort;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::model::ModelId;

/// Checks that a model file is usable before the camera is opened.
pub struct OnnxModelCatalog;

impl OnnxModelCatalog {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OnnxModelCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelCatalogPort for OnnxModelCatalog {
    async fn validate_model(&self, model: &ModelId) -> DomainResult<()> {
        if model.onnx_path.trim().is_empty() {
            return Err(DomainError::ModelLoad("onnx_path is empty".into()));
        }
        let path = Path::new(&model.onnx_path);
        if path.extension().and_then(|e| e.to_str()) != Some("onnx") {
            return Err(DomainError::ModelLoad(format!("{} is not an .onnx file", model.onnx_path)));
        }
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
            Ok(_) => Err(DomainError::ModelLoad(format!("{} is empty or not a file", model.onnx_path))),
            Err(_) => Err(DomainError::ModelLoad(format!("model file not found: {}", model.onnx_path))),
        }
    }
}
