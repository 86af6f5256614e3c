//! Model management DTOs for the v1 API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScriptorError};
use crate::lifecycle::{InstalledModel, ModelState};
use crate::models::ModelType;

/// Snapshot of the neural model lifecycle.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ModelStatusResponse {
    pub loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_model_type: Option<String>,
    /// Human-readable progress line, e.g. `Downloading base-printed...`.
    pub status: String,
    /// `cpu` or `gpu`.
    pub device: String,
    /// Backend name, e.g. `CUDA`, `METAL` or `CPU`.
    pub device_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub loaded_at: Option<DateTime<Utc>>,
}

impl From<ModelState> for ModelStatusResponse {
    fn from(state: ModelState) -> Self {
        Self {
            loaded: state.loaded,
            current_model_type: state.current_model_type.map(|m| m.to_string()),
            status: state.status,
            device: state.device.to_string().to_lowercase(),
            device_label: state.device_label,
            loaded_at: state.loaded_at,
        }
    }
}

/// One model present in the local cache.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct InstalledModelResponse {
    pub model_type: String,
    pub repository_id: String,
    pub approx_size_bytes: u64,
    pub size_label: String,
    /// Cache directory holding the model files.
    pub path: String,
}

impl From<InstalledModel> for InstalledModelResponse {
    fn from(model: InstalledModel) -> Self {
        Self {
            model_type: model.descriptor.model_type,
            repository_id: model.descriptor.repository_id,
            approx_size_bytes: model.descriptor.approx_size_bytes,
            size_label: model.descriptor.size_label,
            path: model.path.display().to_string(),
        }
    }
}

fn parse_model_type(raw: &str) -> Result<ModelType> {
    raw.parse().map_err(ScriptorError::InvalidInput)
}

/// Request body for `POST /api/v1/models/download` and
/// `DELETE /api/v1/models/cache`.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct ModelRequest {
    /// Catalog key, e.g. `large-handwritten`.
    pub model_type: String,
}

impl ModelRequest {
    pub fn model_type(&self) -> Result<ModelType> {
        parse_model_type(&self.model_type)
    }
}

/// Request body for `POST /api/v1/models/force-reload`.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct ForceReloadRequest {
    pub model_type: String,
    /// Delete the cached files first so the model is downloaded again.
    #[serde(default)]
    pub refetch: bool,
}

impl ForceReloadRequest {
    pub fn model_type(&self) -> Result<ModelType> {
        parse_model_type(&self.model_type)
    }
}

/// Result of a model management action.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ModelActionResponse {
    pub message: String,
    pub model: ModelStatusResponse,
}
