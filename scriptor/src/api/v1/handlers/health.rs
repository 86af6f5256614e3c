use axum::extract::State;
use serde::Serialize;

use crate::api::state::AppState;
use crate::api::v1::response::ApiResponse;

/// Health data returned inside the v1 envelope.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub tesseract: TesseractHealth,
    pub trocr: TrocrHealth,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct TesseractHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct TrocrHealth {
    /// `ready` when a model is resident, `idle` otherwise.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub device: String,
}

/// `GET /api/v1/health`
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "health",
    responses(
        (status = 200, description = "Service health status", body = HealthData),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> ApiResponse<HealthData> {
    let engines = state.extraction.status();

    let tesseract = TesseractHealth {
        status: if engines.tesseract_ready {
            "ok".to_string()
        } else {
            "unavailable".to_string()
        },
        error: engines.tesseract_error,
    };

    let trocr = TrocrHealth {
        status: if engines.trocr_ready {
            "ready".to_string()
        } else {
            "idle".to_string()
        },
        model: engines.model.current_model_type.map(|m| m.to_string()),
        device: engines.model.device_label,
    };

    ApiResponse::success(HealthData {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        tesseract,
        trocr,
    })
}
