//! v1 model management handlers.

use axum::extract::State;

use crate::api::extractors::AppJson;
use crate::api::state::AppState;
use crate::api::v1::dto::{
    ForceReloadRequest, InstalledModelResponse, ModelActionResponse, ModelRequest,
};
use crate::api::v1::response::{ApiError, ApiResponse, ResponseMeta};
use crate::models::ModelDescriptor;

/// `GET /api/v1/models/available`
#[utoipa::path(
    get,
    path = "/api/v1/models/available",
    tag = "models",
    responses(
        (status = 200, description = "Every installable model", body = Vec<ModelDescriptor>),
    )
)]
pub async fn list_available(State(state): State<AppState>) -> ApiResponse<Vec<ModelDescriptor>> {
    let models = state.models.available_models();
    let total = models.len() as u64;
    ApiResponse::success_with_meta(models, ResponseMeta { total: Some(total) })
}

/// `GET /api/v1/models/installed`
#[utoipa::path(
    get,
    path = "/api/v1/models/installed",
    tag = "models",
    responses(
        (status = 200, description = "Models with a complete local cache", body = Vec<InstalledModelResponse>),
    )
)]
pub async fn list_installed(
    State(state): State<AppState>,
) -> ApiResponse<Vec<InstalledModelResponse>> {
    let models: Vec<InstalledModelResponse> = state
        .models
        .installed_models()
        .into_iter()
        .map(Into::into)
        .collect();
    let total = models.len() as u64;
    ApiResponse::success_with_meta(models, ResponseMeta { total: Some(total) })
}

/// `POST /api/v1/models/download`
///
/// Makes `model_type` the resident model, downloading it first when the
/// cache is missing. Blocks until the model is ready.
#[utoipa::path(
    post,
    path = "/api/v1/models/download",
    tag = "models",
    request_body = ModelRequest,
    responses(
        (status = 200, description = "Model downloaded and loaded", body = ModelActionResponse),
        (status = 400, description = "Unknown model type", body = ApiError),
        (status = 401, description = "Missing or invalid API key", body = ApiError),
        (status = 500, description = "Download or load failed", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn download_model(
    State(state): State<AppState>,
    AppJson(req): AppJson<ModelRequest>,
) -> ApiResponse<ModelActionResponse> {
    let model_type = match req.model_type() {
        Ok(model_type) => model_type,
        Err(e) => return e.into(),
    };

    match state.models.ensure_loaded(model_type).await {
        Ok(_) => ApiResponse::success(ModelActionResponse {
            message: format!("Model {model_type} is ready"),
            model: state.models.status().into(),
        }),
        Err(e) => e.into(),
    }
}

/// `POST /api/v1/models/force-reload`
///
/// Drops the resident model and loads `model_type` again. With `refetch`
/// the cached files are deleted and downloaded anew.
#[utoipa::path(
    post,
    path = "/api/v1/models/force-reload",
    tag = "models",
    request_body = ForceReloadRequest,
    responses(
        (status = 200, description = "Model reloaded", body = ModelActionResponse),
        (status = 400, description = "Unknown model type", body = ApiError),
        (status = 401, description = "Missing or invalid API key", body = ApiError),
        (status = 500, description = "Download or load failed", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn force_reload(
    State(state): State<AppState>,
    AppJson(req): AppJson<ForceReloadRequest>,
) -> ApiResponse<ModelActionResponse> {
    let model_type = match req.model_type() {
        Ok(model_type) => model_type,
        Err(e) => return e.into(),
    };

    match state.models.force_reload(model_type, req.refetch).await {
        Ok(_) => ApiResponse::success(ModelActionResponse {
            message: format!("Model {model_type} reloaded"),
            model: state.models.status().into(),
        }),
        Err(e) => e.into(),
    }
}

/// `DELETE /api/v1/models/cache`
///
/// Deletes the cached files of `model_type`. Clearing a model that was never
/// downloaded succeeds with `No cache to clear`.
#[utoipa::path(
    delete,
    path = "/api/v1/models/cache",
    tag = "models",
    request_body = ModelRequest,
    responses(
        (status = 200, description = "Cache cleared or already absent", body = ModelActionResponse),
        (status = 400, description = "Unknown model type", body = ApiError),
        (status = 401, description = "Missing or invalid API key", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn clear_cache(
    State(state): State<AppState>,
    AppJson(req): AppJson<ModelRequest>,
) -> ApiResponse<ModelActionResponse> {
    let model_type = match req.model_type() {
        Ok(model_type) => model_type,
        Err(e) => return e.into(),
    };

    match state.models.clear_cache(model_type).await {
        Ok(outcome) => ApiResponse::success(ModelActionResponse {
            message: outcome.message().to_string(),
            model: state.models.status().into(),
        }),
        Err(e) => e.into(),
    }
}
