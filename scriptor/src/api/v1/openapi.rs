use axum::Json;
use utoipa::OpenApi;
use utoipa_redoc::{Redoc, Servable};

use crate::models;

use super::dto;
use super::handlers;
use super::response;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Scriptor API",
        version = "1.0.0",
        description = "Dual-engine OCR service. Tesseract for printed text, TrOCR for handwriting, with model management.",
    ),
    paths(
        handlers::health::health_check,
        handlers::ocr::ocr_status,
        handlers::ocr::extract_text,
        handlers::ocr::preprocess_preview,
        handlers::models::list_available,
        handlers::models::list_installed,
        handlers::models::download_model,
        handlers::models::force_reload,
        handlers::models::clear_cache,
    ),
    components(schemas(
        // Response envelope
        response::ErrorCode,
        response::ApiError,
        response::ResponseMeta,
        // Core types on the wire
        models::EngineKind,
        models::EngineUsed,
        models::ThresholdMethod,
        models::PreprocessingParams,
        models::ProcessingSpeed,
        models::AccuracyLevel,
        models::ModelDescriptor,
        // OCR
        dto::ExtractionResponse,
        dto::PreprocessResponse,
        dto::OcrStatusResponse,
        // Models
        dto::ModelStatusResponse,
        dto::InstalledModelResponse,
        dto::ModelRequest,
        dto::ForceReloadRequest,
        dto::ModelActionResponse,
        // Health (handler-local types)
        handlers::health::HealthData,
        handlers::health::TesseractHealth,
        handlers::health::TrocrHealth,
    )),
    tags(
        (name = "health", description = "Health check"),
        (name = "ocr", description = "Text extraction and preprocessing preview"),
        (name = "models", description = "Neural model catalog, download and cache management"),
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(utoipa::openapi::security::Http::new(
                utoipa::openapi::security::HttpAuthScheme::Bearer,
            )),
        );
    }
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn redoc_router<S: Clone + Send + Sync + 'static>() -> axum::Router<S> {
    Redoc::with_url("/docs", ApiDoc::openapi()).into()
}
