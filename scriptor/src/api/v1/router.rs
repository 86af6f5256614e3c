use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::api::state::AppState;

use super::handlers;
use super::middleware::admin_auth_middleware;

pub fn v1_router(state: AppState) -> Router<AppState> {
    let ocr = Router::new()
        .route("/status", get(handlers::ocr::ocr_status))
        .route("/extract", post(handlers::ocr::extract_text))
        .route("/preprocess", post(handlers::ocr::preprocess_preview));

    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/openapi.json", get(super::openapi::openapi_json))
        .merge(super::openapi::redoc_router())
        .route("/models/available", get(handlers::models::list_available))
        .route("/models/installed", get(handlers::models::list_installed))
        .nest("/ocr", ocr);

    let admin_routes = Router::new()
        .route("/models/download", post(handlers::models::download_model))
        .route("/models/force-reload", post(handlers::models::force_reload))
        .route("/models/cache", delete(handlers::models::clear_cache))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware));

    Router::new().merge(public_routes).merge(admin_routes)
}
