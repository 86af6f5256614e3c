//! # V1 API Response Envelope & Error Contract
//!
//! Every v1 endpoint returns an [`ApiResponse<T>`] envelope with three
//! optional top-level fields:
//!
//! ```json
//! {
//!   "data": { ... },                  // present on success, absent on error
//!   "meta": { "total": 6 },           // optional, list endpoints only
//!   "error": { "code": "invalid_request", "message": "..." }  // present on error
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::ScriptorError;

/// Machine-readable error code included in every error response.
///
/// Serialized as a snake_case string on the wire (e.g. `"invalid_request"`).
/// Each variant maps to a fixed HTTP status code via [`ErrorCode::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed upload, unknown engine or model key, or invalid
    /// preprocessing parameters. HTTP 400.
    InvalidRequest,
    /// Missing or invalid API key on an admin endpoint. HTTP 401.
    Unauthorized,
    /// Recognition or model management failed. HTTP 500.
    InternalError,
    /// No engine can serve the request. HTTP 503.
    Unavailable,
}

impl ErrorCode {
    /// Returns the HTTP status code corresponding to this error code.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRequest => write!(f, "invalid_request"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::InternalError => write!(f, "internal_error"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Structured error payload within the API envelope.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ApiError {
    /// Machine-readable error classification.
    pub code: ErrorCode,
    /// Human-readable description safe to display to end users.
    pub message: String,
}

/// Metadata included in list responses.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    /// Number of items in `data`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

/// Canonical v1 API response envelope.
///
/// On success, `data` is present and `error` is absent. On error, `error` is
/// present and `data` is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,

    /// HTTP status to use in the response. Not serialized on the wire.
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    /// Success response with data (HTTP 200).
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            meta: None,
            error: None,
            status: StatusCode::OK,
        }
    }

    /// Success response with data and metadata (HTTP 200).
    pub fn success_with_meta(data: T, meta: ResponseMeta) -> Self {
        Self {
            data: Some(data),
            meta: Some(meta),
            error: None,
            status: StatusCode::OK,
        }
    }

    /// Error response. HTTP status is derived from the [`ErrorCode`].
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        let status = code.status();
        Self {
            data: None,
            meta: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
            status,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status;
        match serde_json::to_value(&self) {
            Ok(body) => (status, Json(body)).into_response(),
            Err(_) => {
                let body = serde_json::json!({
                    "error": {
                        "code": "internal_error",
                        "message": "An internal error occurred"
                    }
                });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

impl<T: Serialize> From<ScriptorError> for ApiResponse<T> {
    /// Convert a [`ScriptorError`] into a v1 [`ApiResponse`].
    ///
    /// Plumbing failures (I/O, image codec, JSON, internal) are logged and
    /// answered with a generic message. Recognition and model errors keep
    /// their cause.
    fn from(err: ScriptorError) -> Self {
        match err {
            ScriptorError::InvalidInput(msg) | ScriptorError::Preprocessing(msg) => {
                ApiResponse::error(ErrorCode::InvalidRequest, msg)
            }

            ScriptorError::EngineUnavailable(msg) => {
                ApiResponse::error(ErrorCode::Unavailable, msg)
            }

            ScriptorError::Extraction(msg) | ScriptorError::ModelLoad(msg) => {
                tracing::error!(error = %msg, "Request failed");
                ApiResponse::error(ErrorCode::InternalError, msg)
            }

            ScriptorError::Download(failure) => {
                tracing::error!(kind = ?failure.kind, error = %failure, "Model download failed");
                ApiResponse::error(
                    ErrorCode::InternalError,
                    format!("Model download failed: {failure}"),
                )
            }

            ref internal @ (ScriptorError::Image(_)
            | ScriptorError::Json(_)
            | ScriptorError::Io(_)
            | ScriptorError::Internal(_)) => {
                tracing::error!(error = %internal, "Internal error mapped to v1 response");
                ApiResponse::error(ErrorCode::InternalError, "An internal error occurred")
            }
        }
    }
}

impl IntoResponse for ScriptorError {
    fn into_response(self) -> Response {
        ApiResponse::<()>::from(self).into_response()
    }
}
