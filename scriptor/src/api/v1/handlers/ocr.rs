//! v1 OCR handlers: engine status, extraction and preprocessing preview.

use axum::extract::{Multipart, State};
use image::DynamicImage;

use crate::api::state::AppState;
use crate::api::v1::dto::{ExtractionResponse, OcrForm, OcrStatusResponse, PreprocessResponse};
use crate::api::v1::response::{ApiError, ApiResponse};
use crate::error::{Result, ScriptorError};

/// Image bytes plus the text fields of an OCR form.
struct Upload {
    bytes: Vec<u8>,
    form: OcrForm,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload> {
    let mut bytes: Option<Vec<u8>> = None;
    let mut form = OcrForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ScriptorError::InvalidInput(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();

        if name == "file" {
            let data = field
                .bytes()
                .await
                .map_err(|e| ScriptorError::InvalidInput(format!("Failed to read file: {e}")))?;
            bytes = Some(data.to_vec());
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| ScriptorError::InvalidInput(format!("Invalid {name} value: {e}")))?;
        form.set(&name, &value)?;
    }

    let bytes = bytes
        .ok_or_else(|| ScriptorError::InvalidInput("Missing required 'file' field".to_string()))?;
    if bytes.is_empty() {
        return Err(ScriptorError::InvalidInput(
            "Uploaded file is empty".to_string(),
        ));
    }

    Ok(Upload { bytes, form })
}

async fn decode_image(bytes: Vec<u8>) -> Result<DynamicImage> {
    tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
        .await
        .map_err(|e| ScriptorError::Internal(format!("Image decode task failed: {e}")))?
        .map_err(|e| ScriptorError::InvalidInput(format!("Could not decode image: {e}")))
}

/// `GET /api/v1/ocr/status`
#[utoipa::path(
    get,
    path = "/api/v1/ocr/status",
    tag = "ocr",
    responses(
        (status = 200, description = "Engine availability and model state", body = OcrStatusResponse),
    )
)]
pub async fn ocr_status(State(state): State<AppState>) -> ApiResponse<OcrStatusResponse> {
    ApiResponse::success(OcrStatusResponse::new(
        state.extraction.status(),
        state.models.available_models(),
    ))
}

/// `POST /api/v1/ocr/extract`
///
/// Accepts a multipart form with a `file` field plus optional engine,
/// model, preset and preprocessing fields. `engine` defaults to `tesseract`.
/// When the neural model cannot be
/// loaded the request is answered by Tesseract and `engine_used` is
/// `fallback`.
#[utoipa::path(
    post,
    path = "/api/v1/ocr/extract",
    tag = "ocr",
    request_body(content_type = "multipart/form-data", content = String, description = "Image upload with optional engine, model_type, use_preprocessing, blur_kernel, threshold_method, block_size, c_value, simple_thresh_value, processing_speed and accuracy_level fields"),
    responses(
        (status = 200, description = "Recognized text", body = ExtractionResponse),
        (status = 400, description = "Invalid upload or parameters", body = ApiError),
        (status = 500, description = "Recognition failed", body = ApiError),
        (status = 503, description = "No engine available", body = ApiError),
    )
)]
pub async fn extract_text(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResponse<ExtractionResponse> {
    let upload = match read_upload(multipart).await {
        Ok(upload) => upload,
        Err(e) => return e.into(),
    };
    let request = upload.form.into_request();

    let image = match decode_image(upload.bytes).await {
        Ok(image) => image,
        Err(e) => return e.into(),
    };

    match state.extraction.extract(&image, &request).await {
        Ok(result) => ApiResponse::success(result.into()),
        Err(e) => e.into(),
    }
}

/// `POST /api/v1/ocr/preprocess`
///
/// Runs only the preprocessing pipeline and returns the binarized image as a
/// PNG data URL, so callers can tune the parameters before extracting.
#[utoipa::path(
    post,
    path = "/api/v1/ocr/preprocess",
    tag = "ocr",
    request_body(content_type = "multipart/form-data", content = String, description = "Image upload with the same preprocessing fields as extraction"),
    responses(
        (status = 200, description = "Preprocessed preview", body = PreprocessResponse),
        (status = 400, description = "Invalid upload or parameters", body = ApiError),
    )
)]
pub async fn preprocess_preview(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResponse<PreprocessResponse> {
    let upload = match read_upload(multipart).await {
        Ok(upload) => upload,
        Err(e) => return e.into(),
    };
    let request = upload.form.into_request();

    let image = match decode_image(upload.bytes).await {
        Ok(image) => image,
        Err(e) => return e.into(),
    };

    match state.extraction.preview(&image, &request).await {
        Ok(preview) => ApiResponse::success(preview.into()),
        Err(e) => e.into(),
    }
}
