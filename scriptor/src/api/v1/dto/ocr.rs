//! OCR DTOs for the v1 API.

use serde::Serialize;

use crate::error::{Result, ScriptorError};
use crate::models::{
    AccuracyLevel, EngineKind, EngineUsed, ExtractionResult, ModelDescriptor, ModelType,
    PreprocessingParams, ProcessingSpeed, SpeedAccuracyPreset, ThresholdMethod,
};
use crate::processing::resolve_preset;
use crate::services::{EngineStatus, ExtractionRequest, PreviewResult};

use super::models::ModelStatusResponse;

/// Response for `POST /api/v1/ocr/extract`.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ExtractionResponse {
    /// Recognized text, trimmed.
    pub text: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// Recognition time in seconds.
    pub elapsed_seconds: f64,
    /// Engine that produced `text`.
    pub engine: EngineKind,
    pub engine_used: EngineUsed,
    /// Why the requested engine was not used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    /// Neural model that produced `text`, e.g. `base-printed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,
}

impl From<ExtractionResult> for ExtractionResponse {
    fn from(result: ExtractionResult) -> Self {
        Self {
            text: result.text,
            confidence: result.confidence,
            elapsed_seconds: result.elapsed_seconds,
            engine: result.engine,
            engine_used: result.engine_used,
            fallback_reason: result.fallback_reason,
            model_type: result.model_type.map(|m| m.to_string()),
        }
    }
}

/// Response for `POST /api/v1/ocr/preprocess`.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct PreprocessResponse {
    /// `data:image/png;base64,...` of the binarized image.
    pub data_url: String,
    /// Parameters the preview was produced with.
    pub params: PreprocessingParams,
}

impl From<PreviewResult> for PreprocessResponse {
    fn from(preview: PreviewResult) -> Self {
        Self {
            data_url: preview.data_url,
            params: preview.params,
        }
    }
}

/// Response for `GET /api/v1/ocr/status`.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct OcrStatusResponse {
    pub tesseract_ready: bool,
    /// Why Tesseract could not be initialized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tesseract_error: Option<String>,
    /// Whether a neural model is resident.
    pub trocr_ready: bool,
    /// Model used when a request names none.
    pub default_model: String,
    pub model: ModelStatusResponse,
    /// Every installable model.
    pub available_models: Vec<ModelDescriptor>,
}

impl OcrStatusResponse {
    pub fn new(status: EngineStatus, available_models: Vec<ModelDescriptor>) -> Self {
        Self {
            tesseract_ready: status.tesseract_ready,
            tesseract_error: status.tesseract_error,
            trocr_ready: status.trocr_ready,
            default_model: status.default_model.to_string(),
            model: status.model.into(),
            available_models,
        }
    }
}

pub(crate) fn parse_form_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ScriptorError::InvalidInput(format!("{field} must be a number, got {value:?}")))
}

/// Text fields of an OCR multipart form, collected before validation.
///
/// Preprocessing fields left out of the form take the preset's value.
#[derive(Debug, Clone, Default)]
pub struct OcrForm {
    pub engine: Option<EngineKind>,
    pub model_type: Option<ModelType>,
    pub use_preprocessing: Option<bool>,
    pub speed: Option<ProcessingSpeed>,
    pub accuracy: Option<AccuracyLevel>,
    pub blur_kernel: Option<u32>,
    pub threshold_method: Option<ThresholdMethod>,
    pub block_size: Option<u32>,
    pub c_value: Option<i32>,
    pub simple_thresh_value: Option<u8>,
}

impl OcrForm {
    /// Records one text field. Unknown field names are ignored; empty
    /// values count as absent.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(());
        }

        match name {
            "engine" => self.engine = Some(value.parse().map_err(ScriptorError::InvalidInput)?),
            "model_type" => {
                self.model_type = Some(value.parse().map_err(ScriptorError::InvalidInput)?)
            }
            "use_preprocessing" => {
                self.use_preprocessing = Some(parse_form_bool(value).ok_or_else(|| {
                    ScriptorError::InvalidInput(
                        "use_preprocessing must be one of true/false/1/0/yes/no".to_string(),
                    )
                })?)
            }
            "processing_speed" => {
                self.speed = Some(value.parse().map_err(ScriptorError::InvalidInput)?)
            }
            "accuracy_level" => {
                self.accuracy = Some(value.parse().map_err(ScriptorError::InvalidInput)?)
            }
            "blur_kernel" => self.blur_kernel = Some(parse_number(name, value)?),
            "threshold_method" => {
                self.threshold_method = Some(value.parse().map_err(ScriptorError::InvalidInput)?)
            }
            "block_size" => self.block_size = Some(parse_number(name, value)?),
            "c_value" => self.c_value = Some(parse_number(name, value)?),
            "simple_thresh_value" => {
                self.simple_thresh_value = Some(value.trim().parse().map_err(|_| {
                    ScriptorError::InvalidInput(format!(
                        "simple_thresh_value must be between 0 and 255, got {value:?}"
                    ))
                })?)
            }
            _ => {}
        }
        Ok(())
    }

    fn has_preprocessing_override(&self) -> bool {
        self.blur_kernel.is_some()
            || self.threshold_method.is_some()
            || self.block_size.is_some()
            || self.c_value.is_some()
            || self.simple_thresh_value.is_some()
    }

    pub fn into_request(self) -> ExtractionRequest {
        let defaults = ExtractionRequest::default();
        let preset = SpeedAccuracyPreset {
            speed: self.speed.unwrap_or(defaults.preset.speed),
            accuracy: self.accuracy.unwrap_or(defaults.preset.accuracy),
        };

        let preprocessing = self.has_preprocessing_override().then(|| {
            let base = resolve_preset(preset).preprocessing;
            PreprocessingParams {
                blur_kernel: self.blur_kernel.unwrap_or(base.blur_kernel),
                threshold_method: self.threshold_method.unwrap_or(base.threshold_method),
                block_size: self.block_size.unwrap_or(base.block_size),
                c_value: self.c_value.unwrap_or(base.c_value),
                simple_thresh_value: self.simple_thresh_value.unwrap_or(base.simple_thresh_value),
            }
        });

        ExtractionRequest {
            engine: self.engine.unwrap_or(defaults.engine),
            model_type: self.model_type,
            preset,
            preprocessing,
            use_preprocessing: self.use_preprocessing.unwrap_or(defaults.use_preprocessing),
        }
    }
}
