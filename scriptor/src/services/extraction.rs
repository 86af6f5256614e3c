use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Result, ScriptorError};
use crate::lifecycle::ModelState;
use crate::models::{
    EngineKind, EngineRuntimeParams, EngineUsed, ExtractionResult, GenerationParams, ModelType,
    PreprocessingParams, SpeedAccuracyPreset, TesseractParams,
};
use crate::ocr::{EngineOutput, TesseractEngine, TrocrEngine};
use crate::processing::{preprocess, preview_data_url, resolve_preset};

/// Validated inputs of one extraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractionRequest {
    pub engine: EngineKind,
    /// Neural model to use; the configured default when unset.
    pub model_type: Option<ModelType>,
    pub preset: SpeedAccuracyPreset,
    /// Replaces the preset's preprocessing when set.
    pub preprocessing: Option<PreprocessingParams>,
    pub use_preprocessing: bool,
}

impl Default for ExtractionRequest {
    fn default() -> Self {
        Self {
            engine: EngineKind::Tesseract,
            model_type: None,
            preset: SpeedAccuracyPreset::default(),
            preprocessing: None,
            use_preprocessing: true,
        }
    }
}

impl ExtractionRequest {
    /// Preprocessing this request runs with.
    pub fn effective_preprocessing(&self) -> PreprocessingParams {
        self.preprocessing
            .unwrap_or_else(|| resolve_preset(self.preset).preprocessing)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewResult {
    pub data_url: String,
    pub params: PreprocessingParams,
}

/// Availability of both engines and the neural model state.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub tesseract_ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tesseract_error: Option<String>,
    pub trocr_ready: bool,
    pub default_model: ModelType,
    pub model: ModelState,
}

/// Runs preprocessing, engine selection and fallback for one image.
#[derive(Clone)]
pub struct ExtractionService {
    tesseract: TesseractEngine,
    trocr: TrocrEngine,
    default_model: ModelType,
}

impl ExtractionService {
    pub fn new(tesseract: TesseractEngine, trocr: TrocrEngine, default_model: ModelType) -> Self {
        Self {
            tesseract,
            trocr,
            default_model,
        }
    }

    pub fn trocr(&self) -> &TrocrEngine {
        &self.trocr
    }

    pub fn default_model(&self) -> ModelType {
        self.default_model
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            tesseract_ready: self.tesseract.is_ready(),
            tesseract_error: self.tesseract.unavailable_reason().map(str::to_string),
            trocr_ready: self.trocr.is_ready(),
            default_model: self.default_model,
            model: self.trocr.manager().status(),
        }
    }

    pub async fn extract(
        &self,
        image: &DynamicImage,
        request: &ExtractionRequest,
    ) -> Result<ExtractionResult> {
        let preset = resolve_preset(request.preset);
        let preprocessing = request.preprocessing.unwrap_or(preset.preprocessing);
        if request.use_preprocessing {
            preprocessing.validate()?;
        }
        let model_type = request.model_type.unwrap_or(self.default_model);

        debug!(
            engine = %request.engine,
            speed = %request.preset.speed,
            accuracy = %request.preset.accuracy,
            use_preprocessing = request.use_preprocessing,
            ?preprocessing,
            "Starting extraction"
        );

        let prepared = if request.use_preprocessing {
            prepare(image, preprocessing).await?
        } else {
            image.clone()
        };

        match preset.runtime_for(request.engine) {
            EngineRuntimeParams::Tesseract(params) => {
                let output = self.tesseract.extract_text(&prepared, &params).await?;
                Ok(assemble(output, EngineKind::Tesseract, EngineUsed::Primary, None, None))
            }
            EngineRuntimeParams::Trocr(params) => {
                self.extract_neural(&prepared, model_type, &params, &preset.tesseract)
                    .await
            }
        }
    }

    async fn extract_neural(
        &self,
        image: &DynamicImage,
        model_type: ModelType,
        generation: &GenerationParams,
        fallback_params: &TesseractParams,
    ) -> Result<ExtractionResult> {
        let handle = match self.trocr.manager().ensure_loaded(model_type).await {
            Ok(handle) => handle,
            Err(e) => {
                let reason = format!("TrOCR model {model_type} failed to load: {e}");
                return self.fallback(image, fallback_params, reason).await;
            }
        };

        let output = self.trocr.extract_text(&handle, image, generation).await?;
        Ok(assemble(
            output,
            EngineKind::Trocr,
            EngineUsed::Primary,
            None,
            Some(model_type),
        ))
    }

    async fn fallback(
        &self,
        image: &DynamicImage,
        params: &TesseractParams,
        reason: String,
    ) -> Result<ExtractionResult> {
        if let Some(tesseract_reason) = self.tesseract.unavailable_reason() {
            return Err(ScriptorError::EngineUnavailable(format!(
                "{reason}; fallback engine also unavailable: {tesseract_reason}"
            )));
        }

        warn!("{}. Falling back to Tesseract", reason);
        let output = self.tesseract.extract_text(image, params).await?;
        info!(
            elapsed_ms = output.elapsed.as_millis() as u64,
            "Fallback extraction finished"
        );
        Ok(assemble(
            output,
            EngineKind::Tesseract,
            EngineUsed::Fallback,
            Some(reason),
            None,
        ))
    }

    /// Binarizes `image` as `request` would before recognition and returns
    /// it as a PNG data URL.
    pub async fn preview(
        &self,
        image: &DynamicImage,
        request: &ExtractionRequest,
    ) -> Result<PreviewResult> {
        let params = request.effective_preprocessing();
        params.validate()?;

        let image = image.clone();
        let data_url = tokio::task::spawn_blocking(move || preview_data_url(&image, &params))
            .await
            .map_err(|e| ScriptorError::Internal(format!("Preprocessing task failed: {e}")))??;

        Ok(PreviewResult { data_url, params })
    }
}

async fn prepare(image: &DynamicImage, params: PreprocessingParams) -> Result<DynamicImage> {
    let image = image.clone();
    tokio::task::spawn_blocking(move || preprocess(&image, &params).map(DynamicImage::ImageLuma8))
        .await
        .map_err(|e| ScriptorError::Internal(format!("Preprocessing task failed: {e}")))?
}

fn assemble(
    output: EngineOutput,
    engine: EngineKind,
    engine_used: EngineUsed,
    fallback_reason: Option<String>,
    model_type: Option<ModelType>,
) -> ExtractionResult {
    ExtractionResult {
        text: output.text,
        confidence: output.confidence.clamp(0.0, 1.0),
        elapsed_seconds: output.elapsed.as_secs_f64(),
        engine,
        engine_used,
        fallback_reason,
        model_type,
    }
}
