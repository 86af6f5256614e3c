//! Typed engine runtime settings produced by the preset resolver.

use serde::{Deserialize, Serialize};

use super::{EngineKind, PreprocessingParams};

/// Tesseract page segmentation modes used by the presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PageSegMode {
    /// Automatic segmentation with orientation and script detection (psm 1).
    AutoOsd,
    /// Fully automatic segmentation without OSD (psm 3).
    Auto,
    /// Assume a single uniform block of text (psm 6).
    SingleBlock,
}

impl PageSegMode {
    /// Value for tesseract's `tessedit_pageseg_mode` variable.
    pub fn as_tess_value(self) -> &'static str {
        match self {
            Self::AutoOsd => "1",
            Self::Auto => "3",
            Self::SingleBlock => "6",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CharWhitelist {
    Alphanumeric,
}

impl CharWhitelist {
    /// Value for tesseract's `tessedit_char_whitelist` variable.
    pub fn as_tess_value(self) -> &'static str {
        match self {
            Self::Alphanumeric => {
                "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789"
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TesseractParams {
    pub page_seg_mode: PageSegMode,
    /// Restricts recognition to these characters when set.
    pub char_whitelist: Option<CharWhitelist>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SamplingParams {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct GenerationParams {
    pub num_beams: usize,
    /// Upper bound on generated sequence length, start token included.
    pub max_length: usize,
    /// Stop beam search once `num_beams` finished hypotheses exist.
    pub early_stopping: bool,
    /// Stochastic decoding; takes precedence over beam search when set.
    pub sampling: Option<SamplingParams>,
}

/// Runtime settings for one engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineRuntimeParams {
    Tesseract(TesseractParams),
    Trocr(GenerationParams),
}

/// Everything a (speed, accuracy) pair resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ResolvedPreset {
    pub preprocessing: PreprocessingParams,
    pub tesseract: TesseractParams,
    pub generation: GenerationParams,
}

impl ResolvedPreset {
    pub fn runtime_for(&self, engine: EngineKind) -> EngineRuntimeParams {
        match engine {
            EngineKind::Tesseract => EngineRuntimeParams::Tesseract(self.tesseract),
            EngineKind::Trocr => EngineRuntimeParams::Trocr(self.generation),
        }
    }
}
