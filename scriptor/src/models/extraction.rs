use serde::{Deserialize, Serialize};

use super::ModelType;

/// The recognition engines a request can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Deterministic CPU OCR (Tesseract).
    Tesseract,
    /// Neural vision-to-text model (TrOCR).
    Trocr,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tesseract => write!(f, "tesseract"),
            Self::Trocr => write!(f, "trocr"),
        }
    }
}

impl std::str::FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tesseract" => Ok(Self::Tesseract),
            "trocr" => Ok(Self::Trocr),
            _ => Err(format!("Unknown engine: {s} (expected tesseract or trocr)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EngineUsed {
    Primary,
    Fallback,
}

/// Unified outcome of one extraction request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub text: String,
    /// Always within `[0, 1]`.
    pub confidence: f32,
    /// Recognition time only; model loading is not included.
    pub elapsed_seconds: f64,
    /// Engine that actually produced `text`.
    pub engine: EngineKind,
    pub engine_used: EngineUsed,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    /// Set when the neural engine produced the text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_type: Option<ModelType>,
}

impl ExtractionResult {
    pub fn is_fallback(&self) -> bool {
        self.engine_used == EngineUsed::Fallback
    }
}
