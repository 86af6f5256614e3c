//! Recognition engines.
//!
//! Two engines sit behind the closed [`EngineKind`](crate::models::EngineKind)
//! enum:
//! - `TesseractEngine`: deterministic OCR through leptess, ready once tesseract
//!   initializes at startup
//! - `TrocrEngine`: a TrOCR vision encoder-decoder run with candle, ready only
//!   after the model lifecycle manager has loaded a model
//!
//! Both report elapsed time for the recognition call alone.

mod tesseract;
pub mod trocr;

use std::time::Duration;

pub use tesseract::{
    average_confidence, parse_tsv_confidences, RecognizedText, TesseractEngine, TokenRecognizer,
};
pub use trocr::{CandleTrocrLoader, SequenceGenerator, TrocrEngine};

/// Confidence reported when the deterministic engine yields no positive
/// per-token score.
pub const DEFAULT_CONFIDENCE: f32 = 0.95;

/// Confidence reported for neural output, which has no native score.
pub const NEURAL_CONFIDENCE: f32 = 0.95;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineOutput {
    pub text: String,
    pub confidence: f32,
    pub elapsed: Duration,
}
