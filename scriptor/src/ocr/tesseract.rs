use std::sync::Arc;
use std::time::{Duration, Instant};

use image::DynamicImage;
use leptess::{LepTess, Variable};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::OcrConfig;
use crate::error::{Result, ScriptorError};
use crate::models::{CharWhitelist, TesseractParams};
use crate::processing::encode_png;

use super::{EngineOutput, DEFAULT_CONFIDENCE};

/// Raw recognizer output before confidence aggregation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecognizedText {
    pub text: String,
    /// Per-word confidences on tesseract's 0-100 scale. Non-words report -1.
    pub token_confidences: Vec<f32>,
}

/// Blocking OCR call into a deterministic recognizer.
///
/// Implementations are not assumed reentrant; the engine serializes calls.
pub trait TokenRecognizer: Send {
    fn recognize(&mut self, png: &[u8], params: &TesseractParams) -> Result<RecognizedText>;
}

struct LepTessRecognizer {
    inner: LepTess,
}

impl LepTessRecognizer {
    fn new(data_path: Option<&str>, languages: &str) -> std::result::Result<Self, String> {
        let inner = LepTess::new(data_path, languages).map_err(|e| e.to_string())?;
        Ok(Self { inner })
    }
}

impl TokenRecognizer for LepTessRecognizer {
    fn recognize(&mut self, png: &[u8], params: &TesseractParams) -> Result<RecognizedText> {
        self.inner
            .set_variable(
                Variable::TesseditPagesegMode,
                params.page_seg_mode.as_tess_value(),
            )
            .map_err(|e| ScriptorError::Extraction(format!("Failed to set page mode: {e}")))?;

        // The instance is shared, so an unset whitelist must clear the previous one.
        let whitelist = params
            .char_whitelist
            .map(CharWhitelist::as_tess_value)
            .unwrap_or("");
        self.inner
            .set_variable(Variable::TesseditCharWhitelist, whitelist)
            .map_err(|e| ScriptorError::Extraction(format!("Failed to set whitelist: {e}")))?;

        self.inner
            .set_image_from_mem(png)
            .map_err(|e| ScriptorError::Extraction(format!("Failed to set image: {e}")))?;

        let text = self
            .inner
            .get_utf8_text()
            .map_err(|e| ScriptorError::Extraction(format!("Failed to extract text: {e}")))?;
        let tsv = self
            .inner
            .get_tsv_text(0)
            .map_err(|e| ScriptorError::Extraction(format!("Failed to read confidences: {e}")))?;

        Ok(RecognizedText {
            text: text.trim().to_string(),
            token_confidences: parse_tsv_confidences(&tsv),
        })
    }
}

/// Word-level confidences from tesseract TSV output (level 5 rows, column 11).
pub fn parse_tsv_confidences(tsv: &str) -> Vec<f32> {
    tsv.lines()
        .filter_map(|line| {
            let columns: Vec<&str> = line.split('\t').collect();
            if columns.len() < 12 || columns[0] != "5" {
                return None;
            }
            columns[10].trim().parse::<f32>().ok()
        })
        .collect()
}

/// Mean of the positive per-token confidences, scaled to `[0, 1]`.
///
/// Non-positive scores carry no signal. When none remain the result is
/// [`DEFAULT_CONFIDENCE`] rather than zero.
pub fn average_confidence(token_confidences: &[f32]) -> f32 {
    let positive: Vec<f32> = token_confidences
        .iter()
        .copied()
        .filter(|c| *c > 0.0)
        .collect();

    if positive.is_empty() {
        return DEFAULT_CONFIDENCE;
    }

    let mean = positive.iter().sum::<f32>() / positive.len() as f32;
    (mean / 100.0).clamp(0.0, 1.0)
}

#[derive(Clone)]
enum TesseractBackend {
    Local {
        recognizer: Arc<Mutex<Box<dyn TokenRecognizer>>>,
    },
    Unavailable {
        reason: String,
    },
}

/// The deterministic engine. Always usable once tesseract initialized.
#[derive(Clone)]
pub struct TesseractEngine {
    backend: TesseractBackend,
    timeout_secs: u64,
}

impl TesseractEngine {
    /// Initializes tesseract. Failure leaves the engine unavailable rather
    /// than aborting startup.
    pub fn new(config: &OcrConfig) -> Self {
        let backend =
            match LepTessRecognizer::new(config.data_path.as_deref(), &config.languages) {
                Ok(recognizer) => {
                    info!(languages = %config.languages, "Tesseract OCR initialized");
                    TesseractBackend::Local {
                        recognizer: Arc::new(Mutex::new(Box::new(recognizer))),
                    }
                }
                Err(e) => {
                    let reason = format!("Tesseract not available: {e}");
                    warn!("{}", reason);
                    TesseractBackend::Unavailable { reason }
                }
            };

        Self {
            backend,
            timeout_secs: config.timeout_secs,
        }
    }

    pub fn with_recognizer(recognizer: Box<dyn TokenRecognizer>, timeout_secs: u64) -> Self {
        Self {
            backend: TesseractBackend::Local {
                recognizer: Arc::new(Mutex::new(recognizer)),
            },
            timeout_secs,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            backend: TesseractBackend::Unavailable {
                reason: reason.into(),
            },
            timeout_secs: 0,
        }
    }

    pub fn is_ready(&self) -> bool {
        !matches!(self.backend, TesseractBackend::Unavailable { .. })
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.backend {
            TesseractBackend::Unavailable { reason } => Some(reason),
            TesseractBackend::Local { .. } => None,
        }
    }

    pub async fn extract_text(
        &self,
        image: &DynamicImage,
        params: &TesseractParams,
    ) -> Result<EngineOutput> {
        let timeout_duration = Duration::from_secs(self.timeout_secs);

        match tokio::time::timeout(timeout_duration, self.extract_internal(image, params)).await {
            Ok(inner_result) => inner_result,
            Err(_) => Err(ScriptorError::Extraction(format!(
                "Tesseract timed out after {} seconds",
                self.timeout_secs
            ))),
        }
    }

    async fn extract_internal(
        &self,
        image: &DynamicImage,
        params: &TesseractParams,
    ) -> Result<EngineOutput> {
        let recognizer = match &self.backend {
            TesseractBackend::Local { recognizer } => Arc::clone(recognizer),
            TesseractBackend::Unavailable { reason } => {
                return Err(ScriptorError::EngineUnavailable(reason.clone()))
            }
        };

        let image = image.clone();
        let params = *params;

        let (recognized, elapsed) = tokio::task::spawn_blocking(move || {
            let png = encode_png(&image)?;
            let mut recognizer = recognizer.blocking_lock();
            let started = Instant::now();
            let recognized = recognizer.recognize(&png, &params)?;
            Ok::<_, ScriptorError>((recognized, started.elapsed()))
        })
        .await
        .map_err(|e| ScriptorError::Extraction(format!("OCR task panicked: {e}")))??;

        let confidence = average_confidence(&recognized.token_confidences);
        debug!(
            chars = recognized.text.len(),
            confidence,
            elapsed_ms = elapsed.as_millis() as u64,
            "Tesseract recognition finished"
        );

        Ok(EngineOutput {
            text: recognized.text.trim().to_string(),
            confidence,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PageSegMode;
    use image::{GrayImage, Luma};

    struct ScriptedRecognizer {
        output: RecognizedText,
        seen: Arc<std::sync::Mutex<Vec<TesseractParams>>>,
    }

    impl TokenRecognizer for ScriptedRecognizer {
        fn recognize(&mut self, png: &[u8], params: &TesseractParams) -> Result<RecognizedText> {
            assert!(image::load_from_memory(png).is_ok());
            self.seen.lock().unwrap().push(*params);
            Ok(self.output.clone())
        }
    }

    struct FailingRecognizer;

    impl TokenRecognizer for FailingRecognizer {
        fn recognize(&mut self, _png: &[u8], _params: &TesseractParams) -> Result<RecognizedText> {
            Err(ScriptorError::Extraction("segfault in page layout".to_string()))
        }
    }

    fn params() -> TesseractParams {
        TesseractParams {
            page_seg_mode: PageSegMode::SingleBlock,
            char_whitelist: None,
        }
    }

    fn blank() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, Luma([255])))
    }

    #[test]
    fn average_excludes_non_positive_scores() {
        let confidence = average_confidence(&[-1.0, 0.0, 80.0, 90.0]);
        assert!((confidence - 0.85).abs() < 1e-6);
    }

    #[test]
    fn empty_confidences_use_default_not_zero() {
        assert_eq!(average_confidence(&[]), DEFAULT_CONFIDENCE);
        assert_eq!(average_confidence(&[-1.0, 0.0]), DEFAULT_CONFIDENCE);
    }

    #[test]
    fn tsv_parsing_reads_word_rows_only() {
        let tsv = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
                   1\t1\t0\t0\t0\t0\t0\t0\t100\t40\t-1\t\n\
                   4\t1\t1\t1\t1\t0\t2\t3\t90\t30\t-1\t\n\
                   5\t1\t1\t1\t1\t1\t2\t3\t40\t30\t91.5\tHello\n\
                   5\t1\t1\t1\t1\t2\t50\t3\t40\t30\t73\tworld\n";
        assert_eq!(parse_tsv_confidences(tsv), vec![91.5, 73.0]);
    }

    #[tokio::test]
    async fn extract_text_aggregates_confidence_and_passes_params() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let engine = TesseractEngine::with_recognizer(
            Box::new(ScriptedRecognizer {
                output: RecognizedText {
                    text: "Dear diary".to_string(),
                    token_confidences: vec![-1.0, 60.0, 80.0],
                },
                seen: Arc::clone(&seen),
            }),
            30,
        );

        let output = engine.extract_text(&blank(), &params()).await.unwrap();
        assert_eq!(output.text, "Dear diary");
        assert!((output.confidence - 0.7).abs() < 1e-6);
        assert_eq!(seen.lock().unwrap().as_slice(), &[params()]);
    }

    #[tokio::test]
    async fn unavailable_engine_returns_error() {
        let engine = TesseractEngine::unavailable("Test unavailable");
        assert!(!engine.is_ready());
        assert_eq!(engine.unavailable_reason(), Some("Test unavailable"));

        let result = engine.extract_text(&blank(), &params()).await;
        assert!(matches!(result, Err(ScriptorError::EngineUnavailable(_))));
    }

    #[tokio::test]
    async fn recognizer_failure_is_extraction_error() {
        let engine = TesseractEngine::with_recognizer(Box::new(FailingRecognizer), 30);
        let result = engine.extract_text(&blank(), &params()).await;
        match result {
            Err(ScriptorError::Extraction(msg)) => assert!(msg.contains("page layout")),
            other => panic!("expected extraction error, got {other:?}"),
        }
    }

    #[test]
    fn engine_construction_degrades_gracefully() {
        let config = OcrConfig {
            languages: "eng".to_string(),
            data_path: None,
            timeout_secs: 60,
            max_upload_bytes: 1024,
        };
        let engine = TesseractEngine::new(&config);
        assert_eq!(engine.is_ready(), engine.unavailable_reason().is_none());
    }
}
