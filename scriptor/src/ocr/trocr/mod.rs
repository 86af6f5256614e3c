mod decode;
mod model;
mod processor;

use std::sync::Arc;
use std::time::{Duration, Instant};

use image::DynamicImage;
use tracing::debug;

use crate::error::{Result, ScriptorError};
use crate::lifecycle::{ModelHandle, ModelManager};
use crate::models::GenerationParams;

use super::{EngineOutput, NEURAL_CONFIDENCE};

pub use model::CandleTrocrLoader;

/// A loaded image-to-text model. Blocking; calls are serialized per model.
pub trait SequenceGenerator: Send {
    fn generate(&mut self, image: &DynamicImage, params: &GenerationParams) -> Result<String>;
}

/// The neural engine. Recognition needs a handle from the [`ModelManager`].
#[derive(Clone)]
pub struct TrocrEngine {
    manager: Arc<ModelManager>,
    timeout_secs: u64,
}

impl TrocrEngine {
    pub fn new(manager: Arc<ModelManager>, timeout_secs: u64) -> Self {
        Self {
            manager,
            timeout_secs,
        }
    }

    pub fn manager(&self) -> &Arc<ModelManager> {
        &self.manager
    }

    /// Whether some model is resident.
    pub fn is_ready(&self) -> bool {
        self.manager.status().loaded
    }

    pub async fn extract_text(
        &self,
        handle: &ModelHandle,
        image: &DynamicImage,
        params: &GenerationParams,
    ) -> Result<EngineOutput> {
        let timeout_duration = Duration::from_secs(self.timeout_secs);

        match tokio::time::timeout(timeout_duration, self.extract_internal(handle, image, params))
            .await
        {
            Ok(inner_result) => inner_result,
            Err(_) => Err(ScriptorError::Extraction(format!(
                "TrOCR timed out after {} seconds",
                self.timeout_secs
            ))),
        }
    }

    async fn extract_internal(
        &self,
        handle: &ModelHandle,
        image: &DynamicImage,
        params: &GenerationParams,
    ) -> Result<EngineOutput> {
        let generator = handle.generator();
        let image = image.clone();
        let params = *params;

        let (text, elapsed) = tokio::task::spawn_blocking(move || {
            let mut generator = generator.blocking_lock();
            let started = Instant::now();
            let text = generator.generate(&image, &params)?;
            Ok::<_, ScriptorError>((text, started.elapsed()))
        })
        .await
        .map_err(|e| ScriptorError::Extraction(format!("TrOCR task panicked: {e}")))??;

        debug!(
            model_type = %handle.model_type(),
            chars = text.len(),
            num_beams = params.num_beams,
            elapsed_ms = elapsed.as_millis() as u64,
            "TrOCR recognition finished"
        );

        Ok(EngineOutput {
            text,
            confidence: NEURAL_CONFIDENCE,
            elapsed,
        })
    }
}
