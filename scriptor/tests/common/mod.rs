// Shared fakes for integration tests
#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, GrayImage, Luma};

use scriptor::error::{Result, ScriptorError};
use scriptor::lifecycle::{
    required_files, ComputeDevice, DownloadFailure, DownloadFailureKind, LoadedModel, ModelCache,
    ModelDownloader, ModelLoader, ModelManager,
};
use scriptor::models::{GenerationParams, ModelType, TesseractParams};
use scriptor::ocr::{
    RecognizedText, SequenceGenerator, TesseractEngine, TokenRecognizer, TrocrEngine,
};
use scriptor::services::ExtractionService;

static INIT: Once = Once::new();

/// Initialize tracing subscriber once for tests
pub fn init_test_logger() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// A white page with one dark bar, enough for every threshold method.
pub fn sample_page() -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_fn(96, 48, |x, y| {
        if (30..66).contains(&x) && (16..32).contains(&y) {
            Luma([10])
        } else {
            Luma([245])
        }
    }))
}

/// Writes placeholder files for every required model file.
pub fn install_model(cache: &ModelCache, model_type: ModelType) {
    let dir = cache.model_dir(model_type);
    std::fs::create_dir_all(&dir).unwrap();
    for name in required_files() {
        std::fs::write(dir.join(name), b"{}").unwrap();
    }
}

/// Deterministic engine returning fixed text.
pub struct ScriptedRecognizer {
    pub text: String,
    pub confidences: Vec<f32>,
}

impl ScriptedRecognizer {
    pub fn boxed(text: &str, confidences: &[f32]) -> Box<dyn TokenRecognizer> {
        Box::new(Self {
            text: text.to_string(),
            confidences: confidences.to_vec(),
        })
    }
}

impl TokenRecognizer for ScriptedRecognizer {
    fn recognize(&mut self, _png: &[u8], _params: &TesseractParams) -> Result<RecognizedText> {
        Ok(RecognizedText {
            text: self.text.clone(),
            token_confidences: self.confidences.clone(),
        })
    }
}

pub struct EchoGenerator(pub String);

impl SequenceGenerator for EchoGenerator {
    fn generate(&mut self, _image: &DynamicImage, _params: &GenerationParams) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Loader that answers with an [`EchoGenerator`] naming the model type.
#[derive(Default)]
pub struct FakeLoader {
    pub loads: AtomicUsize,
    pub fail: bool,
}

impl FakeLoader {
    pub fn failing() -> Self {
        Self {
            loads: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ModelLoader for FakeLoader {
    fn load(&self, model_type: ModelType, _model_dir: &Path) -> Result<LoadedModel> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ScriptorError::ModelLoad("corrupt weights".to_string()));
        }
        Ok(LoadedModel {
            generator: Box::new(EchoGenerator(format!("handwritten by {model_type}"))),
            device: ComputeDevice::Cpu,
            device_label: "CPU".to_string(),
        })
    }

    fn preferred_device(&self) -> (ComputeDevice, String) {
        (ComputeDevice::Cpu, "CPU".to_string())
    }
}

/// Downloader that counts calls and either installs placeholder files or
/// fails the way a dead network would.
pub struct CountingDownloader {
    pub calls: AtomicUsize,
    pub succeed: bool,
}

impl CountingDownloader {
    pub fn succeeding() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            succeed: true,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            succeed: false,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelDownloader for CountingDownloader {
    async fn download(
        &self,
        _model_type: ModelType,
        destination: &Path,
    ) -> std::result::Result<(), DownloadFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.succeed {
            return Err(DownloadFailure::new(
                DownloadFailureKind::Exit,
                "Download program exited with status 1: network unreachable",
            ));
        }
        std::fs::create_dir_all(destination).unwrap();
        for name in required_files() {
            std::fs::write(destination.join(name), b"{}").unwrap();
        }
        Ok(())
    }
}

pub fn manager(
    cache_root: &Path,
    downloader: Arc<CountingDownloader>,
    loader: Arc<FakeLoader>,
) -> Arc<ModelManager> {
    Arc::new(ModelManager::new(
        ModelCache::new(cache_root),
        downloader,
        loader,
        Duration::from_secs(5),
    ))
}

pub fn service(tesseract: TesseractEngine, manager: Arc<ModelManager>) -> ExtractionService {
    ExtractionService::new(
        tesseract,
        TrocrEngine::new(manager, 30),
        ModelType::default(),
    )
}
