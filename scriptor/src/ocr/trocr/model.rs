use std::path::Path;

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::{trocr, vit};
use image::DynamicImage;
use serde::Deserialize;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use crate::error::{Result, ScriptorError};
use crate::lifecycle::{ComputeDevice, LoadedModel, ModelLoader};
use crate::models::{GenerationParams, ModelType};

use super::decode::{decode, PrefixCache, SpecialTokens};
use super::processor::ImageProcessor;
use super::SequenceGenerator;

const SAFETENSORS_FILE: &str = "model.safetensors";
const PYTORCH_FILE: &str = "pytorch_model.bin";

/// Layout of a vision encoder-decoder `config.json`.
#[derive(Debug, Clone, Deserialize)]
struct EncoderDecoderConfig {
    encoder: vit::Config,
    decoder: trocr::TrOCRConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Cuda,
    Metal,
    Cpu,
}

impl Backend {
    fn detect(use_gpu: bool) -> Self {
        if use_gpu && candle_core::utils::cuda_is_available() {
            Backend::Cuda
        } else if use_gpu && candle_core::utils::metal_is_available() {
            Backend::Metal
        } else {
            Backend::Cpu
        }
    }

    fn label(self) -> &'static str {
        match self {
            Backend::Cuda => "CUDA",
            Backend::Metal => "METAL",
            Backend::Cpu => "CPU",
        }
    }

    fn compute_device(self) -> ComputeDevice {
        match self {
            Backend::Cuda | Backend::Metal => ComputeDevice::Gpu,
            Backend::Cpu => ComputeDevice::Cpu,
        }
    }
}

/// Picks CUDA, then Metal, then CPU. A GPU that fails to initialize falls
/// back to CPU.
fn select_device(use_gpu: bool) -> (Device, Backend) {
    let backend = Backend::detect(use_gpu);
    let device = match backend {
        Backend::Cuda => Device::new_cuda(0),
        Backend::Metal => Device::new_metal(0),
        Backend::Cpu => return (Device::Cpu, Backend::Cpu),
    };
    match device {
        Ok(device) => (device, backend),
        Err(e) => {
            warn!("{} device unavailable, using CPU: {}", backend.label(), e);
            (Device::Cpu, Backend::Cpu)
        }
    }
}

/// A TrOCR model resident on one device.
struct CandleTrocr {
    model: trocr::TrOCRModel,
    tokenizer: Tokenizer,
    processor: ImageProcessor,
    device: Device,
    tokens: SpecialTokens,
}

impl CandleTrocr {
    fn load(model_dir: &Path, device: Device) -> Result<Self> {
        let load_err = |what: &str, e: &dyn std::fmt::Display| {
            ScriptorError::ModelLoad(format!("Failed to load {what}: {e}"))
        };

        let config_path = model_dir.join("config.json");
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| load_err("model config", &e))?;
        let config: EncoderDecoderConfig =
            serde_json::from_str(&raw).map_err(|e| load_err("model config", &e))?;

        let tokenizer = Tokenizer::from_file(model_dir.join("tokenizer.json"))
            .map_err(|e| load_err("tokenizer", &e))?;
        let processor = ImageProcessor::from_file(&model_dir.join("preprocessor_config.json"))?;

        let safetensors = model_dir.join(SAFETENSORS_FILE);
        let vb = if safetensors.is_file() {
            // SAFETY: the cache directory is only written by the downloader,
            // which moves complete files into place.
            unsafe { VarBuilder::from_mmaped_safetensors(&[safetensors], DType::F32, &device) }
        } else {
            VarBuilder::from_pth(model_dir.join(PYTORCH_FILE), DType::F32, &device)
        }
        .map_err(|e| load_err("model weights", &e))?;

        let model = trocr::TrOCRModel::new(&config.encoder, &config.decoder, vb)
            .map_err(|e| load_err("model weights", &e))?;

        Ok(Self {
            model,
            tokenizer,
            processor,
            device,
            tokens: SpecialTokens {
                start: config.decoder.decoder_start_token_id,
                eos: config.decoder.eos_token_id,
            },
        })
    }

    fn generate_ids(
        &mut self,
        image: &DynamicImage,
        params: &GenerationParams,
    ) -> candle_core::Result<Vec<u32>> {
        let pixels = self.processor.pixel_values(image, &self.device)?;
        let encoder_xs = self.model.encoder().forward(&pixels)?;

        let model = &mut self.model;
        let device = &self.device;
        let mut cache = PrefixCache::default();
        let step = |prefix: &[u32]| -> candle_core::Result<Vec<f32>> {
            let feed = cache.advance(prefix);
            if feed.reset {
                model.reset_kv_cache();
            }
            let input_ids = Tensor::new(feed.tokens, device)?.unsqueeze(0)?;
            let logits = model
                .decode(&input_ids, &encoder_xs, feed.start_pos)?
                .squeeze(0)?;
            let last = logits.get(logits.dim(0)? - 1)?;
            last.to_dtype(DType::F32)?.to_vec1::<f32>()
        };

        let ids = decode(step, self.tokens, params);
        self.model.reset_kv_cache();
        ids
    }
}

impl SequenceGenerator for CandleTrocr {
    fn generate(&mut self, image: &DynamicImage, params: &GenerationParams) -> Result<String> {
        let ids = self
            .generate_ids(image, params)
            .map_err(|e| ScriptorError::Extraction(format!("TrOCR generation failed: {e}")))?;
        debug!(tokens = ids.len(), "TrOCR generation finished");

        let text = self
            .tokenizer
            .decode(&ids, true)
            .map_err(|e| ScriptorError::Extraction(format!("Failed to decode tokens: {e}")))?;
        Ok(text.trim().to_string())
    }
}

/// Loads TrOCR checkpoints from the model cache with candle.
#[derive(Debug, Clone, Copy)]
pub struct CandleTrocrLoader {
    use_gpu: bool,
}

impl CandleTrocrLoader {
    pub fn new(use_gpu: bool) -> Self {
        Self { use_gpu }
    }
}

impl ModelLoader for CandleTrocrLoader {
    fn load(&self, model_type: ModelType, model_dir: &Path) -> Result<LoadedModel> {
        let (device, backend) = select_device(self.use_gpu);
        info!(model_type = %model_type, device = backend.label(), "Loading TrOCR weights");

        let model = CandleTrocr::load(model_dir, device)?;
        Ok(LoadedModel {
            generator: Box::new(model),
            device: backend.compute_device(),
            device_label: backend.label().to_string(),
        })
    }

    fn preferred_device(&self) -> (ComputeDevice, String) {
        let backend = Backend::detect(self.use_gpu);
        (backend.compute_device(), backend.label().to_string())
    }
}
