use std::path::Path;

use candle_core::{DType, Device, Tensor};
use image::imageops::FilterType;
use image::DynamicImage;
use serde::Deserialize;

use crate::error::{Result, ScriptorError};

const DEFAULT_SIZE: usize = 384;
const DEFAULT_MEAN: [f32; 3] = [0.5, 0.5, 0.5];
const DEFAULT_STD: [f32; 3] = [0.5, 0.5, 0.5];

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SizeField {
    Square(usize),
    Rect { height: usize, width: usize },
}

#[derive(Debug, Deserialize)]
struct RawProcessorConfig {
    size: Option<SizeField>,
    image_mean: Option<[f32; 3]>,
    image_std: Option<[f32; 3]>,
}

/// ViT image preprocessing read from `preprocessor_config.json`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ImageProcessor {
    pub height: usize,
    pub width: usize,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self {
            height: DEFAULT_SIZE,
            width: DEFAULT_SIZE,
            mean: DEFAULT_MEAN,
            std: DEFAULT_STD,
        }
    }
}

impl ImageProcessor {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ScriptorError::ModelLoad(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: RawProcessorConfig = serde_json::from_str(raw)
            .map_err(|e| ScriptorError::ModelLoad(format!("Invalid preprocessor config: {e}")))?;

        let (height, width) = match config.size {
            Some(SizeField::Square(size)) => (size, size),
            Some(SizeField::Rect { height, width }) => (height, width),
            None => (DEFAULT_SIZE, DEFAULT_SIZE),
        };
        if height == 0 || width == 0 {
            return Err(ScriptorError::ModelLoad(
                "Preprocessor config has a zero image size".to_string(),
            ));
        }

        Ok(Self {
            height,
            width,
            mean: config.image_mean.unwrap_or(DEFAULT_MEAN),
            std: config.image_std.unwrap_or(DEFAULT_STD),
        })
    }

    /// Resizes to the encoder's input size and normalizes into a
    /// `(1, 3, height, width)` tensor.
    pub fn pixel_values(&self, image: &DynamicImage, device: &Device) -> candle_core::Result<Tensor> {
        let rgb = image
            .resize_exact(self.width as u32, self.height as u32, FilterType::Triangle)
            .to_rgb8();

        let plane = self.height * self.width;
        let mut data = vec![0f32; 3 * plane];
        for (i, pixel) in rgb.pixels().enumerate() {
            for channel in 0..3 {
                let value = f32::from(pixel[channel]) / 255.0;
                data[channel * plane + i] = (value - self.mean[channel]) / self.std[channel];
            }
        }

        Tensor::from_vec(data, (3, self.height, self.width), &Device::Cpu)?
            .to_dtype(DType::F32)?
            .to_device(device)?
            .unsqueeze(0)
    }
}
