use serde::{Deserialize, Serialize};

use crate::error::{Result, ScriptorError};

/// Cutoff used by [`ThresholdMethod::Simple`] when the caller does not set one.
pub const DEFAULT_SIMPLE_THRESHOLD: u8 = 127;

/// Largest blur kernel or adaptive block accepted from a request.
pub const MAX_WINDOW_SIZE: u32 = 255;

/// Largest magnitude of the adaptive threshold offset.
pub const MAX_C_OFFSET: i32 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMethod {
    AdaptiveGaussian,
    AdaptiveMean,
    Otsu,
    Simple,
}

impl ThresholdMethod {
    pub fn is_adaptive(self) -> bool {
        matches!(self, Self::AdaptiveGaussian | Self::AdaptiveMean)
    }
}

impl std::fmt::Display for ThresholdMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AdaptiveGaussian => write!(f, "adaptive_gaussian"),
            Self::AdaptiveMean => write!(f, "adaptive_mean"),
            Self::Otsu => write!(f, "otsu"),
            Self::Simple => write!(f, "simple"),
        }
    }
}

impl std::str::FromStr for ThresholdMethod {
    type Err = String;

    /// Accepts snake_case keys as well as the labels shown in the UI
    /// ("Adaptive Gaussian", "Otsu", ...).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "adaptivegaussian" | "gaussian" => Ok(Self::AdaptiveGaussian),
            "adaptivemean" | "mean" => Ok(Self::AdaptiveMean),
            "otsu" => Ok(Self::Otsu),
            "simple" | "binary" => Ok(Self::Simple),
            _ => Err(format!("Unknown threshold method: {s}")),
        }
    }
}

/// Concrete image transform parameters fed to the preprocessing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PreprocessingParams {
    /// Gaussian blur kernel size. Even values are bumped to the next odd value.
    pub blur_kernel: u32,
    pub threshold_method: ThresholdMethod,
    /// Window size for adaptive thresholding. Must be odd and at least 3.
    pub block_size: u32,
    /// Constant subtracted from the local mean by adaptive methods.
    pub c_value: i32,
    /// Global cutoff for [`ThresholdMethod::Simple`].
    pub simple_thresh_value: u8,
}

impl Default for PreprocessingParams {
    fn default() -> Self {
        Self {
            blur_kernel: 5,
            threshold_method: ThresholdMethod::AdaptiveGaussian,
            block_size: 11,
            c_value: 2,
            simple_thresh_value: DEFAULT_SIMPLE_THRESHOLD,
        }
    }
}

impl PreprocessingParams {
    /// Kernel size actually applied by the blur step.
    pub fn effective_blur_kernel(&self) -> u32 {
        if self.blur_kernel % 2 == 0 {
            self.blur_kernel + 1
        } else {
            self.blur_kernel
        }
    }

    /// Rejects parameter sets the pipeline cannot run.
    ///
    /// The blur kernel is coerced rather than rejected; an even adaptive block
    /// size is a caller error and is never corrected.
    pub fn validate(&self) -> Result<()> {
        if self.blur_kernel > MAX_WINDOW_SIZE {
            return Err(ScriptorError::InvalidInput(format!(
                "blur_kernel must be at most {MAX_WINDOW_SIZE}, got {}",
                self.blur_kernel
            )));
        }

        if !(-MAX_C_OFFSET..=MAX_C_OFFSET).contains(&self.c_value) {
            return Err(ScriptorError::InvalidInput(format!(
                "c_value must be between -{MAX_C_OFFSET} and {MAX_C_OFFSET}, got {}",
                self.c_value
            )));
        }

        if self.threshold_method.is_adaptive() {
            if self.block_size < 3 || self.block_size > MAX_WINDOW_SIZE {
                return Err(ScriptorError::InvalidInput(format!(
                    "block_size must be between 3 and {MAX_WINDOW_SIZE} for {} thresholding, got {}",
                    self.threshold_method, self.block_size
                )));
            }
            if self.block_size % 2 == 0 {
                return Err(ScriptorError::InvalidInput(format!(
                    "block_size must be odd for {} thresholding, got {}",
                    self.threshold_method, self.block_size
                )));
            }
        }

        Ok(())
    }
}
