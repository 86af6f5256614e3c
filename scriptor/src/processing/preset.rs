//! Maps (speed, accuracy) onto concrete parameters for both engines.
//!
//! Speed sets the baseline; accuracy only ever raises settings above it. The
//! mapping is total over the 4×4 grid and has no side effects.

use crate::models::{
    AccuracyLevel, CharWhitelist, GenerationParams, PageSegMode, PreprocessingParams,
    ProcessingSpeed, ResolvedPreset, SamplingParams, SpeedAccuracyPreset, TesseractParams,
    ThresholdMethod, DEFAULT_SIMPLE_THRESHOLD,
};

const BASE_MAX_LENGTH: usize = 128;
const HIGH_ACCURACY_MAX_LENGTH: usize = 150;
const MAXIMUM_ACCURACY_MAX_LENGTH: usize = 200;

pub fn resolve(speed: ProcessingSpeed, accuracy: AccuracyLevel) -> ResolvedPreset {
    ResolvedPreset {
        preprocessing: resolve_preprocessing(speed, accuracy),
        tesseract: resolve_tesseract(speed, accuracy),
        generation: resolve_generation(speed, accuracy),
    }
}

pub fn resolve_preset(preset: SpeedAccuracyPreset) -> ResolvedPreset {
    resolve(preset.speed, preset.accuracy)
}

pub fn resolve_preprocessing(
    speed: ProcessingSpeed,
    accuracy: AccuracyLevel,
) -> PreprocessingParams {
    let (blur_kernel, mut threshold_method, mut block_size, mut c_value) = match speed {
        ProcessingSpeed::Fast => (3, ThresholdMethod::Simple, 7, 1),
        ProcessingSpeed::Balanced => (5, ThresholdMethod::AdaptiveGaussian, 11, 2),
        ProcessingSpeed::High => (7, ThresholdMethod::AdaptiveGaussian, 15, 3),
        ProcessingSpeed::Maximum => (9, ThresholdMethod::Otsu, 19, 4),
    };

    match accuracy {
        AccuracyLevel::Low => {}
        AccuracyLevel::Medium => {
            if speed != ProcessingSpeed::Fast {
                threshold_method = ThresholdMethod::AdaptiveGaussian;
            }
        }
        AccuracyLevel::High => {
            if matches!(speed, ProcessingSpeed::High | ProcessingSpeed::Maximum) {
                threshold_method = ThresholdMethod::AdaptiveGaussian;
                block_size = block_size.max(13);
            }
        }
        AccuracyLevel::Maximum => {
            threshold_method = ThresholdMethod::Otsu;
            block_size = block_size.max(15);
            c_value = c_value.max(3);
        }
    }

    PreprocessingParams {
        blur_kernel,
        threshold_method,
        block_size,
        c_value,
        simple_thresh_value: DEFAULT_SIMPLE_THRESHOLD,
    }
}

pub fn resolve_tesseract(speed: ProcessingSpeed, accuracy: AccuracyLevel) -> TesseractParams {
    let page_seg_mode = match speed {
        ProcessingSpeed::Fast | ProcessingSpeed::Balanced => PageSegMode::SingleBlock,
        ProcessingSpeed::High => PageSegMode::Auto,
        ProcessingSpeed::Maximum => PageSegMode::AutoOsd,
    };

    let char_whitelist = match accuracy {
        AccuracyLevel::Maximum => Some(CharWhitelist::Alphanumeric),
        _ => None,
    };

    TesseractParams {
        page_seg_mode,
        char_whitelist,
    }
}

pub fn resolve_generation(speed: ProcessingSpeed, accuracy: AccuracyLevel) -> GenerationParams {
    let mut params = GenerationParams {
        num_beams: match speed {
            ProcessingSpeed::Fast => 1,
            ProcessingSpeed::Balanced => 3,
            ProcessingSpeed::High => 5,
            ProcessingSpeed::Maximum => 8,
        },
        max_length: BASE_MAX_LENGTH,
        early_stopping: true,
        sampling: None,
    };

    if speed == ProcessingSpeed::Maximum {
        params.sampling = Some(SamplingParams {
            temperature: 0.8,
            top_p: 0.9,
            top_k: 50,
        });
    }

    match accuracy {
        AccuracyLevel::Low => {}
        AccuracyLevel::Medium => {
            if speed != ProcessingSpeed::Fast {
                params.num_beams = params.num_beams.max(3);
            }
        }
        AccuracyLevel::High => {
            if matches!(speed, ProcessingSpeed::High | ProcessingSpeed::Maximum) {
                params.num_beams = params.num_beams.max(5);
                params.max_length = HIGH_ACCURACY_MAX_LENGTH;
            }
        }
        AccuracyLevel::Maximum => {
            params.num_beams = params.num_beams.max(8);
            params.max_length = MAXIMUM_ACCURACY_MAX_LENGTH;
            params.sampling = Some(SamplingParams {
                temperature: 0.7,
                top_p: 0.9,
                top_k: 50,
            });
        }
    }

    params
}
