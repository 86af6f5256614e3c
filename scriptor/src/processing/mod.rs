mod filters;
mod pipeline;
mod preset;
mod threshold;

pub use filters::gaussian_blur;
pub use pipeline::{encode_png, preprocess, preview_data_url};
pub use preset::{
    resolve, resolve_generation, resolve_preprocessing, resolve_preset, resolve_tesseract,
};
pub use threshold::{adaptive_threshold, otsu_level, otsu_threshold, simple_threshold, AdaptiveWeighting};
