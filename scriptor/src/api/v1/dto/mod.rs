//! Data transfer objects for the v1 API.
//!
//! Wire types are kept apart from the core types so the HTTP contract can
//! stay stable while the engines change.

mod models;
mod ocr;

pub use models::{
    ForceReloadRequest, InstalledModelResponse, ModelActionResponse, ModelRequest,
    ModelStatusResponse,
};
pub use ocr::{ExtractionResponse, OcrForm, OcrStatusResponse, PreprocessResponse};
