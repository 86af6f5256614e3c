use thiserror::Error;

use crate::lifecycle::DownloadFailure;

#[derive(Error, Debug)]
pub enum ScriptorError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Model load error: {0}")]
    ModelLoad(String),

    #[error("Model download failed: {0}")]
    Download(#[from] DownloadFailure),

    #[error("Preprocessing error: {0}")]
    Preprocessing(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ScriptorError>;
