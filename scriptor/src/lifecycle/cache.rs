use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::models::ModelType;

/// Tokenizer and image processor files every cached model must have.
pub const PROCESSOR_FILES: [&str; 3] = [
    "tokenizer.json",
    "tokenizer_config.json",
    "preprocessor_config.json",
];

/// Architecture and weight files every cached model must have.
pub const MODEL_FILES: [&str; 2] = ["config.json", "pytorch_model.bin"];

/// Prefix of in-flight download directories under the cache root.
pub const STAGING_PREFIX: &str = ".download-";

pub fn required_files() -> impl Iterator<Item = &'static str> {
    PROCESSOR_FILES.into_iter().chain(MODEL_FILES)
}

/// Files from [`required_files`] that are missing under `dir`.
pub fn missing_files(dir: &Path) -> Vec<&'static str> {
    required_files()
        .filter(|name| !dir.join(name).is_file())
        .collect()
}

/// On-disk layout of downloaded models: one `trocr-{model_type}` directory
/// per model under a common root.
#[derive(Debug, Clone)]
pub struct ModelCache {
    root: PathBuf,
}

impl ModelCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn model_dir(&self, model_type: ModelType) -> PathBuf {
        self.root.join(model_type.cache_dir_name())
    }

    /// A model is present only when every required file exists.
    pub fn is_present(&self, model_type: ModelType) -> bool {
        missing_files(&self.model_dir(model_type)).is_empty()
    }

    pub fn installed(&self) -> Vec<ModelType> {
        ModelType::ALL
            .into_iter()
            .filter(|model_type| self.is_present(*model_type))
            .collect()
    }

    /// Deletes the model directory. Returns whether anything was removed.
    pub async fn remove(&self, model_type: ModelType) -> std::io::Result<bool> {
        let dir = self.model_dir(model_type);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(path = %dir.display(), "Removed cached model directory");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Removes staging directories left behind by a process that died
    /// mid-download. Returns how many were removed.
    pub async fn sweep_stale_staging(&self) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(_) => return 0,
        };

        let mut removed = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with(STAGING_PREFIX) {
                continue;
            }
            match tokio::fs::remove_dir_all(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(
                    path = %entry.path().display(),
                    "Failed to remove stale download directory: {}", e
                ),
            }
        }
        removed
    }
}
