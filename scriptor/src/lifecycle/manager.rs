use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::error::{Result, ScriptorError};
use crate::models::{catalog, ModelDescriptor, ModelType};

use super::cache::ModelCache;
use super::download::ModelDownloader;
use super::state::{ModelHandle, ModelLoader, ModelState};

pub const NO_CACHE_MESSAGE: &str = "No cache to clear";
pub const CACHE_CLEARED_MESSAGE: &str = "Cache cleared";

#[derive(Debug, Clone, Serialize)]
pub struct InstalledModel {
    #[serde(flatten)]
    pub descriptor: ModelDescriptor,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    Removed,
    NothingToClear,
}

impl ClearOutcome {
    pub fn message(self) -> &'static str {
        match self {
            ClearOutcome::Removed => CACHE_CLEARED_MESSAGE,
            ClearOutcome::NothingToClear => NO_CACHE_MESSAGE,
        }
    }
}

/// State readers see; updated only while `lifecycle` is held.
struct Resident {
    state: ModelState,
    handle: Option<ModelHandle>,
}

/// Owns the neural model cache, its downloads and the one resident model.
///
/// Lifecycle mutations (download, load, force-reload, clear) are serialized
/// by an async mutex. Status readers only take a short read lock on the
/// resident slot and never wait behind a download or load.
///
/// A load that outlives `load_timeout` fails its caller at once, but the mutex
/// stays held until the blocking load returns, so a retry never builds a
/// second model next to it.
pub struct ModelManager {
    cache: ModelCache,
    downloader: Arc<dyn ModelDownloader>,
    loader: Arc<dyn ModelLoader>,
    load_timeout: Duration,
    lifecycle: Arc<Mutex<()>>,
    resident: RwLock<Resident>,
}

impl ModelManager {
    pub fn new(
        cache: ModelCache,
        downloader: Arc<dyn ModelDownloader>,
        loader: Arc<dyn ModelLoader>,
        load_timeout: Duration,
    ) -> Self {
        let (device, device_label) = loader.preferred_device();
        Self {
            cache,
            downloader,
            loader,
            load_timeout,
            lifecycle: Arc::new(Mutex::new(())),
            resident: RwLock::new(Resident {
                state: ModelState::new(device, device_label),
                handle: None,
            }),
        }
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    pub fn status(&self) -> ModelState {
        self.read(|resident| resident.state.clone())
    }

    pub fn available_models(&self) -> Vec<ModelDescriptor> {
        catalog()
    }

    pub fn installed_models(&self) -> Vec<InstalledModel> {
        self.cache
            .installed()
            .into_iter()
            .map(|model_type| InstalledModel {
                descriptor: model_type.descriptor(),
                path: self.cache.model_dir(model_type),
            })
            .collect()
    }

    pub fn is_present(&self, model_type: ModelType) -> bool {
        self.cache.is_present(model_type)
    }

    /// The resident handle, if it is `model_type`. Never waits on a lifecycle
    /// operation.
    pub fn loaded_handle(&self, model_type: ModelType) -> Option<ModelHandle> {
        self.read(|resident| {
            resident
                .handle
                .as_ref()
                .filter(|handle| handle.model_type() == model_type)
                .cloned()
        })
    }

    /// Returns a handle to `model_type`, downloading and loading it first when
    /// needed. Loading a different type evicts the resident one.
    pub async fn ensure_loaded(&self, model_type: ModelType) -> Result<ModelHandle> {
        if let Some(handle) = self.loaded_handle(model_type) {
            return Ok(handle);
        }

        let guard = Arc::clone(&self.lifecycle).lock_owned().await;
        // Another request may have loaded it while this one waited.
        if let Some(handle) = self.loaded_handle(model_type) {
            return Ok(handle);
        }
        self.load_locked(guard, model_type).await
    }

    /// Discards the resident model and loads `model_type` again. With `refetch`
    /// the cached files are deleted first, forcing a fresh download.
    pub async fn force_reload(&self, model_type: ModelType, refetch: bool) -> Result<ModelHandle> {
        let guard = Arc::clone(&self.lifecycle).lock_owned().await;
        info!(model_type = %model_type, refetch, "Force reloading model");

        self.evict(format!("Reloading {model_type}..."));
        if refetch {
            self.cache.remove(model_type).await?;
        }
        self.load_locked(guard, model_type).await
    }

    /// Deletes the cached files of `model_type`. Clearing an absent cache is
    /// not an error.
    pub async fn clear_cache(&self, model_type: ModelType) -> Result<ClearOutcome> {
        let _guard = self.lifecycle.lock().await;

        if !self.cache.remove(model_type).await? {
            return Ok(ClearOutcome::NothingToClear);
        }

        self.evict(format!(
            "{CACHE_CLEARED_MESSAGE} - {model_type} will be downloaded on next use"
        ));
        info!(model_type = %model_type, "Model cache cleared");
        Ok(ClearOutcome::Removed)
    }

    async fn load_locked(
        &self,
        guard: OwnedMutexGuard<()>,
        model_type: ModelType,
    ) -> Result<ModelHandle> {
        let model_dir = self.cache.model_dir(model_type);

        if !self.cache.is_present(model_type) {
            self.set_status(format!("Downloading {model_type}..."));
            if let Err(failure) = self.downloader.download(model_type, &model_dir).await {
                warn!(model_type = %model_type, kind = ?failure.kind, "Model download failed: {}", failure);
                self.set_status(format!("Error: {failure}"));
                return Err(failure.into());
            }
        }

        self.evict(format!("Loading {model_type}..."));
        info!(model_type = %model_type, path = %model_dir.display(), "Loading model");
        let started = Instant::now();

        let loader = Arc::clone(&self.loader);
        let mut task = tokio::task::spawn_blocking(move || loader.load(model_type, &model_dir));
        let outcome = match tokio::time::timeout(self.load_timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(ScriptorError::ModelLoad(format!(
                "Model loading task failed: {e}"
            ))),
            Err(_) => {
                // The blocking load cannot be cancelled; hold the lock until it
                // returns and drop whatever it built.
                tokio::spawn(async move {
                    match task.await {
                        Ok(Ok(_)) => debug!(model_type = %model_type, "Discarded model that loaded after its timeout"),
                        Ok(Err(e)) => debug!(model_type = %model_type, "Timed-out model load failed: {}", e),
                        Err(e) => debug!(model_type = %model_type, "Timed-out model load task failed: {}", e),
                    }
                    drop(guard);
                });
                Err(ScriptorError::ModelLoad(format!(
                    "Model loading timed out after {} seconds",
                    self.load_timeout.as_secs()
                )))
            }
        };

        let loaded = match outcome {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(model_type = %model_type, "Model load failed: {}", e);
                self.set_status(format!("Error: {e}"));
                return Err(e);
            }
        };

        let handle = ModelHandle::new(model_type, loaded.device, loaded.generator);
        let status = format!("Ready - {model_type} - Using {}", loaded.device_label);
        self.write(|resident| {
            resident.handle = Some(handle.clone());
            resident.state = ModelState {
                loaded: true,
                current_model_type: Some(model_type),
                status: status.clone(),
                device: loaded.device,
                device_label: loaded.device_label.clone(),
                loaded_at: Some(Utc::now()),
            };
        });

        info!(
            model_type = %model_type,
            device = %loaded.device_label,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Model loaded"
        );
        Ok(handle)
    }

    fn evict(&self, status: String) {
        self.write(|resident| {
            resident.handle = None;
            resident.state.unload(status);
        });
    }

    fn set_status(&self, status: String) {
        self.write(|resident| resident.state.status = status);
    }

    fn read<T>(&self, f: impl FnOnce(&Resident) -> T) -> T {
        let guard = self.resident.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write(&self, f: impl FnOnce(&mut Resident)) {
        let mut guard = self
            .resident
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}
