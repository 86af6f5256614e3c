use std::fmt;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::ModelType;
use crate::ocr::SequenceGenerator;

pub const NOT_LOADED_STATUS: &str = "Not loaded";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeDevice {
    #[default]
    Cpu,
    Gpu,
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeDevice::Cpu => write!(f, "CPU"),
            ComputeDevice::Gpu => write!(f, "GPU"),
        }
    }
}

/// Snapshot of the neural engine's lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelState {
    pub loaded: bool,
    pub current_model_type: Option<ModelType>,
    pub status: String,
    pub device: ComputeDevice,
    /// Backend name, e.g. `CUDA`, `METAL` or `CPU`.
    pub device_label: String,
    pub loaded_at: Option<DateTime<Utc>>,
}

impl ModelState {
    pub fn new(device: ComputeDevice, device_label: impl Into<String>) -> Self {
        Self {
            loaded: false,
            current_model_type: None,
            status: NOT_LOADED_STATUS.to_string(),
            device,
            device_label: device_label.into(),
            loaded_at: None,
        }
    }

    /// Drops back to "nothing resident" with the given status line.
    pub(crate) fn unload(&mut self, status: impl Into<String>) {
        self.loaded = false;
        self.current_model_type = None;
        self.loaded_at = None;
        self.status = status.into();
    }
}

/// Result of a successful [`ModelLoader::load`].
pub struct LoadedModel {
    pub generator: Box<dyn SequenceGenerator>,
    pub device: ComputeDevice,
    pub device_label: String,
}

/// Turns a complete cache directory into a ready generator. Blocking.
pub trait ModelLoader: Send + Sync {
    fn load(&self, model_type: ModelType, model_dir: &Path) -> Result<LoadedModel>;

    /// Device a load would land on, used before anything is loaded.
    fn preferred_device(&self) -> (ComputeDevice, String);
}

/// Shared reference to the resident model.
///
/// Cloning is cheap. A request holding a handle keeps the generator alive even
/// after the manager evicts or replaces it.
#[derive(Clone)]
pub struct ModelHandle {
    model_type: ModelType,
    device: ComputeDevice,
    generator: Arc<Mutex<Box<dyn SequenceGenerator>>>,
}

impl ModelHandle {
    pub fn new(
        model_type: ModelType,
        device: ComputeDevice,
        generator: Box<dyn SequenceGenerator>,
    ) -> Self {
        Self {
            model_type,
            device,
            generator: Arc::new(Mutex::new(generator)),
        }
    }

    pub fn model_type(&self) -> ModelType {
        self.model_type
    }

    pub fn device(&self) -> ComputeDevice {
        self.device
    }

    pub(crate) fn generator(&self) -> Arc<Mutex<Box<dyn SequenceGenerator>>> {
        Arc::clone(&self.generator)
    }

    /// Whether two handles share the same loaded generator.
    pub fn same_instance(&self, other: &ModelHandle) -> bool {
        Arc::ptr_eq(&self.generator, &other.generator)
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("model_type", &self.model_type)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}
