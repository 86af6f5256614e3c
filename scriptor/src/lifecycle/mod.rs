//! Neural model lifecycle: on-disk cache, download, load and hot-swap.

mod cache;
mod download;
mod manager;
mod state;

pub use cache::{missing_files, required_files, ModelCache, MODEL_FILES, PROCESSOR_FILES};
pub use download::{
    parse_args_template, DownloadFailure, DownloadFailureKind, ModelDownloader, ProcessDownloader,
    MANIFEST_ENV, MANIFEST_FILE,
};
pub use manager::{ClearOutcome, InstalledModel, ModelManager, NO_CACHE_MESSAGE};
pub use state::{ComputeDevice, LoadedModel, ModelHandle, ModelLoader, ModelState};
