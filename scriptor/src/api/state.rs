use std::sync::Arc;

use crate::config::Config;
use crate::lifecycle::ModelManager;
use crate::services::ExtractionService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub extraction: ExtractionService,
    pub models: Arc<ModelManager>,
}

impl AppState {
    pub fn new(config: Config, extraction: ExtractionService) -> Self {
        let models = Arc::clone(extraction.trocr().manager());
        Self {
            config: Arc::new(config),
            extraction,
            models,
        }
    }
}
