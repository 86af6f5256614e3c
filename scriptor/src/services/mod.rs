mod extraction;

pub use extraction::{EngineStatus, ExtractionRequest, ExtractionService, PreviewResult};
