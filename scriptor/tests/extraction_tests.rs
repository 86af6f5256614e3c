mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use scriptor::error::ScriptorError;
use scriptor::models::{
    AccuracyLevel, EngineKind, EngineUsed, ModelType, PreprocessingParams, ProcessingSpeed,
    SpeedAccuracyPreset, ThresholdMethod,
};
use scriptor::ocr::TesseractEngine;
use scriptor::services::ExtractionRequest;

use common::{
    init_test_logger, install_model, manager, sample_page, service, CountingDownloader,
    FakeLoader, ScriptedRecognizer,
};

fn tesseract(text: &str, confidences: &[f32]) -> TesseractEngine {
    TesseractEngine::with_recognizer(ScriptedRecognizer::boxed(text, confidences), 30)
}

/// TrOCR with the service's default model.
fn neural_default() -> ExtractionRequest {
    ExtractionRequest {
        engine: EngineKind::Trocr,
        ..ExtractionRequest::default()
    }
}

fn neural(model_type: ModelType) -> ExtractionRequest {
    ExtractionRequest {
        engine: EngineKind::Trocr,
        model_type: Some(model_type),
        ..ExtractionRequest::default()
    }
}

#[tokio::test]
async fn tesseract_request_reports_mean_token_confidence() {
    init_test_logger();
    let tmp = TempDir::new().unwrap();
    let downloader = Arc::new(CountingDownloader::succeeding());
    let loader = Arc::new(FakeLoader::default());
    let svc = service(
        tesseract("  Invoice 42\n", &[90.0, -1.0, 80.0]),
        manager(tmp.path(), downloader.clone(), loader.clone()),
    );

    let request = ExtractionRequest {
        engine: EngineKind::Tesseract,
        ..ExtractionRequest::default()
    };
    let result = svc.extract(&sample_page(), &request).await.unwrap();

    assert_eq!(result.text, "Invoice 42");
    assert!((result.confidence - 0.85).abs() < 1e-6);
    assert_eq!(result.engine, EngineKind::Tesseract);
    assert_eq!(result.engine_used, EngineUsed::Primary);
    assert!(result.model_type.is_none());
    assert_eq!(downloader.call_count(), 0);
    assert_eq!(loader.load_count(), 0);
}

#[tokio::test]
async fn request_without_engine_uses_tesseract() {
    init_test_logger();
    let tmp = TempDir::new().unwrap();
    let downloader = Arc::new(CountingDownloader::succeeding());
    let loader = Arc::new(FakeLoader::default());
    let svc = service(
        tesseract("quick scan", &[75.0]),
        manager(tmp.path(), downloader.clone(), loader.clone()),
    );

    let result = svc
        .extract(&sample_page(), &ExtractionRequest::default())
        .await
        .unwrap();

    assert_eq!(result.text, "quick scan");
    assert_eq!(result.engine, EngineKind::Tesseract);
    assert_eq!(result.engine_used, EngineUsed::Primary);
    assert_eq!(downloader.call_count(), 0);
    assert_eq!(loader.load_count(), 0);
}

#[tokio::test]
async fn neural_request_uses_cached_model_without_downloading() {
    init_test_logger();
    let tmp = TempDir::new().unwrap();
    let downloader = Arc::new(CountingDownloader::succeeding());
    let loader = Arc::new(FakeLoader::default());
    let models = manager(tmp.path(), downloader.clone(), loader.clone());
    let model_type: ModelType = "base-handwritten".parse().unwrap();
    install_model(models.cache(), model_type);
    let svc = service(tesseract("unused", &[]), models);

    let result = svc.extract(&sample_page(), &neural(model_type)).await.unwrap();

    assert_eq!(result.text, "handwritten by base-handwritten");
    assert_eq!(result.engine, EngineKind::Trocr);
    assert_eq!(result.engine_used, EngineUsed::Primary);
    assert_eq!(result.model_type, Some(model_type));
    assert!(result.confidence > 0.0 && result.confidence <= 1.0);
    assert_eq!(downloader.call_count(), 0);

    // The resident model serves the next request without another load.
    svc.extract(&sample_page(), &neural(model_type)).await.unwrap();
    assert_eq!(loader.load_count(), 1);
}

#[tokio::test]
async fn missing_model_is_downloaded_then_loaded() {
    init_test_logger();
    let tmp = TempDir::new().unwrap();
    let downloader = Arc::new(CountingDownloader::succeeding());
    let loader = Arc::new(FakeLoader::default());
    let svc = service(
        tesseract("unused", &[]),
        manager(tmp.path(), downloader.clone(), loader.clone()),
    );

    let result = svc
        .extract(&sample_page(), &neural_default())
        .await
        .unwrap();

    assert_eq!(result.engine_used, EngineUsed::Primary);
    assert_eq!(result.model_type, Some(ModelType::default()));
    assert_eq!(downloader.call_count(), 1);
    assert_eq!(loader.load_count(), 1);
}

#[tokio::test]
async fn download_failure_falls_back_to_tesseract() {
    init_test_logger();
    let tmp = TempDir::new().unwrap();
    let downloader = Arc::new(CountingDownloader::failing());
    let loader = Arc::new(FakeLoader::default());
    let models = manager(tmp.path(), downloader.clone(), loader.clone());
    let svc = service(tesseract("printed fallback", &[70.0]), Arc::clone(&models));
    let model_type: ModelType = "small-printed".parse().unwrap();

    let result = svc.extract(&sample_page(), &neural(model_type)).await.unwrap();

    assert!(result.is_fallback());
    assert_eq!(result.text, "printed fallback");
    assert_eq!(result.engine, EngineKind::Tesseract);
    assert!(result.model_type.is_none());
    let reason = result.fallback_reason.expect("fallback reason");
    assert!(reason.contains("small-printed"), "{reason}");
    assert!(reason.contains("network unreachable"), "{reason}");

    let status = models.status();
    assert!(!status.loaded);
    assert!(status.status.starts_with("Error"), "{}", status.status);
    assert_eq!(loader.load_count(), 0);
}

#[tokio::test]
async fn load_failure_falls_back_to_tesseract() {
    init_test_logger();
    let tmp = TempDir::new().unwrap();
    let downloader = Arc::new(CountingDownloader::succeeding());
    let loader = Arc::new(FakeLoader::failing());
    let svc = service(
        tesseract("printed fallback", &[]),
        manager(tmp.path(), downloader, loader),
    );

    let result = svc
        .extract(&sample_page(), &neural_default())
        .await
        .unwrap();

    assert_eq!(result.engine_used, EngineUsed::Fallback);
    assert!(result
        .fallback_reason
        .as_deref()
        .unwrap_or_default()
        .contains("corrupt weights"));
    // No positive token confidence: the default applies.
    assert!((result.confidence - 0.95).abs() < 1e-6);
}

#[tokio::test]
async fn fallback_without_tesseract_names_both_causes() {
    init_test_logger();
    let tmp = TempDir::new().unwrap();
    let svc = service(
        TesseractEngine::unavailable("tessdata not found"),
        manager(
            tmp.path(),
            Arc::new(CountingDownloader::failing()),
            Arc::new(FakeLoader::default()),
        ),
    );

    let err = svc
        .extract(&sample_page(), &neural_default())
        .await
        .unwrap_err();

    match err {
        ScriptorError::EngineUnavailable(message) => {
            assert!(message.contains("network unreachable"), "{message}");
            assert!(message.contains("tessdata not found"), "{message}");
        }
        other => panic!("expected EngineUnavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn switching_models_keeps_one_resident() {
    init_test_logger();
    let tmp = TempDir::new().unwrap();
    let loader = Arc::new(FakeLoader::default());
    let models = manager(
        tmp.path(),
        Arc::new(CountingDownloader::succeeding()),
        loader.clone(),
    );
    let svc = service(tesseract("unused", &[]), Arc::clone(&models));
    let first: ModelType = "small-handwritten".parse().unwrap();
    let second: ModelType = "small-printed".parse().unwrap();

    svc.extract(&sample_page(), &neural(first)).await.unwrap();
    let result = svc.extract(&sample_page(), &neural(second)).await.unwrap();

    assert_eq!(result.text, "handwritten by small-printed");
    assert_eq!(loader.load_count(), 2);
    assert!(models.loaded_handle(first).is_none());
    assert!(models.loaded_handle(second).is_some());
    assert_eq!(models.status().current_model_type, Some(second));
}

#[tokio::test]
async fn invalid_override_is_rejected_before_recognition() {
    init_test_logger();
    let tmp = TempDir::new().unwrap();
    let loader = Arc::new(FakeLoader::default());
    let svc = service(
        tesseract("unused", &[]),
        manager(
            tmp.path(),
            Arc::new(CountingDownloader::succeeding()),
            loader.clone(),
        ),
    );

    let request = ExtractionRequest {
        preprocessing: Some(PreprocessingParams {
            threshold_method: ThresholdMethod::AdaptiveMean,
            block_size: 8,
            ..PreprocessingParams::default()
        }),
        ..neural_default()
    };
    let err = svc.extract(&sample_page(), &request).await.unwrap_err();

    assert!(matches!(err, ScriptorError::InvalidInput(_)), "{err:?}");
    assert_eq!(loader.load_count(), 0);
}

#[tokio::test]
async fn skipped_preprocessing_ignores_parameters() {
    init_test_logger();
    let tmp = TempDir::new().unwrap();
    let svc = service(
        tesseract("raw page", &[60.0]),
        manager(
            tmp.path(),
            Arc::new(CountingDownloader::succeeding()),
            Arc::new(FakeLoader::default()),
        ),
    );

    let request = ExtractionRequest {
        engine: EngineKind::Tesseract,
        preset: SpeedAccuracyPreset::new(ProcessingSpeed::Maximum, AccuracyLevel::Maximum),
        preprocessing: Some(PreprocessingParams {
            block_size: 8,
            ..PreprocessingParams::default()
        }),
        use_preprocessing: false,
        ..ExtractionRequest::default()
    };
    let result = svc.extract(&sample_page(), &request).await.unwrap();

    assert_eq!(result.text, "raw page");
}

#[tokio::test]
async fn preview_reports_effective_parameters() {
    init_test_logger();
    let tmp = TempDir::new().unwrap();
    let svc = service(
        tesseract("unused", &[]),
        manager(
            tmp.path(),
            Arc::new(CountingDownloader::succeeding()),
            Arc::new(FakeLoader::default()),
        ),
    );

    let request = ExtractionRequest {
        preset: SpeedAccuracyPreset::new(ProcessingSpeed::Fast, AccuracyLevel::Low),
        ..ExtractionRequest::default()
    };
    let preview = svc.preview(&sample_page(), &request).await.unwrap();

    assert!(preview.data_url.starts_with("data:image/png;base64,"));
    assert_eq!(preview.params, request.effective_preprocessing());
}
