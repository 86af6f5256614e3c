use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scriptor::api::{create_router, AppState};
use scriptor::config::Config;
use scriptor::lifecycle::{ModelCache, ModelManager, ProcessDownloader};
use scriptor::models::ModelType;
use scriptor::ocr::{CandleTrocrLoader, TesseractEngine, TrocrEngine};
use scriptor::services::ExtractionService;

#[derive(Parser)]
#[command(name = "scriptor")]
#[command(about = "Self-hostable handwriting and print OCR service")]
struct Args {
    /// Bind address, overrides SCRIPTOR_HOST
    #[arg(long)]
    host: Option<String>,

    /// Bind port, overrides SCRIPTOR_PORT
    #[arg(long)]
    port: Option<u16>,

    /// Download and load this model in the background at startup
    #[arg(long, value_name = "MODEL_TYPE")]
    preload: Option<ModelType>,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "scriptor=info,tower_http=info".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();
    init_tracing();

    let mut config = Config::from_env();
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    if config.server.api_keys.is_empty() {
        tracing::warn!(
            "SCRIPTOR_API_KEYS is not set - model management endpoints are open to every caller"
        );
    }

    let cancel_token = CancellationToken::new();

    tracing::info!("Initializing Tesseract ({})...", config.ocr.languages);
    let tesseract = TesseractEngine::new(&config.ocr);
    if let Some(reason) = tesseract.unavailable_reason() {
        tracing::warn!("Tesseract unavailable - TrOCR fallback disabled: {}", reason);
    }

    tracing::info!(
        cache_dir = %config.trocr.cache_dir.display(),
        default_model = %config.trocr.default_model,
        "Initializing TrOCR model manager..."
    );
    let cache = ModelCache::new(&config.trocr.cache_dir);
    let swept = cache.sweep_stale_staging().await;
    if swept > 0 {
        tracing::info!("Removed {} interrupted download(s) from the cache", swept);
    }

    let manager = Arc::new(ModelManager::new(
        cache,
        Arc::new(ProcessDownloader::from_config(
            &config.trocr,
            cancel_token.child_token(),
        )),
        Arc::new(CandleTrocrLoader::new(config.trocr.use_gpu)),
        Duration::from_secs(config.trocr.load_timeout_secs),
    ));

    let extraction = ExtractionService::new(
        tesseract,
        TrocrEngine::new(Arc::clone(&manager), config.ocr.timeout_secs),
        config.trocr.default_model,
    );

    if let Some(model_type) = args.preload {
        tracing::info!("Preloading TrOCR model {} in the background...", model_type);
        let manager = Arc::clone(&manager);
        let token = cancel_token.child_token();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("Preload cancelled");
                }
                result = manager.ensure_loaded(model_type) => {
                    if let Err(e) = result {
                        tracing::error!("Preloading {} failed: {}", model_type, e);
                    }
                }
            }
        });
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = create_router(AppState::new(config, extraction));

    tracing::info!("Scriptor starting on http://{}", addr);
    tracing::info!("  Health check: http://{}/api/v1/health", addr);
    tracing::info!("  API docs:     http://{}/api/v1/docs", addr);
    tracing::info!("  OpenAPI document: http://{}/api/v1/openapi.json", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token))
        .await?;

    Ok(())
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, cancelling downloads and preloads...");
    cancel_token.cancel();
}
