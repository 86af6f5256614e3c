use serde::Deserialize;
use std::env;
use std::path::PathBuf;

use crate::lifecycle::parse_args_template;
use crate::models::ModelType;

const DEFAULT_DOWNLOAD_ARGS: &str = "download {repo} {files} --local-dir {dest}";

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_env_opt<T: std::str::FromStr>(var: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) if val.trim().is_empty() => None,
        Ok(val) => match val.parse() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Ignoring.", val, var, e);
                None
            }
        },
        Err(_) => None,
    }
}

/// Platform cache directory, falling back to a relative `.cache`.
fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("scriptor")
        .join("models")
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub ocr: OcrConfig,
    pub trocr: TrocrConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Keys accepted on admin endpoints. Empty leaves them open.
    pub api_keys: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    pub languages: String,
    pub data_path: Option<String>,
    pub timeout_secs: u64,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrocrConfig {
    pub cache_dir: PathBuf,
    pub default_model: ModelType,
    pub use_gpu: bool,
    pub download_program: String,
    pub download_args: Vec<String>,
    pub download_timeout_secs: u64,
    pub load_timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: "eng".to_string(),
            data_path: None,
            timeout_secs: 60,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

impl Default for TrocrConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_root(),
            default_model: ModelType::default(),
            use_gpu: true,
            download_program: "huggingface-cli".to_string(),
            download_args: parse_args_template(DEFAULT_DOWNLOAD_ARGS),
            download_timeout_secs: 300,
            load_timeout_secs: 600,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let ocr_defaults = OcrConfig::default();
        let trocr_defaults = TrocrConfig::default();

        Self {
            server: ServerConfig {
                host: env::var("SCRIPTOR_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or("SCRIPTOR_PORT", 3200),
                api_keys: env::var("SCRIPTOR_API_KEYS")
                    .map(|keys| {
                        keys.split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            ocr: OcrConfig {
                languages: env::var("TESSERACT_LANGUAGES").unwrap_or(ocr_defaults.languages),
                data_path: parse_env_opt("TESSERACT_DATA_PATH"),
                timeout_secs: parse_env_or("OCR_TIMEOUT_SECS", ocr_defaults.timeout_secs),
                max_upload_bytes: parse_env_or(
                    "OCR_MAX_IMAGE_BYTES",
                    ocr_defaults.max_upload_bytes,
                ),
            },
            trocr: TrocrConfig {
                cache_dir: parse_env_opt("TROCR_CACHE_DIR").unwrap_or(trocr_defaults.cache_dir),
                default_model: parse_env_or("TROCR_DEFAULT_MODEL", trocr_defaults.default_model),
                use_gpu: parse_env_or("TROCR_USE_GPU", trocr_defaults.use_gpu),
                download_program: env::var("TROCR_DOWNLOAD_PROGRAM")
                    .unwrap_or(trocr_defaults.download_program),
                download_args: env::var("TROCR_DOWNLOAD_ARGS")
                    .map(|template| parse_args_template(&template))
                    .unwrap_or(trocr_defaults.download_args),
                download_timeout_secs: parse_env_or(
                    "TROCR_DOWNLOAD_TIMEOUT_SECS",
                    trocr_defaults.download_timeout_secs,
                ),
                load_timeout_secs: parse_env_or(
                    "TROCR_LOAD_TIMEOUT_SECS",
                    trocr_defaults.load_timeout_secs,
                ),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}
