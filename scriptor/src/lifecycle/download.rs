use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TrocrConfig;
use crate::models::ModelType;

use super::cache::{missing_files, required_files, STAGING_PREFIX};

/// Name of the request manifest written into the staging directory.
pub const MANIFEST_FILE: &str = "download-request.json";

/// Environment variable carrying the manifest path to the download program.
pub const MANIFEST_ENV: &str = "SCRIPTOR_DOWNLOAD_MANIFEST";

const OUTPUT_TAIL_BYTES: usize = 2048;
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadFailureKind {
    Timeout,
    Exit,
    Spawn,
    Interrupted,
    Incomplete,
    Io,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DownloadFailure {
    pub kind: DownloadFailureKind,
    pub message: String,
}

impl DownloadFailure {
    pub fn new(kind: DownloadFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn io(context: &str, err: std::io::Error) -> Self {
        Self::new(DownloadFailureKind::Io, format!("{context}: {err}"))
    }
}

/// Fetches every required file of a model into `destination`.
///
/// `destination` is the model's cache directory. On success all required files
/// exist there; on failure nothing partial may be left behind.
#[async_trait]
pub trait ModelDownloader: Send + Sync {
    async fn download(
        &self,
        model_type: ModelType,
        destination: &Path,
    ) -> std::result::Result<(), DownloadFailure>;
}

/// Contents of [`MANIFEST_FILE`].
#[derive(Debug, Serialize)]
struct DownloadRequest<'a> {
    model_type: String,
    repository_id: String,
    files: Vec<&'a str>,
    staging_dir: &'a Path,
    destination: &'a Path,
}

/// Downloads by running an external program with a hard timeout.
///
/// The program writes into a `.download-*` staging directory next to the cache
/// directory. Files are moved into place only after the program exits cleanly
/// and every required file is present.
pub struct ProcessDownloader {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    cancel: CancellationToken,
}

impl ProcessDownloader {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
            cancel,
        }
    }

    pub fn from_config(config: &TrocrConfig, cancel: CancellationToken) -> Self {
        Self::new(
            config.download_program.clone(),
            config.download_args.clone(),
            Duration::from_secs(config.download_timeout_secs),
            cancel,
        )
    }

    /// Substitutes `{repo}`, `{dest}`, `{manifest}` and `{model_type}` in each
    /// argument. A bare `{files}` argument expands to one argument per file.
    fn render_args(&self, model_type: ModelType, dest: &Path, manifest: &Path) -> Vec<String> {
        let repo = model_type.repository_id();
        let dest = dest.to_string_lossy();
        let manifest = manifest.to_string_lossy();
        let key = model_type.to_string();

        let mut rendered = Vec::with_capacity(self.args.len() + 4);
        for arg in &self.args {
            if arg == "{files}" {
                rendered.extend(required_files().map(str::to_string));
                continue;
            }
            rendered.push(
                arg.replace("{repo}", &repo)
                    .replace("{dest}", &dest)
                    .replace("{manifest}", &manifest)
                    .replace("{model_type}", &key),
            );
        }
        rendered
    }

    async fn run_program(
        &self,
        args: &[String],
        manifest: &Path,
    ) -> std::result::Result<(), DownloadFailure> {
        let mut child = tokio::process::Command::new(&self.program)
            .args(args)
            .env(MANIFEST_ENV, manifest)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DownloadFailure::new(
                    DownloadFailureKind::Spawn,
                    format!("Failed to start download program '{}': {e}", self.program),
                )
            })?;

        let stdout = tokio::spawn(read_tail(child.stdout.take()));
        let stderr = tokio::spawn(read_tail(child.stderr.take()));

        let status = tokio::select! {
            status = child.wait() => status.map_err(|e| DownloadFailure::io("Failed to wait for download program", e)),
            _ = tokio::time::sleep(self.timeout) => Err(DownloadFailure::new(
                DownloadFailureKind::Timeout,
                format!("Model download timed out after {}", humanize(self.timeout)),
            )),
            _ = self.cancel.cancelled() => Err(DownloadFailure::new(
                DownloadFailureKind::Interrupted,
                "Model download was interrupted",
            )),
        };

        let status = match status {
            Ok(status) => status,
            Err(failure) => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill download program: {}", e);
                }
                stdout.abort();
                stderr.abort();
                return Err(failure);
            }
        };

        let stdout_tail = drain(stdout).await;
        let stderr_tail = drain(stderr).await;

        if status.success() {
            return Ok(());
        }

        let code = status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        debug!(status = %code, stdout = %stdout_tail.trim(), "Download program failed");

        // Some downloaders report errors on stdout only.
        let detail = if stderr_tail.trim().is_empty() {
            stdout_tail.trim()
        } else {
            stderr_tail.trim()
        };
        let mut message = format!("Download program exited with status {code}");
        if !detail.is_empty() {
            message.push_str(": ");
            message.push_str(detail);
        }
        Err(DownloadFailure::new(DownloadFailureKind::Exit, message))
    }
}

#[async_trait]
impl ModelDownloader for ProcessDownloader {
    async fn download(
        &self,
        model_type: ModelType,
        destination: &Path,
    ) -> std::result::Result<(), DownloadFailure> {
        let cache_root = destination.parent().ok_or_else(|| {
            DownloadFailure::new(
                DownloadFailureKind::Io,
                format!("Cache directory {} has no parent", destination.display()),
            )
        })?;
        tokio::fs::create_dir_all(cache_root)
            .await
            .map_err(|e| DownloadFailure::io("Failed to create cache root", e))?;

        // Removed on drop, whichever way this function returns.
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(cache_root)
            .map_err(|e| DownloadFailure::io("Failed to create staging directory", e))?;
        let staged_model = staging.path().join("model");
        let manifest = staging.path().join(MANIFEST_FILE);

        let request = DownloadRequest {
            model_type: model_type.to_string(),
            repository_id: model_type.repository_id(),
            files: required_files().collect(),
            staging_dir: &staged_model,
            destination,
        };
        let body = serde_json::to_vec_pretty(&request).map_err(|e| {
            DownloadFailure::new(
                DownloadFailureKind::Io,
                format!("Failed to encode manifest: {e}"),
            )
        })?;
        tokio::fs::write(&manifest, body)
            .await
            .map_err(|e| DownloadFailure::io("Failed to write manifest", e))?;

        let args = self.render_args(model_type, &staged_model, &manifest);
        info!(
            model_type = %model_type,
            program = %self.program,
            timeout_secs = self.timeout.as_secs(),
            "Downloading model"
        );
        debug!(?args, "Download program arguments");

        self.run_program(&args, &manifest).await?;

        let missing = missing_files(&staged_model);
        if !missing.is_empty() {
            return Err(DownloadFailure::new(
                DownloadFailureKind::Incomplete,
                format!(
                    "Download finished but files are missing: {}",
                    missing.join(", ")
                ),
            ));
        }

        install(&staged_model, destination).await?;
        info!(model_type = %model_type, path = %destination.display(), "Model downloaded");
        Ok(())
    }
}

/// Moves a verified staging directory into its final location, replacing
/// whatever partial directory was there.
async fn install(staged: &Path, destination: &Path) -> std::result::Result<(), DownloadFailure> {
    match tokio::fs::remove_dir_all(destination).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(DownloadFailure::io("Failed to replace cache directory", e)),
    }
    tokio::fs::rename(staged, destination)
        .await
        .map_err(|e| DownloadFailure::io("Failed to move downloaded files", e))
}

/// Waits briefly for a pipe reader; a reader that does not finish yields
/// nothing.
async fn drain(reader: tokio::task::JoinHandle<String>) -> String {
    match tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, reader).await {
        Ok(Ok(tail)) => tail,
        Ok(Err(e)) => {
            debug!("Download output reader failed: {}", e);
            String::new()
        }
        Err(_) => {
            debug!("Download output reader did not finish in time");
            String::new()
        }
    }
}

/// Reads a child pipe to the end and keeps the last few bytes.
async fn read_tail<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let Some(mut pipe) = pipe else {
        return String::new();
    };
    let mut tail: Vec<u8> = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match pipe.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                tail.extend_from_slice(&buf[..n]);
                if tail.len() > OUTPUT_TAIL_BYTES {
                    let excess = tail.len() - OUTPUT_TAIL_BYTES;
                    tail.drain(..excess);
                }
            }
        }
    }
    String::from_utf8_lossy(&tail).into_owned()
}

fn humanize(duration: Duration) -> String {
    let secs = duration.as_secs();
    match secs {
        0 => format!("{} ms", duration.as_millis()),
        60 => "1 minute".to_string(),
        s if s % 60 == 0 => format!("{} minutes", s / 60),
        1 => "1 second".to_string(),
        s => format!("{s} seconds"),
    }
}

/// Splits a whitespace-separated argument template.
pub fn parse_args_template(template: &str) -> Vec<String> {
    template.split_whitespace().map(str::to_string).collect()
}
