//! Install Queue Executor
//!
//! Runs an install queue strictly in order: download the artifact, stage it in
//! the host VFS, then ask the host to install it. The first failure aborts the
//! run. Progress is reported through a [`ProgressSink`] so the caller decides
//! where events go (actor mailbox, channel, test buffer).
//!
//! Progress layout for item `i` of `total`: the item owns the band starting at
//! `20 + i/total * 80`. Download advances through the first `40/total` of the
//! band; the install step starts at `base + 40/total`.

use std::sync::Arc;

use crate::catalog::PackageDescriptor;
use crate::host::PackageHost;

/// Percentage at which execution starts (after confirmation)
pub const EXECUTION_START_PERCENT: f64 = 20.0;

/// Share of the progress bar covered by the queue
const EXECUTION_SPAN_PERCENT: f64 = 80.0;

/// Share of each item's band spent downloading, before scaling by queue length
const DOWNLOAD_SPAN_PERCENT: f64 = 40.0;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum InstallError {
    #[error("Failed to download {name}: {reason}")]
    Download { name: String, reason: String },

    #[error("Failed to write {path} to VFS: {reason}")]
    Stage { path: String, reason: String },

    #[error("Failed to install {name}: {reason}")]
    Install { name: String, reason: String },
}

/// Observable steps of a run
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    /// An item's download/install step began
    ItemStarted { name: String },
    Progress { percent: f64, status: String },
    Log(String),
    /// An item was installed at `version`
    ItemInstalled { name: String, version: String },
}

/// Receiver of [`ExecutionEvent`]s
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ExecutionEvent);
}

impl ProgressSink for tokio::sync::mpsc::UnboundedSender<ExecutionEvent> {
    fn emit(&self, event: ExecutionEvent) {
        if self.send(event).is_err() {
            tracing::debug!("Progress receiver dropped");
        }
    }
}

/// Where staged archives are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingConfig {
    /// VFS prefix, e.g. `tmp:/`
    pub prefix: String,
    /// Archive extension without the dot
    pub extension: String,
}

impl StagingConfig {
    /// Full VFS path for a package's archive
    pub fn path_for(&self, pkg: &PackageDescriptor) -> String {
        format!("{}{}", self.prefix, pkg.staged_file_name(&self.extension))
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            prefix: "tmp:/".to_string(),
            extension: "wpk".to_string(),
        }
    }
}

/// Start of item `index`'s progress band
pub fn item_base_percent(index: usize, total: usize) -> f64 {
    EXECUTION_START_PERCENT + (index as f64 / total as f64) * EXECUTION_SPAN_PERCENT
}

pub struct QueueExecutor {
    client: reqwest::Client,
    host: Arc<dyn PackageHost>,
    staging: StagingConfig,
}

impl QueueExecutor {
    pub fn new(client: reqwest::Client, host: Arc<dyn PackageHost>, staging: StagingConfig) -> Self {
        Self {
            client,
            host,
            staging,
        }
    }

    /// Install every package of `queue` in order
    pub async fn run(
        &self,
        queue: &[PackageDescriptor],
        sink: &dyn ProgressSink,
    ) -> Result<(), InstallError> {
        let total = queue.len();
        for (index, pkg) in queue.iter().enumerate() {
            let base = item_base_percent(index, total);
            self.install_one(pkg, base, total, sink).await?;
        }
        Ok(())
    }

    async fn install_one(
        &self,
        pkg: &PackageDescriptor,
        base: f64,
        total: usize,
        sink: &dyn ProgressSink,
    ) -> Result<(), InstallError> {
        sink.emit(ExecutionEvent::ItemStarted {
            name: pkg.name.clone(),
        });
        let status = format!("Downloading {}...", pkg.name);
        sink.emit(ExecutionEvent::Progress {
            percent: base,
            status: status.clone(),
        });
        sink.emit(ExecutionEvent::Log(status));

        let url = pkg.download_url();
        tracing::info!(package = %pkg.name, version = %pkg.version, url = %url, "Downloading package");
        let bytes = self.download(pkg, &url, base, total, sink).await?;

        let path = self.staging.path_for(pkg);
        sink.emit(ExecutionEvent::Log(format!(
            "Writing {} to VFS...",
            pkg.staged_file_name(&self.staging.extension)
        )));
        self.host
            .write_file(&path, bytes)
            .await
            .map_err(|e| InstallError::Stage {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let status = format!("Installing {}...", pkg.name);
        sink.emit(ExecutionEvent::Progress {
            percent: base + DOWNLOAD_SPAN_PERCENT / total as f64,
            status: status.clone(),
        });
        sink.emit(ExecutionEvent::Log(status));

        let response = self
            .host
            .install_package(&path)
            .await
            .map_err(|e| InstallError::Install {
                name: pkg.name.clone(),
                reason: e.to_string(),
            })?;
        if !response.success {
            return Err(InstallError::Install {
                name: pkg.name.clone(),
                reason: response
                    .error
                    .unwrap_or_else(|| "Unknown error".to_string()),
            });
        }

        tracing::info!(package = %pkg.name, version = %pkg.version, path = %path, "Package installed");
        sink.emit(ExecutionEvent::Log(format!(
            "Successfully installed {}.",
            pkg.name
        )));
        sink.emit(ExecutionEvent::ItemInstalled {
            name: pkg.name.clone(),
            version: pkg.version.clone(),
        });
        Ok(())
    }

    /// Fetch the artifact, streaming progress when the length is known
    async fn download(
        &self,
        pkg: &PackageDescriptor,
        url: &str,
        base: f64,
        total: usize,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<u8>, InstallError> {
        let failed = |reason: String| InstallError::Download {
            name: pkg.name.clone(),
            reason,
        };

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {}", status.as_u16())));
        }

        let Some(length) = response.content_length().filter(|len| *len > 0) else {
            let body = response.bytes().await.map_err(|e| failed(e.to_string()))?;
            return Ok(body.to_vec());
        };

        let span = DOWNLOAD_SPAN_PERCENT / total as f64;
        let status_line = format!("Downloading {}...", pkg.name);
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| failed(e.to_string()))? {
            bytes.extend_from_slice(&chunk);
            let fraction = (bytes.len() as f64 / length as f64).min(1.0);
            sink.emit(ExecutionEvent::Progress {
                percent: base + fraction * span,
                status: status_line.clone(),
            });
        }
        Ok(bytes)
    }
}
