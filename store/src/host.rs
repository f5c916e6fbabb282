//! Host capabilities - package manager, VFS staging and user notifications
//!
//! The Store never touches the host directly; everything goes through these
//! traits so the executor and actor can be driven against a fake host in tests.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use shared_types::{HostPackage, InstallRequest, InstallResponse};

const PACKAGES_PATH: &str = "/packages";
const VFS_WRITE_PATH: &str = "/vfs/writefile";
const INSTALL_PATH: &str = "/packages/install";

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("Host request to {endpoint} failed: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("Host returned HTTP {status} for {endpoint}")]
    Status { endpoint: String, status: u16 },

    #[error("Invalid host response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },
}

/// Package manager and virtual filesystem of the host platform
#[async_trait]
pub trait PackageHost: Send + Sync {
    /// Packages currently installed on the host
    async fn installed_packages(&self) -> Result<Vec<HostPackage>, HostError>;

    /// Write `bytes` to a VFS path such as `tmp:/Editor-1.0.wpk`
    async fn write_file(&self, path: &str, bytes: Vec<u8>) -> Result<(), HostError>;

    /// Install the archive previously written to `vfs_path`
    async fn install_package(&self, vfs_path: &str) -> Result<InstallResponse, HostError>;
}

/// User-facing notifications and alert dialogs
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, message: &str);
    async fn alert(&self, title: &str, message: &str);
}

/// Notifier that only emits log records
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, title: &str, message: &str) {
        tracing::info!(title = %title, message = %message, "Notification");
    }

    async fn alert(&self, title: &str, message: &str) {
        tracing::warn!(title = %title, message = %message, "Alert");
    }
}

// ============================================================================
// HTTP host
// ============================================================================

/// Host reached over its REST endpoints
#[derive(Debug, Clone)]
pub struct HttpPackageHost {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPackageHost {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn transport(endpoint: &str, e: reqwest::Error) -> HostError {
        HostError::Transport {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl PackageHost for HttpPackageHost {
    async fn installed_packages(&self) -> Result<Vec<HostPackage>, HostError> {
        let endpoint = self.endpoint(PACKAGES_PATH);
        let response = self
            .client
            .get(&endpoint)
            .send()
            .await
            .map_err(|e| Self::transport(&endpoint, e))?;

        if !response.status().is_success() {
            return Err(HostError::Status {
                endpoint,
                status: response.status().as_u16(),
            });
        }

        response
            .json::<Vec<HostPackage>>()
            .await
            .map_err(|e| HostError::Decode {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })
    }

    async fn write_file(&self, path: &str, bytes: Vec<u8>) -> Result<(), HostError> {
        let endpoint = self.endpoint(VFS_WRITE_PATH);
        let file_name = path.rsplit(|c| c == '/' || c == ':').next().unwrap_or(path).to_string();
        let form = Form::new()
            .part("upload", Part::bytes(bytes).file_name(file_name))
            .text("path", path.to_string());

        let response = self
            .client
            .post(&endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Self::transport(&endpoint, e))?;

        if !response.status().is_success() {
            return Err(HostError::Status {
                endpoint,
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    async fn install_package(&self, vfs_path: &str) -> Result<InstallResponse, HostError> {
        let endpoint = self.endpoint(INSTALL_PATH);
        let response = self
            .client
            .post(&endpoint)
            .json(&InstallRequest {
                vfs_path: vfs_path.to_string(),
            })
            .send()
            .await
            .map_err(|e| Self::transport(&endpoint, e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| Self::transport(&endpoint, e))?;

        // Hosts may report install failures with an error status and a JSON body
        match serde_json::from_slice::<InstallResponse>(&body) {
            Ok(result) => Ok(result),
            Err(_) if !status.is_success() => Err(HostError::Status {
                endpoint,
                status: status.as_u16(),
            }),
            Err(e) => Err(HostError::Decode {
                endpoint,
                reason: e.to_string(),
            }),
        }
    }
}
