//! Repository Fetcher - retrieves and normalizes repository manifests
//!
//! Every configured repository is fetched independently. A repository that
//! fails (transport error, non-success status, unparseable body) is logged and
//! contributes nothing; it never aborts its siblings.

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;

use super::{repository_base, PackageDescriptor, RepositoryList};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("Repository {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Invalid manifest from {url}: {reason}")]
    Parse { url: String, reason: String },
}

/// One entry of a manifest's `apps` array
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub name: String,
    pub version: String,
    pub download: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub icon_name: Option<String>,
    /// `null` and a missing key both mean no dependencies
    #[serde(default)]
    pub dependencies: Option<Vec<String>>,
}

impl ManifestEntry {
    /// Attach repository provenance
    pub fn into_descriptor(self, repo_url: &str) -> PackageDescriptor {
        PackageDescriptor {
            name: self.name,
            version: self.version,
            title: self.title,
            description: self.description,
            category: self.category,
            icon: self.icon,
            icon_name: self.icon_name,
            download: self.download,
            dependencies: self.dependencies.unwrap_or_default(),
            repo_url: repo_url.to_string(),
            repo_base: repository_base(repo_url),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RepositoryManifest {
    #[serde(default)]
    apps: Option<Vec<serde_json::Value>>,
}

/// Parse a manifest body into descriptors tagged with `repo_url`
///
/// A missing or `null` `apps` array yields no packages. Individual entries that do not
/// decode are skipped with a warning.
pub fn parse_manifest(repo_url: &str, body: &[u8]) -> Result<Vec<PackageDescriptor>, FetchError> {
    let manifest: RepositoryManifest =
        serde_json::from_slice(body).map_err(|e| FetchError::Parse {
            url: repo_url.to_string(),
            reason: e.to_string(),
        })?;

    let apps = manifest.apps.unwrap_or_default();
    let mut packages = Vec::with_capacity(apps.len());
    for (index, raw) in apps.into_iter().enumerate() {
        match serde_json::from_value::<ManifestEntry>(raw) {
            Ok(entry) => packages.push(entry.into_descriptor(repo_url)),
            Err(e) => {
                tracing::warn!(
                    repository = %repo_url,
                    index,
                    error = %e,
                    "Skipping malformed manifest entry"
                );
            }
        }
    }
    Ok(packages)
}

/// Source of repository manifests
#[async_trait]
pub trait RepositoryFetcher: Send + Sync {
    /// Fetch one repository
    async fn fetch_repository(&self, repo_url: &str) -> Result<Vec<PackageDescriptor>, FetchError>;

    /// Fetch every repository concurrently and concatenate results in list order
    async fn fetch_all(&self, repositories: &RepositoryList) -> Vec<PackageDescriptor> {
        let results = join_all(
            repositories
                .urls()
                .iter()
                .map(|url| self.fetch_repository(url)),
        )
        .await;

        let mut packages = Vec::new();
        for (url, result) in repositories.urls().iter().zip(results) {
            match result {
                Ok(mut fetched) => {
                    tracing::debug!(repository = %url, count = fetched.len(), "Repository fetched");
                    packages.append(&mut fetched);
                }
                Err(e) => {
                    tracing::warn!(repository = %url, error = %e, "Failed to fetch repository");
                }
            }
        }
        packages
    }
}

/// Fetches manifests over plain HTTP GET
#[derive(Debug, Clone, Default)]
pub struct HttpRepositoryFetcher {
    client: reqwest::Client,
}

impl HttpRepositoryFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RepositoryFetcher for HttpRepositoryFetcher {
    async fn fetch_repository(&self, repo_url: &str) -> Result<Vec<PackageDescriptor>, FetchError> {
        let response = self
            .client
            .get(repo_url)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: repo_url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: repo_url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| FetchError::Transport {
            url: repo_url.to_string(),
            reason: e.to_string(),
        })?;

        parse_manifest(repo_url, &body)
    }
}
