//! Catalog state - package descriptors, installed index and repository list
//!
//! The catalog is rebuilt wholesale on every repository refresh. Duplicate names
//! coming from different repositories are kept as separate rows; lookups by name
//! return the first row.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

pub mod fetcher;

pub use fetcher::{FetchError, HttpRepositoryFetcher, ManifestEntry, RepositoryFetcher};

/// Repository used when nothing else is configured
pub const DEFAULT_REPOSITORY: &str =
    "https://raw.githubusercontent.com/Kaname-Fundation/KanameStore/refs/heads/live/repository.json";

/// Version recorded for host packages that do not report one
pub const FALLBACK_INSTALLED_VERSION: &str = "1.0.0";

static SCHEME_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").expect("valid regex"));

/// Whether `location` already carries a URL scheme
pub fn is_absolute_url(location: &str) -> bool {
    SCHEME_PREFIX.is_match(location)
}

/// Base path of a repository URL: everything before the last `/`
pub fn repository_base(repo_url: &str) -> String {
    match repo_url.rfind('/') {
        Some(idx) => repo_url[..idx].to_string(),
        None => String::new(),
    }
}

// ============================================================================
// Package Descriptor
// ============================================================================

/// A package as advertised by one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    pub name: String,
    pub version: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub icon: Option<String>,
    pub icon_name: Option<String>,
    pub download: String,
    pub dependencies: Vec<String>,
    /// Repository this descriptor was fetched from
    pub repo_url: String,
    /// `repo_url` truncated to its last path separator
    pub repo_base: String,
}

impl PackageDescriptor {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        download: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            title: None,
            description: None,
            category: None,
            icon: None,
            icon_name: None,
            download: download.into(),
            dependencies: Vec::new(),
            repo_url: String::new(),
            repo_base: String::new(),
        }
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Tag the descriptor with its source repository
    pub fn with_repository(mut self, repo_url: impl Into<String>) -> Self {
        let repo_url = repo_url.into();
        self.repo_base = repository_base(&repo_url);
        self.repo_url = repo_url;
        self
    }

    fn resolve(&self, location: &str) -> String {
        if is_absolute_url(location) {
            location.to_string()
        } else {
            format!("{}/{}", self.repo_base, location)
        }
    }

    /// Effective artifact URL
    pub fn download_url(&self) -> String {
        self.resolve(&self.download)
    }

    pub fn icon_url(&self) -> Option<String> {
        self.icon.as_deref().map(|icon| self.resolve(icon))
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    /// Staging file name, e.g. `Editor-1.2.0.wpk`
    pub fn staged_file_name(&self, extension: &str) -> String {
        format!("{}-{}.{}", self.name, self.version, extension)
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Concatenated descriptors from every configured repository
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    packages: Vec<PackageDescriptor>,
}

impl Catalog {
    pub fn new(packages: Vec<PackageDescriptor>) -> Self {
        Self { packages }
    }

    /// First row with this name
    pub fn find(&self, name: &str) -> Option<&PackageDescriptor> {
        self.packages.iter().find(|pkg| pkg.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageDescriptor> {
        self.packages.iter()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Rows whose name or description contains `query`, ignoring case
    pub fn filtered<'a>(&'a self, query: &str) -> Vec<&'a PackageDescriptor> {
        let query = query.to_lowercase();
        self.packages
            .iter()
            .filter(|pkg| {
                pkg.name.to_lowercase().contains(&query)
                    || pkg
                        .description
                        .as_deref()
                        .unwrap_or_default()
                        .to_lowercase()
                        .contains(&query)
            })
            .collect()
    }
}

// ============================================================================
// Installed Index
// ============================================================================

/// Point-in-time view of what the host has installed: name -> version
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstalledIndex {
    versions: BTreeMap<String, String>,
}

impl InstalledIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the host's package list, skipping unnamed entries
    pub fn from_host(packages: &[shared_types::HostPackage]) -> Self {
        let versions = packages
            .iter()
            .filter_map(|pkg| {
                let name = pkg.name.as_deref().filter(|name| !name.is_empty())?;
                let version = pkg
                    .version
                    .clone()
                    .filter(|version| !version.is_empty())
                    .unwrap_or_else(|| FALLBACK_INSTALLED_VERSION.to_string());
                Some((name.to_string(), version))
            })
            .collect();
        Self { versions }
    }

    pub fn version_of(&self, name: &str) -> Option<&str> {
        self.versions.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.versions.contains_key(name)
    }

    pub fn record(&mut self, name: impl Into<String>, version: impl Into<String>) {
        self.versions.insert(name.into(), version.into());
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for InstalledIndex {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        Self {
            versions: iter
                .into_iter()
                .map(|(name, version)| (name.into(), version.into()))
                .collect(),
        }
    }
}

// ============================================================================
// Repository List
// ============================================================================

/// Ordered repository URLs; never empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryList {
    urls: Vec<String>,
}

impl RepositoryList {
    /// Trim and drop blank entries, falling back to `default` if none remain
    pub fn new<I, S>(urls: I, default: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_draft(urls).unwrap_or_else(|| Self {
            urls: vec![default.to_string()],
        })
    }

    /// Trim and drop blank entries; `None` if nothing is left
    pub fn from_draft<I, S>(urls: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let urls: Vec<String> = urls
            .into_iter()
            .map(|url| url.as_ref().trim().to_string())
            .filter(|url| !url.is_empty())
            .collect();
        if urls.is_empty() {
            None
        } else {
            Some(Self { urls })
        }
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }
}
