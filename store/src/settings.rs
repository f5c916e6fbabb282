//! Repository settings persistence

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Settings I/O error at {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Invalid settings file {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("Failed to encode settings: {0}")]
    Encode(String),
}

impl From<toml::ser::Error> for SettingsError {
    fn from(e: toml::ser::Error) -> Self {
        SettingsError::Encode(e.to_string())
    }
}

/// Where the committed repository list lives between runs
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Stored repository URLs; empty when nothing has been saved yet
    async fn load_repositories(&self) -> Result<Vec<String>, SettingsError>;

    async fn save_repositories(&self, repositories: &[String]) -> Result<(), SettingsError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreSettings {
    #[serde(default)]
    repositories: Vec<String>,
}

// ============================================================================
// File-backed settings
// ============================================================================

/// TOML file holding `repositories = [...]`
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, e: std::io::Error) -> SettingsError {
        SettingsError::Io {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn load_repositories(&self) -> Result<Vec<String>, SettingsError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No settings file yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let settings: StoreSettings = toml::from_str(&raw).map_err(|e| SettingsError::Parse {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(settings.repositories)
    }

    async fn save_repositories(&self, repositories: &[String]) -> Result<(), SettingsError> {
        let encoded = toml::to_string(&StoreSettings {
            repositories: repositories.to_vec(),
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        tokio::fs::write(&self.path, encoded)
            .await
            .map_err(|e| self.io_error(e))?;

        tracing::info!(
            path = %self.path.display(),
            count = repositories.len(),
            "Repository settings saved"
        );
        Ok(())
    }
}

// ============================================================================
// In-memory settings
// ============================================================================

/// Settings that live only as long as the process
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    repositories: Mutex<Vec<String>>,
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load_repositories(&self) -> Result<Vec<String>, SettingsError> {
        Ok(self.repositories.lock().await.clone())
    }

    async fn save_repositories(&self, repositories: &[String]) -> Result<(), SettingsError> {
        *self.repositories.lock().await = repositories.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileSettingsStore::new(dir.path().join("absent.toml"));
        assert!(store.load_repositories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = FileSettingsStore::new(dir.path().join("nested/store-settings.toml"));
        let repos = vec![
            "https://a/repo.json".to_string(),
            "https://b/repo.json".to_string(),
        ];
        store.save_repositories(&repos).await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("repositories"));
        assert_eq!(store.load_repositories().await.unwrap(), repos);
    }

    #[tokio::test]
    async fn test_invalid_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store-settings.toml");
        std::fs::write(&path, "repositories = 42").unwrap();
        let err = FileSettingsStore::new(&path).load_repositories().await.unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_file_without_key_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store-settings.toml");
        std::fs::write(&path, "# nothing here\n").unwrap();
        assert!(FileSettingsStore::new(&path).load_repositories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemorySettingsStore::default();
        store.save_repositories(&["https://r/repo.json".to_string()]).await.unwrap();
        assert_eq!(store.load_repositories().await.unwrap(), vec!["https://r/repo.json"]);
    }
}
