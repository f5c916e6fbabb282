use std::path::PathBuf;

use crate::catalog::DEFAULT_REPOSITORY;
use crate::installer::StagingConfig;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Port the Store API listens on
    pub port: u16,
    /// Base URL of the host platform (package manager and VFS endpoints)
    pub host_base_url: String,
    /// Repository used when none are configured
    pub default_repository: String,
    /// Settings file for the repository list; `None` keeps it in memory
    pub settings_path: Option<PathBuf>,
    /// Where downloaded archives are staged before install
    pub staging: StagingConfig,
    /// Fetch the catalog at startup
    pub fetch_on_start: bool,
    /// Origins allowed by CORS
    pub allowed_origins: Vec<String>,
}

impl StoreConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let settings_path = env_str("STORE_SETTINGS_PATH", "./data/store-settings.toml");
        let settings_path = if settings_path.trim().is_empty() {
            None
        } else {
            Some(PathBuf::from(settings_path))
        };

        let default_repository = env_str("STORE_DEFAULT_REPOSITORY", DEFAULT_REPOSITORY);
        if default_repository.trim().is_empty() {
            anyhow::bail!("STORE_DEFAULT_REPOSITORY must not be empty");
        }

        Ok(Self {
            port: env_parse("STORE_PORT", 8090)?,
            host_base_url: env_str("STORE_HOST_BASE_URL", "http://127.0.0.1:8000"),
            default_repository,
            settings_path,
            staging: StagingConfig {
                prefix: env_str("STORE_STAGING_PREFIX", "tmp:/"),
                extension: env_str("STORE_ARCHIVE_EXTENSION", "wpk")
                    .trim_start_matches('.')
                    .to_string(),
            },
            fetch_on_start: env_flag("STORE_FETCH_ON_START", true),
            allowed_origins: env_csv(
                "STORE_ALLOWED_ORIGINS",
                &["http://localhost:3000", "http://127.0.0.1:3000"],
            ),
        })
    }
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Failed to parse env var {key}={val}: {e}")),
        Err(_) => Ok(default),
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| v != "0" && v.to_lowercase() != "false")
        .unwrap_or(default)
}

fn env_csv(key: &str, default: &[&str]) -> Vec<String> {
    match std::env::var(key) {
        Ok(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect(),
        Err(_) => default.iter().map(|s| (*s).to_string()).collect(),
    }
}
