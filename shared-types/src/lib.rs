//! Shared types between the Store service and its frontend
//!
//! These types are used by both:
//! - the Store actor and HTTP API (native Rust)
//! - the desktop frontend that renders the Store window
//!
//! Serializable with serde for JSON over HTTP

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ============================================================================
// Host Wire Types
// ============================================================================

/// Entry of the host's active package list
///
/// The host does not guarantee either field; entries without a name are ignored
/// by the Store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default, TS)]
#[ts(export, export_to = "store.ts")]
pub struct HostPackage {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Body of the host's package install call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "store.ts")]
pub struct InstallRequest {
    #[serde(rename = "vfsPath")]
    pub vfs_path: String,
}

/// Result of the host's package install call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "store.ts")]
pub struct InstallResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Store View State
// ============================================================================

/// Which pipeline a progress view is running
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "store.ts")]
pub enum InstallFlow {
    /// Install (or single update) through dependency resolution
    Install,
    /// Every available update, queued without resolution
    UpdateAll,
}

/// Internal phase of the progress view
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "store.ts")]
pub enum ProgressPhase {
    Resolving,
    AwaitingConfirmation,
    Executing,
    /// Nothing to do; finished without confirmation
    Done,
    Succeeded,
    Failed,
}

impl ProgressPhase {
    /// Terminal phases are the only ones the user can close from
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressPhase::Done | ProgressPhase::Succeeded | ProgressPhase::Failed
        )
    }
}

/// Install/update button state for one catalog row
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "store.ts")]
pub enum PackageStatus {
    Available,
    Installing,
    UpdateAvailable,
    Installed,
}

/// Catalog row as rendered by the frontend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "store.ts")]
pub struct PackageCard {
    pub name: String,
    pub title: String,
    pub version: String,
    pub category: Option<String>,
    pub description: Option<String>,
    /// Absolute icon URL, if the manifest provides one
    pub icon_url: Option<String>,
    /// Theme icon name used when there is no icon URL
    pub icon_name: Option<String>,
    pub installed_version: Option<String>,
    pub status: PackageStatus,
    pub repository: String,
}

/// Progress view payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "store.ts")]
pub struct ProgressView {
    pub run_id: String,
    pub flow: InstallFlow,
    pub phase: ProgressPhase,
    pub percent: f64,
    pub status: String,
    pub logs: Vec<String>,
    /// Names of the queued packages, in install order
    pub pending: Vec<String>,
}

/// Current view of the Store window
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(tag = "view", rename_all = "snake_case")]
#[ts(export, export_to = "store.ts")]
pub enum ViewSnapshot {
    Home,
    Progress { progress: ProgressView },
    Updates { updates: Vec<PackageCard> },
    Repositories { draft: Vec<String> },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "store.ts")]
pub enum NoticeKind {
    /// Transient tray notification
    Notification,
    /// Modal alert dialog
    Alert,
}

/// Notification or alert raised by the Store for the frontend to show
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "store.ts")]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
    #[ts(type = "string")]
    pub raised_at: DateTime<Utc>,
}

/// Full Store state as seen by the frontend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "store.ts")]
pub struct StoreSnapshot {
    pub view: ViewSnapshot,
    /// Last progress status line; `Ready` once the progress view is closed
    pub status: String,
    pub search: String,
    pub loading: bool,
    /// Catalog rows matching the search text
    pub packages: Vec<PackageCard>,
    pub total_packages: usize,
    pub update_count: usize,
    pub repositories: Vec<String>,
    pub notices: Vec<Notice>,
}

// ============================================================================
// Constants
// ============================================================================

pub const STATUS_READY: &str = "Ready";
pub const STATUS_DONE: &str = "Done";
pub const STATUS_RESOLVING: &str = "Resolving dependencies...";
pub const STATUS_AWAITING_CONFIRMATION: &str = "Waiting for confirmation...";
pub const STATUS_COMPLETE: &str = "Installation Complete!";
pub const STATUS_FAILED: &str = "Installation Failed";

// ============================================================================
// Tests
// ============================================================================
