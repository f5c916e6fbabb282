//! StoreController - the Store's view state machine
//!
//! Owns every piece of Store state (repositories, catalog, installed index,
//! installing flags, search text) and the current [`View`]. Operations are
//! synchronous and only legal from specific views; anything else is rejected
//! with [`StoreError::InvalidTransition`] and leaves state untouched. Because
//! a new pipeline can only start from `Home` or `Updates`, the view doubles as
//! the single-flight guard for installs.
//!
//! Network work (fetching, downloading) is not done here. The owner performs
//! it and feeds results back through `replace_catalog`, `apply_event` and
//! `finish_execution`.

use std::collections::BTreeSet;

use chrono::Utc;
use shared_types::{
    InstallFlow, Notice, NoticeKind, PackageCard, PackageStatus, ProgressPhase, ProgressView,
    StoreSnapshot, ViewSnapshot, STATUS_AWAITING_CONFIRMATION, STATUS_COMPLETE, STATUS_DONE,
    STATUS_FAILED, STATUS_READY, STATUS_RESOLVING,
};
use ulid::Ulid;

use crate::catalog::{Catalog, InstalledIndex, PackageDescriptor, RepositoryList};
use crate::installer::{ExecutionEvent, InstallError, EXECUTION_START_PERCENT};
use crate::resolver;
use crate::updates;

const RESOLVING_PERCENT: f64 = 10.0;
const COMPLETE_PERCENT: f64 = 100.0;

pub const VALIDATION_TITLE: &str = "Validation Error";
pub const EMPTY_REPOSITORIES_MESSAGE: &str = "Please enter at least one repository URL.";
pub const INSTALLED_NOTICE_TITLE: &str = "Store";
pub const INSTALLED_NOTICE_MESSAGE: &str = "Package installed successfully.";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),

    #[error("Cannot {action} while in {from}")]
    InvalidTransition { from: String, action: String },

    #[error("Package not found: {0}")]
    PackageNotFound(String),

    #[error("Repository slot {0} does not exist")]
    NoSuchSlot(usize),
}

// ============================================================================
// View State
// ============================================================================

/// Progress view state for one install/update pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressState {
    pub run_id: Ulid,
    pub flow: InstallFlow,
    pub phase: ProgressPhase,
    /// Requested package for the install flow
    pub target: Option<String>,
    pub percent: f64,
    pub status: String,
    pub logs: Vec<String>,
    /// Install queue, in order
    pub pending: Vec<PackageDescriptor>,
}

impl ProgressState {
    fn new(flow: InstallFlow, target: Option<String>) -> Self {
        Self {
            run_id: Ulid::new(),
            flow,
            phase: ProgressPhase::Resolving,
            target,
            percent: 0.0,
            status: String::new(),
            logs: Vec::new(),
            pending: Vec::new(),
        }
    }

    fn log(&mut self, line: impl Into<String>) {
        self.logs.push(line.into());
    }

    fn set_progress(&mut self, percent: f64, status: impl Into<String>) {
        self.percent = percent;
        self.status = status.into();
    }

    fn to_view(&self) -> ProgressView {
        ProgressView {
            run_id: self.run_id.to_string(),
            flow: self.flow,
            phase: self.phase,
            percent: self.percent,
            status: self.status.clone(),
            logs: self.logs.clone(),
            pending: self.pending.iter().map(|pkg| pkg.name.clone()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Home,
    Progress(ProgressState),
    Updates,
    Repositories { draft: Vec<String> },
}

impl View {
    /// Human-readable state name used in transition errors
    pub fn label(&self) -> String {
        match self {
            View::Home => "home".to_string(),
            View::Updates => "updates".to_string(),
            View::Repositories { .. } => "repositories".to_string(),
            View::Progress(progress) => format!("progress ({})", phase_label(progress.phase)),
        }
    }
}

fn phase_label(phase: ProgressPhase) -> &'static str {
    match phase {
        ProgressPhase::Resolving => "resolving",
        ProgressPhase::AwaitingConfirmation => "awaiting confirmation",
        ProgressPhase::Executing => "executing",
        ProgressPhase::Done => "done",
        ProgressPhase::Succeeded => "succeeded",
        ProgressPhase::Failed => "failed",
    }
}

// ============================================================================
// Controller
// ============================================================================

pub struct StoreController {
    repositories: RepositoryList,
    default_repository: String,
    catalog: Catalog,
    installed: InstalledIndex,
    installing: BTreeSet<String>,
    search: String,
    loading: bool,
    status: String,
    view: View,
    notices: Vec<Notice>,
}

impl StoreController {
    /// Controller seeded with only the default repository; stored settings
    /// are applied with [`StoreController::load_repositories`]
    pub fn new(default_repository: impl Into<String>) -> Self {
        let default_repository = default_repository.into();
        Self {
            repositories: RepositoryList::new(Vec::<String>::new(), &default_repository),
            default_repository,
            catalog: Catalog::default(),
            installed: InstalledIndex::default(),
            installing: BTreeSet::new(),
            search: String::new(),
            loading: false,
            status: STATUS_READY.to_string(),
            view: View::Home,
            notices: Vec::new(),
        }
    }

    pub fn repositories(&self) -> &RepositoryList {
        &self.repositories
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn installed(&self) -> &InstalledIndex {
        &self.installed
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn progress(&self) -> Option<&ProgressState> {
        match &self.view {
            View::Progress(progress) => Some(progress),
            _ => None,
        }
    }

    pub fn is_installing(&self, name: &str) -> bool {
        self.installing.contains(name)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    fn invalid(&self, action: &str) -> StoreError {
        StoreError::InvalidTransition {
            from: self.view.label(),
            action: action.to_string(),
        }
    }

    fn raise(&mut self, kind: NoticeKind, title: &str, message: impl Into<String>) -> Notice {
        let notice = Notice {
            kind,
            title: title.to_string(),
            message: message.into(),
            raised_at: Utc::now(),
        };
        self.notices.push(notice.clone());
        notice
    }

    // ------------------------------------------------------------------------
    // State refresh
    // ------------------------------------------------------------------------

    pub fn set_search(&mut self, text: impl Into<String>) {
        self.search = text.into();
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    /// Replace the catalog wholesale with a fresh fetch result
    pub fn replace_catalog(&mut self, packages: Vec<PackageDescriptor>) {
        self.catalog = Catalog::new(packages);
    }

    pub fn replace_installed(&mut self, installed: InstalledIndex) {
        self.installed = installed;
    }

    /// Adopt a stored repository list, falling back to the default when empty
    pub fn load_repositories(&mut self, urls: Vec<String>) {
        self.repositories = RepositoryList::new(urls, &self.default_repository);
    }

    pub fn clear_notices(&mut self) {
        self.notices.clear();
    }

    // ------------------------------------------------------------------------
    // Install pipeline
    // ------------------------------------------------------------------------

    /// Start the install flow for `name`
    pub fn request_install(&mut self, name: &str) -> Result<(), StoreError> {
        if !matches!(self.view, View::Home | View::Updates) {
            return Err(self.invalid("install"));
        }
        if self.catalog.find(name).is_none() {
            return Err(StoreError::PackageNotFound(name.to_string()));
        }

        let mut progress = ProgressState::new(InstallFlow::Install, Some(name.to_string()));
        progress.log(format!("Starting resolution for {name}..."));
        progress.set_progress(RESOLVING_PERCENT, STATUS_RESOLVING);
        self.status = progress.status.clone();
        self.view = View::Progress(progress);

        tracing::info!(package = %name, "Install requested");
        Ok(())
    }

    /// Resolve the pending install target against the current catalog and
    /// installed index. Returns the resulting phase.
    pub fn complete_resolution(&mut self) -> Result<ProgressPhase, StoreError> {
        let target = match &self.view {
            View::Progress(progress) if progress.phase == ProgressPhase::Resolving => {
                progress.target.clone()
            }
            _ => None,
        };
        let Some(target) = target else {
            return Err(self.invalid("complete resolution"));
        };

        let resolution = match self.catalog.find(&target) {
            Some(pkg) => resolver::install_queue(pkg, &self.catalog, &self.installed),
            None => {
                // Catalog was refreshed between request and resolution
                let message = StoreError::PackageNotFound(target).to_string();
                self.fail_progress(&message);
                return Ok(ProgressPhase::Failed);
            }
        };

        let View::Progress(progress) = &mut self.view else {
            return Err(StoreError::InvalidTransition {
                from: "unknown".to_string(),
                action: "complete resolution".to_string(),
            });
        };
        for warning in resolution.warnings() {
            progress.log(warning);
        }

        let phase = Self::queue_or_done(progress, resolution.packages);
        self.status = progress.status.clone();
        Ok(phase)
    }

    /// Queue every available update without dependency resolution
    pub fn request_update_all(&mut self) -> Result<ProgressPhase, StoreError> {
        if !matches!(self.view, View::Home | View::Updates) {
            return Err(self.invalid("update all"));
        }

        let queue = updates::compute_updates(&self.catalog, &self.installed);
        let mut progress = ProgressState::new(InstallFlow::UpdateAll, None);
        progress.log(format!("Starting update of {} package(s)...", queue.len()));
        let phase = Self::queue_or_done(&mut progress, queue);
        self.status = progress.status.clone();
        self.view = View::Progress(progress);

        tracing::info!(phase = ?phase, "Update all requested");
        Ok(phase)
    }

    fn queue_or_done(progress: &mut ProgressState, queue: Vec<PackageDescriptor>) -> ProgressPhase {
        if queue.is_empty() {
            progress.log("All packages already installed.");
            progress.set_progress(COMPLETE_PERCENT, STATUS_DONE);
            progress.phase = ProgressPhase::Done;
            return progress.phase;
        }

        let names: Vec<&str> = queue.iter().map(|pkg| pkg.name.as_str()).collect();
        progress.log(format!("Installation Queue: {}", names.join(", ")));
        progress.log("Waiting for user confirmation...");
        progress.set_progress(EXECUTION_START_PERCENT, STATUS_AWAITING_CONFIRMATION);
        progress.pending = queue;
        progress.phase = ProgressPhase::AwaitingConfirmation;
        progress.phase
    }

    /// Accept the pending queue; returns it for execution
    pub fn confirm(&mut self) -> Result<Vec<PackageDescriptor>, StoreError> {
        match &mut self.view {
            View::Progress(progress) if progress.phase == ProgressPhase::AwaitingConfirmation => {
                progress.phase = ProgressPhase::Executing;
                progress.log("Confirmation received. Proceeding...");
                tracing::info!(
                    run_id = %progress.run_id,
                    count = progress.pending.len(),
                    "Install queue confirmed"
                );
                Ok(progress.pending.clone())
            }
            _ => Err(self.invalid("confirm")),
        }
    }

    /// Discard the pending queue and return home
    pub fn cancel(&mut self) -> Result<(), StoreError> {
        match &self.view {
            View::Progress(progress) if progress.phase == ProgressPhase::AwaitingConfirmation => {
                tracing::info!(run_id = %progress.run_id, "Install queue cancelled");
                self.view = View::Home;
                self.status = STATUS_READY.to_string();
                Ok(())
            }
            _ => Err(self.invalid("cancel")),
        }
    }

    /// Fold one executor event into progress and bookkeeping
    pub fn apply_event(&mut self, event: ExecutionEvent) -> Result<(), StoreError> {
        let progress = match &mut self.view {
            View::Progress(progress) if progress.phase == ProgressPhase::Executing => progress,
            _ => return Err(self.invalid("record progress")),
        };

        match event {
            ExecutionEvent::ItemStarted { name } => {
                self.installing.insert(name);
            }
            ExecutionEvent::Progress { percent, status } => {
                progress.set_progress(percent, status);
                self.status = progress.status.clone();
            }
            ExecutionEvent::Log(line) => progress.log(line),
            ExecutionEvent::ItemInstalled { name, version } => {
                self.installing.remove(&name);
                self.installed.record(name, version);
            }
        }
        Ok(())
    }

    /// Close out a run. Returns the notice raised for the user.
    pub fn finish_execution(&mut self, result: Result<(), InstallError>) -> Result<Notice, StoreError> {
        let executing = matches!(
            &self.view,
            View::Progress(progress) if progress.phase == ProgressPhase::Executing
        );
        if !executing {
            return Err(self.invalid("finish execution"));
        }

        match result {
            Ok(()) => {
                if let View::Progress(progress) = &mut self.view {
                    progress.set_progress(COMPLETE_PERCENT, STATUS_COMPLETE);
                    progress.log("All operations completed successfully.");
                    progress.phase = ProgressPhase::Succeeded;
                    tracing::info!(run_id = %progress.run_id, "Install run succeeded");
                }
                self.status = STATUS_COMPLETE.to_string();
                self.clear_pending();
                Ok(self.raise(
                    NoticeKind::Notification,
                    INSTALLED_NOTICE_TITLE,
                    INSTALLED_NOTICE_MESSAGE,
                ))
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(error = %message, "Install run failed");
                Ok(self.fail_progress(&message))
            }
        }
    }

    fn fail_progress(&mut self, message: &str) -> Notice {
        if let View::Progress(progress) = &mut self.view {
            progress.log(format!("[ERROR] {message}"));
            progress.set_progress(COMPLETE_PERCENT, STATUS_FAILED);
            progress.phase = ProgressPhase::Failed;
        }
        self.status = STATUS_FAILED.to_string();
        self.clear_pending();
        self.raise(NoticeKind::Alert, STATUS_FAILED, message)
    }

    /// Clear installing flags of every queued item and empty the queue
    fn clear_pending(&mut self) {
        if let View::Progress(progress) = &mut self.view {
            for pkg in progress.pending.drain(..) {
                self.installing.remove(&pkg.name);
            }
        }
    }

    /// Leave the progress view; only allowed when nothing is in flight
    pub fn close_progress(&mut self) -> Result<(), StoreError> {
        match &self.view {
            View::Progress(progress)
                if progress.percent <= 0.0 || progress.percent >= COMPLETE_PERCENT =>
            {
                self.view = View::Home;
                self.status = STATUS_READY.to_string();
                Ok(())
            }
            _ => Err(self.invalid("close progress")),
        }
    }

    // ------------------------------------------------------------------------
    // Display transitions
    // ------------------------------------------------------------------------

    pub fn show_updates(&mut self) -> Result<(), StoreError> {
        match self.view {
            View::Home | View::Updates => {
                self.view = View::Updates;
                Ok(())
            }
            _ => Err(self.invalid("show updates")),
        }
    }

    pub fn show_home(&mut self) -> Result<(), StoreError> {
        match self.view {
            View::Home | View::Updates => {
                self.view = View::Home;
                Ok(())
            }
            _ => Err(self.invalid("show home")),
        }
    }

    // ------------------------------------------------------------------------
    // Repository editor
    // ------------------------------------------------------------------------

    pub fn open_repositories(&mut self) -> Result<(), StoreError> {
        if !matches!(self.view, View::Home) {
            return Err(self.invalid("edit repositories"));
        }
        let mut draft = self.repositories.urls().to_vec();
        if draft.is_empty() {
            draft.push(String::new());
        }
        self.view = View::Repositories { draft };
        Ok(())
    }

    fn draft_mut(&mut self, action: &str) -> Result<&mut Vec<String>, StoreError> {
        if !matches!(self.view, View::Repositories { .. }) {
            return Err(self.invalid(action));
        }
        match &mut self.view {
            View::Repositories { draft } => Ok(draft),
            _ => Err(StoreError::InvalidTransition {
                from: "unknown".to_string(),
                action: action.to_string(),
            }),
        }
    }

    pub fn edit_repository(&mut self, index: usize, url: impl Into<String>) -> Result<(), StoreError> {
        let draft = self.draft_mut("edit a repository")?;
        let slot = draft.get_mut(index).ok_or(StoreError::NoSuchSlot(index))?;
        *slot = url.into();
        Ok(())
    }

    pub fn add_repository(&mut self) -> Result<(), StoreError> {
        self.draft_mut("add a repository")?.push(String::new());
        Ok(())
    }

    pub fn remove_repository(&mut self, index: usize) -> Result<(), StoreError> {
        let draft = self.draft_mut("remove a repository")?;
        if index >= draft.len() {
            return Err(StoreError::NoSuchSlot(index));
        }
        if draft.len() == 1 {
            return Err(StoreError::Validation(
                "At least one repository slot is required.".to_string(),
            ));
        }
        draft.remove(index);
        Ok(())
    }

    pub fn cancel_repositories(&mut self) -> Result<(), StoreError> {
        self.draft_mut("cancel repository edits")?;
        self.view = View::Home;
        Ok(())
    }

    /// Validate and commit the draft; the caller persists and re-fetches
    pub fn save_repositories(&mut self) -> Result<&RepositoryList, StoreError> {
        let draft = self.draft_mut("save repositories")?;
        let Some(list) = RepositoryList::from_draft(draft.iter()) else {
            self.raise(NoticeKind::Alert, VALIDATION_TITLE, EMPTY_REPOSITORIES_MESSAGE);
            return Err(StoreError::Validation(EMPTY_REPOSITORIES_MESSAGE.to_string()));
        };

        tracing::info!(count = list.len(), "Repository list committed");
        self.repositories = list;
        self.view = View::Home;
        Ok(&self.repositories)
    }

    // ------------------------------------------------------------------------
    // Snapshot
    // ------------------------------------------------------------------------

    pub fn package_status(&self, pkg: &PackageDescriptor) -> PackageStatus {
        if self.installing.contains(&pkg.name) {
            return PackageStatus::Installing;
        }
        match self.installed.version_of(&pkg.name) {
            Some(version) if version != pkg.version => PackageStatus::UpdateAvailable,
            Some(_) => PackageStatus::Installed,
            None => PackageStatus::Available,
        }
    }

    fn card(&self, pkg: &PackageDescriptor) -> PackageCard {
        PackageCard {
            name: pkg.name.clone(),
            title: pkg.display_title().to_string(),
            version: pkg.version.clone(),
            category: pkg.category.clone(),
            description: pkg.description.clone(),
            icon_url: pkg.icon_url(),
            icon_name: pkg.icon_name.clone(),
            installed_version: self.installed.version_of(&pkg.name).map(str::to_string),
            status: self.package_status(pkg),
            repository: pkg.repo_url.clone(),
        }
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let view = match &self.view {
            View::Home => ViewSnapshot::Home,
            View::Progress(progress) => ViewSnapshot::Progress {
                progress: progress.to_view(),
            },
            View::Updates => ViewSnapshot::Updates {
                updates: updates::compute_updates(&self.catalog, &self.installed)
                    .iter()
                    .map(|pkg| self.card(pkg))
                    .collect(),
            },
            View::Repositories { draft } => ViewSnapshot::Repositories {
                draft: draft.clone(),
            },
        };

        StoreSnapshot {
            view,
            status: self.status.clone(),
            search: self.search.clone(),
            loading: self.loading,
            packages: self
                .catalog
                .filtered(&self.search)
                .into_iter()
                .map(|pkg| self.card(pkg))
                .collect(),
            total_packages: self.catalog.len(),
            update_count: updates::update_count(&self.catalog, &self.installed),
            repositories: self.repositories.urls().to_vec(),
            notices: self.notices.clone(),
        }
    }
}
