//! StoreActor - owns the Store controller and runs its pipelines
//!
//! Every command goes through the actor mailbox, so the controller has a
//! single owner and commands are applied one at a time. Network work (catalog
//! refresh, host package list, queue execution) runs in spawned tasks that
//! report back by casting messages to the actor; the mailbox stays responsive
//! while any of those requests is in flight.

use async_trait::async_trait;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use shared_types::{HostPackage, NoticeKind, StoreSnapshot};
use std::sync::Arc;

use crate::catalog::{InstalledIndex, PackageDescriptor, RepositoryFetcher};
use crate::controller::{StoreController, StoreError};
use crate::host::{HostError, Notifier, PackageHost};
use crate::installer::{ExecutionEvent, InstallError, ProgressSink, QueueExecutor};
use crate::settings::SettingsStore;

/// Actor that owns the Store state
#[derive(Debug, Default)]
pub struct StoreActor;

/// Arguments for spawning StoreActor
#[derive(Clone)]
pub struct StoreArguments {
    pub default_repository: String,
    pub fetcher: Arc<dyn RepositoryFetcher>,
    pub host: Arc<dyn PackageHost>,
    pub notifier: Arc<dyn Notifier>,
    pub settings: Arc<dyn SettingsStore>,
    pub executor: Arc<QueueExecutor>,
    /// Fetch the catalog as soon as the actor starts
    pub fetch_on_start: bool,
}

/// State for StoreActor
pub struct StoreState {
    controller: StoreController,
    fetcher: Arc<dyn RepositoryFetcher>,
    host: Arc<dyn PackageHost>,
    notifier: Arc<dyn Notifier>,
    settings: Arc<dyn SettingsStore>,
    executor: Arc<QueueExecutor>,
    fetch_on_start: bool,
    /// Bumped on every refresh; only the newest fetch result is applied
    refresh_generation: u64,
    refresh_waiters: Vec<RpcReplyPort<usize>>,
    /// Bumped on every host package list fetch; only the newest is applied
    installed_generation: u64,
    /// Caller of the install waiting for resolution to finish
    resolve_waiter: Option<SnapshotReply>,
}

/// What to do once a host package list fetch lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstalledPurpose {
    /// Only refresh the installed index
    Sync,
    /// Resolve the pending install target
    Resolve,
    /// Finish the catalog refresh with this generation
    Catalog { generation: u64 },
}

type SnapshotReply = RpcReplyPort<Result<StoreSnapshot, StoreError>>;

// ============================================================================
// Messages
// ============================================================================

/// Messages handled by StoreActor
#[derive(Debug)]
pub enum StoreMsg {
    /// Current state for the frontend
    GetSnapshot { reply: RpcReplyPort<StoreSnapshot> },
    /// Re-fetch every repository; replies with the catalog size once applied
    Refresh { reply: Option<RpcReplyPort<usize>> },
    /// Fetch result from a refresh task
    CatalogLoaded {
        generation: u64,
        packages: Vec<PackageDescriptor>,
    },
    /// Host package list from a background fetch
    InstalledLoaded {
        generation: u64,
        purpose: InstalledPurpose,
        result: Result<Vec<HostPackage>, HostError>,
    },
    SetSearch {
        query: String,
        reply: RpcReplyPort<StoreSnapshot>,
    },
    /// Install (or update) one package through dependency resolution;
    /// replies once resolution has finished
    Install { name: String, reply: SnapshotReply },
    UpdateAll { reply: SnapshotReply },
    Confirm { reply: SnapshotReply },
    Cancel { reply: SnapshotReply },
    CloseProgress { reply: SnapshotReply },
    ShowUpdates { reply: SnapshotReply },
    ShowHome { reply: SnapshotReply },
    OpenRepositories { reply: SnapshotReply },
    EditRepository {
        index: usize,
        url: String,
        reply: SnapshotReply,
    },
    AddRepository { reply: SnapshotReply },
    RemoveRepository { index: usize, reply: SnapshotReply },
    CancelRepositories { reply: SnapshotReply },
    SaveRepositories { reply: SnapshotReply },
    ClearNotices { reply: RpcReplyPort<StoreSnapshot> },
    /// Progress from the running executor task
    Execution(ExecutionEvent),
    /// The executor task ended
    ExecutionFinished { result: Result<(), InstallError> },
}

/// Forwards executor events into the actor mailbox
struct ActorProgressSink {
    actor: ActorRef<StoreMsg>,
}

impl ProgressSink for ActorProgressSink {
    fn emit(&self, event: ExecutionEvent) {
        if let Err(e) = self.actor.cast(StoreMsg::Execution(event)) {
            tracing::warn!(error = %e, "Failed to forward execution event");
        }
    }
}

// ============================================================================
// Actor Implementation
// ============================================================================

#[async_trait]
impl Actor for StoreActor {
    type Msg = StoreMsg;
    type State = StoreState;
    type Arguments = StoreArguments;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(actor_id = %myself.get_id(), "StoreActor starting");

        let stored = match args.settings.load_repositories().await {
            Ok(urls) => urls,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load repository settings; using default");
                Vec::new()
            }
        };
        let mut controller = StoreController::new(args.default_repository);
        controller.load_repositories(stored);
        tracing::info!(count = controller.repositories().len(), "Repositories loaded");

        Ok(StoreState {
            controller,
            fetcher: args.fetcher,
            host: args.host,
            notifier: args.notifier,
            settings: args.settings,
            executor: args.executor,
            fetch_on_start: args.fetch_on_start,
            refresh_generation: 0,
            refresh_waiters: Vec::new(),
            installed_generation: 0,
            resolve_waiter: None,
        })
    }

    async fn post_start(
        &self,
        myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        self.start_installed_fetch(&myself, state, InstalledPurpose::Sync);
        if state.fetch_on_start {
            self.start_refresh(&myself, state, None);
        }
        tracing::info!(actor_id = %myself.get_id(), "StoreActor started successfully");
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            StoreMsg::GetSnapshot { reply } => {
                let _ = reply.send(state.controller.snapshot());
            }
            StoreMsg::Refresh { reply } => {
                self.start_refresh(&myself, state, reply);
            }
            StoreMsg::CatalogLoaded {
                generation,
                packages,
            } => {
                self.handle_catalog_loaded(&myself, generation, packages, state);
            }
            StoreMsg::InstalledLoaded {
                generation,
                purpose,
                result,
            } => {
                self.handle_installed_loaded(generation, purpose, result, state);
            }
            StoreMsg::SetSearch { query, reply } => {
                state.controller.set_search(query);
                let _ = reply.send(state.controller.snapshot());
            }
            StoreMsg::Install { name, reply } => {
                self.handle_install(&myself, &name, reply, state);
            }
            StoreMsg::UpdateAll { reply } => {
                let result = state.controller.request_update_all().map(|_| ());
                let _ = reply.send(Self::snapshot_after(result, state));
            }
            StoreMsg::Confirm { reply } => {
                let result = self.handle_confirm(&myself, state);
                let _ = reply.send(Self::snapshot_after(result, state));
            }
            StoreMsg::Cancel { reply } => {
                let result = state.controller.cancel();
                let _ = reply.send(Self::snapshot_after(result, state));
            }
            StoreMsg::CloseProgress { reply } => {
                let result = state.controller.close_progress();
                let _ = reply.send(Self::snapshot_after(result, state));
            }
            StoreMsg::ShowUpdates { reply } => {
                let result = state.controller.show_updates();
                let _ = reply.send(Self::snapshot_after(result, state));
            }
            StoreMsg::ShowHome { reply } => {
                let result = state.controller.show_home();
                let _ = reply.send(Self::snapshot_after(result, state));
            }
            StoreMsg::OpenRepositories { reply } => {
                let result = state.controller.open_repositories();
                let _ = reply.send(Self::snapshot_after(result, state));
            }
            StoreMsg::EditRepository { index, url, reply } => {
                let result = state.controller.edit_repository(index, url);
                let _ = reply.send(Self::snapshot_after(result, state));
            }
            StoreMsg::AddRepository { reply } => {
                let result = state.controller.add_repository();
                let _ = reply.send(Self::snapshot_after(result, state));
            }
            StoreMsg::RemoveRepository { index, reply } => {
                let result = state.controller.remove_repository(index);
                let _ = reply.send(Self::snapshot_after(result, state));
            }
            StoreMsg::CancelRepositories { reply } => {
                let result = state.controller.cancel_repositories();
                let _ = reply.send(Self::snapshot_after(result, state));
            }
            StoreMsg::SaveRepositories { reply } => {
                let result = self.handle_save_repositories(&myself, state).await;
                let _ = reply.send(Self::snapshot_after(result, state));
            }
            StoreMsg::ClearNotices { reply } => {
                state.controller.clear_notices();
                let _ = reply.send(state.controller.snapshot());
            }
            StoreMsg::Execution(event) => {
                if let Err(e) = state.controller.apply_event(event) {
                    tracing::warn!(error = %e, "Dropping execution event");
                }
            }
            StoreMsg::ExecutionFinished { result } => {
                self.handle_execution_finished(&myself, result, state).await;
            }
        }
        Ok(())
    }

    async fn post_stop(
        &self,
        myself: ActorRef<Self::Msg>,
        _state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        tracing::info!(actor_id = %myself.get_id(), "StoreActor stopped");
        Ok(())
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl StoreActor {
    fn snapshot_after(result: Result<(), StoreError>, state: &StoreState) -> Result<StoreSnapshot, StoreError> {
        result.map(|()| state.controller.snapshot())
    }

    /// Fetch the host's package list off the mailbox
    fn start_installed_fetch(
        &self,
        myself: &ActorRef<StoreMsg>,
        state: &mut StoreState,
        purpose: InstalledPurpose,
    ) {
        state.installed_generation += 1;
        let generation = state.installed_generation;
        let host = state.host.clone();
        let actor = myself.clone();

        tokio::spawn(async move {
            let result = host.installed_packages().await;
            if let Err(e) = actor.cast(StoreMsg::InstalledLoaded {
                generation,
                purpose,
                result,
            }) {
                tracing::warn!(error = %e, "Failed to deliver installed packages");
            }
        });
    }

    fn handle_installed_loaded(
        &self,
        generation: u64,
        purpose: InstalledPurpose,
        result: Result<Vec<HostPackage>, HostError>,
        state: &mut StoreState,
    ) {
        match result {
            Ok(packages) if generation == state.installed_generation => {
                let index = InstalledIndex::from_host(&packages);
                tracing::debug!(count = index.len(), "Installed packages refreshed");
                state.controller.replace_installed(index);
            }
            Ok(_) => {
                tracing::debug!(
                    generation,
                    latest = state.installed_generation,
                    "Discarding superseded installed package list"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to refresh installed packages");
            }
        }

        match purpose {
            InstalledPurpose::Sync => {}
            InstalledPurpose::Resolve => self.finish_resolution(state),
            InstalledPurpose::Catalog { generation } => {
                if generation != state.refresh_generation {
                    return;
                }
                state.controller.set_loading(false);
                let count = state.controller.catalog().len();
                for waiter in state.refresh_waiters.drain(..) {
                    let _ = waiter.send(count);
                }
            }
        }
    }

    fn start_refresh(
        &self,
        myself: &ActorRef<StoreMsg>,
        state: &mut StoreState,
        reply: Option<RpcReplyPort<usize>>,
    ) {
        state.refresh_generation += 1;
        let generation = state.refresh_generation;
        if let Some(reply) = reply {
            state.refresh_waiters.push(reply);
        }
        state.controller.set_loading(true);

        let fetcher = state.fetcher.clone();
        let repositories = state.controller.repositories().clone();
        let actor = myself.clone();
        tracing::info!(generation, count = repositories.len(), "Refreshing catalog");

        tokio::spawn(async move {
            let packages = fetcher.fetch_all(&repositories).await;
            if let Err(e) = actor.cast(StoreMsg::CatalogLoaded {
                generation,
                packages,
            }) {
                tracing::warn!(error = %e, "Failed to deliver catalog refresh");
            }
        });
    }

    fn handle_catalog_loaded(
        &self,
        myself: &ActorRef<StoreMsg>,
        generation: u64,
        packages: Vec<PackageDescriptor>,
        state: &mut StoreState,
    ) {
        if generation != state.refresh_generation {
            tracing::debug!(
                generation,
                latest = state.refresh_generation,
                "Discarding superseded catalog refresh"
            );
            return;
        }

        tracing::info!(count = packages.len(), "Catalog refreshed");
        state.controller.replace_catalog(packages);
        // loading ends once the installed index matching this catalog lands
        self.start_installed_fetch(myself, state, InstalledPurpose::Catalog { generation });
    }

    /// Enter resolution and fetch the installed index it resolves against
    fn handle_install(
        &self,
        myself: &ActorRef<StoreMsg>,
        name: &str,
        reply: SnapshotReply,
        state: &mut StoreState,
    ) {
        if let Err(e) = state.controller.request_install(name) {
            let _ = reply.send(Err(e));
            return;
        }
        if let Some(previous) = state.resolve_waiter.replace(reply) {
            let _ = previous.send(Ok(state.controller.snapshot()));
        }
        self.start_installed_fetch(myself, state, InstalledPurpose::Resolve);
    }

    fn finish_resolution(&self, state: &mut StoreState) {
        let result = state.controller.complete_resolution();
        match &result {
            Ok(phase) => tracing::info!(phase = ?phase, "Resolution complete"),
            Err(e) => tracing::warn!(error = %e, "Resolution finished outside of a run"),
        }
        let reply = result.map(|_| state.controller.snapshot());
        if let Some(waiter) = state.resolve_waiter.take() {
            let _ = waiter.send(reply);
        }
    }

    fn handle_confirm(&self, myself: &ActorRef<StoreMsg>, state: &mut StoreState) -> Result<(), StoreError> {
        let queue = state.controller.confirm()?;
        let executor = state.executor.clone();
        let actor = myself.clone();

        tokio::spawn(async move {
            let sink = ActorProgressSink {
                actor: actor.clone(),
            };
            let result = executor.run(&queue, &sink).await;
            if let Err(e) = actor.cast(StoreMsg::ExecutionFinished { result }) {
                tracing::error!(error = %e, "Failed to deliver execution result");
            }
        });
        Ok(())
    }

    async fn handle_execution_finished(
        &self,
        myself: &ActorRef<StoreMsg>,
        result: Result<(), InstallError>,
        state: &mut StoreState,
    ) {
        let succeeded = result.is_ok();
        let notice = match state.controller.finish_execution(result) {
            Ok(notice) => notice,
            Err(e) => {
                tracing::warn!(error = %e, "Execution finished outside of a run");
                return;
            }
        };

        if succeeded {
            self.start_installed_fetch(myself, state, InstalledPurpose::Sync);
        }

        match notice.kind {
            NoticeKind::Notification => {
                state.notifier.notify(&notice.title, &notice.message).await
            }
            NoticeKind::Alert => state.notifier.alert(&notice.title, &notice.message).await,
        }
    }

    async fn handle_save_repositories(
        &self,
        myself: &ActorRef<StoreMsg>,
        state: &mut StoreState,
    ) -> Result<(), StoreError> {
        let urls = match state.controller.save_repositories() {
            Ok(list) => list.urls().to_vec(),
            Err(e) => {
                if let Some(notice) = state.controller.notices().last() {
                    state.notifier.alert(&notice.title, &notice.message).await;
                }
                return Err(e);
            }
        };

        if let Err(e) = state.settings.save_repositories(&urls).await {
            tracing::error!(error = %e, "Failed to persist repositories");
        }
        self.start_refresh(myself, state, None);
        Ok(())
    }
}

// ============================================================================
// Convenience Functions
// ============================================================================

/// Convenience function to get the current snapshot
pub async fn get_snapshot(
    store: &ActorRef<StoreMsg>,
) -> Result<StoreSnapshot, ractor::RactorErr<StoreMsg>> {
    ractor::call!(store, |reply| StoreMsg::GetSnapshot { reply })
}

/// Convenience function to refresh the catalog and wait for it to land
pub async fn refresh(store: &ActorRef<StoreMsg>) -> Result<usize, ractor::RactorErr<StoreMsg>> {
    ractor::call!(store, |reply| StoreMsg::Refresh { reply: Some(reply) })
}

/// Convenience function to request an install
pub async fn install(
    store: &ActorRef<StoreMsg>,
    name: impl Into<String>,
) -> Result<Result<StoreSnapshot, StoreError>, ractor::RactorErr<StoreMsg>> {
    let name = name.into();
    ractor::call!(store, |reply| StoreMsg::Install {
        name: name.clone(),
        reply,
    })
}

/// Convenience function to confirm the pending queue
pub async fn confirm(
    store: &ActorRef<StoreMsg>,
) -> Result<Result<StoreSnapshot, StoreError>, ractor::RactorErr<StoreMsg>> {
    ractor::call!(store, |reply| StoreMsg::Confirm { reply })
}
