//! Shared fixtures: an in-process server that plays repository, artifact
//! mirror and host platform at once.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use ractor::{Actor, ActorRef};
use serde_json::json;
use shared_types::{HostPackage, InstallRequest, NoticeKind, ProgressPhase, StoreSnapshot, ViewSnapshot};
use tokio::net::TcpListener;

use store::actors::store::get_snapshot;
use store::actors::{StoreActor, StoreArguments, StoreMsg};
use store::catalog::HttpRepositoryFetcher;
use store::host::{HttpPackageHost, Notifier};
use store::installer::{QueueExecutor, StagingConfig};
use store::settings::{MemorySettingsStore, SettingsStore};

/// Everything the fake server knows and records
#[derive(Debug, Default)]
pub struct World {
    /// Raw manifest bodies by file name under `/repos/`
    pub manifests: HashMap<String, String>,
    /// Artifact bytes by file name under `/artifacts/`, `/stream/` and `/paced/`
    pub artifacts: HashMap<String, Vec<u8>>,
    pub installed: Vec<HostPackage>,
    /// (vfs path, byte count) in write order
    pub writes: Vec<(String, usize)>,
    /// vfs paths in install order
    pub installs: Vec<String>,
    /// Package name -> error reported by the install endpoint
    pub failing_installs: HashMap<String, String>,
    /// `/packages` accepts the request and never answers
    pub hang_packages: bool,
}

pub type SharedWorld = Arc<Mutex<World>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub world: SharedWorld,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn repo_url(&self, file: &str) -> String {
        self.url(&format!("/repos/{file}"))
    }

    pub fn writes(&self) -> Vec<(String, usize)> {
        self.world.lock().unwrap().writes.clone()
    }

    pub fn installs(&self) -> Vec<String> {
        self.world.lock().unwrap().installs.clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Name and version from a staged path like `tmp:/A-2.0.wpk`
fn parse_staged(path: &str) -> Option<(String, String)> {
    let file = path.rsplit(|c| c == '/' || c == ':').next()?;
    let stem = file.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(file);
    let (name, version) = stem.rsplit_once('-')?;
    Some((name.to_string(), version.to_string()))
}

async fn serve_manifest(Path(file): Path<String>, State(world): State<SharedWorld>) -> Response {
    match world.lock().unwrap().manifests.get(&file) {
        Some(body) => (StatusCode::OK, body.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn serve_artifact(Path(file): Path<String>, State(world): State<SharedWorld>) -> Response {
    match world.lock().unwrap().artifacts.get(&file) {
        Some(bytes) => (StatusCode::OK, bytes.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Same artifacts, chunked without a content length
async fn stream_artifact(Path(file): Path<String>, State(world): State<SharedWorld>) -> Response {
    let Some(bytes) = world.lock().unwrap().artifacts.get(&file).cloned() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let chunks: Vec<Result<Vec<u8>, std::io::Error>> =
        bytes.chunks(4).map(|chunk| Ok(chunk.to_vec())).collect();
    Body::from_stream(futures::stream::iter(chunks)).into_response()
}

/// Same artifacts with a content length, sent in spaced-out chunks
async fn paced_artifact(Path(file): Path<String>, State(world): State<SharedWorld>) -> Response {
    let Some(bytes) = world.lock().unwrap().artifacts.get(&file).cloned() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let length = bytes.len();
    let chunks: Vec<Result<Vec<u8>, std::io::Error>> =
        bytes.chunks(4).map(|chunk| Ok(chunk.to_vec())).collect();
    let paced = futures::stream::iter(chunks).then(|chunk| async move {
        tokio::time::sleep(Duration::from_millis(25)).await;
        chunk
    });
    (
        [(header::CONTENT_LENGTH, length.to_string())],
        Body::from_stream(paced),
    )
        .into_response()
}

async fn list_packages(State(world): State<SharedWorld>) -> Json<Vec<HostPackage>> {
    let (hang, installed) = {
        let world = world.lock().unwrap();
        (world.hang_packages, world.installed.clone())
    };
    if hang {
        std::future::pending::<()>().await;
    }
    Json(installed)
}

async fn write_file(State(world): State<SharedWorld>, mut multipart: Multipart) -> StatusCode {
    let mut path = None;
    let mut size = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let Ok(data) = field.bytes().await else {
            return StatusCode::BAD_REQUEST;
        };
        match name.as_str() {
            "upload" => size = Some(data.len()),
            "path" => path = Some(String::from_utf8_lossy(&data).to_string()),
            _ => {}
        }
    }
    match (path, size) {
        (Some(path), Some(size)) => {
            world.lock().unwrap().writes.push((path, size));
            StatusCode::OK
        }
        _ => StatusCode::BAD_REQUEST,
    }
}

async fn install_package(
    State(world): State<SharedWorld>,
    Json(req): Json<InstallRequest>,
) -> Response {
    let mut world = world.lock().unwrap();
    world.installs.push(req.vfs_path.clone());

    if !world.writes.iter().any(|(path, _)| path == &req.vfs_path) {
        return Json(json!({"success": false, "error": "File not found"})).into_response();
    }
    let Some((name, version)) = parse_staged(&req.vfs_path) else {
        return Json(json!({"success": false, "error": "Bad archive name"})).into_response();
    };
    if let Some(error) = world.failing_installs.get(&name).cloned() {
        return Json(json!({"success": false, "error": error})).into_response();
    }

    world.installed.retain(|pkg| pkg.name.as_deref() != Some(name.as_str()));
    world.installed.push(HostPackage {
        name: Some(name),
        version: Some(version),
    });
    Json(json!({"success": true})).into_response()
}

pub async fn spawn_server(world: World) -> TestServer {
    let world: SharedWorld = Arc::new(Mutex::new(world));
    let app = Router::new()
        .route("/repos/{file}", get(serve_manifest))
        .route("/artifacts/{file}", get(serve_artifact))
        .route("/stream/{file}", get(stream_artifact))
        .route("/paced/{file}", get(paced_artifact))
        .route("/packages", get(list_packages))
        .route("/packages/install", post(install_package))
        .route("/vfs/writefile", post(write_file))
        .with_state(world.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind listener");
    let addr = listener.local_addr().expect("Failed to get addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .await
            .expect("Server failed");
    });

    TestServer {
        addr,
        world,
        handle,
    }
}

/// `A` (2.0) depends on `B` (1.0); both artifacts present
pub fn ab_world() -> World {
    let mut world = World::default();
    world.manifests.insert(
        "repo.json".to_string(),
        json!({
            "apps": [
                {"name": "A", "version": "2.0", "title": "Alpha", "download": "../artifacts/a.wpk", "dependencies": ["B"]},
                {"name": "B", "version": "1.0", "download": "../artifacts/b.wpk"}
            ]
        })
        .to_string(),
    );
    world.artifacts.insert("a.wpk".to_string(), b"alpha-archive-bytes".to_vec());
    world.artifacts.insert("b.wpk".to_string(), b"beta-archive".to_vec());
    world
}

pub fn host_package(name: &str, version: &str) -> HostPackage {
    HostPackage {
        name: Some(name.to_string()),
        version: Some(version.to_string()),
    }
}

// ============================================================================
// Notifier
// ============================================================================

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    log: Mutex<Vec<(NoticeKind, String, String)>>,
}

impl RecordingNotifier {
    pub fn raised(&self) -> Vec<(NoticeKind, String, String)> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, title: &str, message: &str) {
        self.log
            .lock()
            .unwrap()
            .push((NoticeKind::Notification, title.to_string(), message.to_string()));
    }

    async fn alert(&self, title: &str, message: &str) {
        self.log
            .lock()
            .unwrap()
            .push((NoticeKind::Alert, title.to_string(), message.to_string()));
    }
}

// ============================================================================
// Store actor
// ============================================================================

pub struct TestStore {
    pub store: ActorRef<StoreMsg>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Drop for TestStore {
    fn drop(&mut self) {
        self.store.stop(None);
    }
}

/// Spawn a Store actor pointed at `server`, with the given settings backend
pub async fn spawn_store_with(server: &TestServer, settings: Arc<dyn SettingsStore>) -> TestStore {
    let client = reqwest::Client::new();
    let host = Arc::new(HttpPackageHost::new(client.clone(), server.base_url()));
    let notifier = Arc::new(RecordingNotifier::default());
    let (store, _handle) = Actor::spawn(
        None,
        StoreActor,
        StoreArguments {
            default_repository: server.repo_url("repo.json"),
            fetcher: Arc::new(HttpRepositoryFetcher::new(client.clone())),
            host: host.clone(),
            notifier: notifier.clone(),
            settings,
            executor: Arc::new(QueueExecutor::new(client, host, StagingConfig::default())),
            fetch_on_start: false,
        },
    )
    .await
    .expect("Failed to spawn StoreActor");

    TestStore { store, notifier }
}

pub async fn spawn_store(server: &TestServer) -> TestStore {
    spawn_store_with(server, Arc::new(MemorySettingsStore::default())).await
}

pub fn progress_phase(snapshot: &StoreSnapshot) -> Option<ProgressPhase> {
    match &snapshot.view {
        ViewSnapshot::Progress { progress } => Some(progress.phase),
        _ => None,
    }
}

/// Poll until the progress view reaches a terminal phase
pub async fn wait_for_terminal(store: &ActorRef<StoreMsg>) -> StoreSnapshot {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let snapshot = get_snapshot(store).await.expect("snapshot");
        if progress_phase(&snapshot).is_some_and(|phase| phase.is_terminal()) {
            return snapshot;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "pipeline did not finish: {:?}",
            snapshot.view
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
