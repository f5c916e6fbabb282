use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use ractor::Actor;
use store::actors::{StoreActor, StoreArguments};
use store::api;
use store::catalog::HttpRepositoryFetcher;
use store::config::StoreConfig;
use store::host::{HttpPackageHost, TracingNotifier};
use store::installer::QueueExecutor;
use store::settings::{FileSettingsStore, MemorySettingsStore, SettingsStore};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "store=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = StoreConfig::from_env()?;
    tracing::info!(
        port = config.port,
        host = %config.host_base_url,
        "Starting Store API Server"
    );

    let client = reqwest::Client::builder()
        .user_agent(concat!("store/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let settings: Arc<dyn SettingsStore> = match &config.settings_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Using file-backed repository settings");
            Arc::new(FileSettingsStore::new(path))
        }
        None => {
            tracing::warn!("STORE_SETTINGS_PATH is empty; repository settings will not persist");
            Arc::new(MemorySettingsStore::default())
        }
    };

    let host = Arc::new(HttpPackageHost::new(client.clone(), &config.host_base_url));
    let executor = QueueExecutor::new(client.clone(), host.clone(), config.staging.clone());

    let (store, _handle) = Actor::spawn(
        Some("store".to_string()),
        StoreActor,
        StoreArguments {
            default_repository: config.default_repository.clone(),
            fetcher: Arc::new(HttpRepositoryFetcher::new(client)),
            host,
            notifier: Arc::new(TracingNotifier),
            settings,
            executor: Arc::new(executor),
            fetch_on_start: config.fetch_on_start,
        },
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to spawn StoreActor: {e}"))?;

    tracing::info!("StoreActor started");

    let allowed_origins = config
        .allowed_origins
        .iter()
        .map(|origin| HeaderValue::from_str(origin))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {e}"))?;

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(std::time::Duration::from_secs(3600));

    let app = api::router()
        .with_state(api::ApiState { store })
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting HTTP server on http://{addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
