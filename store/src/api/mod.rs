//! HTTP API routes for the Store service
//!
//! Thin layer over the Store actor: each route maps to one actor message and
//! returns the resulting snapshot.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use ractor::ActorRef;
use serde_json::json;

pub mod store;

use crate::actors::StoreMsg;

#[derive(Clone)]
pub struct ApiState {
    pub store: ActorRef<StoreMsg>,
}

/// Configure all API routes
pub fn router() -> Router<ApiState> {
    Router::new()
        .route("/health", get(health_check))
        // Catalog
        .route("/store", get(store::get_store))
        .route("/store/refresh", post(store::refresh_catalog))
        .route("/store/search", put(store::set_search))
        // Install pipeline
        .route(
            "/store/packages/{name}/install",
            post(store::install_package),
        )
        .route("/store/updates/all", post(store::update_all))
        .route("/store/progress/confirm", post(store::confirm_install))
        .route("/store/progress/cancel", post(store::cancel_install))
        .route("/store/progress/close", post(store::close_progress))
        // Views
        .route("/store/views/updates", post(store::show_updates))
        .route("/store/views/home", post(store::show_home))
        // Repository editor
        .route("/store/repositories/edit", post(store::open_repositories))
        .route("/store/repositories/draft", post(store::add_repository))
        .route(
            "/store/repositories/draft/{index}",
            put(store::edit_repository).delete(store::remove_repository),
        )
        .route("/store/repositories/save", post(store::save_repositories))
        .route("/store/repositories/cancel", post(store::cancel_repositories))
        .route("/store/notices", delete(store::clear_notices))
}

/// Health check endpoint
pub async fn health_check(State(_state): State<ApiState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "store",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}
