//! Store API endpoints

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use shared_types::StoreSnapshot;

use crate::actors::StoreMsg;
use crate::api::ApiState;
use crate::controller::StoreError;

type ActorResult<T> = Result<T, ractor::RactorErr<StoreMsg>>;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct RepositorySlotRequest {
    pub url: String,
}

fn actor_error(e: ractor::RactorErr<StoreMsg>) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "success": false,
            "error": format!("Actor error: {e}")
        })),
    )
        .into_response()
}

fn snapshot_response(result: ActorResult<StoreSnapshot>) -> Response {
    match result {
        Ok(snapshot) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "store": snapshot
            })),
        )
            .into_response(),
        Err(e) => actor_error(e),
    }
}

fn command_response(result: ActorResult<Result<StoreSnapshot, StoreError>>) -> Response {
    match result {
        Ok(Ok(snapshot)) => snapshot_response(Ok(snapshot)),
        Ok(Err(e)) => {
            let status = match e {
                StoreError::PackageNotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_REQUEST,
            };
            (
                status,
                Json(json!({
                    "success": false,
                    "error": e.to_string()
                })),
            )
                .into_response()
        }
        Err(e) => actor_error(e),
    }
}

/// Get the full Store state
pub async fn get_store(State(state): State<ApiState>) -> impl IntoResponse {
    snapshot_response(ractor::call!(state.store, |reply| StoreMsg::GetSnapshot {
        reply
    }))
}

/// Re-fetch every repository and wait for the new catalog
pub async fn refresh_catalog(State(state): State<ApiState>) -> impl IntoResponse {
    match ractor::call!(state.store, |reply| StoreMsg::Refresh {
        reply: Some(reply)
    }) {
        Ok(count) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "count": count
            })),
        )
            .into_response(),
        Err(e) => actor_error(e),
    }
}

pub async fn set_search(
    State(state): State<ApiState>,
    Json(req): Json<SearchRequest>,
) -> impl IntoResponse {
    snapshot_response(ractor::call!(state.store, |reply| StoreMsg::SetSearch {
        query: req.query,
        reply,
    }))
}

/// Install or update one package
pub async fn install_package(
    Path(name): Path<String>,
    State(state): State<ApiState>,
) -> impl IntoResponse {
    command_response(ractor::call!(state.store, |reply| StoreMsg::Install {
        name,
        reply
    }))
}

pub async fn update_all(State(state): State<ApiState>) -> impl IntoResponse {
    command_response(ractor::call!(state.store, |reply| StoreMsg::UpdateAll {
        reply
    }))
}

pub async fn confirm_install(State(state): State<ApiState>) -> impl IntoResponse {
    command_response(ractor::call!(state.store, |reply| StoreMsg::Confirm { reply }))
}

pub async fn cancel_install(State(state): State<ApiState>) -> impl IntoResponse {
    command_response(ractor::call!(state.store, |reply| StoreMsg::Cancel { reply }))
}

pub async fn close_progress(State(state): State<ApiState>) -> impl IntoResponse {
    command_response(ractor::call!(state.store, |reply| StoreMsg::CloseProgress {
        reply
    }))
}

pub async fn show_updates(State(state): State<ApiState>) -> impl IntoResponse {
    command_response(ractor::call!(state.store, |reply| StoreMsg::ShowUpdates {
        reply
    }))
}

pub async fn show_home(State(state): State<ApiState>) -> impl IntoResponse {
    command_response(ractor::call!(state.store, |reply| StoreMsg::ShowHome { reply }))
}

/// Open the repository editor with a draft of the committed list
pub async fn open_repositories(State(state): State<ApiState>) -> impl IntoResponse {
    command_response(ractor::call!(state.store, |reply| {
        StoreMsg::OpenRepositories { reply }
    }))
}

pub async fn edit_repository(
    Path(index): Path<usize>,
    State(state): State<ApiState>,
    Json(req): Json<RepositorySlotRequest>,
) -> impl IntoResponse {
    command_response(ractor::call!(state.store, |reply| {
        StoreMsg::EditRepository {
            index,
            url: req.url,
            reply,
        }
    }))
}

pub async fn add_repository(State(state): State<ApiState>) -> impl IntoResponse {
    command_response(ractor::call!(state.store, |reply| StoreMsg::AddRepository {
        reply
    }))
}

pub async fn remove_repository(
    Path(index): Path<usize>,
    State(state): State<ApiState>,
) -> impl IntoResponse {
    command_response(ractor::call!(state.store, |reply| {
        StoreMsg::RemoveRepository { index, reply }
    }))
}

/// Validate and commit the draft, then refresh the catalog
pub async fn save_repositories(State(state): State<ApiState>) -> impl IntoResponse {
    command_response(ractor::call!(state.store, |reply| {
        StoreMsg::SaveRepositories { reply }
    }))
}

pub async fn cancel_repositories(State(state): State<ApiState>) -> impl IntoResponse {
    command_response(ractor::call!(state.store, |reply| {
        StoreMsg::CancelRepositories { reply }
    }))
}

pub async fn clear_notices(State(state): State<ApiState>) -> impl IntoResponse {
    snapshot_response(ractor::call!(state.store, |reply| StoreMsg::ClearNotices {
        reply
    }))
}
