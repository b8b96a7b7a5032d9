use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::RequireAdmin;
use crate::server::AppState;
use crate::server::dto::CreateRepositoryRequest;
use crate::server::response::{ApiError, ApiResponse};
use crate::server::validation::validate_name;
use crate::types::Repository;

pub async fn create_repository(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRepositoryRequest>,
) -> impl IntoResponse {
    if let Err(e) = validate_name(&req.name) {
        return Err(ApiError::bad_request(e));
    }
    if req.url.trim().is_empty() {
        return Err(ApiError::bad_request("Repository url cannot be empty"));
    }

    if state.store.get_repository_by_name(&req.name)?.is_some() {
        return Err(ApiError::conflict("Repository already exists"));
    }

    let local_path = state.repos_dir.join(&req.name);
    let repository = Repository {
        id: Uuid::new_v4().to_string(),
        name: req.name,
        url: req.url,
        branch: req.branch,
        local_path: local_path.to_string_lossy().to_string(),
        current_head: None,
        pull_period_seconds: req.pull_period_seconds,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    state.store.create_repository(&repository)?;
    // Initial clone and reconcile happen on the scheduler's next pass.
    state.request_sync();

    Ok((StatusCode::CREATED, Json(ApiResponse::success(repository))))
}

pub async fn list_repositories(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let repositories = state.store.list_repositories()?;
    Ok::<_, ApiError>(Json(ApiResponse::success(repositories)))
}

pub async fn get_repository(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let repository = state
        .store
        .get_repository(&id)?
        .ok_or_else(|| ApiError::not_found("Repository not found"))?;

    Ok::<_, ApiError>(Json(ApiResponse::success(repository)))
}

pub async fn delete_repository(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let repository = state
        .store
        .get_repository(&id)?
        .ok_or_else(|| ApiError::not_found("Repository not found"))?;

    // Reference rows cascade with the repository row; already-distributed
    // relations dangle until their manifests converge away.
    state.store.delete_repository(&repository.id)?;

    if let Err(e) = std::fs::remove_dir_all(&repository.local_path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(repo = %repository.name, error = %e, "failed to remove clone");
        }
    }

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

/// Kick the sync scheduler outside its tick.
pub async fn sync_repository(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if state.store.get_repository(&id)?.is_none() {
        return Err(ApiError::not_found("Repository not found"));
    }

    state.request_sync();
    Ok::<_, ApiError>(StatusCode::ACCEPTED)
}

pub async fn list_manifests(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let repository = state
        .store
        .get_repository(&id)?
        .ok_or_else(|| ApiError::not_found("Repository not found"))?;

    let references = state.store.list_references(&repository.id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(references)))
}
