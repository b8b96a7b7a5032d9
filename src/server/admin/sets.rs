use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;

use crate::auth::RequireAdmin;
use crate::server::AppState;
use crate::server::dto::{CreateSetRequest, UpdateSetRequest};
use crate::server::response::{ApiError, ApiResponse};
use crate::server::validation::validate_name;
use crate::types::DeviceSet;

#[derive(Debug, Deserialize)]
pub struct ListSetsParams {
    pub namespace: Option<String>,
}

pub async fn create_set(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSetRequest>,
) -> impl IntoResponse {
    if let Err(e) = validate_name(&req.name) {
        return Err(ApiError::bad_request(e));
    }

    if state.store.get_namespace(&req.namespace)?.is_none() {
        return Err(ApiError::bad_request("Unknown namespace"));
    }

    let set = DeviceSet {
        name: req.name,
        namespace: req.namespace,
        configuration: req.configuration,
        created_at: Utc::now(),
    };

    state.store.create_set(&set)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(set))))
}

pub async fn list_sets(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListSetsParams>,
) -> impl IntoResponse {
    let sets = state.store.list_sets(params.namespace.as_deref())?;
    Ok::<_, ApiError>(Json(ApiResponse::success(sets)))
}

pub async fn get_set(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let set = state
        .store
        .get_set(&name)?
        .ok_or_else(|| ApiError::not_found("Set not found"))?;

    Ok::<_, ApiError>(Json(ApiResponse::success(set)))
}

pub async fn update_set(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<UpdateSetRequest>,
) -> impl IntoResponse {
    let mut set = state
        .store
        .get_set(&name)?
        .ok_or_else(|| ApiError::not_found("Set not found"))?;

    if let Some(configuration) = req.configuration {
        set.configuration = configuration;
    }

    state.store.update_set(&set)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(set)))
}

pub async fn delete_set(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    if !state.store.delete_set(&name)? {
        return Err(ApiError::not_found("Set not found"));
    }

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
