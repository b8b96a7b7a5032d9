use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use crate::auth::RequireAdmin;
use crate::server::AppState;
use crate::server::dto::{CreateNamespaceRequest, UpdateNamespaceRequest};
use crate::server::response::{ApiError, ApiResponse};
use crate::server::validation::validate_name;
use crate::types::Namespace;

pub async fn create_namespace(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateNamespaceRequest>,
) -> impl IntoResponse {
    if let Err(e) = validate_name(&req.name) {
        return Err(ApiError::bad_request(e));
    }

    let ns = Namespace {
        name: req.name,
        is_default: req.is_default,
        configuration: req.configuration.unwrap_or_default(),
        created_at: Utc::now(),
    };

    let ns = state.namespaces.create(ns)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(ns))))
}

pub async fn list_namespaces(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let namespaces = state.store.list_namespaces()?;
    Ok::<_, ApiError>(Json(ApiResponse::success(namespaces)))
}

pub async fn get_namespace(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let ns = state
        .store
        .get_namespace(&name)?
        .ok_or_else(|| ApiError::not_found("Namespace not found"))?;

    Ok::<_, ApiError>(Json(ApiResponse::success(ns)))
}

pub async fn update_namespace(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<UpdateNamespaceRequest>,
) -> impl IntoResponse {
    let mut ns = state
        .store
        .get_namespace(&name)?
        .ok_or_else(|| ApiError::not_found("Namespace not found"))?;

    if let Some(is_default) = req.is_default {
        ns.is_default = is_default;
    }
    if let Some(configuration) = req.configuration {
        ns.configuration = configuration;
    }

    state.namespaces.update(&ns)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(ns)))
}

pub async fn delete_namespace(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let deleted = state.namespaces.delete(&name)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(deleted)))
}
