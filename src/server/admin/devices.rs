use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireAdmin;
use crate::server::AppState;
use crate::server::dto::{PaginationParams, UpdateDeviceRequest};
use crate::server::response::{
    ApiError, ApiResponse, DEFAULT_PAGE_SIZE, PaginatedResponse, paginate,
};

pub async fn list_devices(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let cursor = params.cursor.as_deref().unwrap_or("");

    let devices = state.store.list_devices(
        params.namespace.as_deref(),
        cursor,
        DEFAULT_PAGE_SIZE + 1,
    )?;

    let (devices, next_cursor, has_more) =
        paginate(devices, DEFAULT_PAGE_SIZE as usize, |d| d.id.clone());

    Ok::<_, ApiError>(Json(PaginatedResponse::new(devices, next_cursor, has_more)))
}

pub async fn get_device(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let device = state
        .store
        .get_device(&id)?
        .ok_or_else(|| ApiError::not_found("Device not found"))?;

    Ok::<_, ApiError>(Json(ApiResponse::success(device)))
}

/// Move a device between namespaces or sets, or override its configuration.
pub async fn update_device(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateDeviceRequest>,
) -> impl IntoResponse {
    let mut device = state
        .store
        .get_device(&id)?
        .ok_or_else(|| ApiError::not_found("Device not found"))?;

    if let Some(namespace) = req.namespace {
        if state.store.get_namespace(&namespace)?.is_none() {
            return Err(ApiError::bad_request("Unknown namespace"));
        }
        if namespace != device.namespace {
            // Sets do not cross namespaces.
            device.set = None;
        }
        device.namespace = namespace;
    }

    if let Some(set) = req.set {
        match &set {
            Some(name) => {
                let target = state
                    .store
                    .get_set(name)?
                    .ok_or_else(|| ApiError::bad_request("Unknown set"))?;
                if target.namespace != device.namespace {
                    return Err(ApiError::bad_request(
                        "Set belongs to a different namespace",
                    ));
                }
            }
            None => {}
        }
        device.set = set;
    }

    if let Some(configuration) = req.configuration {
        device.configuration = configuration;
    }

    state.store.update_device(&device)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(device)))
}

pub async fn delete_device(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if !state.store.delete_device(&id)? {
        return Err(ApiError::not_found("Device not found"));
    }

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
