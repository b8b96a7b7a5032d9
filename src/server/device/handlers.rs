//! Device-facing endpoints: enroll, register, fetch configuration.
//!
//! Transport security sits in front of this API: an mTLS-terminating proxy
//! authenticates registered devices and forwards the certificate subject in
//! headers (see `auth::DeviceIdentity`). Enrollment and registration run
//! before the device holds its identity and are gated by the deployment's
//! bootstrap trust (enrollment network, provisioning token on the proxy).

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use crate::auth::DeviceIdentity;
use crate::server::AppState;
use crate::server::dto::{EnrollRequest, RegisterRequest, RegisterResponse};
use crate::server::response::{ApiError, ApiResponse};
use crate::server::validation::validate_device_id;
use crate::types::{Device, DeviceStatus};

/// Create the device record. Enrolling an already-known device returns the
/// existing record so agents can retry safely.
pub async fn enroll(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EnrollRequest>,
) -> impl IntoResponse {
    if let Err(e) = validate_device_id(&req.device_id) {
        return Err(ApiError::bad_request(e));
    }

    if let Some(existing) = state.store.get_device(&req.device_id)? {
        return Ok((StatusCode::OK, Json(ApiResponse::success(existing))));
    }

    let namespace = match &req.namespace {
        Some(name) => state
            .store
            .get_namespace(name)?
            .ok_or_else(|| ApiError::bad_request("Unknown namespace"))?,
        None => state
            .store
            .get_default_namespace()?
            .ok_or_else(|| ApiError::internal("No default namespace"))?,
    };

    let now = Utc::now();
    let device = Device {
        id: req.device_id,
        namespace: namespace.name,
        set: None,
        configuration: None,
        status: DeviceStatus::Enrolled,
        cert_serial: None,
        created_at: now,
        updated_at: now,
        last_seen_at: None,
    };

    state.store.create_device(&device)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(device))))
}

/// Issue the device identity and mark it registered.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    let mut device = state
        .store
        .get_device(&id)?
        .ok_or_else(|| ApiError::not_found("Device not found"))?;

    let cert_serial = state.issuer.issue(&device.id, &req.csr)?;

    device.status = DeviceStatus::Registered;
    device.cert_serial = Some(cert_serial.clone());
    state.store.update_device(&device)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(RegisterResponse { cert_serial })))
}

/// The device-facing resolution path. Individual unresolvable manifests are
/// dropped by the resolver; only an unknown device or a broken hierarchy
/// fails the request.
pub async fn get_configuration(
    identity: DeviceIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if identity.common_name != id {
        return Err(ApiError::forbidden("Certificate does not match device"));
    }

    let device = state
        .store
        .get_device(&id)?
        .ok_or_else(|| ApiError::not_found("Device not found"))?;

    if device.status != DeviceStatus::Registered {
        return Err(ApiError::forbidden("Device not registered"));
    }

    if let (Some(presented), Some(stored)) = (&identity.cert_serial, &device.cert_serial) {
        if presented != stored {
            return Err(ApiError::forbidden("Certificate serial mismatch"));
        }
    }

    let response = state.resolver.resolve(&device.id)?;

    if let Err(e) = state.store.touch_device_seen(&device.id) {
        tracing::warn!(device = %device.id, error = %e, "failed to update last_seen_at");
    }

    Ok::<_, ApiError>(Json(ApiResponse::success(response)))
}
