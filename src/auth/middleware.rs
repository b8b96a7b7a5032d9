use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::json;

use super::token::{TokenGenerator, parse_token};
use crate::server::AppState;
use crate::types::Token;

/// Extractor that requires a valid admin token
pub struct RequireAdmin(pub Token);

/// Device identity asserted by the mTLS-terminating proxy in front of the
/// device API. The proxy authenticates the client certificate and forwards
/// the subject CN and serial; the control plane only compares them against
/// its records.
pub struct DeviceIdentity {
    pub common_name: String,
    pub cert_serial: Option<String>,
}

const DEVICE_CN_HEADER: &str = "x-device-cn";
const DEVICE_SERIAL_HEADER: &str = "x-device-cert-serial";

#[derive(Debug)]
pub enum AuthError {
    MissingAuth,
    InvalidScheme,
    InvalidToken,
    TokenExpired,
    MissingIdentity,
    InternalError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AuthError::InvalidScheme => (StatusCode::UNAUTHORIZED, "Invalid authorization scheme"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token"),
            AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "Token expired"),
            AuthError::MissingIdentity => {
                (StatusCode::UNAUTHORIZED, "Device identity not presented")
            }
            AuthError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = json!({ "data": null, "error": message });

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                "WWW-Authenticate",
                "Bearer realm=\"drover\"".parse().expect("static header value"),
            );
        }

        response
    }
}

impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AuthError::MissingAuth)?;

        let raw_token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidScheme)?
            .trim();

        let (lookup, _secret) = parse_token(raw_token).map_err(|_| AuthError::InvalidToken)?;

        let token = state
            .store
            .get_token_by_lookup(&lookup)
            .map_err(|_| AuthError::InternalError)?
            .ok_or(AuthError::InvalidToken)?;

        if let Some(expires_at) = token.expires_at {
            if expires_at < Utc::now() {
                return Err(AuthError::TokenExpired);
            }
        }

        let verified = TokenGenerator::new()
            .verify(raw_token, &token.token_hash)
            .map_err(|_| AuthError::InternalError)?;
        if !verified {
            return Err(AuthError::InvalidToken);
        }

        // Best effort; an audit timestamp is not worth failing the request.
        if let Err(e) = state.store.update_token_last_used(&token.id) {
            tracing::warn!(token = %token.id, error = %e, "failed to update token last_used_at");
        }

        Ok(RequireAdmin(token))
    }
}

impl FromRequestParts<Arc<AppState>> for DeviceIdentity {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let common_name = parts
            .headers
            .get(DEVICE_CN_HEADER)
            .and_then(|h| h.to_str().ok())
            .filter(|cn| !cn.is_empty())
            .ok_or(AuthError::MissingIdentity)?
            .to_string();

        let cert_serial = parts
            .headers
            .get(DEVICE_SERIAL_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string());

        Ok(DeviceIdentity {
            common_name,
            cert_serial,
        })
    }
}
