mod handlers;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::server::AppState;

pub fn device_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/devices/enroll", post(handlers::enroll))
        .route("/devices/{id}/register", post(handlers::register))
        .route("/devices/{id}/configuration", get(handlers::get_configuration))
}
