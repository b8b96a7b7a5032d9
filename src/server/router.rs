use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get};
use tokio::sync::broadcast;

use super::admin::admin_router;
use super::device::device_router;
use crate::auth::IdentityIssuer;
use crate::fleet::{ConfigurationResolver, NamespaceManager};
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub namespaces: NamespaceManager,
    pub resolver: Arc<ConfigurationResolver>,
    pub issuer: Arc<dyn IdentityIssuer>,
    /// Wakes the sync scheduler outside its tick.
    pub sync_trigger: broadcast::Sender<()>,
    /// Where repository clones are placed.
    pub repos_dir: PathBuf,
}

impl AppState {
    /// Fire the manual sync trigger. Nobody listening (scheduler not
    /// running) is fine.
    pub fn request_sync(&self) {
        let _ = self.sync_trigger.send(());
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/admin", admin_router())
        .nest("/api/v1", device_router())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
