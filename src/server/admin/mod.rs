mod devices;
mod namespaces;
mod repositories;
mod sets;
mod tokens;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::server::AppState;

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/namespaces",
            post(namespaces::create_namespace).get(namespaces::list_namespaces),
        )
        .route(
            "/namespaces/{name}",
            get(namespaces::get_namespace)
                .put(namespaces::update_namespace)
                .delete(namespaces::delete_namespace),
        )
        .route("/sets", post(sets::create_set).get(sets::list_sets))
        .route(
            "/sets/{name}",
            get(sets::get_set).put(sets::update_set).delete(sets::delete_set),
        )
        .route("/devices", get(devices::list_devices))
        .route(
            "/devices/{id}",
            get(devices::get_device)
                .put(devices::update_device)
                .delete(devices::delete_device),
        )
        .route(
            "/repositories",
            post(repositories::create_repository).get(repositories::list_repositories),
        )
        .route(
            "/repositories/{id}",
            get(repositories::get_repository).delete(repositories::delete_repository),
        )
        .route("/repositories/{id}/sync", post(repositories::sync_repository))
        .route(
            "/repositories/{id}/manifests",
            get(repositories::list_manifests),
        )
        .route("/tokens", post(tokens::create_token).get(tokens::list_tokens))
        .route("/tokens/{id}", delete(tokens::delete_token))
}
