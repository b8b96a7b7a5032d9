//! # Drover
//!
//! A control plane for fleets of edge devices, usable both as a standalone
//! binary and as a library. Devices enroll into a Namespace → Set → Device
//! hierarchy; workloads and configuration are declared in YAML manifests
//! kept in git repositories and bound to resources through selectors. A
//! background synchronizer keeps the persisted relation graph convergent
//! with git state, and each device request resolves its effective
//! configuration by walking the hierarchy.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! drover = { version = "0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use drover::store::{SqliteStore, Store};
//! use drover::source::FsManifestSource;
//! use drover::sync::Synchronizer;
//!
//! let store = Arc::new(SqliteStore::new("./data/drover.db").unwrap());
//! store.initialize().unwrap();
//!
//! let synchronizer = Synchronizer::new(store.clone(), Arc::new(FsManifestSource::new()));
//! // Reconcile a repository, serve the router with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes the binary's CLI dependencies. Disable with
//!   `default-features = false`.

pub mod auth;
pub mod config;
pub mod error;
pub mod fleet;
pub mod secrets;
pub mod server;
pub mod source;
pub mod store;
pub mod sync;
pub mod types;
