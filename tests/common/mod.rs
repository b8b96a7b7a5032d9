#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tempfile::TempDir;
use tokio::sync::broadcast;
use uuid::Uuid;

use drover::auth::{LocalIssuer, TokenGenerator};
use drover::fleet::{ConfigurationResolver, NamespaceManager};
use drover::secrets::FileSecretSource;
use drover::server::AppState;
use drover::source::{FsManifestSource, RepoFetcher};
use drover::store::{SqliteStore, Store};
use drover::sync::{SyncScheduler, Synchronizer};
use drover::types::{Device, DeviceConfiguration, DeviceStatus, Namespace, Repository, Token};

pub struct TestHarness {
    pub temp: TempDir,
    pub store: Arc<SqliteStore>,
    pub state: Arc<AppState>,
    pub synchronizer: Arc<Synchronizer>,
    pub scheduler: Arc<SyncScheduler>,
    pub admin_token: String,
}

/// Build a full in-process control plane over a temp data dir, seeded with
/// the default namespace and one admin token.
pub fn harness() -> TestHarness {
    let temp = TempDir::new().expect("create temp dir");
    let store = Arc::new(SqliteStore::new(temp.path().join("drover.db")).expect("open store"));
    store.initialize().expect("initialize store");

    store
        .create_namespace(&Namespace {
            name: "default".to_string(),
            is_default: true,
            configuration: DeviceConfiguration::default(),
            created_at: Utc::now(),
        })
        .expect("seed default namespace");

    let generator = TokenGenerator::new();
    let (raw_token, lookup, hash) = generator.generate().expect("generate token");
    store
        .create_token(&Token {
            id: Uuid::new_v4().to_string(),
            token_hash: hash,
            token_lookup: lookup,
            created_at: Utc::now(),
            expires_at: None,
            last_used_at: None,
        })
        .expect("seed admin token");

    let secrets_dir = temp.path().join("secrets");
    std::fs::create_dir_all(&secrets_dir).expect("create secrets dir");
    let repos_dir = temp.path().join("repos");
    std::fs::create_dir_all(&repos_dir).expect("create repos dir");

    let source = Arc::new(FsManifestSource::new());
    let synchronizer = Arc::new(Synchronizer::new(store.clone(), source.clone()));
    let resolver = Arc::new(ConfigurationResolver::new(
        store.clone(),
        source,
        Arc::new(FileSecretSource::new(&secrets_dir)),
    ));
    let scheduler = Arc::new(SyncScheduler::new(
        store.clone(),
        synchronizer.clone(),
        Arc::new(RepoFetcher::new()),
        Duration::from_secs(3600),
    ));

    let (sync_trigger, _trigger_rx) = broadcast::channel(16);
    let state = Arc::new(AppState {
        store: store.clone(),
        namespaces: NamespaceManager::new(store.clone()),
        resolver,
        issuer: Arc::new(LocalIssuer::new()),
        sync_trigger,
        repos_dir,
    });

    TestHarness {
        temp,
        store,
        state,
        synchronizer,
        scheduler,
        admin_token: raw_token,
    }
}

impl TestHarness {
    /// Register a manifest repository row pointing its clone into the temp
    /// dir.
    pub fn add_repository(&self, name: &str, url: &str) -> Repository {
        let repository = Repository {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            url: url.to_string(),
            branch: "main".to_string(),
            local_path: self
                .temp
                .path()
                .join("repos")
                .join(name)
                .to_string_lossy()
                .to_string(),
            current_head: None,
            pull_period_seconds: 60,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.store
            .create_repository(&repository)
            .expect("create repository");
        repository
    }

    pub fn add_registered_device(&self, id: &str, namespace: &str) -> Device {
        let device = Device {
            id: id.to_string(),
            namespace: namespace.to_string(),
            set: None,
            configuration: None,
            status: DeviceStatus::Registered,
            cert_serial: Some("serial-1".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_seen_at: None,
        };
        self.store.create_device(&device).expect("create device");
        device
    }

    pub fn write_secret(&self, path: &str, key: &str, value: &str) {
        let dir = self.temp.path().join("secrets").join(path);
        std::fs::create_dir_all(&dir).expect("create secret dir");
        std::fs::write(dir.join(key), value).expect("write secret");
    }
}

/// Initialize a git repository with `main` as the initial branch.
pub fn init_manifest_repo(dir: &Path) -> git2::Repository {
    let mut opts = git2::RepositoryInitOptions::new();
    opts.initial_head("main");
    git2::Repository::init_opts(dir, &opts).expect("init repo")
}

/// Stage everything and commit; returns the commit SHA.
pub fn commit_all(repo: &git2::Repository, message: &str) -> String {
    let mut index = repo.index().expect("open index");
    index
        .add_all(["*"], git2::IndexAddOption::DEFAULT, None)
        .expect("stage files");
    index.write().expect("write index");
    let tree_id = index.write_tree().expect("write tree");
    let tree = repo.find_tree(tree_id).expect("find tree");
    let sig = git2::Signature::now("Test", "test@example.com").expect("signature");
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .expect("commit")
        .to_string()
}
