//! Periodic reconciliation driver.
//!
//! A single interval tick walks every known repository in sequence: pull the
//! clone, then reconcile references and relations. A manual trigger wakes
//! the loop early and bypasses per-repository pull-period gating. Failures
//! are isolated per repository; the next tick retries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info};

use super::Synchronizer;
use crate::error::Result;
use crate::source::RepoFetcher;
use crate::store::Store;
use crate::types::Repository;

pub struct SyncScheduler {
    store: Arc<dyn Store>,
    synchronizer: Arc<Synchronizer>,
    fetcher: Arc<RepoFetcher>,
    interval: Duration,
    last_synced: Mutex<HashMap<String, Instant>>,
}

impl SyncScheduler {
    pub fn new(
        store: Arc<dyn Store>,
        synchronizer: Arc<Synchronizer>,
        fetcher: Arc<RepoFetcher>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            synchronizer,
            fetcher,
            interval,
            last_synced: Mutex::new(HashMap::new()),
        }
    }

    /// Start the sync loop. `trigger_rx` wakes it early (manual sync),
    /// `shutdown_rx` stops it; a pass already underway finishes its current
    /// repository and the next tick resumes from persisted state.
    pub fn spawn(
        self: Arc<Self>,
        mut trigger_rx: broadcast::Receiver<()>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // consume the immediate first tick
            let mut trigger_open = true;

            loop {
                let forced = tokio::select! {
                    _ = ticker.tick() => false,
                    received = trigger_rx.recv(), if trigger_open => {
                        match received {
                            Ok(()) => {
                                info!("manual sync triggered");
                                true
                            }
                            // Missed triggers collapse into one forced pass.
                            Err(broadcast::error::RecvError::Lagged(_)) => true,
                            Err(broadcast::error::RecvError::Closed) => {
                                // All trigger senders gone; keep ticking.
                                trigger_open = false;
                                continue;
                            }
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                };

                if *shutdown_rx.borrow() {
                    break;
                }

                let scheduler = Arc::clone(&self);
                let result =
                    tokio::task::spawn_blocking(move || scheduler.run_once(forced)).await;
                if let Err(e) = result {
                    error!(error = %e, "sync pass panicked");
                }
            }

            debug!("sync scheduler stopped");
        })
    }

    /// Run one pass over all repositories. Returns how many were synced;
    /// repositories inside their pull period are skipped unless `force` is
    /// set.
    pub fn run_once(&self, force: bool) -> usize {
        let repositories = match self.store.list_repositories() {
            Ok(repositories) => repositories,
            Err(e) => {
                error!(error = %e, "cannot list repositories");
                return 0;
            }
        };

        let mut synced = 0;
        for repository in repositories {
            if !force && !self.due(&repository) {
                continue;
            }
            match self.sync_repository(&repository) {
                Ok(()) => synced += 1,
                Err(e) => {
                    // This repository retries next tick; siblings are unaffected.
                    error!(repo = %repository.name, error = %e, "repository sync failed");
                }
            }
        }
        synced
    }

    fn due(&self, repository: &Repository) -> bool {
        let last_synced = self.last_synced.lock().unwrap_or_else(|e| e.into_inner());
        match last_synced.get(&repository.id) {
            Some(at) => at.elapsed() >= Duration::from_secs(repository.pull_period_seconds.into()),
            None => true,
        }
    }

    fn sync_repository(&self, repository: &Repository) -> Result<()> {
        let head = self.fetcher.ensure_local(repository)?;
        if repository.current_head.as_deref() != Some(head.as_str()) {
            self.store.update_repository_head(&repository.id, &head)?;
        }

        let outcome = self.synchronizer.sync_repository(repository)?;
        if !outcome.is_noop() {
            info!(
                repo = %repository.name,
                created = outcome.references_created,
                updated = outcome.references_updated,
                deleted = outcome.references_deleted,
                relations_created = outcome.relations_created,
                relations_deleted = outcome.relations_deleted,
                "repository reconciled"
            );
        }

        self.last_synced
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(repository.id.clone(), Instant::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;
    use crate::source::FsManifestSource;
    use crate::store::SqliteStore;

    fn init_source_repo(dir: &std::path::Path) -> git2::Repository {
        let mut opts = git2::RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = git2::Repository::init_opts(dir, &opts).unwrap();
        std::fs::write(dir.join("a.manifest.yaml"), "kind: workload\nname: a\n").unwrap();
        {
            let mut index = repo.index().unwrap();
            index
                .add_all(["*"], git2::IndexAddOption::DEFAULT, None)
                .unwrap();
            index.write().unwrap();
            let tree_id = index.write_tree().unwrap();
            let tree = repo.find_tree(tree_id).unwrap();
            let sig = git2::Signature::now("Test", "test@example.com").unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[])
                .unwrap();
        }
        repo
    }

    fn scheduler_with_repo(temp: &TempDir, source_dir: &std::path::Path) -> Arc<SyncScheduler> {
        let store = Arc::new(SqliteStore::new(temp.path().join("test.db")).unwrap());
        store.initialize().unwrap();
        store
            .create_repository(&Repository {
                id: "repo-1".to_string(),
                name: "fleet".to_string(),
                url: source_dir.to_string_lossy().to_string(),
                branch: "main".to_string(),
                local_path: temp.path().join("clones/fleet").to_string_lossy().to_string(),
                current_head: None,
                pull_period_seconds: 3600,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .unwrap();

        let source = Arc::new(FsManifestSource::new());
        let synchronizer = Arc::new(Synchronizer::new(store.clone(), source));
        Arc::new(SyncScheduler::new(
            store,
            synchronizer,
            Arc::new(RepoFetcher::new()),
            Duration::from_secs(3600),
        ))
    }

    #[test]
    fn test_run_once_syncs_and_records_head() {
        let temp = TempDir::new().unwrap();
        let source_dir = TempDir::new().unwrap();
        init_source_repo(source_dir.path());

        let scheduler = scheduler_with_repo(&temp, source_dir.path());
        assert_eq!(scheduler.run_once(false), 1);

        let repository = scheduler.store.get_repository("repo-1").unwrap().unwrap();
        assert!(repository.current_head.is_some());
        assert_eq!(scheduler.store.list_references("repo-1").unwrap().len(), 1);
    }

    #[test]
    fn test_pull_period_gates_unforced_passes() {
        let temp = TempDir::new().unwrap();
        let source_dir = TempDir::new().unwrap();
        init_source_repo(source_dir.path());

        let scheduler = scheduler_with_repo(&temp, source_dir.path());
        assert_eq!(scheduler.run_once(false), 1);
        // Inside the 3600s pull period: skipped unless forced.
        assert_eq!(scheduler.run_once(false), 0);
        assert_eq!(scheduler.run_once(true), 1);
    }

    #[test]
    fn test_broken_repository_does_not_stop_the_pass() {
        let temp = TempDir::new().unwrap();
        let source_dir = TempDir::new().unwrap();
        init_source_repo(source_dir.path());

        let scheduler = scheduler_with_repo(&temp, source_dir.path());
        scheduler
            .store
            .create_repository(&Repository {
                id: "repo-0".to_string(),
                name: "broken".to_string(),
                url: temp.path().join("nowhere").to_string_lossy().to_string(),
                branch: "main".to_string(),
                local_path: temp.path().join("clones/broken").to_string_lossy().to_string(),
                current_head: None,
                pull_period_seconds: 3600,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .unwrap();

        // "broken" fails to clone; "fleet" still syncs.
        assert_eq!(scheduler.run_once(true), 1);
        assert_eq!(scheduler.store.list_references("repo-1").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_spawned_loop_stops_on_shutdown() {
        let temp = TempDir::new().unwrap();
        let source_dir = TempDir::new().unwrap();
        init_source_repo(source_dir.path());

        let scheduler = scheduler_with_repo(&temp, source_dir.path());
        let (_trigger_tx, trigger_rx) = broadcast::channel(4);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = scheduler.spawn(trigger_rx, shutdown_rx);
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }
}
