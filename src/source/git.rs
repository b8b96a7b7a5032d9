//! Keeps repository clones current.
//!
//! One fetcher serves every repository row: clone on first sight, then
//! fetch-and-reset on each pass. Local state always tracks the remote branch
//! head, even across force pushes.

use std::path::Path;

use git2::build::RepoBuilder;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::Repository;

#[derive(Debug, Default)]
pub struct RepoFetcher;

impl RepoFetcher {
    pub fn new() -> Self {
        Self
    }

    /// Ensure the repository's local clone exists and matches the remote
    /// branch head. Returns the head commit SHA.
    pub fn ensure_local(&self, repo: &Repository) -> Result<String> {
        let path = Path::new(&repo.local_path);
        if path.join(".git").exists() {
            self.update(repo, path)
        } else {
            self.clone(repo, path)
        }
    }

    fn clone(&self, repo: &Repository, path: &Path) -> Result<String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!(repo = %repo.name, url = %repo.url, branch = %repo.branch, "cloning repository");
        let git_repo = RepoBuilder::new()
            .branch(&repo.branch)
            .clone(&repo.url, path)?;

        let head = git_repo.head()?.peel_to_commit()?.id();
        Ok(head.to_string())
    }

    fn update(&self, repo: &Repository, path: &Path) -> Result<String> {
        let git_repo = git2::Repository::open(path)?;

        let mut remote = git_repo.find_remote("origin")?;
        remote.fetch(&[repo.branch.as_str()], None, None)?;

        let remote_ref = git_repo.find_reference(&format!("refs/remotes/origin/{}", repo.branch))?;
        let oid = remote_ref
            .target()
            .ok_or_else(|| Error::Config(format!("remote branch {} has no target", repo.branch)))?;

        // Hard reset to the remote head; survives force pushes and local
        // clutter alike.
        let object = git_repo.find_object(oid, None)?;
        git_repo.reset(&object, git2::ResetType::Hard, None)?;

        debug!(repo = %repo.name, head = %oid, "repository updated");
        Ok(oid.to_string())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;

    fn init_source_repo(dir: &Path) -> git2::Repository {
        let mut opts = git2::RepositoryInitOptions::new();
        opts.initial_head("main");
        git2::Repository::init_opts(dir, &opts).unwrap()
    }

    fn commit_all(repo: &git2::Repository, message: &str) -> git2::Oid {
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"], git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("Test", "test@example.com").unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
    }

    fn repository(url: &str, local: &Path) -> Repository {
        Repository {
            id: "repo-1".to_string(),
            name: "fleet".to_string(),
            url: url.to_string(),
            branch: "main".to_string(),
            local_path: local.to_string_lossy().to_string(),
            current_head: None,
            pull_period_seconds: 60,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_clone_then_fetch_tracks_head() {
        let source_dir = TempDir::new().unwrap();
        let clone_dir = TempDir::new().unwrap();

        let source = init_source_repo(source_dir.path());
        std::fs::write(source_dir.path().join("a.manifest.yaml"), "kind: workload\nname: a\n")
            .unwrap();
        let first = commit_all(&source, "first");

        let fetcher = RepoFetcher::new();
        let repo = repository(
            source_dir.path().to_str().unwrap(),
            &clone_dir.path().join("fleet"),
        );

        let head = fetcher.ensure_local(&repo).unwrap();
        assert_eq!(head, first.to_string());

        std::fs::write(source_dir.path().join("b.manifest.yaml"), "kind: workload\nname: b\n")
            .unwrap();
        let second = commit_all(&source, "second");

        let head = fetcher.ensure_local(&repo).unwrap();
        assert_eq!(head, second.to_string());
        assert!(clone_dir.path().join("fleet/b.manifest.yaml").exists());
    }

    #[test]
    fn test_clone_missing_branch_fails() {
        let source_dir = TempDir::new().unwrap();
        let clone_dir = TempDir::new().unwrap();

        let source = init_source_repo(source_dir.path());
        std::fs::write(source_dir.path().join("a.txt"), "x").unwrap();
        commit_all(&source, "first");

        let fetcher = RepoFetcher::new();
        let mut repo = repository(
            source_dir.path().to_str().unwrap(),
            &clone_dir.path().join("fleet"),
        );
        repo.branch = "release".to_string();

        assert!(fetcher.ensure_local(&repo).is_err());
    }
}
