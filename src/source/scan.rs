//! Manifest discovery and parsing over a repository clone.

use std::path::Path;

use glob::glob;
use tracing::warn;

use super::ManifestSource;
use crate::error::{Error, Result};
use crate::types::{
    ManifestFile, ManifestKind, ManifestReference, Repository, WorkloadManifest, WorkloadResource,
    content_hash, reference_id,
};

const MANIFEST_PATTERNS: [&str; 2] = ["**/*.manifest.yaml", "**/*.manifest.yml"];

/// Scans the filesystem under each repository's `local_path`. Stateless; the
/// fetcher keeps the clone current.
#[derive(Debug, Default)]
pub struct FsManifestSource;

impl FsManifestSource {
    pub fn new() -> Self {
        Self
    }
}

fn in_git_dir(path: &Path) -> bool {
    path.components()
        .any(|c| c.as_os_str().to_str() == Some(".git"))
}

fn relative_path(base: &Path, path: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(base)
        .map_err(|_| Error::manifest(path.display().to_string(), "outside repository root"))?;
    Ok(rel.to_string_lossy().replace('\\', "/"))
}

impl ManifestSource for FsManifestSource {
    fn get_references(&self, repo: &Repository) -> Result<Vec<ManifestReference>> {
        let base = Path::new(&repo.local_path);
        let mut references = Vec::new();

        for pattern in MANIFEST_PATTERNS {
            let full_pattern = base.join(pattern);
            let full_pattern = full_pattern.to_string_lossy();
            let paths = glob(&full_pattern)
                .map_err(|e| Error::Config(format!("bad manifest pattern {full_pattern}: {e}")))?;

            for entry in paths {
                let path = entry.map_err(|e| Error::Io(e.into_error()))?;
                if in_git_dir(&path) || !path.is_file() {
                    continue;
                }

                let content = std::fs::read(&path)?;
                let rel = relative_path(base, &path)?;
                let mut reference = ManifestReference {
                    id: reference_id(&rel),
                    repo_id: repo.id.clone(),
                    path: rel.clone(),
                    hash: content_hash(&content),
                    kind: ManifestKind::Workload,
                    valid: false,
                    namespace_selectors: vec![],
                    set_selectors: vec![],
                    device_selectors: vec![],
                };

                match serde_yaml::from_slice::<ManifestFile>(&content) {
                    Ok(manifest) => {
                        reference.kind = manifest.kind;
                        reference.valid = true;
                        reference.namespace_selectors = manifest.selectors.namespaces;
                        reference.set_selectors = manifest.selectors.sets;
                        reference.device_selectors = manifest.selectors.devices;
                    }
                    Err(e) => {
                        // Keep the reference so the row tracks the broken
                        // file; it binds to nothing until fixed.
                        warn!(repo = %repo.name, path = %rel, error = %e, "unparsable manifest");
                    }
                }

                references.push(reference);
            }
        }

        Ok(references)
    }

    fn get_workload(
        &self,
        repo: &Repository,
        reference: &ManifestReference,
    ) -> Result<WorkloadManifest> {
        let base = Path::new(&repo.local_path);
        let path = base.join(&reference.path);
        let content = std::fs::read(&path)?;

        let manifest: ManifestFile = serde_yaml::from_slice(&content)
            .map_err(|e| Error::manifest(reference.path.clone(), e.to_string()))?;

        if manifest.kind != ManifestKind::Workload {
            return Err(Error::manifest(
                reference.path.clone(),
                "not a workload manifest",
            ));
        }

        let parent = path.parent().unwrap_or(base);
        let mut resources = Vec::with_capacity(manifest.resources.len());
        for resource in &manifest.resources {
            if resource.reference.starts_with('/') || resource.reference.contains("..") {
                return Err(Error::manifest(
                    reference.path.clone(),
                    format!("resource ref escapes repository: {}", resource.reference),
                ));
            }
            let resource_path = parent.join(&resource.reference);
            let resource_content = std::fs::read_to_string(&resource_path).map_err(|e| {
                Error::manifest(
                    reference.path.clone(),
                    format!("resource {} unreadable: {e}", resource.reference),
                )
            })?;
            resources.push(WorkloadResource {
                path: resource.reference.clone(),
                content: resource_content,
            });
        }

        Ok(WorkloadManifest {
            id: reference.id.clone(),
            name: manifest.name,
            version: manifest.version,
            hash: content_hash(&content),
            secrets: manifest.secrets,
            resources,
        })
    }
}
