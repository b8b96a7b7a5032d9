mod git;
mod scan;

pub use git::RepoFetcher;
pub use scan::FsManifestSource;

use crate::error::Result;
use crate::types::{ManifestReference, Repository, WorkloadManifest};

/// Read-side of a repository clone: list manifest references, materialize
/// workloads. The synchronizer and resolver consume this; only the fetcher
/// knows about git itself.
pub trait ManifestSource: Send + Sync {
    /// Parse every manifest file under the repository's local clone into a
    /// reference. Files that fail to parse come back with `valid = false`
    /// rather than failing the listing.
    fn get_references(&self, repo: &Repository) -> Result<Vec<ManifestReference>>;

    /// Materialize one workload manifest, inlining its resource files.
    /// Fails when the file is gone, unparsable, or not a workload.
    fn get_workload(
        &self,
        repo: &Repository,
        reference: &ManifestReference,
    ) -> Result<WorkloadManifest>;
}
