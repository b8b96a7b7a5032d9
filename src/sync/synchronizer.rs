//! Reference reconciliation and relation convergence.
//!
//! One `sync_repository` call reconciles the persisted manifest references of
//! a repository against a fresh listing from its clone, then converges the
//! relation rows of every created or updated reference. The pass is
//! idempotent: re-running it on unchanged input produces zero writes. It is
//! eventually convergent rather than transactional; a hard error aborts the
//! remaining work for the current repository and the next tick retries.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::diff::{intersect, subtract};
use crate::error::{Error, Result};
use crate::source::ManifestSource;
use crate::store::Store;
use crate::types::{ManifestReference, Relation, RelationType, Repository};

/// Write counts for one reconciliation pass. All zeros means the pass was a
/// no-op.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub references_created: usize,
    pub references_updated: usize,
    pub references_deleted: usize,
    pub relations_created: usize,
    pub relations_deleted: usize,
}

impl SyncOutcome {
    pub fn is_noop(&self) -> bool {
        *self == SyncOutcome::default()
    }
}

pub struct Synchronizer {
    store: Arc<dyn Store>,
    source: Arc<dyn ManifestSource>,
}

impl Synchronizer {
    pub fn new(store: Arc<dyn Store>, source: Arc<dyn ManifestSource>) -> Self {
        Self { store, source }
    }

    /// Reconcile one repository: diff stored references against the fresh
    /// listing, apply reference writes, converge relations.
    ///
    /// Reference writes happen before relation convergence for the same
    /// reference. "Already exists" is success for idempotent writes; any
    /// other error aborts this repository's pass.
    pub fn sync_repository(&self, repo: &Repository) -> Result<SyncOutcome> {
        let stored = self.store.list_references(&repo.id)?;
        let fresh = self.source.get_references(repo)?;

        let created = subtract(&fresh, &stored, |r| r.id.clone());
        let deleted = subtract(&stored, &fresh, |r| r.id.clone());
        let updated = intersect(&fresh, &stored, |r| r.id.clone(), |a, b| a.hash != b.hash);

        // Prior selector lists come from the snapshot read above; convergence
        // diffs fresh targets against them.
        let stored_by_id: HashMap<&str, &ManifestReference> =
            stored.iter().map(|r| (r.id.as_str(), r)).collect();

        let mut outcome = SyncOutcome::default();

        for reference in &created {
            match self.store.insert_reference(reference) {
                Ok(()) => outcome.references_created += 1,
                // Lost a race with an earlier pass; converge anyway.
                Err(Error::AlreadyExists) => {
                    debug!(manifest = %reference.id, "reference already present, skipping insert");
                }
                Err(e) => return Err(e),
            }
            let (added, removed) = self.converge_relations(reference, None)?;
            outcome.relations_created += added;
            outcome.relations_deleted += removed;
        }

        for reference in &deleted {
            // Relations pointing at the reference become dangling rows; the
            // resolver skips them.
            if self.store.delete_reference(&reference.id)? {
                outcome.references_deleted += 1;
            }
        }

        for reference in &updated {
            self.store.update_reference(reference)?;
            outcome.references_updated += 1;
            let old = stored_by_id.get(reference.id.as_str()).copied();
            let (added, removed) = self.converge_relations(reference, old)?;
            outcome.relations_created += added;
            outcome.relations_deleted += removed;
        }

        Ok(outcome)
    }

    /// Converge the relation rows of one manifest reference against its prior
    /// selector lists.
    ///
    /// Creation verifies the target resource exists and skips silently when
    /// it does not (bootstrap ordering race, not an error). Deletion runs
    /// regardless of whether the target still exists: stale rows must be
    /// cleaned up even when the resource was deleted first. The asymmetry is
    /// deliberate.
    fn converge_relations(
        &self,
        fresh: &ManifestReference,
        old: Option<&ManifestReference>,
    ) -> Result<(usize, usize)> {
        let mut created = 0;
        let mut deleted = 0;

        for relation_type in RelationType::ALL {
            let new_targets = fresh.targets(relation_type);
            let old_targets = old.map_or(&[][..], |o| o.targets(relation_type));

            for target in subtract(new_targets, old_targets, |s| s.clone()) {
                if !self.resource_exists(relation_type, &target)? {
                    debug!(
                        manifest = %fresh.id,
                        relation_type = relation_type.as_str(),
                        target,
                        "selector target does not exist, skipping relation"
                    );
                    continue;
                }
                let relation = Relation::new(relation_type, target, fresh.id.clone());
                match self.store.create_relation(&relation) {
                    Ok(()) => created += 1,
                    Err(Error::AlreadyExists) => {}
                    Err(e) => return Err(e),
                }
            }

            for target in subtract(old_targets, new_targets, |s| s.clone()) {
                let relation = Relation::new(relation_type, target, fresh.id.clone());
                if self.store.delete_relation(&relation)? {
                    deleted += 1;
                }
            }
        }

        Ok((created, deleted))
    }

    fn resource_exists(&self, relation_type: RelationType, target: &str) -> Result<bool> {
        Ok(match relation_type {
            RelationType::Namespace => self.store.get_namespace(target)?.is_some(),
            RelationType::Set => self.store.get_set(target)?.is_some(),
            RelationType::Device => self.store.get_device(target)?.is_some(),
        })
    }
}
