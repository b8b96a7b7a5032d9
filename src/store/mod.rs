mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface. It is the single source of truth
/// for the resource graph and the reference/relation rows the synchronizer
/// converges; per-row atomicity is all the core relies on (no cross-row
/// transactions).
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Namespace operations
    fn create_namespace(&self, ns: &Namespace) -> Result<()>;
    fn get_namespace(&self, name: &str) -> Result<Option<Namespace>>;
    fn get_default_namespace(&self) -> Result<Option<Namespace>>;
    fn list_namespaces(&self) -> Result<Vec<Namespace>>;
    fn update_namespace(&self, ns: &Namespace) -> Result<()>;
    fn delete_namespace(&self, name: &str) -> Result<bool>;

    // Device set operations
    fn create_set(&self, set: &DeviceSet) -> Result<()>;
    fn get_set(&self, name: &str) -> Result<Option<DeviceSet>>;
    fn list_sets(&self, namespace: Option<&str>) -> Result<Vec<DeviceSet>>;
    fn update_set(&self, set: &DeviceSet) -> Result<()>;
    fn delete_set(&self, name: &str) -> Result<bool>;

    // Device operations
    fn create_device(&self, device: &Device) -> Result<()>;
    fn get_device(&self, id: &str) -> Result<Option<Device>>;
    fn list_devices(&self, namespace: Option<&str>, cursor: &str, limit: i32)
    -> Result<Vec<Device>>;
    fn list_namespace_devices(&self, namespace: &str) -> Result<Vec<Device>>;
    fn update_device(&self, device: &Device) -> Result<()>;
    fn delete_device(&self, id: &str) -> Result<bool>;
    fn touch_device_seen(&self, id: &str) -> Result<()>;

    // Repository operations
    fn create_repository(&self, repo: &Repository) -> Result<()>;
    fn get_repository(&self, id: &str) -> Result<Option<Repository>>;
    fn get_repository_by_name(&self, name: &str) -> Result<Option<Repository>>;
    fn list_repositories(&self) -> Result<Vec<Repository>>;
    fn update_repository(&self, repo: &Repository) -> Result<()>;
    fn update_repository_head(&self, id: &str, head: &str) -> Result<()>;
    fn delete_repository(&self, id: &str) -> Result<bool>;

    // Manifest reference operations
    fn list_references(&self, repo_id: &str) -> Result<Vec<ManifestReference>>;
    fn get_reference(&self, id: &str) -> Result<Option<ManifestReference>>;
    /// Fails with `Error::AlreadyExists` on duplicate id; callers performing
    /// idempotent writes treat that as success.
    fn insert_reference(&self, reference: &ManifestReference) -> Result<()>;
    /// Fails with `Error::NotFound` if the reference is absent.
    fn update_reference(&self, reference: &ManifestReference) -> Result<()>;
    fn delete_reference(&self, id: &str) -> Result<bool>;

    // Relation operations
    /// Fails with `Error::AlreadyExists` on a duplicate row.
    fn create_relation(&self, relation: &Relation) -> Result<()>;
    /// Returns false when the row was already gone; that is success for
    /// cleanup purposes.
    fn delete_relation(&self, relation: &Relation) -> Result<bool>;
    fn list_resource_relations(
        &self,
        relation_type: RelationType,
        resource_id: &str,
    ) -> Result<Vec<Relation>>;
    fn list_manifest_relations(&self, manifest_id: &str) -> Result<Vec<Relation>>;

    // Token operations
    fn create_token(&self, token: &Token) -> Result<()>;
    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>>;
    fn list_tokens(&self) -> Result<Vec<Token>>;
    fn delete_token(&self, id: &str) -> Result<bool>;
    fn update_token_last_used(&self, id: &str) -> Result<()>;
    fn has_admin_token(&self) -> Result<bool>;

    fn close(&self) -> Result<()>;
}
