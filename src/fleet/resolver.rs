//! Effective-configuration resolution.
//!
//! For one device the resolver walks Device → Set → Namespace with override
//! semantics, materializes the bound workload manifests and resolves their
//! secrets. The walk is read-only and safe to run concurrently; results are
//! recomputed on every call (a write-through cache keyed by device id is the
//! obvious extension point, invalidated when relations touching the device's
//! manifests change).

use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::secrets::SecretSource;
use crate::source::ManifestSource;
use crate::store::Store;
use crate::types::{
    Device, DeviceConfiguration, DeviceSet, ManifestKind, Namespace, RelationType,
    WorkloadResource,
};

/// A workload as shipped to the device.
#[derive(Debug, Clone, Serialize)]
pub struct Workload {
    pub id: String,
    pub name: String,
    pub version: String,
    pub hash: String,
    pub resources: Vec<WorkloadResource>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedSecret {
    pub id: String,
    pub value: String,
    pub hash: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationResponse {
    pub hash: String,
    pub configuration: DeviceConfiguration,
    pub workloads: Vec<Workload>,
    pub secrets: Vec<ResolvedSecret>,
}

pub struct ConfigurationResolver {
    store: Arc<dyn Store>,
    source: Arc<dyn ManifestSource>,
    secrets: Arc<dyn SecretSource>,
}

impl ConfigurationResolver {
    pub fn new(
        store: Arc<dyn Store>,
        source: Arc<dyn ManifestSource>,
        secrets: Arc<dyn SecretSource>,
    ) -> Self {
        Self {
            store,
            source,
            secrets,
        }
    }

    /// Compute the effective configuration for one device.
    ///
    /// Only a missing device or a missing terminal namespace is a hard
    /// error. Unresolvable manifests and secrets are dropped with a log
    /// line: partial results beat total failure on this device-facing path.
    pub fn resolve(&self, device_id: &str) -> Result<ConfigurationResponse> {
        let device = self.store.get_device(device_id)?.ok_or(Error::NotFound)?;
        let namespace = self
            .store
            .get_namespace(&device.namespace)?
            .ok_or(Error::NotFound)?;
        let set = match &device.set {
            Some(name) => self.store.get_set(name)?,
            None => None,
        };

        // First-match-wins: the namespace configuration is the guaranteed
        // terminal case, never nil.
        let configuration = device
            .configuration
            .clone()
            .or_else(|| set.as_ref().and_then(|s| s.configuration.clone()))
            .unwrap_or_else(|| namespace.configuration.clone());

        let manifest_ids = self.effective_manifest_ids(&device, set.as_ref(), &namespace)?;

        let mut workloads = Vec::new();
        let mut secrets = Vec::new();
        for manifest_id in manifest_ids {
            match self.materialize(&manifest_id) {
                Ok(Some((workload, mut resolved))) => {
                    workloads.push(workload);
                    secrets.append(&mut resolved);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        device = device_id,
                        manifest = %manifest_id,
                        error = %e,
                        "dropping unresolvable manifest"
                    );
                }
            }
        }

        let hash = response_hash(&configuration, &workloads, &secrets)?;
        Ok(ConfigurationResponse {
            hash,
            configuration,
            workloads,
            secrets,
        })
    }

    /// First non-empty list wins; levels are not merged. A device with its
    /// own bindings ignores set and namespace bindings entirely.
    fn effective_manifest_ids(
        &self,
        device: &Device,
        set: Option<&DeviceSet>,
        namespace: &Namespace,
    ) -> Result<Vec<String>> {
        let own = self
            .store
            .list_resource_relations(RelationType::Device, &device.id)?;
        if !own.is_empty() {
            return Ok(own.into_iter().map(|r| r.manifest_id).collect());
        }

        if let Some(set) = set {
            let bound = self
                .store
                .list_resource_relations(RelationType::Set, &set.name)?;
            if !bound.is_empty() {
                return Ok(bound.into_iter().map(|r| r.manifest_id).collect());
            }
        }

        let bound = self
            .store
            .list_resource_relations(RelationType::Namespace, &namespace.name)?;
        Ok(bound.into_iter().map(|r| r.manifest_id).collect())
    }

    /// Materialize one bound manifest. `Ok(None)` covers the benign skips:
    /// dangling relations from already-deleted references, invalid files and
    /// configuration-kind manifests, none of which belong in the workload
    /// list.
    fn materialize(&self, manifest_id: &str) -> Result<Option<(Workload, Vec<ResolvedSecret>)>> {
        let Some(reference) = self.store.get_reference(manifest_id)? else {
            debug!(manifest = manifest_id, "relation points at a deleted reference, skipping");
            return Ok(None);
        };
        if !reference.valid || reference.kind != ManifestKind::Workload {
            return Ok(None);
        }
        let Some(repo) = self.store.get_repository(&reference.repo_id)? else {
            debug!(manifest = manifest_id, "repository row is gone, skipping");
            return Ok(None);
        };

        let manifest = self.source.get_workload(&repo, &reference)?;

        let mut resolved = Vec::with_capacity(manifest.secrets.len());
        for secret_ref in &manifest.secrets {
            let secret = self
                .secrets
                .get_secret(&secret_ref.path, &secret_ref.key)?;
            resolved.push(ResolvedSecret {
                id: secret_ref.id.clone(),
                value: secret.value,
                hash: secret.hash,
            });
        }

        Ok(Some((
            Workload {
                id: manifest.id,
                name: manifest.name,
                version: manifest.version,
                hash: manifest.hash,
                resources: manifest.resources,
            },
            resolved,
        )))
    }
}

fn response_hash(
    configuration: &DeviceConfiguration,
    workloads: &[Workload],
    secrets: &[ResolvedSecret],
) -> Result<String> {
    let body = serde_json::to_vec(&(configuration, workloads, secrets))
        .map_err(|e| Error::Config(format!("serialize configuration response: {e}")))?;
    Ok(hex::encode(Sha256::digest(&body)))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;
    use crate::secrets::SecretValue;
    use crate::store::SqliteStore;
    use crate::types::{
        DeviceStatus, ManifestReference, Relation, Repository, SecretRef, WorkloadManifest,
    };

    struct FakeSource {
        workloads: Mutex<Vec<WorkloadManifest>>,
    }

    impl FakeSource {
        fn new(workloads: Vec<WorkloadManifest>) -> Self {
            Self {
                workloads: Mutex::new(workloads),
            }
        }
    }

    impl ManifestSource for FakeSource {
        fn get_references(&self, _repo: &Repository) -> Result<Vec<ManifestReference>> {
            Ok(vec![])
        }

        fn get_workload(
            &self,
            _repo: &Repository,
            reference: &ManifestReference,
        ) -> Result<WorkloadManifest> {
            self.workloads
                .lock()
                .unwrap()
                .iter()
                .find(|w| w.id == reference.id)
                .cloned()
                .ok_or_else(|| Error::manifest(reference.path.clone(), "missing from source"))
        }
    }

    struct FakeSecrets;

    impl SecretSource for FakeSecrets {
        fn get_secret(&self, path: &str, key: &str) -> Result<SecretValue> {
            if path == "vaulted" {
                return Err(Error::secret(path, key, "backend down"));
            }
            Ok(SecretValue {
                value: format!("{path}:{key}"),
                hash: "h".to_string(),
            })
        }
    }

    fn config(level: &str) -> DeviceConfiguration {
        DeviceConfiguration {
            heartbeat_period_seconds: 30,
            log_level: level.to_string(),
        }
    }

    fn workload_manifest(id: &str, secrets: Vec<SecretRef>) -> WorkloadManifest {
        WorkloadManifest {
            id: id.to_string(),
            name: format!("workload-{id}"),
            version: "v1".to_string(),
            hash: format!("hash-{id}"),
            secrets,
            resources: vec![WorkloadResource {
                path: "pod.yaml".to_string(),
                content: "containers: []\n".to_string(),
            }],
        }
    }

    fn reference(id: &str) -> ManifestReference {
        ManifestReference {
            id: id.to_string(),
            repo_id: "repo-1".to_string(),
            path: format!("{id}.manifest.yaml"),
            hash: format!("hash-{id}"),
            kind: ManifestKind::Workload,
            valid: true,
            namespace_selectors: vec![],
            set_selectors: vec![],
            device_selectors: vec![],
        }
    }

    struct Fixture {
        _temp: TempDir,
        store: Arc<SqliteStore>,
        resolver: ConfigurationResolver,
    }

    fn setup(workloads: Vec<WorkloadManifest>) -> Fixture {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::new(temp.path().join("test.db")).unwrap());
        store.initialize().unwrap();

        store
            .create_namespace(&Namespace {
                name: "default".to_string(),
                is_default: true,
                configuration: config("info"),
                created_at: Utc::now(),
            })
            .unwrap();
        store
            .create_repository(&Repository {
                id: "repo-1".to_string(),
                name: "fleet".to_string(),
                url: "https://example.com/fleet.git".to_string(),
                branch: "main".to_string(),
                local_path: "/tmp/fleet".to_string(),
                current_head: None,
                pull_period_seconds: 60,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .unwrap();

        let resolver = ConfigurationResolver::new(
            store.clone(),
            Arc::new(FakeSource::new(workloads)),
            Arc::new(FakeSecrets),
        );
        Fixture {
            _temp: temp,
            store,
            resolver,
        }
    }

    fn add_device(store: &SqliteStore, id: &str, set: Option<&str>, cfg: Option<DeviceConfiguration>) {
        store
            .create_device(&Device {
                id: id.to_string(),
                namespace: "default".to_string(),
                set: set.map(|s| s.to_string()),
                configuration: cfg,
                status: DeviceStatus::Registered,
                cert_serial: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
                last_seen_at: None,
            })
            .unwrap();
    }

    fn add_set(store: &SqliteStore, name: &str, cfg: Option<DeviceConfiguration>) {
        store
            .create_set(&DeviceSet {
                name: name.to_string(),
                namespace: "default".to_string(),
                configuration: cfg,
                created_at: Utc::now(),
            })
            .unwrap();
    }

    #[test]
    fn test_device_configuration_wins_over_set_and_namespace() {
        let fixture = setup(vec![]);
        add_set(&fixture.store, "gw", Some(config("warn")));
        add_device(&fixture.store, "dev-1", Some("gw"), Some(config("trace")));

        let response = fixture.resolver.resolve("dev-1").unwrap();
        assert_eq!(response.configuration.log_level, "trace");
    }

    #[test]
    fn test_set_configuration_wins_over_namespace() {
        let fixture = setup(vec![]);
        add_set(&fixture.store, "gw", Some(config("warn")));
        add_device(&fixture.store, "dev-1", Some("gw"), None);

        let response = fixture.resolver.resolve("dev-1").unwrap();
        assert_eq!(response.configuration.log_level, "warn");
    }

    #[test]
    fn test_namespace_configuration_is_terminal() {
        let fixture = setup(vec![]);
        add_set(&fixture.store, "gw", None);
        add_device(&fixture.store, "dev-1", Some("gw"), None);

        let response = fixture.resolver.resolve("dev-1").unwrap();
        assert_eq!(response.configuration.log_level, "info");
    }

    #[test]
    fn test_device_bindings_shadow_set_and_namespace() {
        let fixture = setup(vec![
            workload_manifest("m-dev", vec![]),
            workload_manifest("m-ns", vec![]),
        ]);
        add_set(&fixture.store, "gw", None);
        add_device(&fixture.store, "dev-1", Some("gw"), None);

        fixture.store.insert_reference(&reference("m-dev")).unwrap();
        fixture.store.insert_reference(&reference("m-ns")).unwrap();
        fixture
            .store
            .create_relation(&Relation::new(RelationType::Device, "dev-1", "m-dev"))
            .unwrap();
        fixture
            .store
            .create_relation(&Relation::new(RelationType::Namespace, "default", "m-ns"))
            .unwrap();

        let response = fixture.resolver.resolve("dev-1").unwrap();
        let names: Vec<_> = response.workloads.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(names, vec!["m-dev"]);
    }

    #[test]
    fn test_set_bindings_shadow_namespace() {
        let fixture = setup(vec![
            workload_manifest("m-set", vec![]),
            workload_manifest("m-ns", vec![]),
        ]);
        add_set(&fixture.store, "gw", None);
        add_device(&fixture.store, "dev-1", Some("gw"), None);

        fixture.store.insert_reference(&reference("m-set")).unwrap();
        fixture.store.insert_reference(&reference("m-ns")).unwrap();
        fixture
            .store
            .create_relation(&Relation::new(RelationType::Set, "gw", "m-set"))
            .unwrap();
        fixture
            .store
            .create_relation(&Relation::new(RelationType::Namespace, "default", "m-ns"))
            .unwrap();

        let response = fixture.resolver.resolve("dev-1").unwrap();
        assert_eq!(response.workloads[0].id, "m-set");
    }

    #[test]
    fn test_falls_through_to_namespace_bindings() {
        let fixture = setup(vec![workload_manifest("m-ns", vec![])]);
        add_device(&fixture.store, "dev-1", None, None);

        fixture.store.insert_reference(&reference("m-ns")).unwrap();
        fixture
            .store
            .create_relation(&Relation::new(RelationType::Namespace, "default", "m-ns"))
            .unwrap();

        let response = fixture.resolver.resolve("dev-1").unwrap();
        assert_eq!(response.workloads.len(), 1);
        assert_eq!(response.workloads[0].resources[0].path, "pod.yaml");
    }

    #[test]
    fn test_dangling_relation_is_skipped_not_fatal() {
        // Scenario C: the reference is gone but the relation row survived.
        let fixture = setup(vec![]);
        add_device(&fixture.store, "dev-1", None, None);
        fixture
            .store
            .create_relation(&Relation::new(RelationType::Device, "dev-1", "ghost"))
            .unwrap();

        let response = fixture.resolver.resolve("dev-1").unwrap();
        assert!(response.workloads.is_empty());
    }

    #[test]
    fn test_secrets_are_resolved_and_attached() {
        let fixture = setup(vec![workload_manifest(
            "m1",
            vec![SecretRef {
                id: "mqtt-password".to_string(),
                path: "fleet/mqtt".to_string(),
                key: "password".to_string(),
            }],
        )]);
        add_device(&fixture.store, "dev-1", None, None);
        fixture.store.insert_reference(&reference("m1")).unwrap();
        fixture
            .store
            .create_relation(&Relation::new(RelationType::Device, "dev-1", "m1"))
            .unwrap();

        let response = fixture.resolver.resolve("dev-1").unwrap();
        assert_eq!(response.secrets.len(), 1);
        assert_eq!(response.secrets[0].id, "mqtt-password");
        assert_eq!(response.secrets[0].value, "fleet/mqtt:password");
    }

    #[test]
    fn test_failing_secret_drops_only_that_workload() {
        let fixture = setup(vec![
            workload_manifest("m-ok", vec![]),
            workload_manifest(
                "m-bad",
                vec![SecretRef {
                    id: "s".to_string(),
                    path: "vaulted".to_string(),
                    key: "k".to_string(),
                }],
            ),
        ]);
        add_device(&fixture.store, "dev-1", None, None);
        for id in ["m-ok", "m-bad"] {
            fixture.store.insert_reference(&reference(id)).unwrap();
            fixture
                .store
                .create_relation(&Relation::new(RelationType::Device, "dev-1", id))
                .unwrap();
        }

        let response = fixture.resolver.resolve("dev-1").unwrap();
        let ids: Vec<_> = response.workloads.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["m-ok"]);
        assert!(response.secrets.is_empty());
    }

    #[test]
    fn test_configuration_kind_manifest_is_not_a_workload() {
        let fixture = setup(vec![workload_manifest("m1", vec![])]);
        add_device(&fixture.store, "dev-1", None, None);

        let mut conf_ref = reference("m1");
        conf_ref.kind = ManifestKind::Configuration;
        fixture.store.insert_reference(&conf_ref).unwrap();
        fixture
            .store
            .create_relation(&Relation::new(RelationType::Device, "dev-1", "m1"))
            .unwrap();

        let response = fixture.resolver.resolve("dev-1").unwrap();
        assert!(response.workloads.is_empty());
    }

    #[test]
    fn test_unknown_device_is_not_found() {
        let fixture = setup(vec![]);
        let err = fixture.resolver.resolve("ghost").unwrap_err();
        assert!(matches!(err, Error::NotFound));
    }

    #[test]
    fn test_response_hash_tracks_content() {
        let fixture = setup(vec![workload_manifest("m1", vec![])]);
        add_device(&fixture.store, "dev-1", None, None);

        let empty = fixture.resolver.resolve("dev-1").unwrap();

        fixture.store.insert_reference(&reference("m1")).unwrap();
        fixture
            .store
            .create_relation(&Relation::new(RelationType::Device, "dev-1", "m1"))
            .unwrap();
        let with_workload = fixture.resolver.resolve("dev-1").unwrap();

        assert_ne!(empty.hash, with_workload.hash);
        let again = fixture.resolver.resolve("dev-1").unwrap();
        assert_eq!(with_workload.hash, again.hash);
    }
}
