//! On-disk manifest schema and digest helpers.
//!
//! Manifests are YAML files named `*.manifest.yaml` / `*.manifest.yml` kept
//! in a git repository. A manifest declares what it is (`kind`), which
//! resources it targets (`selectors`) and what the device agent needs to run
//! it (`resources`, `secrets`).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestKind {
    Workload,
    Configuration,
}

impl Default for ManifestKind {
    fn default() -> Self {
        ManifestKind::Workload
    }
}

/// Parsed form of one manifest file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFile {
    pub kind: ManifestKind,
    #[serde(default = "default_version")]
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub selectors: Selectors,
    #[serde(default)]
    pub secrets: Vec<SecretRef>,
    #[serde(default)]
    pub resources: Vec<ResourceRef>,
}

fn default_version() -> String {
    "v1".to_string()
}

/// Declarative target lists. Namespaces and sets are addressed by name,
/// devices by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Selectors {
    #[serde(default)]
    pub namespaces: Vec<String>,
    #[serde(default)]
    pub sets: Vec<String>,
    #[serde(default)]
    pub devices: Vec<String>,
}

/// Pointer into the secret store: `id` names the secret inside the workload,
/// `path`/`key` locate it in the secret source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRef {
    pub id: String,
    pub path: String,
    pub key: String,
}

/// A file shipped alongside the manifest, referenced relative to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    #[serde(rename = "$ref")]
    pub reference: String,
}

/// A workload manifest materialized from the git source: parsed content plus
/// the inlined resource files. Secrets are still unresolved at this stage.
#[derive(Debug, Clone)]
pub struct WorkloadManifest {
    pub id: String,
    pub name: String,
    pub version: String,
    pub hash: String,
    pub secrets: Vec<SecretRef>,
    pub resources: Vec<WorkloadResource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadResource {
    pub path: String,
    pub content: String,
}

/// Stable manifest identity: digest of the repo-relative path, independent of
/// the file's content.
pub fn reference_id(relative_path: &str) -> String {
    hex::encode(Sha256::digest(relative_path.as_bytes()))
}

/// Digest of raw content, used for change detection and response hashing.
pub fn content_hash(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_manifest() {
        let yaml = r#"
kind: workload
version: v1
name: telemetry-agent
description: Ships metrics home
selectors:
  namespaces:
    - production
  sets:
    - edge-gateways
  devices:
    - dev-42
secrets:
  - id: mqtt-password
    path: fleet/mqtt
    key: password
resources:
  - $ref: telemetry/pod.yaml
"#;
        let manifest: ManifestFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(manifest.kind, ManifestKind::Workload);
        assert_eq!(manifest.name, "telemetry-agent");
        assert_eq!(manifest.selectors.namespaces, vec!["production"]);
        assert_eq!(manifest.selectors.sets, vec!["edge-gateways"]);
        assert_eq!(manifest.selectors.devices, vec!["dev-42"]);
        assert_eq!(manifest.secrets[0].id, "mqtt-password");
        assert_eq!(manifest.resources[0].reference, "telemetry/pod.yaml");
    }

    #[test]
    fn test_parse_minimal_manifest() {
        let manifest: ManifestFile =
            serde_yaml::from_str("kind: configuration\nname: base-config\n").unwrap();
        assert_eq!(manifest.kind, ManifestKind::Configuration);
        assert_eq!(manifest.version, "v1");
        assert!(manifest.selectors.namespaces.is_empty());
        assert!(manifest.secrets.is_empty());
    }

    #[test]
    fn test_reference_id_depends_on_path_only() {
        assert_eq!(reference_id("a/b.manifest.yaml"), reference_id("a/b.manifest.yaml"));
        assert_ne!(reference_id("a/b.manifest.yaml"), reference_id("a/c.manifest.yaml"));
    }

    #[test]
    fn test_content_hash_changes_with_content() {
        assert_ne!(content_hash(b"one"), content_hash(b"two"));
        assert_eq!(content_hash(b"same"), content_hash(b"same"));
    }
}
