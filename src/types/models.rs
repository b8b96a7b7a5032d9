use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::manifest::ManifestKind;

/// Settings pushed down to every device agent. Always present on a
/// namespace; optional overrides on sets and devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfiguration {
    pub heartbeat_period_seconds: u32,
    pub log_level: String,
}

impl Default for DeviceConfiguration {
    fn default() -> Self {
        Self {
            heartbeat_period_seconds: 60,
            log_level: "info".to_string(),
        }
    }
}

/// Top level of the resource hierarchy. The name is the identity.
///
/// Exactly one namespace carries `is_default` whenever any namespace exists,
/// and at least one namespace always exists; `fleet::NamespaceManager`
/// enforces both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Namespace {
    pub name: String,
    pub is_default: bool,
    pub configuration: DeviceConfiguration,
    pub created_at: DateTime<Utc>,
}

/// A grouping of devices inside a namespace. Set names are unique across
/// namespaces so manifest selectors can address them without qualification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSet {
    pub name: String,
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<DeviceConfiguration>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    /// Known to the control plane, identity not yet issued.
    Enrolled,
    /// Identity issued; may fetch configuration.
    Registered,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Enrolled => "enrolled",
            DeviceStatus::Registered => "registered",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<DeviceConfiguration>,
    pub status: DeviceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_serial: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<DateTime<Utc>>,
}

/// A git remote that holds manifest files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    pub name: String,
    pub url: String,
    pub branch: String,
    /// Local clone path, owned by the sync worker.
    pub local_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_head: Option<String>,
    pub pull_period_seconds: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persisted record of one manifest file: stable identity, content hash and
/// the flattened selector targets observed at the last sync.
///
/// The id is derived from the repo-relative path so it survives content
/// changes; diffing stored against fresh listings is only meaningful because
/// of that stability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestReference {
    pub id: String,
    pub repo_id: String,
    pub path: String,
    pub hash: String,
    pub kind: ManifestKind,
    pub valid: bool,
    pub namespace_selectors: Vec<String>,
    pub set_selectors: Vec<String>,
    pub device_selectors: Vec<String>,
}

impl ManifestReference {
    /// Selector targets for one level of the hierarchy.
    pub fn targets(&self, relation_type: RelationType) -> &[String] {
        match relation_type {
            RelationType::Namespace => &self.namespace_selectors,
            RelationType::Set => &self.set_selectors,
            RelationType::Device => &self.device_selectors,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationType {
    Namespace,
    Set,
    Device,
}

impl RelationType {
    pub const ALL: [RelationType; 3] = [
        RelationType::Namespace,
        RelationType::Set,
        RelationType::Device,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Namespace => "namespace",
            RelationType::Set => "set",
            RelationType::Device => "device",
        }
    }
}

/// A materialized binding between one manifest and one resource. Carries no
/// foreign keys on purpose: a relation may outlive its reference (the
/// resolver skips dangling ones) and must stay deletable after the resource
/// it points at is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub relation_type: RelationType,
    pub resource_id: String,
    pub manifest_id: String,
}

impl Relation {
    pub fn new(
        relation_type: RelationType,
        resource_id: impl Into<String>,
        manifest_id: impl Into<String>,
    ) -> Self {
        Self {
            relation_type,
            resource_id: resource_id.into(),
            manifest_id: manifest_id.into(),
        }
    }
}

/// Admin API credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    #[serde(skip)]
    pub token_hash: String,
    #[serde(skip)]
    pub token_lookup: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}
