//! Secret resolution for workload manifests.
//!
//! Manifests point at secrets with `{path, key}`; the control plane resolves
//! them at configuration-build time and ships value plus content hash to the
//! device. The trait is the seam where a real secret backend (Vault or
//! similar) plugs in; the file source covers development and the
//! Docker-secrets deployment pattern.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::content_hash;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretValue {
    pub value: String,
    pub hash: String,
}

pub trait SecretSource: Send + Sync {
    fn get_secret(&self, path: &str, key: &str) -> Result<SecretValue>;
}

/// Reads secrets from a directory tree: `<root>/<path>/<key>`, one value per
/// file. Trailing newlines are stripped so `echo`-created files behave.
pub struct FileSecretSource {
    root: PathBuf,
}

impl FileSecretSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

fn escapes_root(part: &str) -> bool {
    let path = Path::new(part);
    path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
}

impl SecretSource for FileSecretSource {
    fn get_secret(&self, path: &str, key: &str) -> Result<SecretValue> {
        if escapes_root(path) || escapes_root(key) {
            return Err(Error::secret(path, key, "path escapes secret root"));
        }

        let file = self.root.join(path).join(key);
        let raw = std::fs::read_to_string(&file)
            .map_err(|e| Error::secret(path, key, e.to_string()))?;
        let value = raw.trim_end_matches('\n').to_string();

        Ok(SecretValue {
            hash: content_hash(value.as_bytes()),
            value,
        })
    }
}
