//! Namespace lifecycle.
//!
//! Two invariants hold in every quiescent state: at least one namespace
//! exists, and exactly one namespace is the default while any exist. Every
//! mutation goes through `NamespaceManager` so the invariants survive
//! creation, promotion and deletion.

use std::sync::Arc;

use tracing::info;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::Namespace;

#[derive(Clone)]
pub struct NamespaceManager {
    store: Arc<dyn Store>,
}

impl NamespaceManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Insert a new namespace. The caller decides `is_default`; no automatic
    /// promotion happens here, but claiming the default demotes the current
    /// holder so at most one default survives the write.
    pub fn create(&self, ns: Namespace) -> Result<Namespace> {
        if self.store.get_namespace(&ns.name)?.is_some() {
            return Err(Error::AlreadyExists);
        }

        if ns.is_default {
            if let Some(mut current) = self.store.get_default_namespace()? {
                current.is_default = false;
                self.store.update_namespace(&current)?;
            }
        }

        self.store.create_namespace(&ns)?;
        Ok(ns)
    }

    /// Update a namespace. Default-ness changes must be explicit and
    /// exclusive: promoting a namespace demotes the old default in the same
    /// operation, and stripping the flag from the current default is
    /// rejected because it would leave no default at all.
    pub fn update(&self, ns: &Namespace) -> Result<()> {
        let current = self.store.get_namespace(&ns.name)?.ok_or(Error::NotFound)?;

        match (current.is_default, ns.is_default) {
            (true, false) => {
                return Err(Error::Conflict(
                    "cannot unset the default namespace; promote another namespace instead"
                        .to_string(),
                ));
            }
            (false, true) => {
                if let Some(mut old) = self.store.get_default_namespace()? {
                    if old.name != ns.name {
                        old.is_default = false;
                        self.store.update_namespace(&old)?;
                    }
                }
            }
            _ => {}
        }

        self.store.update_namespace(ns)
    }

    /// Delete a namespace and return it as it was.
    ///
    /// The last namespace cannot be deleted. Deleting the default promotes
    /// the lexicographically smallest survivor and reassigns every member
    /// device to it before the row is removed; devices lose their set on the
    /// way since sets do not cross namespaces.
    pub fn delete(&self, name: &str) -> Result<Namespace> {
        let ns = self.store.get_namespace(name)?.ok_or(Error::NotFound)?;
        let all = self.store.list_namespaces()?;

        if all.len() <= 1 {
            return Err(Error::DeleteResource(
                "cannot delete the last namespace".to_string(),
            ));
        }

        if ns.is_default {
            let Some(mut heir) = all
                .into_iter()
                .filter(|n| n.name != ns.name)
                .min_by(|a, b| a.name.cmp(&b.name))
            else {
                return Err(Error::DeleteResource(
                    "cannot delete the last namespace".to_string(),
                ));
            };

            heir.is_default = true;
            self.store.update_namespace(&heir)?;
            info!(from = %ns.name, to = %heir.name, "promoted new default namespace");

            for mut device in self.store.list_namespace_devices(&ns.name)? {
                device.namespace = heir.name.clone();
                device.set = None;
                self.store.update_device(&device)?;
            }
        }

        self.store.delete_namespace(&ns.name)?;
        Ok(ns)
    }
}
