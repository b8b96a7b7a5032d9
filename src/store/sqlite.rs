use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Maps duplicate-row INSERT failures to `Error::AlreadyExists` so
/// idempotent writers can recognize them. Foreign-key violations stay
/// database errors.
fn map_insert_err(e: rusqlite::Error) -> Error {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Error::AlreadyExists
        }
        _ => Error::Database(e),
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(idx: usize, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::Config(format!("serialize to json: {e}")))
}

fn parse_status(idx: usize, raw: &str) -> rusqlite::Result<DeviceStatus> {
    match raw {
        "enrolled" => Ok(DeviceStatus::Enrolled),
        "registered" => Ok(DeviceStatus::Registered),
        other => Err(rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown device status: {other}").into(),
        )),
    }
}

fn parse_kind(idx: usize, raw: &str) -> rusqlite::Result<ManifestKind> {
    match raw {
        "workload" => Ok(ManifestKind::Workload),
        "configuration" => Ok(ManifestKind::Configuration),
        other => Err(rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown manifest kind: {other}").into(),
        )),
    }
}

fn kind_str(kind: ManifestKind) -> &'static str {
    match kind {
        ManifestKind::Workload => "workload",
        ManifestKind::Configuration => "configuration",
    }
}

fn parse_relation_type(idx: usize, raw: &str) -> rusqlite::Result<RelationType> {
    match raw {
        "namespace" => Ok(RelationType::Namespace),
        "set" => Ok(RelationType::Set),
        "device" => Ok(RelationType::Device),
        other => Err(rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown relation type: {other}").into(),
        )),
    }
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Namespace operations

    fn create_namespace(&self, ns: &Namespace) -> Result<()> {
        let configuration = to_json(&ns.configuration)?;
        self.conn()
            .execute(
                "INSERT INTO namespaces (name, is_default, configuration, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    ns.name,
                    ns.is_default,
                    configuration,
                    format_datetime(&ns.created_at),
                ],
            )
            .map_err(map_insert_err)?;
        Ok(())
    }

    fn get_namespace(&self, name: &str) -> Result<Option<Namespace>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT name, is_default, configuration, created_at
             FROM namespaces WHERE name = ?1",
            params![name],
            |row| {
                let configuration: String = row.get(2)?;
                Ok(Namespace {
                    name: row.get(0)?,
                    is_default: row.get(1)?,
                    configuration: parse_json(2, &configuration)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_default_namespace(&self) -> Result<Option<Namespace>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT name, is_default, configuration, created_at
             FROM namespaces WHERE is_default = 1 ORDER BY name LIMIT 1",
            [],
            |row| {
                let configuration: String = row.get(2)?;
                Ok(Namespace {
                    name: row.get(0)?,
                    is_default: row.get(1)?,
                    configuration: parse_json(2, &configuration)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_namespaces(&self) -> Result<Vec<Namespace>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT name, is_default, configuration, created_at
             FROM namespaces ORDER BY name",
        )?;

        let rows = stmt.query_map([], |row| {
            let configuration: String = row.get(2)?;
            Ok(Namespace {
                name: row.get(0)?,
                is_default: row.get(1)?,
                configuration: parse_json(2, &configuration)?,
                created_at: parse_datetime(&row.get::<_, String>(3)?),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_namespace(&self, ns: &Namespace) -> Result<()> {
        let configuration = to_json(&ns.configuration)?;
        let rows = self.conn().execute(
            "UPDATE namespaces SET is_default = ?1, configuration = ?2 WHERE name = ?3",
            params![ns.is_default, configuration, ns.name],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_namespace(&self, name: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM namespaces WHERE name = ?1", params![name])?;
        Ok(rows > 0)
    }

    // Device set operations

    fn create_set(&self, set: &DeviceSet) -> Result<()> {
        let configuration = set
            .configuration
            .as_ref()
            .map(to_json)
            .transpose()?;
        self.conn()
            .execute(
                "INSERT INTO device_sets (name, namespace, configuration, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    set.name,
                    set.namespace,
                    configuration,
                    format_datetime(&set.created_at),
                ],
            )
            .map_err(map_insert_err)?;
        Ok(())
    }

    fn get_set(&self, name: &str) -> Result<Option<DeviceSet>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT name, namespace, configuration, created_at
             FROM device_sets WHERE name = ?1",
            params![name],
            |row| {
                let configuration = match row.get::<_, Option<String>>(2)? {
                    Some(raw) => Some(parse_json(2, &raw)?),
                    None => None,
                };
                Ok(DeviceSet {
                    name: row.get(0)?,
                    namespace: row.get(1)?,
                    configuration,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_sets(&self, namespace: Option<&str>) -> Result<Vec<DeviceSet>> {
        let conn = self.conn();
        let map_row = |row: &rusqlite::Row<'_>| {
            let configuration = match row.get::<_, Option<String>>(2)? {
                Some(raw) => Some(parse_json(2, &raw)?),
                None => None,
            };
            Ok(DeviceSet {
                name: row.get(0)?,
                namespace: row.get(1)?,
                configuration,
                created_at: parse_datetime(&row.get::<_, String>(3)?),
            })
        };

        let rows = if let Some(namespace) = namespace {
            let mut stmt = conn.prepare(
                "SELECT name, namespace, configuration, created_at
                 FROM device_sets WHERE namespace = ?1 ORDER BY name",
            )?;
            let rows = stmt.query_map(params![namespace], map_row)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
        } else {
            let mut stmt = conn.prepare(
                "SELECT name, namespace, configuration, created_at
                 FROM device_sets ORDER BY name",
            )?;
            let rows = stmt.query_map([], map_row)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
        };

        rows.map_err(Error::from)
    }

    fn update_set(&self, set: &DeviceSet) -> Result<()> {
        let configuration = set
            .configuration
            .as_ref()
            .map(to_json)
            .transpose()?;
        let rows = self.conn().execute(
            "UPDATE device_sets SET namespace = ?1, configuration = ?2 WHERE name = ?3",
            params![set.namespace, configuration, set.name],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_set(&self, name: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM device_sets WHERE name = ?1", params![name])?;
        Ok(rows > 0)
    }

    // Device operations

    fn create_device(&self, device: &Device) -> Result<()> {
        let configuration = device
            .configuration
            .as_ref()
            .map(to_json)
            .transpose()?;
        self.conn()
            .execute(
                "INSERT INTO devices (id, namespace, set_name, configuration, status, cert_serial,
                                      created_at, updated_at, last_seen_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    device.id,
                    device.namespace,
                    device.set,
                    configuration,
                    device.status.as_str(),
                    device.cert_serial,
                    format_datetime(&device.created_at),
                    format_datetime(&device.updated_at),
                    device.last_seen_at.as_ref().map(format_datetime),
                ],
            )
            .map_err(map_insert_err)?;
        Ok(())
    }

    fn get_device(&self, id: &str) -> Result<Option<Device>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, namespace, set_name, configuration, status, cert_serial,
                    created_at, updated_at, last_seen_at
             FROM devices WHERE id = ?1",
            params![id],
            |row| {
                let configuration = match row.get::<_, Option<String>>(3)? {
                    Some(raw) => Some(parse_json(3, &raw)?),
                    None => None,
                };
                let status: String = row.get(4)?;
                Ok(Device {
                    id: row.get(0)?,
                    namespace: row.get(1)?,
                    set: row.get(2)?,
                    configuration,
                    status: parse_status(4, &status)?,
                    cert_serial: row.get(5)?,
                    created_at: parse_datetime(&row.get::<_, String>(6)?),
                    updated_at: parse_datetime(&row.get::<_, String>(7)?),
                    last_seen_at: row.get::<_, Option<String>>(8)?.map(|s| parse_datetime(&s)),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_devices(
        &self,
        namespace: Option<&str>,
        cursor: &str,
        limit: i32,
    ) -> Result<Vec<Device>> {
        let conn = self.conn();
        let map_row = |row: &rusqlite::Row<'_>| {
            let configuration = match row.get::<_, Option<String>>(3)? {
                Some(raw) => Some(parse_json(3, &raw)?),
                None => None,
            };
            let status: String = row.get(4)?;
            Ok(Device {
                id: row.get(0)?,
                namespace: row.get(1)?,
                set: row.get(2)?,
                configuration,
                status: parse_status(4, &status)?,
                cert_serial: row.get(5)?,
                created_at: parse_datetime(&row.get::<_, String>(6)?),
                updated_at: parse_datetime(&row.get::<_, String>(7)?),
                last_seen_at: row.get::<_, Option<String>>(8)?.map(|s| parse_datetime(&s)),
            })
        };

        let rows = if let Some(namespace) = namespace {
            let mut stmt = conn.prepare(
                "SELECT id, namespace, set_name, configuration, status, cert_serial,
                        created_at, updated_at, last_seen_at
                 FROM devices WHERE namespace = ?1 AND id > ?2 ORDER BY id LIMIT ?3",
            )?;
            let rows = stmt.query_map(params![namespace, cursor, limit], map_row)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
        } else {
            let mut stmt = conn.prepare(
                "SELECT id, namespace, set_name, configuration, status, cert_serial,
                        created_at, updated_at, last_seen_at
                 FROM devices WHERE id > ?1 ORDER BY id LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![cursor, limit], map_row)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
        };

        rows.map_err(Error::from)
    }

    fn list_namespace_devices(&self, namespace: &str) -> Result<Vec<Device>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, namespace, set_name, configuration, status, cert_serial,
                    created_at, updated_at, last_seen_at
             FROM devices WHERE namespace = ?1 ORDER BY id",
        )?;

        let rows = stmt.query_map(params![namespace], |row| {
            let configuration = match row.get::<_, Option<String>>(3)? {
                Some(raw) => Some(parse_json(3, &raw)?),
                None => None,
            };
            let status: String = row.get(4)?;
            Ok(Device {
                id: row.get(0)?,
                namespace: row.get(1)?,
                set: row.get(2)?,
                configuration,
                status: parse_status(4, &status)?,
                cert_serial: row.get(5)?,
                created_at: parse_datetime(&row.get::<_, String>(6)?),
                updated_at: parse_datetime(&row.get::<_, String>(7)?),
                last_seen_at: row.get::<_, Option<String>>(8)?.map(|s| parse_datetime(&s)),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_device(&self, device: &Device) -> Result<()> {
        let configuration = device
            .configuration
            .as_ref()
            .map(to_json)
            .transpose()?;
        let rows = self.conn().execute(
            "UPDATE devices SET namespace = ?1, set_name = ?2, configuration = ?3, status = ?4,
                    cert_serial = ?5, updated_at = datetime('now')
             WHERE id = ?6",
            params![
                device.namespace,
                device.set,
                configuration,
                device.status.as_str(),
                device.cert_serial,
                device.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_device(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM devices WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn touch_device_seen(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE devices SET last_seen_at = datetime('now') WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    // Repository operations

    fn create_repository(&self, repo: &Repository) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO repositories (id, name, url, branch, local_path, current_head,
                                           pull_period_seconds, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    repo.id,
                    repo.name,
                    repo.url,
                    repo.branch,
                    repo.local_path,
                    repo.current_head,
                    repo.pull_period_seconds,
                    format_datetime(&repo.created_at),
                    format_datetime(&repo.updated_at),
                ],
            )
            .map_err(map_insert_err)?;
        Ok(())
    }

    fn get_repository(&self, id: &str) -> Result<Option<Repository>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, url, branch, local_path, current_head, pull_period_seconds,
                    created_at, updated_at
             FROM repositories WHERE id = ?1",
            params![id],
            |row| {
                Ok(Repository {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    url: row.get(2)?,
                    branch: row.get(3)?,
                    local_path: row.get(4)?,
                    current_head: row.get(5)?,
                    pull_period_seconds: row.get(6)?,
                    created_at: parse_datetime(&row.get::<_, String>(7)?),
                    updated_at: parse_datetime(&row.get::<_, String>(8)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_repository_by_name(&self, name: &str) -> Result<Option<Repository>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, url, branch, local_path, current_head, pull_period_seconds,
                    created_at, updated_at
             FROM repositories WHERE name = ?1",
            params![name],
            |row| {
                Ok(Repository {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    url: row.get(2)?,
                    branch: row.get(3)?,
                    local_path: row.get(4)?,
                    current_head: row.get(5)?,
                    pull_period_seconds: row.get(6)?,
                    created_at: parse_datetime(&row.get::<_, String>(7)?),
                    updated_at: parse_datetime(&row.get::<_, String>(8)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_repositories(&self) -> Result<Vec<Repository>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, url, branch, local_path, current_head, pull_period_seconds,
                    created_at, updated_at
             FROM repositories ORDER BY name",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(Repository {
                id: row.get(0)?,
                name: row.get(1)?,
                url: row.get(2)?,
                branch: row.get(3)?,
                local_path: row.get(4)?,
                current_head: row.get(5)?,
                pull_period_seconds: row.get(6)?,
                created_at: parse_datetime(&row.get::<_, String>(7)?),
                updated_at: parse_datetime(&row.get::<_, String>(8)?),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_repository(&self, repo: &Repository) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE repositories SET url = ?1, branch = ?2, local_path = ?3,
                    pull_period_seconds = ?4, updated_at = datetime('now')
             WHERE id = ?5",
            params![
                repo.url,
                repo.branch,
                repo.local_path,
                repo.pull_period_seconds,
                repo.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn update_repository_head(&self, id: &str, head: &str) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE repositories SET current_head = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![head, id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_repository(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM repositories WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Manifest reference operations

    fn list_references(&self, repo_id: &str) -> Result<Vec<ManifestReference>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, repo_id, path, hash, kind, valid,
                    namespace_selectors, set_selectors, device_selectors
             FROM manifest_references WHERE repo_id = ?1 ORDER BY path",
        )?;

        let rows = stmt.query_map(params![repo_id], |row| {
            let kind: String = row.get(4)?;
            let namespaces: String = row.get(6)?;
            let sets: String = row.get(7)?;
            let devices: String = row.get(8)?;
            Ok(ManifestReference {
                id: row.get(0)?,
                repo_id: row.get(1)?,
                path: row.get(2)?,
                hash: row.get(3)?,
                kind: parse_kind(4, &kind)?,
                valid: row.get(5)?,
                namespace_selectors: parse_json(6, &namespaces)?,
                set_selectors: parse_json(7, &sets)?,
                device_selectors: parse_json(8, &devices)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn get_reference(&self, id: &str) -> Result<Option<ManifestReference>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, repo_id, path, hash, kind, valid,
                    namespace_selectors, set_selectors, device_selectors
             FROM manifest_references WHERE id = ?1",
            params![id],
            |row| {
                let kind: String = row.get(4)?;
                let namespaces: String = row.get(6)?;
                let sets: String = row.get(7)?;
                let devices: String = row.get(8)?;
                Ok(ManifestReference {
                    id: row.get(0)?,
                    repo_id: row.get(1)?,
                    path: row.get(2)?,
                    hash: row.get(3)?,
                    kind: parse_kind(4, &kind)?,
                    valid: row.get(5)?,
                    namespace_selectors: parse_json(6, &namespaces)?,
                    set_selectors: parse_json(7, &sets)?,
                    device_selectors: parse_json(8, &devices)?,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn insert_reference(&self, reference: &ManifestReference) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO manifest_references
                     (id, repo_id, path, hash, kind, valid,
                      namespace_selectors, set_selectors, device_selectors)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    reference.id,
                    reference.repo_id,
                    reference.path,
                    reference.hash,
                    kind_str(reference.kind),
                    reference.valid,
                    to_json(&reference.namespace_selectors)?,
                    to_json(&reference.set_selectors)?,
                    to_json(&reference.device_selectors)?,
                ],
            )
            .map_err(map_insert_err)?;
        Ok(())
    }

    fn update_reference(&self, reference: &ManifestReference) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE manifest_references
             SET path = ?1, hash = ?2, kind = ?3, valid = ?4,
                 namespace_selectors = ?5, set_selectors = ?6, device_selectors = ?7,
                 updated_at = datetime('now')
             WHERE id = ?8",
            params![
                reference.path,
                reference.hash,
                kind_str(reference.kind),
                reference.valid,
                to_json(&reference.namespace_selectors)?,
                to_json(&reference.set_selectors)?,
                to_json(&reference.device_selectors)?,
                reference.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_reference(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM manifest_references WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Relation operations

    fn create_relation(&self, relation: &Relation) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO relations (relation_type, resource_id, manifest_id)
                 VALUES (?1, ?2, ?3)",
                params![
                    relation.relation_type.as_str(),
                    relation.resource_id,
                    relation.manifest_id,
                ],
            )
            .map_err(map_insert_err)?;
        Ok(())
    }

    fn delete_relation(&self, relation: &Relation) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM relations
             WHERE relation_type = ?1 AND resource_id = ?2 AND manifest_id = ?3",
            params![
                relation.relation_type.as_str(),
                relation.resource_id,
                relation.manifest_id,
            ],
        )?;
        Ok(rows > 0)
    }

    fn list_resource_relations(
        &self,
        relation_type: RelationType,
        resource_id: &str,
    ) -> Result<Vec<Relation>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT relation_type, resource_id, manifest_id
             FROM relations WHERE relation_type = ?1 AND resource_id = ?2
             ORDER BY manifest_id",
        )?;

        let rows = stmt.query_map(params![relation_type.as_str(), resource_id], |row| {
            let relation_type: String = row.get(0)?;
            Ok(Relation {
                relation_type: parse_relation_type(0, &relation_type)?,
                resource_id: row.get(1)?,
                manifest_id: row.get(2)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_manifest_relations(&self, manifest_id: &str) -> Result<Vec<Relation>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT relation_type, resource_id, manifest_id
             FROM relations WHERE manifest_id = ?1
             ORDER BY relation_type, resource_id",
        )?;

        let rows = stmt.query_map(params![manifest_id], |row| {
            let relation_type: String = row.get(0)?;
            Ok(Relation {
                relation_type: parse_relation_type(0, &relation_type)?,
                resource_id: row.get(1)?,
                manifest_id: row.get(2)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Token operations

    fn create_token(&self, token: &Token) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO tokens (id, token_hash, token_lookup, created_at, expires_at, last_used_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    token.id,
                    token.token_hash,
                    token.token_lookup,
                    format_datetime(&token.created_at),
                    token.expires_at.as_ref().map(format_datetime),
                    token.last_used_at.as_ref().map(format_datetime),
                ],
            )
            .map_err(map_insert_err)?;
        Ok(())
    }

    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, token_hash, token_lookup, created_at, expires_at, last_used_at
             FROM tokens WHERE token_lookup = ?1",
            params![lookup],
            |row| {
                Ok(Token {
                    id: row.get(0)?,
                    token_hash: row.get(1)?,
                    token_lookup: row.get(2)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                    expires_at: row.get::<_, Option<String>>(4)?.map(|s| parse_datetime(&s)),
                    last_used_at: row.get::<_, Option<String>>(5)?.map(|s| parse_datetime(&s)),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_tokens(&self) -> Result<Vec<Token>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, token_hash, token_lookup, created_at, expires_at, last_used_at
             FROM tokens ORDER BY created_at",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(Token {
                id: row.get(0)?,
                token_hash: row.get(1)?,
                token_lookup: row.get(2)?,
                created_at: parse_datetime(&row.get::<_, String>(3)?),
                expires_at: row.get::<_, Option<String>>(4)?.map(|s| parse_datetime(&s)),
                last_used_at: row.get::<_, Option<String>>(5)?.map(|s| parse_datetime(&s)),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_token(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM tokens WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn update_token_last_used(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE tokens SET last_used_at = datetime('now') WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    fn has_admin_token(&self) -> Result<bool> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM tokens", [], |row| row.get(0))?;
        Ok(count > 0)
    }

    fn close(&self) -> Result<()> {
        self.conn().execute_batch("PRAGMA optimize;")?;
        Ok(())
    }
}
