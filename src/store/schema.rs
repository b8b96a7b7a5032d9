pub const SCHEMA: &str = r#"
-- Namespaces: top of the resource hierarchy. The name is the identity.
CREATE TABLE IF NOT EXISTS namespaces (
    name TEXT PRIMARY KEY,
    is_default INTEGER NOT NULL DEFAULT 0,
    configuration TEXT NOT NULL,     -- JSON DeviceConfiguration, never NULL
    created_at TEXT DEFAULT (datetime('now'))
);

-- Device sets: a namespace-owned grouping. Names are globally unique so
-- manifest selectors can address a set without qualification.
CREATE TABLE IF NOT EXISTS device_sets (
    name TEXT PRIMARY KEY,
    namespace TEXT NOT NULL REFERENCES namespaces(name) ON DELETE CASCADE,
    configuration TEXT,              -- JSON, NULL = inherit from namespace
    created_at TEXT DEFAULT (datetime('now'))
);

-- Devices. A device always belongs to exactly one namespace; set and
-- configuration are optional overrides.
CREATE TABLE IF NOT EXISTS devices (
    id TEXT PRIMARY KEY,
    namespace TEXT NOT NULL REFERENCES namespaces(name) ON DELETE CASCADE,
    set_name TEXT REFERENCES device_sets(name) ON DELETE SET NULL,
    configuration TEXT,              -- JSON, NULL = inherit
    status TEXT NOT NULL DEFAULT 'enrolled',
    cert_serial TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),
    last_seen_at TEXT
);

-- Manifest repositories (git remotes mirrored into the data dir).
CREATE TABLE IF NOT EXISTS repositories (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    url TEXT NOT NULL,
    branch TEXT NOT NULL DEFAULT 'main',
    local_path TEXT NOT NULL,
    current_head TEXT,
    pull_period_seconds INTEGER NOT NULL DEFAULT 60,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- One row per manifest file observed in a repository. The id is a digest of
-- the repo-relative path; selector lists are the flattened projection of the
-- manifest's selectors block at last sync.
CREATE TABLE IF NOT EXISTS manifest_references (
    id TEXT PRIMARY KEY,
    repo_id TEXT NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    path TEXT NOT NULL,
    hash TEXT NOT NULL,
    kind TEXT NOT NULL DEFAULT 'workload',
    valid INTEGER NOT NULL DEFAULT 1,
    namespace_selectors TEXT NOT NULL DEFAULT '[]',
    set_selectors TEXT NOT NULL DEFAULT '[]',
    device_selectors TEXT NOT NULL DEFAULT '[]',
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Manifest-to-resource bindings. No foreign keys: rows may outlive the
-- reference (resolver skips dangling ones) and must stay deletable after the
-- resource is gone.
CREATE TABLE IF NOT EXISTS relations (
    relation_type TEXT NOT NULL,
    resource_id TEXT NOT NULL,
    manifest_id TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (relation_type, resource_id, manifest_id)
);

-- Admin API tokens.
CREATE TABLE IF NOT EXISTS tokens (
    id TEXT PRIMARY KEY,
    token_hash TEXT NOT NULL,          -- argon2id hash with embedded salt
    token_lookup TEXT NOT NULL,        -- short prefix for fast lookup
    created_at TEXT DEFAULT (datetime('now')),
    expires_at TEXT,                   -- NULL = never
    last_used_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_device_sets_namespace ON device_sets(namespace);
CREATE INDEX IF NOT EXISTS idx_devices_namespace ON devices(namespace);
CREATE INDEX IF NOT EXISTS idx_devices_set ON devices(set_name);
CREATE INDEX IF NOT EXISTS idx_references_repo ON manifest_references(repo_id);
CREATE INDEX IF NOT EXISTS idx_relations_resource ON relations(relation_type, resource_id);
CREATE INDEX IF NOT EXISTS idx_relations_manifest ON relations(manifest_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_tokens_lookup ON tokens(token_lookup);
"#;
