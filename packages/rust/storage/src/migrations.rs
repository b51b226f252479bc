//! SQL migration definitions for the workspace item index.
//!
//! Migrations are applied in order when the index is opened. Each migration
//! has a version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: items, action_cache",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Every persisted or recorded item, keyed by its workspace-relative path
CREATE TABLE IF NOT EXISTS items (
    store_path    TEXT PRIMARY KEY,
    identity      TEXT NOT NULL UNIQUE,
    title         TEXT,
    item_type     TEXT NOT NULL,
    format        TEXT NOT NULL,
    source_url    TEXT,
    thumbnail_url TEXT,
    derived_from  TEXT,
    body_hash     TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_derived_from ON items(derived_from);

-- Action outputs, reused unless a rerun is requested
CREATE TABLE IF NOT EXISTS action_cache (
    action            TEXT NOT NULL,
    input_hash        TEXT NOT NULL,
    options_key       TEXT NOT NULL,
    output_store_path TEXT NOT NULL,
    created_at        TEXT NOT NULL,
    PRIMARY KEY (action, input_hash, options_key)
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Record the output body hash of cached actions",
            sql: r#"
ALTER TABLE action_cache ADD COLUMN output_body_hash TEXT NOT NULL DEFAULT '';

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
