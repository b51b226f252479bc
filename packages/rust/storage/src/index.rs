//! libSQL item index: which store path belongs to which item identity, plus
//! the action result cache.

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};

use superanalyze_shared::{Format, ItemType, Result, StorePath, SuperAnalyzeError};

use crate::migrations;

fn db_err(e: libsql::Error) -> SuperAnalyzeError {
    SuperAnalyzeError::Store(e.to_string())
}

/// One row of the `items` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRecord {
    pub store_path: StorePath,
    pub identity: String,
    pub title: Option<String>,
    pub item_type: ItemType,
    pub format: Format,
    pub source_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub derived_from: Option<StorePath>,
    pub body_hash: String,
}

/// A cached action output and the body hash it had when cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedOutput {
    pub store_path: StorePath,
    pub body_hash: String,
}

/// Handle on the workspace's `.index/items.db`.
pub struct ItemIndex {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl ItemIndex {
    /// Open or create the index at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SuperAnalyzeError::store_io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;

        let index = Self { db, conn };
        index.run_migrations().await?;
        Ok(index)
    }

    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying index migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    SuperAnalyzeError::Store(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 before the first migration.
    pub(crate) async fn schema_version(&self) -> u32 {
        match self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await
        {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0,
        }
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    pub async fn get_by_identity(&self, identity: &str) -> Result<Option<ItemRecord>> {
        self.get_one(
            "SELECT store_path, identity, title, item_type, format, source_url, thumbnail_url,
                    derived_from, body_hash
             FROM items WHERE identity = ?1",
            identity,
        )
        .await
    }

    pub async fn get_by_path(&self, store_path: &StorePath) -> Result<Option<ItemRecord>> {
        self.get_one(
            "SELECT store_path, identity, title, item_type, format, source_url, thumbnail_url,
                    derived_from, body_hash
             FROM items WHERE store_path = ?1",
            store_path.as_str(),
        )
        .await
    }

    async fn get_one(&self, sql: &str, key: &str) -> Result<Option<ItemRecord>> {
        let mut rows = self.conn.query(sql, params![key]).await.map_err(db_err)?;
        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    /// Insert or refresh an item row. The identity of an existing path never
    /// changes.
    pub async fn upsert(&self, record: &ItemRecord) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO items (store_path, identity, title, item_type, format, source_url,
                                    thumbnail_url, derived_from, body_hash, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(store_path) DO UPDATE SET
                   title = excluded.title,
                   source_url = excluded.source_url,
                   thumbnail_url = excluded.thumbnail_url,
                   derived_from = excluded.derived_from,
                   body_hash = excluded.body_hash,
                   updated_at = excluded.updated_at",
                params![
                    record.store_path.as_str(),
                    record.identity.as_str(),
                    record.title.as_deref(),
                    record.item_type.as_str(),
                    record.format.as_str(),
                    record.source_url.as_deref(),
                    record.thumbnail_url.as_deref(),
                    record.derived_from.as_ref().map(StorePath::as_str),
                    record.body_hash.as_str(),
                    now.as_str()
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    pub async fn count_items(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM items", params![])
            .await
            .map_err(db_err)?;
        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(db_err)?.max(0) as u64),
            None => Ok(0),
        }
    }

    // -----------------------------------------------------------------------
    // Action cache
    // -----------------------------------------------------------------------

    /// Cached output of an action, if one was recorded.
    pub async fn get_cached_output(
        &self,
        action: &str,
        input_hash: &str,
        options_key: &str,
    ) -> Result<Option<CachedOutput>> {
        let mut rows = self
            .conn
            .query(
                "SELECT output_store_path, output_body_hash FROM action_cache
                 WHERE action = ?1 AND input_hash = ?2 AND options_key = ?3",
                params![action, input_hash, options_key],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => {
                let path: String = row.get(0).map_err(db_err)?;
                Ok(Some(CachedOutput {
                    store_path: StorePath::new(path)?,
                    body_hash: row.get::<String>(1).map_err(db_err)?,
                }))
            }
            None => Ok(None),
        }
    }

    /// Whether the item at a cached output's path still has the cached body.
    ///
    /// Several cache entries can point at one path; only the entry whose
    /// output was written last is current.
    pub async fn is_current(&self, cached: &CachedOutput) -> Result<bool> {
        Ok(self
            .get_by_path(&cached.store_path)
            .await?
            .is_some_and(|record| record.body_hash == cached.body_hash))
    }

    /// Record (or replace) the output of an action.
    pub async fn set_cached_output(
        &self,
        action: &str,
        input_hash: &str,
        options_key: &str,
        output: &CachedOutput,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO action_cache
                   (action, input_hash, options_key, output_store_path, output_body_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(action, input_hash, options_key) DO UPDATE SET
                   output_store_path = excluded.output_store_path,
                   output_body_hash = excluded.output_body_hash,
                   created_at = excluded.created_at",
                params![
                    action,
                    input_hash,
                    options_key,
                    output.store_path.as_str(),
                    output.body_hash.as_str(),
                    now.as_str()
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

fn row_to_record(row: &libsql::Row) -> Result<ItemRecord> {
    let tag: String = row.get(3).map_err(db_err)?;
    let item_type = ItemType::from_tag(&tag)
        .ok_or_else(|| SuperAnalyzeError::Store(format!("unknown item type '{tag}' in index")))?;
    let format_name: String = row.get(4).map_err(db_err)?;
    let format = Format::from_name(&format_name).ok_or_else(|| {
        SuperAnalyzeError::Store(format!("unknown format '{format_name}' in index"))
    })?;

    Ok(ItemRecord {
        store_path: StorePath::new(row.get::<String>(0).map_err(db_err)?)?,
        identity: row.get::<String>(1).map_err(db_err)?,
        title: row.get::<String>(2).ok(),
        item_type,
        format,
        source_url: row.get::<String>(5).ok(),
        thumbnail_url: row.get::<String>(6).ok(),
        derived_from: row
            .get::<String>(7)
            .ok()
            .map(StorePath::new)
            .transpose()?,
        body_hash: row.get::<String>(8).map_err(db_err)?,
    })
}
