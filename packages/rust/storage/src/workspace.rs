//! Workspace handle: directory layout, exclusive lock, and item index.

use std::path::{Path, PathBuf};

use tracing::info;

use superanalyze_shared::{ItemType, Result, StorePath, SuperAnalyzeError};

use crate::index::ItemIndex;
use crate::lock::WorkspaceLock;

/// Name of the base directory created under the workspace root.
pub const WORKSPACE_DIR: &str = "workspace";

/// Item index location, relative to the base directory.
pub const INDEX_DB: &str = ".index/items.db";

const LOCK_FILE: &str = ".lock";

/// An open workspace. Holds the exclusive lock until dropped.
pub struct Workspace {
    root: PathBuf,
    base_dir: PathBuf,
    pub(crate) index: ItemIndex,
    _lock: WorkspaceLock,
}

impl Workspace {
    /// Open (creating if needed) the workspace under `root`.
    ///
    /// Fails with a store error if another handle already holds the lock.
    pub async fn open(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root).map_err(|e| SuperAnalyzeError::store_io(root, e))?;
        let root = root
            .canonicalize()
            .map_err(|e| SuperAnalyzeError::store_io(root, e))?;
        let base_dir = root.join(WORKSPACE_DIR);

        for item_type in [ItemType::Source, ItemType::Derived, ItemType::Export] {
            let dir = base_dir.join(item_type.folder());
            std::fs::create_dir_all(&dir).map_err(|e| SuperAnalyzeError::store_io(&dir, e))?;
        }

        let lock = WorkspaceLock::acquire(&base_dir.join(LOCK_FILE))?;
        let index = ItemIndex::open(&base_dir.join(INDEX_DB)).await?;

        Ok(Self {
            root,
            base_dir,
            index,
            _lock: lock,
        })
    }

    /// Absolute workspace root (holds `workspace/` and `logs/`).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute base directory that all store paths are relative to.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn index(&self) -> &ItemIndex {
        &self.index
    }

    /// Absolute location of a store path.
    pub fn resolve(&self, path: &StorePath) -> PathBuf {
        path.as_str()
            .split('/')
            .fold(self.base_dir.clone(), |acc, seg| acc.join(seg))
    }

    /// Log where the workspace lives and how much it holds.
    pub async fn log_workspace_info(&self) -> Result<()> {
        let items = self.index.count_items().await?;
        info!(
            base_dir = %self.base_dir.display(),
            items,
            "using workspace"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("sa_ws_{}", Uuid::now_v7()))
    }

    #[tokio::test]
    async fn open_creates_layout() {
        let root = temp_root();
        let ws = Workspace::open(&root).await.expect("open workspace");

        assert!(ws.base_dir().is_absolute());
        assert!(ws.base_dir().ends_with(WORKSPACE_DIR));
        for folder in ["sources", "docs", "exports"] {
            assert!(ws.base_dir().join(folder).is_dir());
        }
        assert!(ws.base_dir().join(INDEX_DB).is_file());
        ws.log_workspace_info().await.unwrap();

        drop(ws);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn second_open_fails_until_first_is_dropped() {
        let root = temp_root();
        let first = Workspace::open(&root).await.expect("first open");

        let err = Workspace::open(&root).await.err().expect("locked");
        assert_eq!(err.kind(), "store_error");
        assert!(err.to_string().contains("workspace in use"));

        drop(first);
        let again = Workspace::open(&root).await.expect("reopen after drop");
        drop(again);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn resolve_joins_segments() {
        let root = temp_root();
        let ws = Workspace::open(&root).await.unwrap();
        let path = StorePath::new("docs/climate_report.doc.md").unwrap();
        assert_eq!(
            ws.resolve(&path),
            ws.base_dir().join("docs").join("climate_report.doc.md")
        );
        drop(ws);
        let _ = std::fs::remove_dir_all(&root);
    }
}
