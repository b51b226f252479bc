//! Artifact store operations on an open [`Workspace`].
//!
//! Every persisted item gets a store path derived from its title, type, and
//! format. Items with the same identity always land on the same path; items
//! that only share a title get `_2`, `_3`, ... suffixes.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use superanalyze_markdown::{FrontMatter, frontmatter};
use superanalyze_shared::{ContentItem, Format, Result, StorePath, SuperAnalyzeError};

use crate::index::ItemRecord;
use crate::paths::{body_hash, candidate, identity, slugify};
use crate::workspace::Workspace;

impl Workspace {
    /// Assign a store path, index the item, and write its file.
    #[instrument(skip_all, fields(title = item.title.as_deref().unwrap_or("")))]
    pub async fn persist(&self, item: ContentItem) -> Result<ContentItem> {
        let item = self.record(item).await?;
        let path = item.require_store_path("persisted item")?;
        let target = self.resolve(path);
        write_atomic(&target, serialize(&item).as_bytes())?;
        debug!(store_path = %path, bytes = item.body.len(), "persisted item");
        Ok(item)
    }

    /// Assign a store path and index the item without writing its file.
    pub async fn record(&self, mut item: ContentItem) -> Result<ContentItem> {
        let identity = identity(&item);
        let path = match item.store_path() {
            Some(existing) => existing.clone(),
            None => self.assign_path(&identity, &item).await?,
        };
        item.assign_store_path(path.clone())?;

        self.index
            .upsert(&ItemRecord {
                store_path: path,
                identity,
                title: item.title.clone(),
                item_type: item.item_type,
                format: item.format,
                source_url: item.source_url.clone(),
                thumbnail_url: item.thumbnail_url.clone(),
                derived_from: item.derived_from.clone(),
                body_hash: body_hash(&item.body),
            })
            .await?;
        Ok(item)
    }

    /// Write final HTML at an already recorded path. Returns the absolute path.
    #[instrument(skip(self, html), fields(store_path = %path, bytes = html.len()))]
    pub async fn write_final(&self, path: &StorePath, html: &str) -> Result<PathBuf> {
        if self.index.get_by_path(path).await?.is_none() {
            return Err(SuperAnalyzeError::Store(format!(
                "'{path}' has not been recorded"
            )));
        }
        let target = self.resolve(path);
        write_atomic(&target, html.as_bytes())?;
        Ok(target)
    }

    /// Read a stored item back from the index and its file.
    pub async fn load(&self, path: &StorePath) -> Result<ContentItem> {
        let record = self
            .index
            .get_by_path(path)
            .await?
            .ok_or_else(|| SuperAnalyzeError::Store(format!("no item stored at '{path}'")))?;

        let file = self.resolve(path);
        let text =
            std::fs::read_to_string(&file).map_err(|e| SuperAnalyzeError::store_io(&file, e))?;
        let body = match record.format {
            Format::Html => text,
            _ => frontmatter::split(&text).1.to_string(),
        };

        let mut item = ContentItem::new(record.item_type, record.format, body)
            .with_thumbnail_url(record.thumbnail_url);
        item.title = record.title;
        item.source_url = record.source_url;
        item.derived_from = record.derived_from;
        item.assign_store_path(record.store_path)?;
        Ok(item)
    }

    /// Same identity -> same path; otherwise the first free `_n` candidate.
    async fn assign_path(&self, identity: &str, item: &ContentItem) -> Result<StorePath> {
        if let Some(existing) = self.index.get_by_identity(identity).await? {
            return Ok(existing.store_path);
        }

        let slug = slugify(item.title.as_deref().unwrap_or_default());
        let mut n = 1;
        loop {
            let path = candidate(item.item_type, item.format, &slug, n)?;
            let taken =
                self.index.get_by_path(&path).await?.is_some() || self.resolve(&path).exists();
            if !taken {
                return Ok(path);
            }
            n += 1;
        }
    }
}

/// File contents for an item: HTML verbatim, other formats behind a
/// deterministic front matter block.
fn serialize(item: &ContentItem) -> String {
    if item.format == Format::Html {
        return item.body.clone();
    }

    let mut fm = FrontMatter::new();
    fm.set_opt("title", item.title.as_deref());
    fm.set("item_type", item.item_type.as_str());
    fm.set("format", item.format.as_str());
    fm.set_opt("source_url", item.source_url.as_deref());
    fm.set_opt("thumbnail_url", item.thumbnail_url.as_deref());
    fm.set_opt("derived_from", item.derived_from.as_ref().map(StorePath::as_str));
    frontmatter::join(&fm, &item.body)
}

/// Write to a temp file next to `target`, then rename over it.
fn write_atomic(target: &Path, bytes: &[u8]) -> Result<()> {
    let dir = target
        .parent()
        .ok_or_else(|| SuperAnalyzeError::Store(format!("{} has no parent", target.display())))?;
    std::fs::create_dir_all(dir).map_err(|e| SuperAnalyzeError::store_io(dir, e))?;

    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = dir.join(format!(".{file_name}.tmp"));
    std::fs::write(&temp, bytes).map_err(|e| SuperAnalyzeError::store_io(&temp, e))?;
    std::fs::rename(&temp, target).map_err(|e| SuperAnalyzeError::store_io(target, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use superanalyze_shared::{ItemOverrides, ItemType};
    use uuid::Uuid;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("sa_store_{}", Uuid::now_v7()))
    }

    fn source() -> ContentItem {
        ContentItem::new(ItemType::Source, Format::Markdown, "# Climate Report\n\nSeas rose.\n")
            .with_title("Climate Report")
            .with_source_url("/data/climate.md")
            .with_thumbnail_url(Some("https://example.org/t.png".into()))
    }

    #[tokio::test]
    async fn persist_and_load() {
        let root = temp_root();
        let ws = Workspace::open(&root).await.unwrap();

        let stored = ws.persist(source()).await.unwrap();
        let path = stored.store_path().unwrap().clone();
        assert_eq!(path.as_str(), "sources/climate_report.source.md");

        let on_disk = std::fs::read_to_string(ws.resolve(&path)).unwrap();
        assert!(on_disk.starts_with("---\ntitle: \"Climate Report\"\n"));
        assert!(on_disk.ends_with("# Climate Report\n\nSeas rose.\n"));

        let loaded = ws.load(&path).await.unwrap();
        assert_eq!(loaded, stored);

        drop(ws);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn same_identity_same_path_across_reopen() {
        let root = temp_root();
        let first = {
            let ws = Workspace::open(&root).await.unwrap();
            ws.persist(source()).await.unwrap()
        };
        let ws = Workspace::open(&root).await.unwrap();
        let mut edited = source();
        edited.body = "# Climate Report\n\nSeas rose faster.\n".into();
        let second = ws.persist(edited).await.unwrap();

        assert_eq!(first.store_path(), second.store_path());
        let on_disk = std::fs::read_to_string(ws.resolve(second.store_path().unwrap())).unwrap();
        assert!(on_disk.contains("faster"));

        drop(ws);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn same_title_different_identity_gets_suffix() {
        let root = temp_root();
        let ws = Workspace::open(&root).await.unwrap();

        let analysis = ws
            .persist(
                ws.persist(source())
                    .await
                    .unwrap()
                    .derive(ItemOverrides {
                        item_type: Some(ItemType::Derived),
                        body: Some("Claims.".into()),
                        ..Default::default()
                    }),
            )
            .await
            .unwrap();

        let raw = ws
            .persist(analysis.derive(ItemOverrides {
                item_type: Some(ItemType::Export),
                format: Some(Format::Html),
                body: Some("<html><body>raw</body></html>".into()),
                ..Default::default()
            }))
            .await
            .unwrap();
        let fin = ws
            .record(raw.derive(ItemOverrides {
                body: Some("<html><body>min</body></html>".into()),
                ..Default::default()
            }))
            .await
            .unwrap();

        assert_eq!(
            raw.store_path().unwrap().as_str(),
            "exports/climate_report.export.html"
        );
        assert_eq!(
            fin.store_path().unwrap().as_str(),
            "exports/climate_report_2.export.html"
        );
        // record() does not write
        assert!(!ws.resolve(fin.store_path().unwrap()).exists());

        let written = ws
            .write_final(fin.store_path().unwrap(), &fin.body)
            .await
            .unwrap();
        assert!(written.is_absolute());
        assert_eq!(
            std::fs::read_to_string(&written).unwrap(),
            "<html><body>min</body></html>"
        );
        // HTML is stored verbatim
        assert_eq!(
            std::fs::read_to_string(ws.resolve(raw.store_path().unwrap())).unwrap(),
            "<html><body>raw</body></html>"
        );

        drop(ws);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn write_final_requires_recorded_path() {
        let root = temp_root();
        let ws = Workspace::open(&root).await.unwrap();
        let path = StorePath::new("exports/stray.export.html").unwrap();
        let err = ws.write_final(&path, "<p>x</p>").await.unwrap_err();
        assert!(err.to_string().contains("has not been recorded"));
        assert!(ws.load(&path).await.is_err());
        drop(ws);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn serialized_markdown_is_deterministic() {
        let item = source();
        assert_eq!(serialize(&item), serialize(&item.clone()));
        assert!(!serialize(&item).contains("updated"));
    }
}
