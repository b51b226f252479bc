//! Core domain types for the analysis pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SuperAnalyzeError};

// ---------------------------------------------------------------------------
// ItemType / Format
// ---------------------------------------------------------------------------

/// Role of a content item in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    /// A document as acquired from a path or URL.
    Source,
    /// A document produced by transforming another item (e.g., an analysis).
    Derived,
    /// A browser-ready output artifact.
    Export,
}

impl ItemType {
    /// Tag used in file names and the item index.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Derived => "doc",
            Self::Export => "export",
        }
    }

    /// Top-level workspace folder for items of this type.
    pub fn folder(&self) -> &'static str {
        match self {
            Self::Source => "sources",
            Self::Derived => "docs",
            Self::Export => "exports",
        }
    }

    /// Inverse of [`ItemType::as_str`].
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "source" => Some(Self::Source),
            "doc" => Some(Self::Derived),
            "export" => Some(Self::Export),
            _ => None,
        }
    }
}

/// Body format of a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    Markdown,
    Html,
    PlainText,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::PlainText => "plaintext",
        }
    }

    /// File extension (without the dot).
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Html => "html",
            Self::PlainText => "txt",
        }
    }

    /// Parse a format name as written in front matter or the bridge protocol.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Some(Self::Markdown),
            "html" | "htm" => Some(Self::Html),
            "plaintext" | "text" | "txt" => Some(Self::PlainText),
            _ => None,
        }
    }

    /// Guess a format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "md" | "markdown" | "mdx" => Some(Self::Markdown),
            "html" | "htm" | "xhtml" => Some(Self::Html),
            "txt" | "text" => Some(Self::PlainText),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// StorePath
// ---------------------------------------------------------------------------

/// Relative, `/`-separated location of a persisted item inside the workspace
/// base directory (e.g., `docs/climate_report.doc.md`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorePath(String);

impl StorePath {
    /// Wrap a relative path. Rejects absolute paths and `..` components.
    pub fn new(path: impl Into<String>) -> Result<Self> {
        let path = path.into().replace('\\', "/");
        if path.is_empty()
            || path.starts_with('/')
            || path.split('/').any(|seg| seg == ".." || seg.is_empty())
        {
            return Err(SuperAnalyzeError::Store(format!(
                "invalid store path '{path}'"
            )));
        }
        Ok(Self(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StorePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// ContentItem
// ---------------------------------------------------------------------------

/// A unit of document data flowing through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Document body, interpreted according to `format`.
    pub body: String,
    /// Role of the item.
    pub item_type: ItemType,
    /// Body format.
    pub format: Format,
    /// Optional image shown at the top of rendered reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Where the document came from (URL or canonical file path).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Store path of the item this one was derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_from: Option<StorePath>,
    /// Set exactly once, when the item is persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    store_path: Option<StorePath>,
}

/// Field overrides applied by [`ContentItem::derive`].
#[derive(Debug, Clone, Default)]
pub struct ItemOverrides {
    pub item_type: Option<ItemType>,
    pub format: Option<Format>,
    pub title: Option<String>,
    pub body: Option<String>,
}

impl ContentItem {
    /// Create an unpersisted item.
    pub fn new(item_type: ItemType, format: Format, body: impl Into<String>) -> Self {
        Self {
            title: None,
            body: body.into(),
            item_type,
            format,
            thumbnail_url: None,
            source_url: None,
            derived_from: None,
            store_path: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_thumbnail_url(mut self, url: Option<String>) -> Self {
        self.thumbnail_url = url;
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    /// Where this item lives in the workspace, if it has been persisted.
    pub fn store_path(&self) -> Option<&StorePath> {
        self.store_path.as_ref()
    }

    /// Store path of a persisted item, or a store error naming `what`.
    pub fn require_store_path(&self, what: &str) -> Result<&StorePath> {
        self.store_path
            .as_ref()
            .ok_or_else(|| SuperAnalyzeError::Store(format!("{what} has not been persisted")))
    }

    /// Record the persisted location. Assigning a different path to an
    /// already-persisted item is an error.
    pub fn assign_store_path(&mut self, path: StorePath) -> Result<()> {
        match &self.store_path {
            Some(existing) if *existing != path => Err(SuperAnalyzeError::Store(format!(
                "item already stored at '{existing}', refusing to move it to '{path}'"
            ))),
            _ => {
                self.store_path = Some(path);
                Ok(())
            }
        }
    }

    /// Build a new item from this one. The copy is unpersisted and points
    /// back at this item's store path; `self` is left untouched.
    pub fn derive(&self, overrides: ItemOverrides) -> Self {
        Self {
            title: overrides.title.or_else(|| self.title.clone()),
            body: overrides.body.unwrap_or_else(|| self.body.clone()),
            item_type: overrides.item_type.unwrap_or(self.item_type),
            format: overrides.format.unwrap_or(self.format),
            thumbnail_url: self.thumbnail_url.clone(),
            source_url: self.source_url.clone(),
            derived_from: self.store_path.clone(),
            store_path: None,
        }
    }
}

// ---------------------------------------------------------------------------
// AnalysisResult
// ---------------------------------------------------------------------------

/// The analyzer's output item, guaranteed to carry a title.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    item: ContentItem,
    include_debug: bool,
}

impl AnalysisResult {
    /// Wrap an analyzer output. A missing title is filled from `fallback_title`.
    pub fn new(mut item: ContentItem, include_debug: bool, fallback_title: Option<&str>) -> Self {
        if item.title.as_deref().is_none_or(|t| t.trim().is_empty()) {
            item.title = Some(fallback_title.unwrap_or("Untitled").to_string());
        }
        Self {
            item,
            include_debug,
        }
    }

    pub fn title(&self) -> &str {
        self.item.title.as_deref().unwrap_or("Untitled")
    }

    pub fn thumbnail_url(&self) -> Option<&str> {
        self.item.thumbnail_url.as_deref()
    }

    pub fn include_debug(&self) -> bool {
        self.include_debug
    }

    pub fn item(&self) -> &ContentItem {
        &self.item
    }

    pub fn item_mut(&mut self) -> &mut ContentItem {
        &mut self.item
    }
}

// ---------------------------------------------------------------------------
// RenderParameters / ArtifactPaths
// ---------------------------------------------------------------------------

/// Values handed to the report template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderParameters {
    pub title: String,
    pub add_title_h1: bool,
    /// Pre-rendered HTML fragment of the analysis body.
    pub content_html: String,
    pub thumbnail_url: Option<String>,
    pub enable_themes: bool,
    pub show_theme_toggle: bool,
}

impl RenderParameters {
    /// Parameters for the claim-analysis report: themes on, toggle hidden.
    pub fn for_report(
        title: impl Into<String>,
        content_html: impl Into<String>,
        thumbnail_url: Option<String>,
    ) -> Self {
        Self {
            title: title.into(),
            add_title_h1: true,
            content_html: content_html.into(),
            thumbnail_url,
            enable_themes: true,
            show_theme_toggle: false,
        }
    }
}

/// Locations of the two artifacts produced by one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    /// The analysis in Markdown (citation tags kept as inline HTML).
    pub markdown_path: PathBuf,
    /// The browser-ready HTML report.
    pub html_path: PathBuf,
}
