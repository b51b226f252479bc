//! Document acquisition: resolve an input reference (local path or URL) into
//! a source [`ContentItem`].
//!
//! HTML documents are converted to Markdown on the way in, so every source
//! item handed to the analyzer is Markdown or plain text.

mod fetch;

use std::path::{Path, PathBuf};

use tracing::{info, instrument};
use url::Url;

use superanalyze_markdown::{frontmatter, html_to_markdown};
use superanalyze_shared::{ContentItem, FetchConfig, Format, ItemType, Result, SuperAnalyzeError};

// ---------------------------------------------------------------------------
// InputRef
// ---------------------------------------------------------------------------

/// A user-supplied reference to the document to analyze.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputRef {
    Url(Url),
    Path(PathBuf),
}

impl InputRef {
    /// Interpret `input`: `http`/`https` URLs are fetched, `file://` URLs and
    /// everything else are local paths.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SuperAnalyzeError::acquisition(input, "empty input reference"));
        }

        if let Ok(url) = Url::parse(trimmed) {
            match url.scheme() {
                "http" | "https" => return Ok(Self::Url(url)),
                "file" => {
                    let path = url.to_file_path().map_err(|()| {
                        SuperAnalyzeError::acquisition(input, "file URL is not a valid local path")
                    })?;
                    return Ok(Self::Path(path));
                }
                // Windows drive letters parse as a one-letter scheme.
                _ => {}
            }
        }

        Ok(Self::Path(PathBuf::from(trimmed)))
    }
}

impl std::fmt::Display for InputRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{url}"),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Limits applied while fetching URL inputs.
#[derive(Debug, Clone)]
pub struct AcquireOptions {
    pub timeout_secs: u64,
    pub max_bytes: usize,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        FetchConfig::default().into()
    }
}

impl From<FetchConfig> for AcquireOptions {
    fn from(cfg: FetchConfig) -> Self {
        Self {
            timeout_secs: cfg.timeout_secs,
            max_bytes: cfg.max_bytes,
        }
    }
}

// ---------------------------------------------------------------------------
// Acquisition
// ---------------------------------------------------------------------------

/// Resolve `input` into an unpersisted source item.
///
/// Missing files, directories, unsupported formats, and failed fetches are
/// all reported as acquisition errors.
#[instrument(skip(opts), fields(input = %input))]
pub async fn acquire(input: &InputRef, opts: &AcquireOptions) -> Result<ContentItem> {
    let item = match input {
        InputRef::Path(path) => acquire_file(path).await?,
        InputRef::Url(url) => acquire_url(url, opts).await?,
    };

    info!(
        title = item.title.as_deref().unwrap_or(""),
        format = item.format.as_str(),
        bytes = item.body.len(),
        "acquired source document"
    );
    Ok(item)
}

async fn acquire_file(path: &Path) -> Result<ContentItem> {
    let label = path.display().to_string();
    let fail = |msg: String| SuperAnalyzeError::acquisition(&label, msg);

    let meta = tokio::fs::metadata(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => fail("no such file".into()),
        _ => fail(e.to_string()),
    })?;
    if meta.is_dir() {
        return Err(fail("is a directory".into()));
    }

    let format = match path.extension().and_then(|e| e.to_str()) {
        None => Format::PlainText,
        Some(ext) => Format::from_extension(ext)
            .ok_or_else(|| fail(format!("unsupported file type '.{ext}'")))?,
    };

    let bytes = tokio::fs::read(path).await.map_err(|e| fail(e.to_string()))?;
    let text = String::from_utf8(bytes).map_err(|_| fail("file is not valid UTF-8".into()))?;

    let canonical = tokio::fs::canonicalize(path)
        .await
        .unwrap_or_else(|_| path.to_path_buf());
    let origin = canonical.display().to_string();
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string);

    build_source(&label, text, format, origin, None, stem)
}

async fn acquire_url(url: &Url, opts: &AcquireOptions) -> Result<ContentItem> {
    let doc = fetch::fetch_document(url, opts).await?;
    let fallback_title = url_title(&doc.final_url);
    build_source(
        url.as_str(),
        doc.body,
        doc.format,
        doc.final_url.to_string(),
        Some(&doc.final_url),
        fallback_title,
    )
}

/// Turn raw document text into a source item, normalizing HTML to Markdown
/// and reading front matter from Markdown.
fn build_source(
    label: &str,
    text: String,
    format: Format,
    origin: String,
    base_url: Option<&Url>,
    fallback_title: Option<String>,
) -> Result<ContentItem> {
    let (body, format, title, thumbnail_url, source_url) = match format {
        Format::Html => {
            let page = html_to_markdown(&text, label, base_url)?;
            (page.markdown, Format::Markdown, page.title, page.thumbnail_url, None)
        }
        Format::Markdown => {
            let (fm, body) = frontmatter::split(&text);
            let field = |key: &str| {
                fm.as_ref()
                    .and_then(|fm| fm.get(key))
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            };
            let title = field("title")
                .or_else(|| superanalyze_markdown::extract_title_from_markdown(body));
            (
                body.to_string(),
                Format::Markdown,
                title,
                field("thumbnail_url"),
                field("source_url"),
            )
        }
        Format::PlainText => (text, Format::PlainText, None, None, None),
    };

    if body.trim().is_empty() {
        return Err(SuperAnalyzeError::acquisition(label, "document is empty"));
    }

    let mut item = ContentItem::new(ItemType::Source, format, body)
        .with_thumbnail_url(thumbnail_url)
        .with_source_url(source_url.unwrap_or(origin));
    item.title = title.or(fallback_title);
    Ok(item)
}

/// Last non-empty URL path segment, or the host.
fn url_title(url: &Url) -> Option<String> {
    url.path_segments()
        .and_then(|segs| segs.filter(|s| !s.is_empty()).last().map(str::to_string))
        .map(|seg| match seg.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem.to_string(),
            _ => seg,
        })
        .or_else(|| url.host_str().map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sa_acquire_{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    // --- InputRef ---

    #[test]
    fn parse_distinguishes_urls_and_paths() {
        assert!(matches!(
            InputRef::parse("https://example.org/report").unwrap(),
            InputRef::Url(_)
        ));
        assert_eq!(
            InputRef::parse("docs/report.md").unwrap(),
            InputRef::Path(PathBuf::from("docs/report.md"))
        );
        assert_eq!(
            InputRef::parse("file:///tmp/report.md").unwrap(),
            InputRef::Path(PathBuf::from("/tmp/report.md"))
        );
        assert!(InputRef::parse("   ").is_err());
    }

    // --- Local files ---

    #[tokio::test]
    async fn markdown_front_matter_is_read_and_stripped() {
        let dir = temp_dir();
        let path = dir.join("climate.md");
        std::fs::write(
            &path,
            "---\ntitle: \"Climate Report\"\nthumbnail_url: https://example.org/t.png\n---\n\n# Heading\n\nGlobal temperatures rose.\n",
        )
        .unwrap();

        let item = acquire(&InputRef::Path(path), &AcquireOptions::default())
            .await
            .unwrap();
        assert_eq!(item.item_type, ItemType::Source);
        assert_eq!(item.format, Format::Markdown);
        assert_eq!(item.title.as_deref(), Some("Climate Report"));
        assert_eq!(item.thumbnail_url.as_deref(), Some("https://example.org/t.png"));
        assert!(item.body.starts_with("# Heading"));
        assert!(item.source_url.as_deref().unwrap().ends_with("climate.md"));
        assert!(item.store_path().is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn title_falls_back_to_h1_then_stem() {
        let dir = temp_dir();
        let with_h1 = dir.join("a.md");
        std::fs::write(&with_h1, "# Ocean Heat\n\nbody").unwrap();
        let plain = dir.join("field_notes.txt");
        std::fs::write(&plain, "no headings here").unwrap();

        let opts = AcquireOptions::default();
        let item = acquire(&InputRef::Path(with_h1), &opts).await.unwrap();
        assert_eq!(item.title.as_deref(), Some("Ocean Heat"));

        let item = acquire(&InputRef::Path(plain), &opts).await.unwrap();
        assert_eq!(item.format, Format::PlainText);
        assert_eq!(item.title.as_deref(), Some("field_notes"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn local_html_is_converted() {
        let dir = temp_dir();
        let path = dir.join("page.html");
        std::fs::write(
            &path,
            "<html><head><title>Arctic Ice</title></head><body><main><h1>Arctic Ice</h1><p>Ice extent shrank.</p></main></body></html>",
        )
        .unwrap();

        let item = acquire(&InputRef::Path(path), &AcquireOptions::default())
            .await
            .unwrap();
        assert_eq!(item.format, Format::Markdown);
        assert_eq!(item.title.as_deref(), Some("Arctic Ice"));
        assert!(item.body.contains("Ice extent shrank."));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn bad_local_inputs_are_acquisition_errors() {
        let dir = temp_dir();
        let opts = AcquireOptions::default();

        let missing = acquire(&InputRef::Path(dir.join("nope.md")), &opts).await;
        assert!(matches!(missing, Err(SuperAnalyzeError::Acquisition { .. })));

        let directory = acquire(&InputRef::Path(dir.clone()), &opts).await;
        assert!(directory.unwrap_err().to_string().contains("is a directory"));

        let pdf = dir.join("report.pdf");
        std::fs::write(&pdf, "%PDF-1.7").unwrap();
        let unsupported = acquire(&InputRef::Path(pdf), &opts).await;
        assert!(unsupported.unwrap_err().to_string().contains("unsupported file type"));

        let empty = dir.join("empty.md");
        std::fs::write(&empty, "---\ntitle: x\n---\n\n").unwrap();
        let empty = acquire(&InputRef::Path(empty), &opts).await;
        assert!(empty.unwrap_err().to_string().contains("empty"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    // --- URLs ---

    #[tokio::test]
    async fn fetches_html_page() {
        let server = wiremock::MockServer::start().await;
        let html = r#"<html><head>
            <meta property="og:title" content="Climate Report">
            <meta property="og:image" content="/cover.png">
        </head><body><article><h1>Climate Report</h1><p>Sea levels rose.</p></article></body></html>"#;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/reports/climate"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_raw(html, "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/reports/climate", server.uri())).unwrap();
        let item = acquire(&InputRef::Url(url.clone()), &AcquireOptions::default())
            .await
            .unwrap();

        assert_eq!(item.title.as_deref(), Some("Climate Report"));
        assert_eq!(
            item.thumbnail_url,
            Some(format!("{}/cover.png", server.uri()))
        );
        assert!(item.body.contains("Sea levels rose."));
        assert_eq!(item.source_url.as_deref(), Some(url.as_str()));
    }

    #[tokio::test]
    async fn fetches_markdown_with_path_title() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/notes/glaciers.md"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_raw("Glaciers are retreating.", "text/plain"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/notes/glaciers.md", server.uri())).unwrap();
        let item = acquire(&InputRef::Url(url), &AcquireOptions::default())
            .await
            .unwrap();
        assert_eq!(item.format, Format::Markdown);
        assert_eq!(item.title.as_deref(), Some("glaciers"));
    }

    #[tokio::test]
    async fn http_errors_and_unsupported_types_fail() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/missing"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/paper"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_raw(b"%PDF-1.7".to_vec(), "application/pdf"),
            )
            .mount(&server)
            .await;

        let opts = AcquireOptions::default();
        let missing = Url::parse(&format!("{}/missing", server.uri())).unwrap();
        let err = acquire(&InputRef::Url(missing), &opts).await.unwrap_err();
        assert_eq!(err.kind(), "acquisition_error");
        assert!(err.to_string().contains("404"));

        let paper = Url::parse(&format!("{}/paper", server.uri())).unwrap();
        let err = acquire(&InputRef::Url(paper), &opts).await.unwrap_err();
        assert!(err.to_string().contains("unsupported content type"));
    }

    #[tokio::test]
    async fn oversized_responses_are_rejected() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_raw("x".repeat(2048), "text/markdown"),
            )
            .mount(&server)
            .await;

        let opts = AcquireOptions {
            timeout_secs: 5,
            max_bytes: 1024,
        };
        let url = Url::parse(&server.uri()).unwrap();
        let err = acquire(&InputRef::Url(url), &opts).await.unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn url_titles() {
        let url = Url::parse("https://example.org/reports/climate-2024.html").unwrap();
        assert_eq!(url_title(&url).as_deref(), Some("climate-2024"));
        let url = Url::parse("https://example.org/").unwrap();
        assert_eq!(url_title(&url).as_deref(), Some("example.org"));
    }
}
