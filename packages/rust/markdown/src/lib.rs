//! Document text handling for SuperAnalyze.
//!
//! - HTML pages are reduced to their main content and converted to Markdown
//!   with `htmd`, then tidied by the cleanup passes.
//! - Front matter is read from and written to Markdown documents.
//! - Markdown is rendered to an HTML fragment with `pulldown-cmark`.

mod cleanup;
pub mod frontmatter;

use std::sync::LazyLock;

use pulldown_cmark::{Options, Parser};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use superanalyze_shared::{Result, SuperAnalyzeError};

pub use frontmatter::FrontMatter;

// ---------------------------------------------------------------------------
// HTML -> Markdown
// ---------------------------------------------------------------------------

/// An HTML page converted to Markdown, with the metadata found in its head.
#[derive(Debug, Clone)]
pub struct ConvertedPage {
    /// Cleaned Markdown body (no front matter).
    pub markdown: String,
    /// `og:title`, then `<title>`, then the first H1.
    pub title: Option<String>,
    /// `og:image`, resolved against the page URL when relative.
    pub thumbnail_url: Option<String>,
}

/// Convert a full HTML page to Markdown.
///
/// `origin` names the document in error messages. `base_url` is used to
/// resolve relative links and the thumbnail.
#[instrument(skip(html), fields(origin = %origin))]
pub fn html_to_markdown(html: &str, origin: &str, base_url: Option<&Url>) -> Result<ConvertedPage> {
    let doc = Html::parse_document(html);
    let head_title = meta_content(&doc, "og:title").or_else(|| document_title(&doc));
    let thumbnail_url = meta_content(&doc, "og:image").map(|src| match base_url {
        Some(base) => base.join(&src).map(String::from).unwrap_or(src),
        None => src,
    });

    let content_html = preprocess_tables(&extract_content_html(&doc, html));

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "nav", "iframe", "noscript", "svg"])
        .build();
    let raw = converter.convert(&content_html).map_err(|e| {
        SuperAnalyzeError::acquisition(origin, format!("HTML conversion failed: {e}"))
    })?;

    let markdown = cleanup::run_pipeline(&raw, base_url);
    let title = head_title.or_else(|| extract_title_from_markdown(&markdown));

    debug!(
        raw_len = raw.len(),
        final_len = markdown.len(),
        title = title.as_deref().unwrap_or(""),
        "converted HTML page"
    );

    Ok(ConvertedPage {
        markdown,
        title,
        thumbnail_url,
    })
}

/// Extract the main content HTML, skipping page chrome.
fn extract_content_html(doc: &Html, raw: &str) -> String {
    let candidates = ["article", "main", "[role=\"main\"]", ".content", "body"];

    candidates
        .iter()
        .filter_map(|sel| Selector::parse(sel).ok())
        .find_map(|selector| doc.select(&selector).next().map(|el| el.inner_html()))
        .unwrap_or_else(|| raw.to_string())
}

fn meta_content(doc: &Html, property: &str) -> Option<String> {
    let selector = Selector::parse(&format!(
        "meta[property=\"{property}\"], meta[name=\"{property}\"]"
    ))
    .ok()?;
    doc.select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|c| !c.is_empty())
        .map(str::to_string)
}

fn document_title(doc: &Html) -> Option<String> {
    let selector = Selector::parse("head > title").ok()?;
    let text = doc.select(&selector).next()?.text().collect::<String>();
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

/// Replace `<table>` elements with Markdown tables; `htmd` 0.1 drops them.
fn preprocess_tables(html: &str) -> String {
    let Ok(table_sel) = Selector::parse("table") else {
        return html.to_string();
    };
    let fragment = Html::parse_fragment(html);

    let mut result = html.to_string();
    for table in fragment.select(&table_sel) {
        let md = table_to_markdown(&table);
        result = result.replacen(&table.html(), &md, 1);
    }
    result
}

fn table_to_markdown(table: &ElementRef) -> String {
    let (Ok(tr_sel), Ok(cell_sel)) = (Selector::parse("tr"), Selector::parse("th, td")) else {
        return String::new();
    };

    let rows: Vec<Vec<String>> = table
        .select(&tr_sel)
        .map(|tr| {
            tr.select(&cell_sel)
                .map(|cell| {
                    let text = cell.text().collect::<String>();
                    text.split_whitespace()
                        .collect::<Vec<_>>()
                        .join(" ")
                        .replace('|', "\\|")
                })
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect();

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return String::new();
    }

    let line = |cells: &[String]| {
        let mut padded = cells.to_vec();
        padded.resize(width, String::new());
        format!("| {} |\n", padded.join(" | "))
    };

    let mut md = String::from("\n\n");
    md.push_str(&line(&rows[0]));
    md.push_str(&line(&vec!["---".to_string(); width]));
    for row in &rows[1..] {
        md.push_str(&line(row));
    }
    md.push('\n');
    md
}

/// First `# ` heading of a Markdown text, if any.
pub fn extract_title_from_markdown(md: &str) -> Option<String> {
    static H1_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^# (.+)$").expect("valid regex"));

    H1_RE
        .captures(md)
        .map(|c| c[1].trim().trim_end_matches('#').trim().to_string())
        .filter(|t| !t.is_empty())
}

// ---------------------------------------------------------------------------
// Markdown -> HTML
// ---------------------------------------------------------------------------

/// Render Markdown to an HTML fragment.
///
/// Inline and block HTML (citation tags, debug `<details>`) pass through
/// unchanged.
pub fn markdown_to_html(md: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(md, options);
    let mut out = String::with_capacity(md.len() * 3 / 2);
    pulldown_cmark::html::push_html(&mut out, parser);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(head: &str, body: &str) -> String {
        format!("<html><head>{head}</head><body>{body}</body></html>")
    }

    #[test]
    fn converts_main_content_only() {
        let html = page(
            "<title>Ignored</title>",
            "<nav><a href=\"/\">Home</a></nav><main><h1>Findings</h1><p>Emissions fell.</p></main><footer>Copyright</footer>",
        );
        let page = html_to_markdown(&html, "test", None).unwrap();
        assert!(page.markdown.contains("# Findings"));
        assert!(page.markdown.contains("Emissions fell."));
        assert!(!page.markdown.contains("Copyright"));
        assert!(!page.markdown.contains("<p>"));
    }

    #[test]
    fn title_prefers_open_graph() {
        let html = page(
            "<meta property=\"og:title\" content=\"OG Title\"><title>Doc Title</title>",
            "<h1>Heading</h1>",
        );
        assert_eq!(
            html_to_markdown(&html, "t", None).unwrap().title.as_deref(),
            Some("OG Title")
        );

        let html = page("<title>\n  Doc   Title </title>", "<h1>Heading</h1>");
        assert_eq!(
            html_to_markdown(&html, "t", None).unwrap().title.as_deref(),
            Some("Doc Title")
        );

        let html = page("", "<h1>Heading</h1><p>x</p>");
        assert_eq!(
            html_to_markdown(&html, "t", None).unwrap().title.as_deref(),
            Some("Heading")
        );
    }

    #[test]
    fn thumbnail_resolved_against_page() {
        let base = Url::parse("https://news.example/story/1").unwrap();
        let html = page(
            "<meta property=\"og:image\" content=\"/img/cover.jpg\">",
            "<p>Body</p>",
        );
        let page = html_to_markdown(&html, "t", Some(&base)).unwrap();
        assert_eq!(
            page.thumbnail_url.as_deref(),
            Some("https://news.example/img/cover.jpg")
        );
    }

    #[test]
    fn tables_become_markdown() {
        let html = page(
            "",
            "<main><table><tr><th>Year</th><th>Temp</th></tr><tr><td>2023</td><td>1.4</td></tr><tr><td>2024</td></tr></table></main>",
        );
        let md = html_to_markdown(&html, "t", None).unwrap().markdown;
        assert!(md.contains("| Year | Temp |"));
        assert!(md.contains("| --- | --- |"));
        assert!(md.contains("| 2023 | 1.4 |"));
        assert!(md.contains("| 2024 |"));
        assert!(!md.contains("<td>"));
    }

    #[test]
    fn empty_page_has_no_title() {
        let page = html_to_markdown("<html><body></body></html>", "t", None).unwrap();
        assert!(page.title.is_none());
        assert!(page.thumbnail_url.is_none());
    }

    #[test]
    fn title_from_markdown() {
        assert_eq!(
            extract_title_from_markdown("intro\n# Climate Report #\n"),
            Some("Climate Report".into())
        );
        assert_eq!(extract_title_from_markdown("## Only H2"), None);
    }

    #[test]
    fn renders_gfm_extensions() {
        let html = markdown_to_html("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~old~~ text");
        assert!(html.contains("<table>"));
        assert!(html.contains("<del>old</del>"));
    }

    #[test]
    fn inline_citation_tags_pass_through() {
        let md = "Warming is accelerating <cite data-source=\"ipcc\">[1]</cite>.";
        let html = markdown_to_html(md);
        assert_eq!(
            html,
            "<p>Warming is accelerating <cite data-source=\"ipcc\">[1]</cite>.</p>\n"
        );
    }

    #[test]
    fn block_html_passes_through() {
        let md = "Claim one.\n\n<details class=\"analysis-debug\">\n<summary>Debug</summary>\n</details>\n";
        let html = markdown_to_html(md);
        assert!(html.contains("<details class=\"analysis-debug\">"));
        assert!(html.contains("<p>Claim one.</p>"));
    }
}
