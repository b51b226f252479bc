//! HTML minification with a visible-text safety check.

use minify_html::{Cfg, minify};
use scraper::Html;
use tracing::{debug, instrument};

use superanalyze_shared::{Result, SuperAnalyzeError};

/// Minify a rendered page, or return it unchanged when `skip` is set.
///
/// The minified page must show exactly the same text as the input (ignoring
/// whitespace); otherwise the result is rejected rather than replaced by the
/// unminified body.
#[instrument(skip(html), fields(bytes = html.len()))]
pub fn optimize(html: &str, skip: bool) -> Result<String> {
    if skip {
        debug!("minification skipped");
        return Ok(html.to_string());
    }
    if html.trim().is_empty() || !html.contains('<') {
        return Err(SuperAnalyzeError::Optimization(
            "input is not an HTML document".into(),
        ));
    }

    let minified = minify(html.as_bytes(), &minify_cfg());
    let minified = String::from_utf8(minified).map_err(|e| {
        SuperAnalyzeError::Optimization(format!("minifier produced invalid UTF-8: {e}"))
    })?;
    if minified.trim().is_empty() {
        return Err(SuperAnalyzeError::Optimization(
            "minifier produced an empty document".into(),
        ));
    }

    let before = visible_text(html);
    let after = visible_text(&minified);
    if before != after {
        let at = before
            .chars()
            .zip(after.chars())
            .take_while(|(a, b)| a == b)
            .count();
        return Err(SuperAnalyzeError::Optimization(format!(
            "minification changed visible text (first difference at character {at})"
        )));
    }

    debug!(
        before = html.len(),
        after = minified.len(),
        "minified report"
    );
    Ok(minified)
}

/// Whitespace and comments go, CSS is minified, scripts and document
/// structure are kept as written.
fn minify_cfg() -> Cfg {
    let mut cfg = Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.do_not_minify_doctype = true;
    cfg.ensure_spec_compliant_unquoted_attribute_values = true;
    cfg.keep_spaces_between_attributes = true;
    cfg.minify_css = true;
    cfg.minify_js = false;
    cfg
}

/// Concatenated text a reader would see, with all whitespace removed.
/// Text inside `<script>` and `<style>` is excluded.
pub fn visible_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut out = String::new();
    for node in doc.tree.root().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|el| matches!(el.name(), "script" | "style"))
        });
        if !hidden {
            out.extend(text.chars().filter(|c| !c.is_whitespace()));
        }
    }
    out
}
