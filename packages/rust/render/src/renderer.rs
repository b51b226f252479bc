//! Report rendering: analysis result -> standalone HTML document.

use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde::Serialize;
use tracing::{debug, instrument};

use superanalyze_markdown::markdown_to_html;
use superanalyze_shared::{
    AnalysisResult, ContentItem, Format, RenderParameters, Result, SuperAnalyzeError,
};

/// Template key of the claim-analysis report page.
pub const REPORT_TEMPLATE: &str = "report_webpage.html.jinja";

/// Templates compiled into the binary, keyed by name.
const TEMPLATES: &[(&str, &str)] = &[(
    REPORT_TEMPLATE,
    include_str!("../templates/report_webpage.html.jinja"),
)];

/// Renders analysis results through the built-in page templates.
pub struct ReportRenderer {
    env: Environment<'static>,
}

impl ReportRenderer {
    /// Load the built-in templates. Fails only if a template does not parse.
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        for &(name, source) in TEMPLATES {
            env.add_template(name, source)
                .map_err(|e| SuperAnalyzeError::Template(format!("{name}: {e}")))?;
        }
        Ok(Self { env })
    }

    /// Render the claim-analysis report for `result`.
    #[instrument(skip_all, fields(title = %result.title()))]
    pub fn render(&self, result: &AnalysisResult) -> Result<String> {
        let params = report_parameters(result);
        let html = self.render_with(REPORT_TEMPLATE, &params)?;
        debug!(bytes = html.len(), "rendered report");
        Ok(html)
    }

    /// Render any registered template with a serializable context.
    /// Missing parameters are errors, never blanks.
    pub fn render_with<S: Serialize>(&self, name: &str, ctx: S) -> Result<String> {
        let template = self
            .env
            .get_template(name)
            .map_err(|e| SuperAnalyzeError::Template(format!("unknown template '{name}': {e}")))?;
        template
            .render(ctx)
            .map_err(|e| SuperAnalyzeError::Template(format!("{name}: {e}")))
    }
}

/// Opening tag of the block the analyzer bridge wraps debug detail in.
const DEBUG_BLOCK_OPEN: &str = "<details class=\"analysis-debug\">";

/// Template parameters for a report: themes on, toggle hidden, title as H1.
///
/// Debug blocks are dropped from the content unless the analysis ran with
/// `include_debug`.
pub fn report_parameters(result: &AnalysisResult) -> RenderParameters {
    let mut content_html = body_as_html(result.item());
    if !result.include_debug() {
        content_html = strip_debug_blocks(&content_html);
    }
    RenderParameters::for_report(
        result.title(),
        content_html,
        result.thumbnail_url().map(str::to_string),
    )
}

fn strip_debug_blocks(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find(DEBUG_BLOCK_OPEN) {
        out.push_str(&rest[..start]);
        let after = &rest[start..];
        rest = match after.find("</details>") {
            Some(end) => &after[end + "</details>".len()..],
            None => "",
        };
    }
    out.push_str(rest);
    out
}

/// HTML fragment for an item's body according to its format.
pub fn body_as_html(item: &ContentItem) -> String {
    match item.format {
        Format::Markdown => markdown_to_html(&item.body),
        Format::Html => item.body.clone(),
        Format::PlainText => item
            .body
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| format!("<p>{}</p>\n", escape_html(p)))
            .collect(),
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
