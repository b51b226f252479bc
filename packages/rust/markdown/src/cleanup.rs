//! Post-conversion cleanup for Markdown produced from HTML documents.
//!
//! Each pass is a `&str -> String` function applied in order. Link resolution
//! runs last because it needs the document URL.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Passes that need no context, in application order.
const PASSES: &[fn(&str) -> String] = &[
    demote_extra_h1s,
    strip_wrapper_tags,
    trim_line_ends,
    collapse_blank_lines,
];

/// Run every cleanup pass over freshly converted Markdown.
pub(crate) fn run_pipeline(md: &str, base_url: Option<&Url>) -> String {
    let mut out = PASSES.iter().fold(md.to_string(), |acc, pass| pass(&acc));
    if let Some(base) = base_url {
        out = absolutize_links(&out, base);
    }
    let trimmed = out.trim_matches('\n');
    format!("{trimmed}\n")
}

/// Keep the first H1 as the document title; later H1s become H2s.
fn demote_extra_h1s(md: &str) -> String {
    let mut seen_h1 = false;
    let mut in_fence = false;
    md.lines()
        .map(|line| {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
            }
            if !in_fence && line.starts_with("# ") {
                if seen_h1 {
                    return format!("#{line}");
                }
                seen_h1 = true;
            }
            line.to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drop layout-only tags `htmd` passes through, keeping their text.
/// Fenced code is left alone.
fn strip_wrapper_tags(md: &str) -> String {
    static WRAPPER_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"</?(?:div|section|article|aside|header|footer|figure|figcaption)(?:\s[^>]*)?>")
            .expect("valid regex")
    });

    let mut in_fence = false;
    md.lines()
        .map(|line| {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                return line.to_string();
            }
            if in_fence {
                line.to_string()
            } else {
                WRAPPER_RE.replace_all(line, "").into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn trim_line_ends(md: &str) -> String {
    md.lines().map(str::trim_end).collect::<Vec<_>>().join("\n")
}

/// At most one blank line between blocks.
fn collapse_blank_lines(md: &str) -> String {
    static BLANKS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    BLANKS_RE.replace_all(md, "\n\n").into_owned()
}

/// Rewrite relative link targets against the document URL. Images, anchors,
/// and absolute links are left unchanged.
fn absolutize_links(md: &str, base: &Url) -> String {
    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(!?)\[([^\]]*)\]\(([^)\s]+)\)").expect("valid regex"));

    LINK_RE
        .replace_all(md, |caps: &regex::Captures| {
            let (bang, text, href) = (&caps[1], &caps[2], &caps[3]);
            let keep = !bang.is_empty()
                || href.starts_with('#')
                || href.contains("://")
                || href.starts_with("mailto:");
            if keep {
                return caps[0].to_string();
            }
            match base.join(href) {
                Ok(resolved) => format!("[{text}]({resolved})"),
                Err(_) => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_h1_is_demoted() {
        let result = demote_extra_h1s("# Report\n\ntext\n\n# Appendix");
        assert_eq!(result, "# Report\n\ntext\n\n## Appendix");
    }

    #[test]
    fn h1_inside_fence_is_ignored() {
        let input = "# Title\n\n```sh\n# a shell comment\n```";
        assert_eq!(demote_extra_h1s(input), input);
    }

    #[test]
    fn wrapper_tags_removed_outside_fences() {
        let input = "<div class=\"note\">Kept text</div>\n```html\n<div>code</div>\n```";
        let result = strip_wrapper_tags(input);
        assert!(result.starts_with("Kept text\n"));
        assert!(result.contains("<div>code</div>"));
    }

    #[test]
    fn citation_spans_survive() {
        let input = "Sea levels rose <span class=\"citation\">[1]</span>.";
        assert_eq!(strip_wrapper_tags(input), input);
    }

    #[test]
    fn blank_runs_collapse_to_one() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn relative_links_resolved() {
        let base = Url::parse("https://example.org/reports/2024/").unwrap();
        let result = absolutize_links("[data](../data.csv) and [x](#notes)", &base);
        assert_eq!(
            result,
            "[data](https://example.org/reports/data.csv) and [x](#notes)"
        );
    }

    #[test]
    fn images_and_absolute_links_untouched() {
        let base = Url::parse("https://example.org/").unwrap();
        let input = "![chart](img/c.png) [ext](https://other.net/p)";
        assert_eq!(absolutize_links(input, &base), input);
    }

    #[test]
    fn pipeline_output_is_tidy() {
        let base = Url::parse("https://example.org/a/").unwrap();
        let input = "\n\n# T   \n\n\n\n<section>Body [more](b)</section>\n\n# Again\n\n\n";
        let result = run_pipeline(input, Some(&base));
        assert_eq!(
            result,
            "# T\n\nBody [more](https://example.org/a/b)\n\n## Again\n"
        );
    }
}
