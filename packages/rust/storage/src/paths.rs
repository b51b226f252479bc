//! Store path derivation: slugs and item identities.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use superanalyze_shared::{ContentItem, Format, ItemType, Result, StorePath};

const MAX_SLUG_LEN: usize = 64;

/// File-name-safe form of a title: lowercase ASCII alphanumerics joined by `_`.
pub fn slugify(title: &str) -> String {
    static NON_ALNUM_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

    let lower = title.to_lowercase();
    let slug = NON_ALNUM_RE.replace_all(&lower, "_");
    let mut slug = slug.trim_matches('_').to_string();
    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        slug = slug.trim_end_matches('_').to_string();
    }
    if slug.is_empty() {
        "untitled".into()
    } else {
        slug
    }
}

/// Stable identity of an item: what it is and where it came from, not its
/// body. Two items with the same identity share a store path.
pub fn identity(item: &ContentItem) -> String {
    let origin = match &item.derived_from {
        Some(parent) => format!("derived:{parent}"),
        None => format!("origin:{}", item.source_url.as_deref().unwrap_or_default()),
    };
    hex_sha256(&format!(
        "{}|{}|{}|{}",
        item.title.as_deref().unwrap_or_default(),
        item.item_type.as_str(),
        item.format.as_str(),
        origin
    ))
}

pub fn body_hash(body: &str) -> String {
    hex_sha256(body)
}

pub(crate) fn hex_sha256(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// `n`-th candidate path for an item: `{folder}/{slug}.{type}.{ext}`, with
/// `_n` appended to the slug from the second candidate on.
pub(crate) fn candidate(
    item_type: ItemType,
    format: Format,
    slug: &str,
    n: u32,
) -> Result<StorePath> {
    let stem = if n <= 1 {
        slug.to_string()
    } else {
        format!("{slug}_{n}")
    };
    StorePath::new(format!(
        "{}/{stem}.{}.{}",
        item_type.folder(),
        item_type.as_str(),
        format.extension()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs() {
        assert_eq!(slugify("Climate Report"), "climate_report");
        assert_eq!(slugify("  2024: Heat & Drought!  "), "2024_heat_drought");
        assert_eq!(slugify("Ωμέγα"), "untitled");
        assert_eq!(slugify(""), "untitled");
        let long = slugify(&"word ".repeat(40));
        assert!(long.len() <= 64);
        assert!(!long.ends_with('_'));
    }

    #[test]
    fn candidates() {
        let first = candidate(ItemType::Export, Format::Html, "climate_report", 1).unwrap();
        assert_eq!(first.as_str(), "exports/climate_report.export.html");
        let third = candidate(ItemType::Derived, Format::Markdown, "climate_report", 3).unwrap();
        assert_eq!(third.as_str(), "docs/climate_report_3.doc.md");
    }

    #[test]
    fn identity_ignores_body_but_not_origin() {
        let a = ContentItem::new(ItemType::Source, Format::Markdown, "one")
            .with_title("T")
            .with_source_url("/data/a.md");
        let mut b = a.clone();
        b.body = "two".into();
        assert_eq!(identity(&a), identity(&b));

        let c = a.clone().with_source_url("/data/c.md");
        assert_ne!(identity(&a), identity(&c));

        let mut d = a.clone();
        d.derived_from = Some(StorePath::new("sources/t.source.md").unwrap());
        assert_ne!(identity(&a), identity(&d));
    }
}
