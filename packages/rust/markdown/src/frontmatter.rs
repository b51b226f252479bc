//! Minimal `---`-delimited front matter: flat `key: value` pairs only.

/// Ordered front matter fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    fields: Vec<(String, String)>,
}

impl FrontMatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any earlier value for the same key.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((key.to_string(), value)),
        }
    }

    /// Set a field only when a value is present.
    pub fn set_opt(&mut self, key: &str, value: Option<&str>) {
        if let Some(v) = value {
            self.set(key, v);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render as a `---` block with every value double-quoted.
    /// Output depends only on the fields and their insertion order.
    pub fn render(&self) -> String {
        let mut fm = String::from("---\n");
        for (key, value) in &self.fields {
            fm.push_str(&format!("{key}: \"{}\"\n", escape_yaml_string(value)));
        }
        fm.push_str("---\n");
        fm
    }
}

/// Split leading front matter from a document.
///
/// Returns `(None, text)` when the document does not open with a `---` line
/// or the block is never closed.
pub fn split(text: &str) -> (Option<FrontMatter>, &str) {
    let text_no_bom = text.strip_prefix('\u{feff}').unwrap_or(text);
    let Some(rest) = text_no_bom
        .strip_prefix("---\n")
        .or_else(|| text_no_bom.strip_prefix("---\r\n"))
    else {
        return (None, text);
    };

    let mut offset = 0;
    let mut fm = FrontMatter::new();
    for line in rest.split_inclusive('\n') {
        offset += line.len();
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed == "---" {
            let body = rest[offset..].trim_start_matches(['\n', '\r']);
            return (Some(fm), body);
        }
        if let Some((key, value)) = trimmed.split_once(':') {
            let key = key.trim();
            if !key.is_empty() && !key.starts_with('#') {
                fm.set(key, unquote(value.trim()));
            }
        }
    }

    (None, text)
}

/// Prepend rendered front matter to a body. An empty block is omitted.
pub fn join(fm: &FrontMatter, body: &str) -> String {
    if fm.is_empty() {
        return body.to_string();
    }
    format!("{}\n{body}", fm.render())
}

/// Escape special characters in a YAML string value.
fn escape_yaml_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        let inner = &value[1..value.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some('n') => out.push('\n'),
                    Some(other) => out.push(other),
                    None => out.push('\\'),
                }
            } else {
                out.push(c);
            }
        }
        return out;
    }
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return value[1..value.len() - 1].replace("''", "'");
    }
    value.to_string()
}
