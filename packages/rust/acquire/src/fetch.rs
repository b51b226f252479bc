//! HTTP fetching for URL inputs.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument};
use url::Url;

use superanalyze_shared::{Format, Result, SuperAnalyzeError};

use crate::AcquireOptions;

/// Maximum number of redirects followed for a document URL.
const MAX_REDIRECTS: usize = 5;

/// User-Agent string for document requests.
const USER_AGENT: &str = concat!("SuperAnalyze/", env!("CARGO_PKG_VERSION"));

/// A fetched document body with the format its response declared.
#[derive(Debug)]
pub(crate) struct FetchedDocument {
    pub body: String,
    pub format: Format,
    /// URL after redirects.
    pub final_url: Url,
}

fn build_client(url: &Url, opts: &AcquireOptions) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(Duration::from_secs(opts.timeout_secs))
        .build()
        .map_err(|e| {
            SuperAnalyzeError::acquisition(
                url.as_str(),
                format!("failed to build HTTP client: {e}"),
            )
        })
}

#[instrument(skip(opts), fields(url = %url))]
pub(crate) async fn fetch_document(url: &Url, opts: &AcquireOptions) -> Result<FetchedDocument> {
    let fail = |msg: String| SuperAnalyzeError::acquisition(url.as_str(), msg);
    let client = build_client(url, opts)?;

    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| fail(format!("request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(fail(format!("HTTP {status}")));
    }

    if let Some(len) = response.content_length() {
        if len > opts.max_bytes as u64 {
            return Err(fail(format!(
                "response too large ({len} bytes, max {})",
                opts.max_bytes
            )));
        }
    }

    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let format = format_for(content_type.as_deref(), &final_url).ok_or_else(|| {
        fail(format!(
            "unsupported content type '{}'",
            content_type.as_deref().unwrap_or_default()
        ))
    })?;

    let body = response
        .text()
        .await
        .map_err(|e| fail(format!("failed to read body: {e}")))?;
    if body.len() > opts.max_bytes {
        return Err(fail(format!(
            "response too large ({} bytes, max {})",
            body.len(),
            opts.max_bytes
        )));
    }

    debug!(bytes = body.len(), format = format.as_str(), "fetched document");
    Ok(FetchedDocument {
        body,
        format,
        final_url,
    })
}

/// Decide the body format from the response's content type, falling back to
/// the URL's extension when the server sends none or a generic text type.
fn format_for(content_type: Option<&str>, url: &Url) -> Option<Format> {
    let from_path = url
        .path_segments()
        .and_then(|mut segs| segs.next_back())
        .and_then(|last| last.rsplit_once('.'))
        .and_then(|(_, ext)| Format::from_extension(ext));

    let mime = content_type
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase());

    match mime.as_deref() {
        None | Some("") => Some(from_path.unwrap_or(Format::Html)),
        Some("text/html" | "application/xhtml+xml") => Some(Format::Html),
        Some("text/markdown" | "text/x-markdown") => Some(Format::Markdown),
        Some("text/plain") => Some(from_path.unwrap_or(Format::PlainText)),
        Some(_) => None,
    }
}
