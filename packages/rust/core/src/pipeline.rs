//! End-to-end analysis pipeline: input → acquire → analyze → render → minify → artifacts.

use std::path::Path;
use std::time::Instant;

use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use superanalyze_acquire::{AcquireOptions, InputRef};
use superanalyze_render::{ReportRenderer, optimize};
use superanalyze_shared::{
    ANALYZE_ACTION, AnalysisResult, ArtifactPaths, ContentItem, Format, ItemOverrides, ItemType,
    Result, SuperAnalyzeError,
};
use superanalyze_storage::{CachedOutput, Workspace, body_hash, identity};

use crate::analyzer::ClaimAnalyzer;

/// Per-run switches.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Write the rendered HTML without minifying it.
    pub skip_minify: bool,
    /// Ask the analyzer to embed debug detail in its output.
    pub include_debug: bool,
    /// Ignore any cached analysis and invoke the analyzer again.
    pub rerun: bool,
    /// Limits for URL inputs.
    pub fetch: AcquireOptions,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, paths: &ArtifactPaths);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _paths: &ArtifactPaths) {}
}

/// Run the full pipeline for one input and return the artifact locations.
///
/// 1. Open the workspace (creates directories, takes the lock)
/// 2. Acquire the input as a source item, then persist it
/// 3. Analyze claims (or reuse the cached analysis)
/// 4. Render, checkpoint the raw HTML, minify, write the final HTML
///
/// The workspace lock is released when this returns, on every path.
#[instrument(skip_all, fields(input = %input_ref))]
pub async fn run(
    workspace_root: &Path,
    input_ref: &str,
    opts: &RunOptions,
    analyzer: &dyn ClaimAnalyzer,
    progress: &dyn ProgressReporter,
) -> Result<ArtifactPaths> {
    let start = Instant::now();
    let input = InputRef::parse(input_ref)?;

    progress.phase("Opening workspace");
    let workspace = Workspace::open(workspace_root).await?;
    workspace.log_workspace_info().await?;

    progress.phase("Acquiring document");
    let source = superanalyze_acquire::acquire(&input, &opts.fetch).await?;
    let source = workspace.persist(source).await?;

    progress.phase("Analyzing claims");
    let result = analyze_document_claims(&workspace, &source, opts, analyzer).await?;

    progress.phase("Rendering report");
    let paths = format_results(&workspace, &result, opts.skip_minify).await?;

    progress.done(&paths);
    info!(
        markdown = %paths.markdown_path.display(),
        html = %paths.html_path.display(),
        elapsed_ms = start.elapsed().as_millis(),
        "analysis complete"
    );
    Ok(paths)
}

/// Produce (or reuse) the persisted analysis of a persisted source item.
#[instrument(skip_all, fields(store_path = ?source.store_path(), analyzer = analyzer.name()))]
pub async fn analyze_document_claims(
    workspace: &Workspace,
    source: &ContentItem,
    opts: &RunOptions,
    analyzer: &dyn ClaimAnalyzer,
) -> Result<AnalysisResult> {
    let source_path = source.require_store_path("source document")?.clone();
    let input_hash = analysis_input_hash(source);
    let options_key = options_key(opts.include_debug);

    if !opts.rerun {
        let cached = workspace
            .index()
            .get_cached_output(ANALYZE_ACTION, &input_hash, options_key)
            .await?;
        if let Some(cached) = cached {
            let path = &cached.store_path;
            if !workspace.resolve(path).is_file() {
                warn!(store_path = %path, "cached analysis file is missing, analyzing again");
            } else if !workspace.index().is_current(&cached).await? {
                info!(store_path = %path, "cached analysis was overwritten, analyzing again");
            } else {
                info!(store_path = %path, "reusing cached analysis");
                let item = workspace.load(path).await?;
                return Ok(AnalysisResult::new(
                    item,
                    opts.include_debug,
                    source.title.as_deref(),
                ));
            }
        }
    }

    let mut items = analyzer.analyze(source, opts.include_debug)?;
    if items.is_empty() {
        return Err(SuperAnalyzeError::Analysis(format!(
            "{} returned no results",
            analyzer.name()
        )));
    }
    if items.len() > 1 {
        warn!(
            count = items.len(),
            "analyzer returned multiple results, using the first"
        );
    }
    let mut item = items.swap_remove(0);
    item.item_type = ItemType::Derived;
    item.derived_from = Some(source_path);

    let mut result = AnalysisResult::new(item, opts.include_debug, source.title.as_deref());
    let stored = workspace.persist(result.item().clone()).await?;
    *result.item_mut() = stored;

    let output = CachedOutput {
        store_path: result
            .item()
            .require_store_path("analysis result")?
            .clone(),
        body_hash: body_hash(&result.item().body),
    };
    workspace
        .index()
        .set_cached_output(ANALYZE_ACTION, &input_hash, options_key, &output)
        .await?;
    Ok(result)
}

/// Render the analysis, persist the raw HTML checkpoint, optimize, and write
/// the final HTML.
#[instrument(skip_all, fields(title = result.title(), skip_minify))]
pub async fn format_results(
    workspace: &Workspace,
    result: &AnalysisResult,
    skip_minify: bool,
) -> Result<ArtifactPaths> {
    let analysis_path = result.item().require_store_path("analysis result")?;

    let renderer = ReportRenderer::new()?;
    let html = renderer.render(result)?;
    let raw = workspace
        .persist(result.item().derive(ItemOverrides {
            item_type: Some(ItemType::Export),
            format: Some(Format::Html),
            title: Some(result.title().to_string()),
            body: Some(html),
        }))
        .await?;

    let optimized = optimize(&raw.body, skip_minify)?;
    info!(
        raw_bytes = raw.body.len(),
        final_bytes = optimized.len(),
        "report rendered"
    );

    let final_item = workspace
        .record(raw.derive(ItemOverrides {
            body: Some(optimized),
            ..Default::default()
        }))
        .await?;
    let final_path = final_item.require_store_path("final report")?;
    let html_path = workspace.write_final(final_path, &final_item.body).await?;

    Ok(ArtifactPaths {
        markdown_path: workspace.resolve(analysis_path),
        html_path,
    })
}

/// Cache key of an analysis input: the source's identity plus its body.
fn analysis_input_hash(source: &ContentItem) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identity(source).as_bytes());
    hasher.update(b"\n");
    hasher.update(source.body.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn options_key(include_debug: bool) -> &'static str {
    if include_debug { "debug" } else { "no_debug" }
}
