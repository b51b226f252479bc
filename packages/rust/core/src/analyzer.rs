//! Claim analysis.
//!
//! [`ClaimAnalyzer`] is the seam between the pipeline and whatever produces
//! the analysis. [`BridgeAnalyzer`] spawns an external analyzer process and
//! talks to it over a JSON-lines stdin/stdout protocol.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use tracing::{info, instrument, warn};

use superanalyze_shared::{
    AnalyzerConfig, ContentItem, Format, ItemOverrides, ItemType, Result, SuperAnalyzeError,
};

/// Produces analysis documents for a persisted source item.
///
/// Implementations may return several items; the pipeline uses the first.
pub trait ClaimAnalyzer: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Analyze `source`. When `include_debug` is set, implementations should
    /// embed their debug detail in the returned bodies.
    fn analyze(&self, source: &ContentItem, include_debug: bool) -> Result<Vec<ContentItem>>;
}

// ---------------------------------------------------------------------------
// Protocol types
// ---------------------------------------------------------------------------

/// Analysis task sent to the analyzer process.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AnalysisTask {
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub body: String,
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub include_debug: bool,
}

#[derive(Debug, serde::Serialize)]
#[serde(tag = "type")]
enum RequestMessage {
    #[serde(rename = "analyze")]
    Analyze { id: String, task: AnalysisTask },
    #[serde(rename = "shutdown")]
    Shutdown,
}

#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type")]
enum ResponseMessage {
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "result")]
    Result { id: String, result: AnalysisOutput },
    #[serde(rename = "error")]
    Error {
        #[allow(dead_code)]
        id: String,
        error: String,
    },
}

/// Items returned by the analyzer for one task.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct AnalysisOutput {
    #[serde(default)]
    pub items: Vec<OutputItem>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct OutputItem {
    #[serde(default)]
    pub title: Option<String>,
    pub body: String,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub debug: Option<String>,
}

// ---------------------------------------------------------------------------
// Bridge process
// ---------------------------------------------------------------------------

struct BridgeHandle {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    request_counter: u64,
}

fn bridge_err(msg: impl Into<String>) -> SuperAnalyzeError {
    SuperAnalyzeError::Analysis(msg.into())
}

impl BridgeHandle {
    fn spawn(config: &AnalyzerConfig) -> Result<Self> {
        info!(cmd = %config.command, args = ?config.args, "spawning claim analyzer");

        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if let Some(dir) = &config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            bridge_err(format!(
                "failed to spawn analyzer: {e}. Is `{}` installed?",
                config.command
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| bridge_err("failed to capture analyzer stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| bridge_err("failed to capture analyzer stdout"))?;

        let mut handle = Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
            request_counter: 0,
        };
        if let Err(e) = handle.wait_for_ready() {
            handle.shutdown();
            return Err(e);
        }
        Ok(handle)
    }

    fn read_message(&mut self) -> Result<ResponseMessage> {
        let mut line = String::new();
        self.reader
            .read_line(&mut line)
            .map_err(|e| bridge_err(format!("analyzer read error: {e}")))?;
        if line.is_empty() {
            return Err(bridge_err("analyzer closed stdout unexpectedly"));
        }
        serde_json::from_str(line.trim()).map_err(|e| {
            bridge_err(format!(
                "invalid analyzer message: {e} (got: {})",
                line.chars().take(200).collect::<String>()
            ))
        })
    }

    fn wait_for_ready(&mut self) -> Result<()> {
        match self.read_message()? {
            ResponseMessage::Ready => {
                info!("analyzer is ready");
                Ok(())
            }
            other => Err(bridge_err(format!("expected ready message, got: {other:?}"))),
        }
    }

    fn send_task(&mut self, task: AnalysisTask) -> Result<AnalysisOutput> {
        self.request_counter += 1;
        let id = format!("req-{}", self.request_counter);

        let json = serde_json::to_string(&RequestMessage::Analyze {
            id: id.clone(),
            task,
        })
        .map_err(|e| bridge_err(format!("failed to serialize request: {e}")))?;

        writeln!(self.stdin, "{json}")
            .and_then(|()| self.stdin.flush())
            .map_err(|e| bridge_err(format!("failed to write to analyzer stdin: {e}")))?;

        match self.read_message()? {
            ResponseMessage::Result {
                id: resp_id,
                result,
            } if resp_id == id => Ok(result),
            ResponseMessage::Result { id: resp_id, .. } => Err(bridge_err(format!(
                "analyzer answered '{resp_id}', expected '{id}'"
            ))),
            ResponseMessage::Error { error, .. } => Err(bridge_err(error)),
            ResponseMessage::Ready => Err(bridge_err("unexpected ready message during analysis")),
        }
    }

    /// Ask the process to exit and reap it.
    fn shutdown(mut self) {
        if let Ok(json) = serde_json::to_string(&RequestMessage::Shutdown) {
            let _ = writeln!(self.stdin, "{json}");
            let _ = self.stdin.flush();
        }
        drop(self.stdin);

        match self.child.wait() {
            Ok(status) => info!(?status, "analyzer exited"),
            Err(e) => warn!("analyzer wait error: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// BridgeAnalyzer
// ---------------------------------------------------------------------------

/// Runs the configured analyzer command once per analysis.
#[derive(Debug, Clone)]
pub struct BridgeAnalyzer {
    config: AnalyzerConfig,
}

impl BridgeAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }
}

impl ClaimAnalyzer for BridgeAnalyzer {
    fn name(&self) -> &str {
        &self.config.command
    }

    #[instrument(skip_all, fields(analyzer = %self.config.command))]
    fn analyze(&self, source: &ContentItem, include_debug: bool) -> Result<Vec<ContentItem>> {
        let task = AnalysisTask {
            action: self.config.action.clone(),
            title: source.title.clone(),
            body: source.body.clone(),
            format: source.format.as_str().to_string(),
            source_url: source.source_url.clone(),
            include_debug,
        };

        let mut bridge = BridgeHandle::spawn(&self.config)?;
        let output = bridge.send_task(task);
        bridge.shutdown();

        let items = output?
            .items
            .into_iter()
            .map(|out| output_to_item(source, out, include_debug))
            .collect::<Vec<_>>();
        info!(items = items.len(), "analyzer returned results");
        Ok(items)
    }
}

/// Build a derived item from one analyzer output.
fn output_to_item(source: &ContentItem, out: OutputItem, include_debug: bool) -> ContentItem {
    let format = out
        .format
        .as_deref()
        .and_then(Format::from_name)
        .unwrap_or(Format::Markdown);

    let mut body = out.body;
    if include_debug {
        if let Some(debug) = out.debug.filter(|d| !d.trim().is_empty()) {
            body = append_debug(&body, &debug);
        }
    }

    let mut item = source.derive(ItemOverrides {
        item_type: Some(ItemType::Derived),
        format: Some(format),
        title: out.title.filter(|t| !t.trim().is_empty()),
        body: Some(body),
    });
    if out.thumbnail_url.is_some() {
        item.thumbnail_url = out.thumbnail_url;
    }
    item
}

/// Append debug detail as a collapsed `<details>` block.
fn append_debug(body: &str, debug: &str) -> String {
    let escaped = debug
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!(
        "{}\n\n<details class=\"analysis-debug\">\n<summary>Analysis debug info</summary>\n<pre>{}</pre>\n</details>\n",
        body.trim_end(),
        escaped.trim_end()
    )
}
