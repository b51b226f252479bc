//! MCP tool server exposing the analysis pipeline.
//!
//! One tool, `analyze_document_claims`, served over stdio or streamable
//! HTTP. Calls are serialized: a second call waits for the first to finish
//! instead of failing on the workspace lock.

use std::path::PathBuf;
use std::sync::Arc;

use color_eyre::eyre::{Result, eyre};
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::schemars;
use rmcp::transport::stdio;
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use rmcp::{ErrorData as McpError, ServerHandler, ServiceExt, tool, tool_handler, tool_router};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{error, info};

use superanalyze_core::{ClaimAnalyzer, RunOptions, SilentProgress, pipeline};
use superanalyze_shared::{ANALYZE_ACTION, AppConfig};

/// State shared by every session of the server.
pub(crate) struct ServerContext {
    root: PathBuf,
    config: AppConfig,
    analyzer: Arc<dyn ClaimAnalyzer>,
    run_lock: Mutex<()>,
}

impl ServerContext {
    pub(crate) fn new(
        root: PathBuf,
        config: AppConfig,
        analyzer: Arc<dyn ClaimAnalyzer>,
    ) -> Arc<Self> {
        Arc::new(Self {
            root,
            config,
            analyzer,
            run_lock: Mutex::new(()),
        })
    }

    fn run_options(&self, request: &AnalyzeRequest) -> RunOptions {
        RunOptions {
            skip_minify: request.no_minify.unwrap_or(!self.config.defaults.minify),
            include_debug: request
                .include_debug
                .unwrap_or(self.config.defaults.include_debug),
            rerun: request.rerun.unwrap_or(false),
            fetch: self.config.fetch.clone().into(),
        }
    }
}

/// Arguments of the `analyze_document_claims` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub(crate) struct AnalyzeRequest {
    /// Document to analyze.
    #[schemars(description = "Local file path or http(s) URL of the document to analyze")]
    pub input: String,

    #[schemars(description = "Write the HTML report without minifying it")]
    pub no_minify: Option<bool>,

    #[schemars(description = "Embed analyzer debug detail in the report")]
    pub include_debug: Option<bool>,

    #[schemars(description = "Analyze again even if a cached analysis exists")]
    pub rerun: Option<bool>,
}

/// MCP service wrapping the pipeline.
#[derive(Clone)]
pub(crate) struct AnalysisService {
    ctx: Arc<ServerContext>,
    tool_router: ToolRouter<Self>,
}

impl AnalysisService {
    pub(crate) fn new(ctx: Arc<ServerContext>) -> Self {
        Self {
            ctx,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_handler]
impl ServerHandler for AnalysisService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(format!(
                "SuperAnalyze analyzes a document for claims, rigor, and evidence. Call '{ANALYZE_ACTION}' with a file path or URL; it returns the paths of a Markdown report and an HTML report."
            )),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }
}

#[tool_router]
impl AnalysisService {
    #[tool(description = "Analyze a document (file path or URL) for claims, rigor, and evidence. Returns JSON with markdown_path and html_path of the generated reports.")]
    pub(crate) async fn analyze_document_claims(
        &self,
        Parameters(request): Parameters<AnalyzeRequest>,
    ) -> Result<CallToolResult, McpError> {
        let opts = self.ctx.run_options(&request);

        let _guard = self.ctx.run_lock.lock().await;
        info!(input = %request.input, "tool call");
        let result = pipeline::run(
            &self.ctx.root,
            &request.input,
            &opts,
            self.ctx.analyzer.as_ref(),
            &SilentProgress,
        )
        .await;

        match result {
            Ok(paths) => {
                let json = serde_json::to_string_pretty(&paths).map_err(|e| {
                    McpError::internal_error(format!("failed to serialize result: {e}"), None)
                })?;
                Ok(CallToolResult::success(vec![Content::text(json)]))
            }
            Err(e) => {
                error!(kind = e.kind(), error = %e, "tool call failed");
                Ok(CallToolResult::error(vec![Content::text(format!(
                    "{}: {e}",
                    e.kind()
                ))]))
            }
        }
    }
}

/// Serve over stdin/stdout until the client disconnects.
pub(crate) async fn serve_stdio(ctx: Arc<ServerContext>) -> Result<()> {
    info!(workspace = %ctx.root.display(), "starting MCP server on stdio");
    let server = AnalysisService::new(ctx)
        .serve(stdio())
        .await
        .map_err(|e| eyre!("failed to start MCP server: {e}"))?;
    let reason = server.waiting().await?;
    info!(?reason, "MCP server stopped");
    Ok(())
}

/// Serve streamable HTTP at `http://{host}:{port}/mcp` until Ctrl-C.
pub(crate) async fn serve_http(ctx: Arc<ServerContext>, host: &str, port: u16) -> Result<()> {
    let service = StreamableHttpService::new(
        move || Ok(AnalysisService::new(ctx.clone())),
        LocalSessionManager::default().into(),
        Default::default(),
    );
    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .map_err(|e| eyre!("cannot bind {host}:{port}: {e}"))?;
    let addr = listener.local_addr()?;
    info!(%addr, "starting MCP server on streamable HTTP");
    eprintln!("Serving {ANALYZE_ACTION} on http://{addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    info!("MCP server stopped");
    Ok(())
}
