//! CLI definition, routing, and tracing setup.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};

use superanalyze_core::{BridgeAnalyzer, ProgressReporter, RunOptions, pipeline};
use superanalyze_shared::{AppConfig, ArtifactPaths, init_config, load_config};

/// Log file location, relative to the workspace root.
pub(crate) const LOG_FILE: &str = "logs/superanalyze.log";

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// SuperAnalyze: analyze a document's claims into Markdown and HTML reports.
#[derive(Parser, Debug)]
#[command(
    name = "superanalyze",
    version,
    about = "Analyze a document (path or URL) for claims, rigor, and evidence.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Document to analyze: a local path or an http(s) URL.
    #[arg(required_unless_present_any = ["mcp", "sse", "logs", "init_config", "show_config"])]
    pub input: Option<String>,

    /// Write the HTML report without minifying it.
    #[arg(long = "no_minify", alias = "no-minify")]
    pub no_minify: bool,

    /// Leave analyzer debug detail out of the report.
    #[arg(long = "no_debug", alias = "no-debug")]
    pub no_debug: bool,

    /// Open the HTML report in the browser when done.
    #[arg(long)]
    pub show: bool,

    /// Workspace root (defaults to `defaults.workspace` from the config file).
    #[arg(long, env = "SUPERANALYZE_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Analyze again even if a cached analysis exists.
    #[arg(long)]
    pub rerun: bool,

    /// Serve the analysis tool over stdio (MCP).
    #[arg(long, conflicts_with_all = ["sse", "input"])]
    pub mcp: bool,

    /// Serve the analysis tool over streamable HTTP at /mcp.
    #[arg(long, conflicts_with = "input")]
    pub sse: bool,

    /// Port for `--sse` (defaults to `server.port`).
    #[arg(long)]
    pub port: Option<u16>,

    /// Print and follow the log file.
    #[arg(long, conflicts_with_all = ["mcp", "sse", "input"])]
    pub logs: bool,

    /// Write a default config file and exit.
    #[arg(long)]
    pub init_config: bool,

    /// Print the resolved config and exit.
    #[arg(long)]
    pub show_config: bool,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text")]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Log output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

impl Cli {
    /// Flag combinations clap cannot express.
    fn validate(&self) -> Result<()> {
        if self.port.is_some() && !self.sse {
            return Err(eyre!("--port only applies to --sse"));
        }
        Ok(())
    }

    /// Workspace root: the flag if given, else the configured default.
    fn workspace_root(&self, config: &AppConfig) -> PathBuf {
        self.workspace
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.defaults.workspace))
    }

    /// Per-run options from flags layered over config defaults.
    fn run_options(&self, config: &AppConfig) -> RunOptions {
        RunOptions {
            skip_minify: self.no_minify || !config.defaults.minify,
            include_debug: config.defaults.include_debug && !self.no_debug,
            rerun: self.rerun,
            fetch: config.fetch.clone().into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Install a stderr layer (quiet by default; stdout stays clean for MCP
/// stdio) and, when the log file can be opened, a file layer.
pub(crate) fn init_tracing(cli: &Cli, log_file: &Path) {
    use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

    let (stderr_level, file_level) = match cli.verbose {
        0 => ("warn", "info"),
        1 => ("info", "info"),
        2 => ("debug", "debug"),
        _ => ("trace", "trace"),
    };
    let filter = |level: &str| {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("superanalyze={level}")))
    };

    let stderr_layer = match cli.log_format {
        LogFormat::Text => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
    }
    .with_filter(filter(stderr_level));

    let file_layer = open_log_file(log_file).map(|file| {
        let writer = Arc::new(file);
        match cli.log_format {
            LogFormat::Text => fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .boxed(),
            LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
        }
        .with_filter(filter(file_level))
    });

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();
}

fn open_log_file(path: &Path) -> Option<std::fs::File> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).ok()?;
    }
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("warning: cannot open log file {}: {e}", path.display());
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Run whatever the flags ask for.
pub(crate) async fn run(cli: Cli) -> Result<ExitCode> {
    cli.validate()?;
    if cli.init_config {
        let path = init_config()?;
        println!("Config initialized at: {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let config = load_config()?;
    if cli.show_config {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(ExitCode::SUCCESS);
    }

    let root = cli.workspace_root(&config);
    let log_path = root.join(LOG_FILE);
    if cli.logs {
        follow_logs(&log_path).await?;
        return Ok(ExitCode::SUCCESS);
    }

    init_tracing(&cli, &log_path);
    let analyzer = Arc::new(BridgeAnalyzer::new(config.analyzer.clone()));

    if cli.mcp || cli.sse {
        let ctx = crate::server::ServerContext::new(root, config.clone(), analyzer);
        if cli.mcp {
            crate::server::serve_stdio(ctx).await?;
        } else {
            let port = cli.port.unwrap_or(config.server.port);
            crate::server::serve_http(ctx, &config.server.host, port).await?;
        }
        return Ok(ExitCode::SUCCESS);
    }

    let input = cli
        .input
        .as_deref()
        .ok_or_else(|| eyre!("no input given"))?;
    Ok(cmd_analyze(&cli, &config, &root, input, analyzer.as_ref(), &log_path).await)
}

async fn cmd_analyze(
    cli: &Cli,
    config: &AppConfig,
    root: &Path,
    input: &str,
    analyzer: &BridgeAnalyzer,
    log_path: &Path,
) -> ExitCode {
    let opts = cli.run_options(config);
    info!(
        input,
        workspace = %root.display(),
        skip_minify = opts.skip_minify,
        include_debug = opts.include_debug,
        rerun = opts.rerun,
        "analyzing document"
    );

    let reporter = CliProgress::new();
    let result = pipeline::run(root, input, &opts, analyzer, &reporter).await;
    drop(reporter);

    match result {
        Ok(paths) => {
            print_summary(root, &paths);
            if cli.show {
                if let Err(e) = open::that(&paths.html_path) {
                    warn!(error = %e, "could not open report in browser");
                    eprintln!("Could not open the report in a browser: {e}");
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(kind = e.kind(), error = %e, "analysis failed");
            eprintln!("Error: {e}");
            eprintln!("See {} for details.", log_path.display());
            ExitCode::FAILURE
        }
    }
}

fn print_summary(root: &Path, paths: &ArtifactPaths) {
    let workspace = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    println!();
    println!("  Analysis complete!");
    println!("  Workspace: {}", workspace.display());
    println!("  Markdown:  {}", paths.markdown_path.display());
    println!("  HTML:      {}", paths.html_path.display());
    println!();
}

/// Print the log file, then keep printing what gets appended until Ctrl-C.
async fn follow_logs(path: &Path) -> Result<()> {
    let mut file = std::fs::File::open(path)
        .map_err(|e| eyre!("cannot open log file {}: {e}", path.display()))?;
    let mut stdout = std::io::stdout();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        file.read_to_end(&mut buf)?;
        if !buf.is_empty() {
            stdout.write_all(&buf)?;
            stdout.flush()?;
        }
        // Start over if the file was truncated.
        let len = file.metadata()?.len();
        if file.stream_position()? > len {
            file.seek(SeekFrom::Start(0))?;
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            _ = tokio::time::sleep(Duration::from_millis(500)) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _paths: &ArtifactPaths) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> std::result::Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("superanalyze").chain(args.iter().copied()))
    }

    #[test]
    fn parses_analysis_flags() {
        let cli = parse(&[
            "report.md",
            "--no_minify",
            "--show",
            "--rerun",
            "--workspace",
            "/tmp/ws",
        ])
        .unwrap();
        assert_eq!(cli.input.as_deref(), Some("report.md"));
        assert!(cli.no_minify && cli.show && cli.rerun);
        assert_eq!(cli.workspace, Some(PathBuf::from("/tmp/ws")));
        assert_eq!(cli.log_format, LogFormat::Text);
    }

    #[test]
    fn dashed_alias_is_accepted() {
        let cli = parse(&["report.md", "--no-minify", "-vv"]).unwrap();
        assert!(cli.no_minify);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn input_required_unless_serving() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["--mcp"]).unwrap().mcp);
        let sse = parse(&["--sse", "--port", "9000"]).unwrap();
        assert!(sse.sse);
        assert_eq!(sse.port, Some(9000));
        assert!(parse(&["--logs"]).unwrap().logs);
        assert!(parse(&["--show-config"]).unwrap().show_config);
        assert!(parse(&["--init-config"]).unwrap().init_config);
    }

    #[test]
    fn conflicting_modes_rejected() {
        assert!(parse(&["--mcp", "--sse"]).is_err());
        assert!(parse(&["doc.md", "--mcp"]).is_err());
    }

    #[test]
    fn port_without_sse_is_rejected() {
        let cli = parse(&["doc.md", "--port", "9000"]).unwrap();
        let err = cli.validate().unwrap_err();
        assert!(err.to_string().contains("--sse"));

        let cli = parse(&["--sse", "--port", "9000"]).unwrap();
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn flags_override_config_defaults() {
        let mut config = AppConfig::default();
        let cli = parse(&["doc.md", "--workspace", "/tmp/other"]).unwrap();
        assert_eq!(cli.workspace_root(&config), PathBuf::from("/tmp/other"));

        let cli = parse(&["doc.md"]).unwrap();
        assert_eq!(cli.workspace_root(&config), PathBuf::from("./superanalyze"));
        let opts = cli.run_options(&config);
        assert!(!opts.skip_minify);
        assert!(opts.include_debug);
        assert!(!opts.rerun);

        config.defaults.minify = false;
        let opts = parse(&["doc.md", "--no_debug"]).unwrap().run_options(&config);
        assert!(opts.skip_minify);
        assert!(!opts.include_debug);
    }
}
