//! SuperAnalyze CLI: claim analysis reports for documents.
//!
//! Analyzes a local file or URL and writes a Markdown report plus a styled
//! HTML page, or serves the same pipeline as an MCP tool.

mod commands;
mod server;

use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::run(cli).await
}
