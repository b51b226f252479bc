//! Application configuration for SuperAnalyze.
//!
//! User config lives at `~/.superanalyze/superanalyze.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SuperAnalyzeError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "superanalyze.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".superanalyze";

/// Name of the analysis action exposed by the CLI and the tool server.
pub const ANALYZE_ACTION: &str = "analyze_document_claims";

// ---------------------------------------------------------------------------
// Config structs (matching superanalyze.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// External claim analyzer.
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Document fetching.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Tool server.
    #[serde(default)]
    pub server: ServerConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Workspace root for files, metadata, and cache.
    #[serde(default = "default_workspace")]
    pub workspace: String,

    /// Minify the HTML report.
    #[serde(default = "default_true")]
    pub minify: bool,

    /// Embed analyzer debug detail in the report.
    #[serde(default = "default_true")]
    pub include_debug: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            minify: true,
            include_debug: true,
        }
    }
}

fn default_workspace() -> String {
    "./superanalyze".into()
}
fn default_true() -> bool {
    true
}

/// `[analyzer]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Executable implementing the analyzer bridge protocol.
    #[serde(default = "default_analyzer_command")]
    pub command: String,

    /// Extra arguments passed to the analyzer.
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the analyzer process (defaults to the cwd).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    /// Action name sent with each analysis task.
    #[serde(default = "default_action")]
    pub action: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            command: default_analyzer_command(),
            args: Vec::new(),
            working_dir: None,
            action: default_action(),
        }
    }
}

fn default_analyzer_command() -> String {
    "superanalyze-claims".into()
}
fn default_action() -> String {
    ANALYZE_ACTION.into()
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Largest document body accepted, in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_bytes: default_max_bytes(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_bytes() -> usize {
    20 * 1024 * 1024
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP transport.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port for the HTTP transport.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    4440
}

impl AppConfig {
    /// Reject values no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        if self.analyzer.command.trim().is_empty() {
            return Err(SuperAnalyzeError::config("analyzer.command must not be empty"));
        }
        if self.analyzer.action.trim().is_empty() {
            return Err(SuperAnalyzeError::config("analyzer.action must not be empty"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(SuperAnalyzeError::config("fetch.timeout_secs must be positive"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.superanalyze/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SuperAnalyzeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.superanalyze/superanalyze.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SuperAnalyzeError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        SuperAnalyzeError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SuperAnalyzeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SuperAnalyzeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SuperAnalyzeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
