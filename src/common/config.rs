//! Configuration file handling

use serde::Deserialize;
use std::path::PathBuf;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Where projects, results and server records live
    #[serde(default)]
    pub paths: PathsConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Default context values
    #[serde(default)]
    pub defaults: Defaults,

    /// Local target server settings
    #[serde(default)]
    pub server: ServerConfig,
}

/// Directory layout, relative paths are taken from the working directory
#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    /// Directory holding one YAML file per project
    #[serde(default = "default_projects_dir")]
    pub projects_dir: PathBuf,

    /// Directory that receives run reports
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    /// Directory for target records and server logs
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            projects_dir: default_projects_dir(),
            results_dir: default_results_dir(),
            state_dir: default_state_dir(),
        }
    }
}

fn default_projects_dir() -> PathBuf {
    PathBuf::from("config/projects")
}
fn default_results_dir() -> PathBuf {
    PathBuf::from("result")
}
fn default_state_dir() -> PathBuf {
    PathBuf::from("var/servers")
}

/// Timeout settings in seconds
#[derive(Debug, Deserialize, Clone)]
pub struct Timeouts {
    /// Default timeout for HTTP steps
    #[serde(default = "default_http_step")]
    pub http_step_secs: u64,

    /// Default timeout for CLI steps
    #[serde(default = "default_cli_step")]
    pub cli_step_secs: u64,

    /// How long to wait for a target to accept connections
    #[serde(default = "default_server_start")]
    pub server_start_secs: u64,

    /// How long to wait for a target to exit after SIGTERM
    #[serde(default = "default_server_stop")]
    pub server_stop_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            http_step_secs: default_http_step(),
            cli_step_secs: default_cli_step(),
            server_start_secs: default_server_start(),
            server_stop_secs: default_server_stop(),
        }
    }
}

fn default_http_step() -> u64 {
    5
}
fn default_cli_step() -> u64 {
    60
}
fn default_server_start() -> u64 {
    10
}
fn default_server_stop() -> u64 {
    5
}

/// Default settings injected into every scenario context
#[derive(Debug, Deserialize, Clone)]
pub struct Defaults {
    /// Locale for generated values
    #[serde(default = "default_locale")]
    pub locale: String,

    /// Base URL used when no target server is running
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            base_url: default_base_url(),
        }
    }
}

fn default_locale() -> String {
    "en".to_string()
}
fn default_base_url() -> String {
    "http://127.0.0.1".to_string()
}

/// Local target server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Loopback address the target binds to
    #[serde(default = "default_host")]
    pub host: String,

    /// Launch command; `{host}`, `{port}`, `{docroot}` and `{entry}` are substituted
    #[serde(default = "default_command")]
    pub command: Vec<String>,

    /// Conventional entry point locations, relative to the project root
    #[serde(default = "default_entry_candidates")]
    pub entry_candidates: Vec<PathBuf>,

    /// Interval between connection attempts while starting
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            command: default_command(),
            entry_candidates: default_entry_candidates(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_command() -> Vec<String> {
    ["php", "-S", "{host}:{port}", "-t", "{docroot}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_entry_candidates() -> Vec<PathBuf> {
    vec![PathBuf::from("public/index.php"), PathBuf::from("index.php")]
}
fn default_poll_interval() -> u64 {
    200
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                let content = std::fs::read_to_string(&path)
                    .map_err(|e| super::Error::file_read(&path, e))?;
                return Self::parse(&content);
            }
        }
        Ok(Self::default())
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }
}
