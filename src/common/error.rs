//! Error types for the scenario harness
//!
//! Step failures are never errors: HTTP and CLI problems are captured inside
//! `StepResult`. This enum covers the cases that abort a command outright.

use std::io;
use std::path::Path;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Target Lifecycle Errors ===
    #[error("Entry point for '{target}' not found. Searched: {searched}")]
    EntryPointNotFound { target: String, searched: String },

    #[error("Target '{target}' did not accept connections on port {port} within {secs} seconds")]
    StartupTimeout {
        target: String,
        port: u16,
        secs: u64,
    },

    #[error("Target '{target}' exited during startup ({status}). See log: {log}")]
    TargetExited {
        target: String,
        status: String,
        log: String,
    },

    #[error("Failed to launch target '{target}': {reason}")]
    TargetSpawn { target: String, reason: String },

    // === Project / Scenario Errors ===
    #[error("Project '{0}' not found. Use 'sandbox project list' to see configured projects")]
    ProjectNotFound(String),

    #[error("Project '{0}' already exists. Pass --force to overwrite it")]
    ProjectExists(String),

    #[error("Scenario '{scenario}' not found in project '{project}'")]
    ScenarioNotFound { project: String, scenario: String },

    #[error("Invalid scenario '{scenario}': step {step}: {reason}")]
    InvalidScenario {
        scenario: String,
        step: usize,
        reason: String,
    },

    #[error("{failed} of {total} scenario(s) failed")]
    ScenariosFailed { failed: usize, total: usize },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an entry point not found error with search paths
    pub fn entry_point_not_found<S: AsRef<str>>(target: &str, paths: &[S]) -> Self {
        Self::EntryPointNotFound {
            target: target.to_string(),
            searched: paths.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join(", "),
        }
    }

    /// Create a file read error
    pub fn file_read(path: &Path, error: impl ToString) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }

    /// Create an invalid scenario error
    pub fn invalid_scenario(scenario: &str, step: usize, reason: impl Into<String>) -> Self {
        Self::InvalidScenario {
            scenario: scenario.to_string(),
            step,
            reason: reason.into(),
        }
    }

    pub fn scenario_not_found(project: &str, scenario: &str) -> Self {
        Self::ScenarioNotFound {
            project: project.to_string(),
            scenario: scenario.to_string(),
        }
    }
}
