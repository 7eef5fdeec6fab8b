//! CLI command definitions
//!
//! Defines the clap commands for the sandbox CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Manage configured projects
    #[command(subcommand)]
    Project(ProjectCommands),

    /// List and run scenarios
    #[command(subcommand, alias = "s")]
    Scenario(ScenarioCommands),

    /// Control a project's local target server
    #[command(subcommand)]
    Server(ServerCommands),
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// List configured projects
    List,

    /// Register a project directory
    Add {
        /// Project name, used as the file name of its config
        name: String,

        /// Path to the project root
        path: PathBuf,

        /// Human readable title (default: the name)
        #[arg(long)]
        title: Option<String>,

        /// Entry point relative to the project root
        #[arg(long = "entry-point")]
        entry_point: Option<PathBuf>,

        /// Overwrite an existing project config
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum ScenarioCommands {
    /// List a project's scenarios
    List {
        project: String,
    },

    /// Show scenario groups
    Groups {
        project: String,
    },

    /// Run one scenario
    Run {
        project: String,

        /// Scenario name or `group/name` path
        scenario: String,

        /// Save a detailed report under the results directory
        #[arg(long)]
        save_report: bool,

        /// Delete previous reports first
        #[arg(long)]
        clean: bool,

        /// Do not start a target server; use the configured base URL
        #[arg(long)]
        no_server: bool,
    },

    /// Run every scenario of a project
    RunAll {
        project: String,

        /// Save a report for each scenario
        #[arg(long)]
        save_reports: bool,

        /// Do not start a target server; use the configured base URL
        #[arg(long)]
        no_server: bool,
    },

    /// Run every scenario in a group, including nested groups
    RunGroup {
        project: String,

        /// Group path, e.g. `auth` or `auth/oauth`
        group: String,

        /// Save a report for each scenario
        #[arg(long)]
        save_reports: bool,

        /// Do not start a target server; use the configured base URL
        #[arg(long)]
        no_server: bool,
    },
}

#[derive(Subcommand)]
pub enum ServerCommands {
    /// Start the target and wait until it accepts connections
    Start {
        project: String,

        /// Port to bind (default: a free port)
        #[arg(long)]
        port: Option<u16>,

        /// Seconds to wait for startup
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Stop a recorded target
    Stop {
        project: String,

        /// Seconds to wait for the process to exit
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Show the recorded target
    Status {
        project: String,
    },
}
