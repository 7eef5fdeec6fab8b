//! Scenario sandbox CLI - runs YAML scenarios against local projects
//!
//! Starts a project's target server when needed, executes HTTP and shell
//! steps in order, and reports per-step results.

use clap::Parser;
use sandbox::common::{config::Config, logging, Error};
use sandbox::{cli, commands::Commands};

#[derive(Parser)]
#[command(name = "sandbox", about = "Scenario-driven test harness for local projects")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let _log_guard = logging::init_cli();

    let cli = Cli::parse();

    let result = match Config::load() {
        Ok(config) => cli::dispatch(cli.command, &config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        if !matches!(e, Error::ScenariosFailed { .. }) {
            if let Some(log) = logging::log_path() {
                eprintln!("Log: {}", log.display());
            }
        }
        std::process::exit(1);
    }
}
