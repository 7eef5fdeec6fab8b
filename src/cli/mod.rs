//! CLI command handling
//!
//! Loads projects and scenarios, drives the target manager and the
//! orchestrator, and formats output.

mod output;

use std::path::PathBuf;
use std::time::Duration;

use colored::Colorize;
use serde_json::Value;
use tracing::warn;

use crate::commands::{Commands, ProjectCommands, ScenarioCommands, ServerCommands};
use crate::common::config::Config;
use crate::common::{paths, Error, Result};
use crate::orchestrator::Orchestrator;
use crate::project::{self, NewProject, Project, ProjectRegistry};
use crate::runner::RunnerRegistry;
use crate::scenario::context::{BASE_URL, ENV, LOCALE};
use crate::scenario::{CatalogEntry, Context, ScenarioCatalog};
use crate::storage::RunStorage;
use crate::target::TargetProcessManager;

use output::ScenarioOutcome;

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Project(cmd) => project_command(cmd, config),
        Commands::Scenario(cmd) => scenario_command(cmd, config).await,
        Commands::Server(cmd) => server_command(cmd, config).await,
    }
}

fn projects_dir(config: &Config) -> PathBuf {
    paths::resolve(&config.paths.projects_dir)
}

fn load_project(config: &Config, name: &str) -> Result<Project> {
    let registry = ProjectRegistry::load(&projects_dir(config))?;
    registry.require(name).cloned()
}

fn target_manager(config: &Config) -> TargetProcessManager {
    TargetProcessManager::new(
        paths::resolve(&config.paths.state_dir),
        config.server.clone(),
    )
}

fn run_storage(config: &Config) -> RunStorage {
    RunStorage::new(paths::resolve(&config.paths.results_dir))
}

fn project_command(cmd: ProjectCommands, config: &Config) -> Result<()> {
    match cmd {
        ProjectCommands::List => {
            let registry = ProjectRegistry::load(&projects_dir(config))?;
            if registry.is_empty() {
                println!("No projects configured");
                println!("Add one with: sandbox project add <name> <path>");
                return Ok(());
            }
            println!("Projects:");
            for project in registry.all() {
                println!(
                    "  {:<20} {:<30} {}",
                    project.name.bold(),
                    project.title,
                    project.root.display().to_string().dimmed()
                );
            }
            Ok(())
        }

        ProjectCommands::Add {
            name,
            path,
            title,
            entry_point,
            force,
        } => {
            let new = NewProject {
                name,
                path,
                title,
                entry: entry_point,
                force,
            };
            let tests_root = paths::resolve(std::path::Path::new("tests"));
            let file = project::add_project(&projects_dir(config), &tests_root, &new)?;
            println!(
                "{} Project '{}' added: {}",
                "✓".green(),
                new.name,
                file.display()
            );
            println!(
                "  Put scenarios in {}",
                tests_root.join(&new.name).join("scenarios").display()
            );
            Ok(())
        }
    }
}

/// Flags shared by the scenario run commands
struct RunOptions {
    save_reports: bool,
    no_server: bool,
}

async fn scenario_command(cmd: ScenarioCommands, config: &Config) -> Result<()> {
    match cmd {
        ScenarioCommands::List { project } => {
            let project = load_project(config, &project)?;
            let catalog = ScenarioCatalog::load(&project.scenarios_path())?;
            if catalog.is_empty() {
                println!(
                    "No scenarios in {}",
                    project.scenarios_path().display()
                );
                return Ok(());
            }
            println!("Scenarios for {}:", project.name.bold());
            for entry in catalog.all() {
                let desc = entry.scenario.description.as_deref().unwrap_or("");
                println!(
                    "  {:<40} {:>3} step(s)  {}",
                    entry.path(),
                    entry.scenario.steps.len(),
                    desc.dimmed()
                );
            }
            Ok(())
        }

        ScenarioCommands::Groups { project } => {
            let project = load_project(config, &project)?;
            let catalog = ScenarioCatalog::load(&project.scenarios_path())?;
            let root = catalog.group_summary("");
            println!(
                "{} {} scenario(s)",
                "(all)".bold(),
                root.scenarios_count
            );
            for group in catalog.group_paths() {
                let summary = catalog.group_summary(group);
                let depth = group.matches('/').count();
                println!(
                    "  {}{:<30} {:>3} scenario(s)",
                    "  ".repeat(depth),
                    summary.name,
                    summary.scenarios_count
                );
            }
            Ok(())
        }

        ScenarioCommands::Run {
            project,
            scenario,
            save_report,
            clean,
            no_server,
        } => {
            let project = load_project(config, &project)?;
            let catalog = ScenarioCatalog::load(&project.scenarios_path())?;
            let entry = catalog
                .find(&scenario)
                .ok_or_else(|| Error::scenario_not_found(&project.name, &scenario))?;

            if clean {
                let removed = run_storage(config).clear()?;
                if removed > 0 {
                    println!("Removed {} previous report(s)", removed);
                }
            }

            let options = RunOptions {
                save_reports: save_report,
                no_server,
            };
            run_entries(config, &project, &[entry], &options).await
        }

        ScenarioCommands::RunAll {
            project,
            save_reports,
            no_server,
        } => {
            let project = load_project(config, &project)?;
            let catalog = ScenarioCatalog::load(&project.scenarios_path())?;
            let entries: Vec<&CatalogEntry> = catalog.all().iter().collect();
            let options = RunOptions {
                save_reports,
                no_server,
            };
            run_entries(config, &project, &entries, &options).await
        }

        ScenarioCommands::RunGroup {
            project,
            group,
            save_reports,
            no_server,
        } => {
            let project = load_project(config, &project)?;
            let catalog = ScenarioCatalog::load(&project.scenarios_path())?;
            if !catalog.has_group(&group) {
                return Err(Error::Config(format!(
                    "Group '{}' not found in project '{}'",
                    group, project.name
                )));
            }
            let entries = catalog.in_group(&group);
            let options = RunOptions {
                save_reports,
                no_server,
            };
            run_entries(config, &project, &entries, &options).await
        }
    }
}

/// Run scenarios against one target, stopping it afterwards if we started it
async fn run_entries(
    config: &Config,
    project: &Project,
    entries: &[&CatalogEntry],
    options: &RunOptions,
) -> Result<()> {
    if entries.is_empty() {
        println!("No scenarios to run");
        return Ok(());
    }

    let manager = target_manager(config);
    let target = project.target();
    let (base_url, started_by_us) = if options.no_server {
        (config.defaults.base_url.clone(), false)
    } else {
        let timeout = Duration::from_secs(config.timeouts.server_start_secs);
        let (record, started) = manager.ensure_running(&target, timeout).await?;
        if started {
            println!("Started target for {} at {}", project.name, record.base_url);
        }
        (record.base_url, started)
    };

    let outcomes = execute(config, project, entries, &base_url, options).await;

    if started_by_us {
        let timeout = Duration::from_secs(config.timeouts.server_stop_secs);
        if let Err(e) = manager.stop(&target, timeout).await {
            warn!(project = %project.name, error = %e, "Failed to stop target");
        }
    }

    let outcomes = outcomes?;
    if outcomes.len() > 1 {
        output::print_run_summary(&outcomes);
    }

    let failed = outcomes.iter().filter(|o| !o.ok).count();
    if failed > 0 {
        return Err(Error::ScenariosFailed {
            failed,
            total: outcomes.len(),
        });
    }
    Ok(())
}

async fn execute(
    config: &Config,
    project: &Project,
    entries: &[&CatalogEntry],
    base_url: &str,
    options: &RunOptions,
) -> Result<Vec<ScenarioOutcome>> {
    let orchestrator = Orchestrator::new(RunnerRegistry::with_defaults(&config.timeouts));
    let storage = run_storage(config);
    let env: serde_json::Map<String, Value> = project
        .env
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let mut outcomes = Vec::with_capacity(entries.len());
    for entry in entries {
        let path = entry.path();
        let scenario = &entry.scenario;
        output::print_scenario_header(&project.name, &path, scenario);

        let context = Context::new()
            .with(BASE_URL, base_url)
            .with(LOCALE, config.defaults.locale.as_str())
            .with(ENV, Value::Object(env.clone()));

        let pb = output::progress_bar(scenario.steps.len());
        let mut on_step = |index: usize, result: &crate::scenario::StepResult, type_tag: &str| {
            pb.set_message(output::progress_message(index, result, type_tag));
            pb.inc(1);
        };
        let run = orchestrator
            .run_scenario(scenario, context, Some(&mut on_step))
            .await;
        pb.finish_and_clear();

        let result = match run {
            Ok(result) => result,
            Err(e) if entries.len() == 1 => return Err(e),
            Err(e) => {
                println!("  {} {}", "✗".red(), e);
                outcomes.push(ScenarioOutcome {
                    path,
                    ok: false,
                    metrics: Default::default(),
                    error: Some(e.to_string()),
                });
                continue;
            }
        };

        output::print_step_table(scenario, &result);
        output::print_metrics(&result.metrics);

        if options.save_reports {
            let file = storage.save(&project.name, &path, &result)?;
            println!("  Report saved: {}", file.display());
        }
        output::print_verdict(result.ok);

        outcomes.push(ScenarioOutcome {
            path,
            ok: result.ok,
            metrics: result.metrics,
            error: None,
        });
    }
    Ok(outcomes)
}

async fn server_command(cmd: ServerCommands, config: &Config) -> Result<()> {
    let manager = target_manager(config);
    match cmd {
        ServerCommands::Start {
            project,
            port,
            timeout,
        } => {
            let project = load_project(config, &project)?;
            let target = project.target();
            if let Some(record) = manager.status(&target) {
                if manager.is_reachable(&record).await {
                    println!(
                        "Target for {} already running at {} (pid {})",
                        project.name, record.base_url, record.pid
                    );
                    return Ok(());
                }
                manager.records().remove(&target.name)?;
            }
            let timeout =
                Duration::from_secs(timeout.unwrap_or(config.timeouts.server_start_secs));
            let record = manager.start(&target, port, timeout).await?;
            println!(
                "{} Target for {} running at {} (pid {})",
                "✓".green(),
                project.name,
                record.base_url,
                record.pid
            );
            println!(
                "  Log: {}",
                manager.records().log_path(&target.name).display()
            );
            Ok(())
        }

        ServerCommands::Stop { project, timeout } => {
            let project = load_project(config, &project)?;
            let target = project.target();
            if manager.status(&target).is_none() {
                println!("Target for {} is not running", project.name);
                return Ok(());
            }
            let timeout =
                Duration::from_secs(timeout.unwrap_or(config.timeouts.server_stop_secs));
            manager.stop(&target, timeout).await?;
            println!("{} Target for {} stopped", "✓".green(), project.name);
            Ok(())
        }

        ServerCommands::Status { project } => {
            let project = load_project(config, &project)?;
            let target = project.target();
            match manager.status(&target) {
                None => println!("Target for {} is not running", project.name),
                Some(record) => {
                    let state = if manager.is_reachable(&record).await {
                        "running".green()
                    } else {
                        "not responding".yellow()
                    };
                    println!("Target for {}: {}", project.name, state);
                    println!("  pid:      {}", record.pid);
                    println!("  port:     {}", record.port);
                    println!("  base URL: {}", record.base_url);
                }
            }
            Ok(())
        }
    }
}
