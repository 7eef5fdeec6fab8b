//! Terminal formatting for scenario runs

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::scenario::result::ScenarioMetrics;
use crate::scenario::{Scenario, ScenarioResult, StepResult};

/// Longest error text shown in the step table
const ERROR_WIDTH: usize = 50;

/// Per-scenario line of a multi-scenario summary
pub struct ScenarioOutcome {
    pub path: String,
    pub ok: bool,
    pub metrics: ScenarioMetrics,
    /// Set when the scenario could not run at all
    pub error: Option<String>,
}

pub fn progress_bar(steps: usize) -> ProgressBar {
    let pb = ProgressBar::new(steps as u64);
    let style = ProgressStyle::default_bar()
        .template(" {pos}/{len} [{bar:40.cyan/blue}] {percent:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    pb.set_style(style);
    pb
}

pub fn progress_message(index: usize, result: &StepResult, type_tag: &str) -> String {
    format!(
        "Step {}: {} {} ({}ms)",
        index + 1,
        type_tag,
        mark(result.ok),
        result.duration_ms
    )
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "✓"
    } else {
        "✗"
    }
}

fn colored_mark(ok: bool) -> String {
    if ok {
        mark(ok).green().to_string()
    } else {
        mark(ok).red().to_string()
    }
}

pub fn print_scenario_header(project: &str, path: &str, scenario: &Scenario) {
    println!(
        "\n{} {}/{}",
        "Running Scenario:".blue().bold(),
        project,
        path.white().bold()
    );
    if let Some(desc) = &scenario.description {
        println!("  {}", desc.dimmed());
    }
}

pub fn print_step_table(scenario: &Scenario, result: &ScenarioResult) {
    println!(
        "  {:<6} {:<6} {:<6} {:>8}  {:<8} {}",
        "Step", "Type", "Status", "Time", "HTTP", "Error"
    );
    for (index, step_result) in result.steps.iter().enumerate() {
        let type_tag = scenario
            .steps
            .get(index)
            .map(|s| s.type_tag())
            .unwrap_or("-");
        let http = step_result
            .http_status()
            .map(|s| format!("HTTP {s}"))
            .unwrap_or_else(|| "-".to_string());
        let error = step_result
            .error
            .as_deref()
            .map(truncate)
            .unwrap_or_else(|| "-".to_string());

        println!(
            "  {:<6} {:<6} {}      {:>6}ms  {:<8} {}",
            index + 1,
            type_tag,
            colored_mark(step_result.ok),
            step_result.duration_ms,
            http,
            if step_result.ok {
                error.normal()
            } else {
                error.red()
            }
        );
    }
}

pub fn print_metrics(metrics: &ScenarioMetrics) {
    println!();
    println!("  {:<20} {}s", "Total time", metrics.total_duration_seconds);
    println!("  {:<20} {}", "Steps executed", metrics.steps.count);
    println!("  {:<20} {}", "Successful", metrics.steps.successful);
    println!("  {:<20} {}", "Failed", metrics.steps.failed);
    println!(
        "  {:<20} {}ms",
        "Average step time", metrics.steps.average_duration_ms
    );
}

pub fn print_verdict(ok: bool) {
    if ok {
        println!("\n{} {}", "✓".green().bold(), "Passed".green().bold());
    } else {
        println!("\n{} {}", "✗".red().bold(), "Failed".red().bold());
    }
}

pub fn print_run_summary(outcomes: &[ScenarioOutcome]) {
    println!("\n{}", "Summary:".cyan().bold());
    println!(
        "  {:<32} {:<6} {:>9} {:>10} {:>12}",
        "Scenario", "Status", "Time", "Steps ok", "Avg step"
    );
    for outcome in outcomes {
        let steps = &outcome.metrics.steps;
        println!(
            "  {:<32} {}      {:>8}s {:>10} {:>10}ms",
            outcome.path,
            colored_mark(outcome.ok),
            outcome.metrics.total_duration_seconds,
            format!("{}/{}", steps.successful, steps.count),
            steps.average_duration_ms
        );
        if let Some(error) = &outcome.error {
            println!("    {}", error.red());
        }
    }

    let failed = outcomes.iter().filter(|o| !o.ok).count();
    println!(
        "\n  {} passed, {} failed",
        (outcomes.len() - failed).to_string().green(),
        if failed > 0 {
            failed.to_string().red()
        } else {
            failed.to_string().normal()
        }
    );
}

fn truncate(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(ERROR_WIDTH).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_is_char_aware() {
        assert_eq!(truncate("short"), "short");
        let long = "é".repeat(60);
        let cut = truncate(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), ERROR_WIDTH + 3);
    }

    #[test]
    fn test_progress_message_is_one_based() {
        let result = StepResult::failure("boom");
        assert_eq!(progress_message(0, &result, "http"), "Step 1: http ✗ (0ms)");
    }
}
