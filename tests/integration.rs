//! End-to-end integration tests for the sandbox CLI
//!
//! These tests verify the complete workflow by:
//! 1. Writing a project, its scenarios and a local `sandbox.toml`
//! 2. Running the sandbox binary against the `mock_target` server
//! 3. Verifying exit codes, printed results and saved reports

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use sandbox::common::config::ServerConfig;
use sandbox::scenario::loader::load_file;
use sandbox::{Context, Orchestrator, TargetProcessManager, TargetSpec};

/// Test context with paths and cleanup
struct TestContext {
    /// Temporary directory for this test, used as the working directory
    temp_dir: PathBuf,
    /// Path to the sandbox binary
    sandbox_bin: PathBuf,
    /// Path to the mock target server
    mock_bin: PathBuf,
    /// Root of the project under test
    project_root: PathBuf,
}

impl TestContext {
    /// Create a new test context
    fn new(test_name: &str) -> Self {
        let temp_base = env::temp_dir().join("scenario-sandbox-tests");
        let temp_dir = temp_base.join(test_name);

        // Clean up any previous test artifacts
        let _ = fs::remove_dir_all(&temp_dir);
        fs::create_dir_all(&temp_dir).expect("Failed to create temp dir");

        let project_root = temp_dir.join("app");
        fs::create_dir_all(project_root.join("public")).expect("Failed to create project root");
        fs::write(project_root.join("public/index.php"), "<?php\n").expect("Failed to write entry");

        Self {
            temp_dir,
            sandbox_bin: PathBuf::from(env!("CARGO_BIN_EXE_sandbox")),
            mock_bin: PathBuf::from(env!("CARGO_BIN_EXE_mock_target")),
            project_root,
        }
    }

    /// Write `sandbox.toml` launching the mock target as the server
    fn create_config(&self) {
        let config_content = format!(
            r#"
[timeouts]
http_step_secs = 5
cli_step_secs = 10
server_start_secs = 10
server_stop_secs = 5

[server]
command = ["{mock}", "--host", "{{host}}", "--port", "{{port}}"]
poll_interval_ms = 50
"#,
            mock = self.mock_bin.display(),
        );
        fs::write(self.temp_dir.join("sandbox.toml"), config_content)
            .expect("Failed to write config");
    }

    /// Register the `demo` project with its scenarios under `scenarios/`
    fn create_project(&self) {
        let projects_dir = self.temp_dir.join("config/projects");
        fs::create_dir_all(&projects_dir).expect("Failed to create projects dir");
        let content = format!(
            "name: demo\ntitle: Demo\nprojectRoot: {}\ntests:\n  scenariosDir: scenarios\nenv:\n  GREETING: hello\n",
            self.project_root.display()
        );
        fs::write(projects_dir.join("demo.yaml"), content).expect("Failed to write project");
    }

    /// Write a scenario file relative to the scenarios directory
    fn write_scenario(&self, relative: &str, yaml: &str) -> PathBuf {
        let path = self.temp_dir.join("scenarios").join(relative);
        fs::create_dir_all(path.parent().unwrap()).expect("Failed to create scenario dir");
        fs::write(&path, yaml).expect("Failed to write scenario");
        path
    }

    /// Run a sandbox command from the test directory
    fn run_sandbox(&self, args: &[&str]) -> SandboxOutput {
        let output = Command::new(&self.sandbox_bin)
            .args(args)
            .current_dir(&self.temp_dir)
            .env("XDG_CONFIG_HOME", self.temp_dir.join("xdg-config"))
            .env("XDG_DATA_HOME", self.temp_dir.join("xdg-data"))
            .env("NO_COLOR", "1")
            .env("CLICOLOR", "0")
            .output()
            .expect("Failed to run sandbox");

        SandboxOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
        }
    }

    /// Run sandbox command expecting success
    fn run_sandbox_ok(&self, args: &[&str]) -> String {
        let output = self.run_sandbox(args);
        assert!(
            output.success,
            "Sandbox command {:?} failed:\nstdout: {}\nstderr: {}",
            args,
            output.stdout,
            output.stderr
        );
        output.stdout
    }

    fn record_path(&self) -> PathBuf {
        self.temp_dir.join("var/servers/demo.json")
    }

    /// Every saved `result.json`
    fn reports(&self) -> Vec<PathBuf> {
        let results = self.temp_dir.join("result");
        let Ok(entries) = fs::read_dir(&results) else {
            return Vec::new();
        };
        entries
            .flatten()
            .map(|e| e.path().join("result.json"))
            .filter(|p| p.exists())
            .collect()
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        // Stop a target a failed test may have left behind
        if self.record_path().exists() {
            let _ = self.run_sandbox(&["server", "stop", "demo"]);
        }

        // Set PRESERVE_SANDBOX_TEST_ARTIFACTS=1 to keep the directory
        let preserve = env::var("PRESERVE_SANDBOX_TEST_ARTIFACTS")
            .unwrap_or_else(|_| "0".to_string())
            .to_ascii_lowercase();
        if preserve == "0" || preserve == "false" || preserve == "no" {
            let _ = fs::remove_dir_all(&self.temp_dir);
        }
    }
}

/// Output from a sandbox command
#[derive(Debug)]
struct SandboxOutput {
    stdout: String,
    stderr: String,
    success: bool,
}

const REGISTER_LOGIN: &str = r#"
description: Register a user and log in with the same credentials
steps:
  - type: http
    method: POST
    path: /register
    headers:
      Content-Type: application/json
    body:
      email: "generator.email:user_email"
      password: "generator.password:user_password"
    extract:
      token: data.access_token
  - type: http
    method: POST
    path: /login
    headers:
      Content-Type: application/json
      Authorization: "Bearer {{token}}"
    body:
      email: "{{user_email}}"
      password: "{{user_password}}"
      auth: "Bearer {{token}}"
    extract:
      auth: data.auth
      authorization: data.authorization
"#;

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

// ============== Tests ==============

#[test]
fn test_project_add_and_list() {
    let ctx = TestContext::new("project_add_and_list");

    let output = ctx.run_sandbox_ok(&[
        "project",
        "add",
        "shop",
        ctx.project_root.to_str().unwrap(),
        "--title",
        "Shop API",
    ]);
    assert!(output.contains("Project 'shop' added"), "{output}");
    assert!(ctx.temp_dir.join("config/projects/shop.yaml").exists());
    assert!(ctx.temp_dir.join("tests/shop/scenarios/.gitkeep").exists());

    let listing = ctx.run_sandbox_ok(&["project", "list"]);
    assert!(listing.contains("shop"));
    assert!(listing.contains("Shop API"));

    let again = ctx.run_sandbox(&["project", "add", "shop", ctx.project_root.to_str().unwrap()]);
    assert!(!again.success);
    assert!(again.stderr.contains("already exists"), "{}", again.stderr);
}

#[test]
fn test_unknown_project_fails() {
    let ctx = TestContext::new("unknown_project");
    let output = ctx.run_sandbox(&["scenario", "list", "nope"]);
    assert!(!output.success);
    assert!(output.stderr.contains("Project 'nope' not found"), "{}", output.stderr);
}

#[test]
fn test_error_points_at_daily_log_file() {
    let ctx = TestContext::new("daily_log");
    let output = ctx.run_sandbox(&["scenario", "list", "nope"]);
    assert!(!output.success);

    let log = output
        .stderr
        .lines()
        .find_map(|line| line.strip_prefix("Log: "))
        .unwrap_or_else(|| panic!("no log line in:\n{}", output.stderr));
    let log = PathBuf::from(log);
    assert!(log.starts_with(ctx.temp_dir.join("xdg-data")), "{}", log.display());
    assert!(log.exists(), "{}", log.display());

    let name = log.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("sandbox.") && name.ends_with(".log"), "{name}");
}

#[test]
fn test_register_login_scenario_end_to_end() {
    let ctx = TestContext::new("register_login");
    ctx.create_config();
    ctx.create_project();
    ctx.write_scenario("auth/register_login.yaml", REGISTER_LOGIN);

    let listing = ctx.run_sandbox_ok(&["scenario", "list", "demo"]);
    assert!(listing.contains("auth/register_login"), "{listing}");

    let output = ctx.run_sandbox_ok(&[
        "scenario",
        "run",
        "demo",
        "auth/register_login",
        "--save-report",
    ]);
    assert!(output.contains("Started target"), "{output}");
    assert!(output.contains("Passed"), "{output}");

    // Started by this run, so stopped by it too
    assert!(!ctx.record_path().exists());

    let reports = ctx.reports();
    assert_eq!(reports.len(), 1);
    let report = read_json(&reports[0]);
    assert_eq!(report["project"], "demo");
    assert_eq!(report["result"]["ok"], true);

    let steps = report["result"]["steps"].as_array().unwrap();
    assert_eq!(steps[0]["status"], 201);
    assert_eq!(steps[1]["status"], 200);
    let first = &steps[0]["request"]["body"];
    let second = &steps[1]["request"]["body"];
    assert_eq!(first["email"], second["email"]);
    assert_eq!(first["password"], second["password"]);
    assert!(first["email"].as_str().unwrap().contains('@'));

    let context = &report["result"]["context"];
    assert_eq!(context["token"], "abc123");
    assert_eq!(second["auth"], "Bearer abc123");
    assert_eq!(context["auth"], "Bearer abc123");
    assert_eq!(context["authorization"], "Bearer abc123");
    assert_eq!(context["user_email"], first["email"]);
    assert!(steps[0]["body_file"].as_str().unwrap().ends_with("step_0_body.json"));
}

#[test]
fn test_failing_cli_step_exits_non_zero() {
    let ctx = TestContext::new("cli_exit_code");
    ctx.create_config();
    ctx.create_project();
    ctx.write_scenario(
        "broken.yaml",
        "steps:\n  - command: \"exit 3\"\n  - command: \"echo $GREETING\"\n",
    );

    let output = ctx.run_sandbox(&["scenario", "run", "demo", "broken", "--no-server"]);
    assert!(!output.success);
    assert!(output.stdout.contains("Failed"), "{}", output.stdout);
    assert!(
        output.stderr.contains("1 of 1 scenario(s) failed"),
        "{}",
        output.stderr
    );
    assert!(!ctx.record_path().exists());
}

#[test]
fn test_run_all_summarizes_results() {
    let ctx = TestContext::new("run_all");
    ctx.create_config();
    ctx.create_project();
    ctx.write_scenario("health.yaml", "steps:\n  - type: http\n    path: /health\n");
    ctx.write_scenario("missing.yaml", "steps:\n  - type: http\n    path: /nowhere\n");

    let output = ctx.run_sandbox(&["scenario", "run-all", "demo", "--save-reports"]);
    assert!(!output.success);
    assert!(output.stdout.contains("1 passed, 1 failed"), "{}", output.stdout);
    assert_eq!(ctx.reports().len(), 2);

    let group = ctx.run_sandbox(&["scenario", "run-group", "demo", "nope"]);
    assert!(!group.success);
    assert!(group.stderr.contains("Group 'nope' not found"), "{}", group.stderr);
}

#[test]
fn test_server_start_status_stop() {
    let ctx = TestContext::new("server_lifecycle");
    ctx.create_config();
    ctx.create_project();

    let started = ctx.run_sandbox_ok(&["server", "start", "demo"]);
    assert!(started.contains("running at http://127.0.0.1:"), "{started}");
    assert!(ctx.record_path().exists());

    let record = read_json(&ctx.record_path());
    assert!(record["pid"].as_u64().unwrap() > 0);
    assert!(record["baseUrl"].as_str().unwrap().starts_with("http://127.0.0.1:"));

    let status = ctx.run_sandbox_ok(&["server", "status", "demo"]);
    assert!(status.contains("running"), "{status}");

    // A second start reuses the live target
    let again = ctx.run_sandbox_ok(&["server", "start", "demo"]);
    assert!(again.contains("already running"), "{again}");

    ctx.run_sandbox_ok(&["server", "stop", "demo"]);
    assert!(!ctx.record_path().exists());

    let status = ctx.run_sandbox_ok(&["server", "status", "demo"]);
    assert!(status.contains("not running"), "{status}");

    // Stopping without a record is a no-op
    ctx.run_sandbox_ok(&["server", "stop", "demo"]);
}

#[tokio::test]
async fn test_library_run_against_managed_target() {
    let ctx = TestContext::new("library_run");
    let scenario_file = ctx.write_scenario("register_login.yaml", REGISTER_LOGIN);
    let scenario = load_file(&scenario_file).unwrap();

    let server = ServerConfig {
        command: vec![
            ctx.mock_bin.display().to_string(),
            "--host".into(),
            "{host}".into(),
            "--port".into(),
            "{port}".into(),
        ],
        poll_interval_ms: 50,
        ..ServerConfig::default()
    };
    let manager = TargetProcessManager::new(ctx.temp_dir.join("state"), server);
    let target = TargetSpec {
        name: "demo".into(),
        root: ctx.project_root.clone(),
        entry: None,
        command: None,
    };

    let (record, started) = manager
        .ensure_running(&target, Duration::from_secs(10))
        .await
        .unwrap();
    assert!(started);

    let orchestrator = Orchestrator::new(sandbox::runner::RunnerRegistry::with_defaults(
        &Default::default(),
    ));
    let context = Context::new().with("baseUrl", record.base_url.as_str());
    let result = orchestrator
        .run_scenario(&scenario, context, None)
        .await
        .unwrap();

    // Reusing the running target does not claim ownership
    let (_, started_again) = manager
        .ensure_running(&target, Duration::from_secs(10))
        .await
        .unwrap();
    assert!(!started_again);

    manager.stop(&target, Duration::from_secs(5)).await.unwrap();
    assert!(manager.status(&target).is_none());

    assert!(result.ok, "{:?}", result.steps);
    assert_eq!(result.context.get("auth").unwrap(), "Bearer abc123");
    assert_eq!(result.metrics.steps.count, 2);
    assert_eq!(result.metrics.steps.failed, 0);
}
