//! CLI step runner
//!
//! Commands go through the platform shell with stderr folded into stdout.
//! Context `env` entries are set on the child only.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command as TokioCommand;
use tracing::debug;

use super::{effective_timeout, StepRunner};
use crate::scenario::result::{duration_ms, CliOutput};
use crate::scenario::{CliStep, Context, StepKind, StepOutput, StepResult};

pub struct CliRunner {
    default_timeout: Duration,
}

impl CliRunner {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    async fn run(&self, step: &CliStep, context: &Context) -> StepResult {
        let started = Instant::now();
        let timeout = effective_timeout(step.timeout.as_ref(), context, self.default_timeout);

        let mut command = shell_command(&step.command);
        command
            .envs(context.env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        debug!(command = %step.command, timeout_ms = timeout.as_millis() as u64, "Running command");

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return failed(started, None, format!("Failed to start shell: {e}"));
            }
        };
        let pid = child.id();

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                let exit_code = output.status.code();
                debug!(?exit_code, "Command finished");
                StepResult {
                    ok: output.status.success(),
                    duration_ms: duration_ms(started.elapsed()),
                    error: None,
                    output: Some(StepOutput::Cli(CliOutput {
                        exit_code,
                        stdout: text,
                    })),
                }
            }
            Ok(Err(e)) => failed(started, None, format!("Failed to wait for command: {e}")),
            Err(_) => {
                kill_group(pid);
                failed(
                    started,
                    None,
                    format!("Command timed out after {:.1}s", timeout.as_secs_f64()),
                )
            }
        }
    }
}

#[async_trait]
impl StepRunner for CliRunner {
    fn type_tag(&self) -> &'static str {
        "cli"
    }

    async fn execute(&self, step: &StepKind, context: &Context) -> StepResult {
        match step {
            StepKind::Cli(step) => self.run(step, context).await,
            other => StepResult::failure(format!(
                "cli runner cannot execute '{}' steps",
                other.type_tag()
            )),
        }
    }
}

fn failed(started: Instant, exit_code: Option<i32>, error: String) -> StepResult {
    StepResult {
        ok: false,
        duration_ms: duration_ms(started.elapsed()),
        error: Some(error),
        output: Some(StepOutput::Cli(CliOutput {
            exit_code,
            stdout: String::new(),
        })),
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> TokioCommand {
    let mut cmd = TokioCommand::new("sh");
    cmd.arg("-c").arg(format!("exec 2>&1\n{command}"));
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> TokioCommand {
    let mut cmd = TokioCommand::new("cmd");
    cmd.arg("/C").arg(format!("{command} 2>&1"));
    cmd
}

/// The shell runs in its own process group; take its children down with it
#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    if let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) {
        // SAFETY: signalling a process group we created
        unsafe {
            libc::kill(-pid, libc::SIGKILL);
        }
    }
}

#[cfg(windows)]
fn kill_group(_pid: Option<u32>) {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::scenario::context::ENV;
    use crate::scenario::Seconds;
    use serde_json::json;

    fn runner() -> CliRunner {
        CliRunner::new(Duration::from_secs(10))
    }

    fn cli(command: &str) -> StepKind {
        StepKind::Cli(CliStep {
            command: command.to_string(),
            timeout: None,
        })
    }

    #[tokio::test]
    async fn test_exit_code_is_reported() {
        let result = runner().execute(&cli("exit 3"), &Context::new()).await;
        assert!(!result.ok);
        assert_eq!(result.exit_code(), Some(3));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_combined_output() {
        let result = runner()
            .execute(&cli("echo out; echo err 1>&2"), &Context::new())
            .await;
        assert!(result.ok);
        assert_eq!(result.to_value()["stdout"], json!("out\nerr\n"));
    }

    #[tokio::test]
    async fn test_env_is_exported_to_child_only() {
        let ctx = Context::new().with(ENV, json!({"SANDBOX_GREETING": "hello"}));
        let result = runner()
            .execute(&cli("printf %s \"$SANDBOX_GREETING\""), &ctx)
            .await;
        assert_eq!(result.to_value()["stdout"], json!("hello"));
        assert!(std::env::var("SANDBOX_GREETING").is_err());
    }

    #[tokio::test]
    async fn test_timeout_kills_command() {
        let step = StepKind::Cli(CliStep {
            command: "sleep 30".to_string(),
            timeout: Some(Seconds::Value(0.3)),
        });
        let started = Instant::now();
        let result = runner().execute(&step, &Context::new()).await;
        assert!(!result.ok);
        assert_eq!(result.exit_code(), None);
        assert!(result.error.unwrap().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_wrong_step_kind() {
        let result = runner()
            .execute(&StepKind::Http(Default::default()), &Context::new())
            .await;
        assert!(!result.ok);
    }
}
