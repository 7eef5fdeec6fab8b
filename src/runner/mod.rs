//! Step runners
//!
//! Each runner executes one kind of step and always answers with a
//! `StepResult`: transport errors, timeouts and bad exit codes become
//! `ok: false` rather than errors.

pub mod cli;
pub mod http;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::common::config::Timeouts;
use crate::scenario::{Context, Seconds, StepKind, StepResult};

pub use cli::CliRunner;
pub use http::HttpRunner;

/// Executor for one step type
#[async_trait]
pub trait StepRunner: Send + Sync {
    /// Tag of the steps this runner accepts
    fn type_tag(&self) -> &'static str;

    /// Run an already resolved step
    async fn execute(&self, step: &StepKind, context: &Context) -> StepResult;
}

/// Runners keyed by type tag
#[derive(Clone, Default)]
pub struct RunnerRegistry {
    runners: HashMap<String, Arc<dyn StepRunner>>,
}

impl RunnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// HTTP and CLI runners with the configured default timeouts
    pub fn with_defaults(timeouts: &Timeouts) -> Self {
        let mut registry = Self::new();
        registry.register(HttpRunner::new(Duration::from_secs(timeouts.http_step_secs)));
        registry.register(CliRunner::new(Duration::from_secs(timeouts.cli_step_secs)));
        registry
    }

    /// Add a runner, replacing any runner with the same tag
    pub fn register<R: StepRunner + 'static>(&mut self, runner: R) {
        self.runners
            .insert(runner.type_tag().to_string(), Arc::new(runner));
    }

    pub fn get(&self, type_tag: &str) -> Option<Arc<dyn StepRunner>> {
        self.runners.get(type_tag).cloned()
    }

    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.runners.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

/// Step timeout, then the context `timeout`, then the runner default
pub(crate) fn effective_timeout(
    step: Option<&Seconds>,
    context: &Context,
    default: Duration,
) -> Duration {
    step.and_then(Seconds::as_secs)
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .or_else(|| context.timeout_secs())
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .unwrap_or(default)
}
