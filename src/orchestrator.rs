//! Scenario execution
//!
//! Steps run strictly in order. For each one the configuration is resolved
//! against the context, dispatched to the runner registered for its tag,
//! recorded, and (when it succeeded) mined for extractions that later steps
//! can reference. A failing step never stops the run.

use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info};

use crate::common::{Error, Result};
use crate::resolve::{template, VariableResolver};
use crate::runner::RunnerRegistry;
use crate::scenario::result::ScenarioMetrics;
use crate::scenario::{Context, Scenario, ScenarioResult, Step, StepKind, StepResult};

/// Called after every step with `(index, result, type_tag)`
pub type StepObserver<'a> = dyn FnMut(usize, &StepResult, &str) + Send + 'a;

pub struct Orchestrator {
    runners: RunnerRegistry,
}

impl Orchestrator {
    pub fn new(runners: RunnerRegistry) -> Self {
        Self { runners }
    }

    pub fn runners(&self) -> &RunnerRegistry {
        &self.runners
    }

    /// Run `scenario` with a fresh resolver for the context's locale
    pub async fn run_scenario(
        &self,
        scenario: &Scenario,
        initial: Context,
        observer: Option<&mut StepObserver<'_>>,
    ) -> Result<ScenarioResult> {
        let resolver = VariableResolver::for_locale(initial.locale().as_deref());
        self.run_with_resolver(scenario, initial, resolver, observer)
            .await
    }

    /// Run `scenario` with a caller-supplied resolver
    pub async fn run_with_resolver(
        &self,
        scenario: &Scenario,
        initial: Context,
        mut resolver: VariableResolver,
        mut observer: Option<&mut StepObserver<'_>>,
    ) -> Result<ScenarioResult> {
        validate(scenario)?;

        info!(scenario = %scenario.name, steps = scenario.steps.len(), "Running scenario");
        let started = Instant::now();
        let mut context = initial;
        let mut results = Vec::with_capacity(scenario.steps.len());

        for (index, step) in scenario.steps.iter().enumerate() {
            let type_tag = step.type_tag();

            let resolved = resolve_step(&mut resolver, &step.kind, &mut context);

            let result = match (resolved, self.runners.get(type_tag)) {
                (_, None) => StepResult::failure(format!("Unknown step type: {type_tag}")),
                (Err(error), Some(_)) => StepResult::failure(error),
                (Ok(kind), Some(runner)) => runner.execute(&kind, &context).await,
            };

            debug!(
                step = index,
                r#type = type_tag,
                ok = result.ok,
                duration_ms = result.duration_ms,
                "Step finished"
            );

            if result.ok {
                extract(step, &result, &mut context);
            }

            if let Some(observer) = observer.as_deref_mut() {
                observer(index, &result, type_tag);
            }
            results.push(result);
        }

        let ok = results.iter().all(|r| r.ok);
        let metrics = ScenarioMetrics::collect(&results, started.elapsed());
        info!(scenario = %scenario.name, ok, "Scenario finished");

        Ok(ScenarioResult {
            ok,
            steps: results,
            context,
            metrics,
        })
    }
}

/// Reject scenarios that cannot be run at all
pub fn validate(scenario: &Scenario) -> Result<()> {
    for (index, step) in scenario.steps.iter().enumerate() {
        let number = index + 1;
        match &step.kind {
            StepKind::Http(http) => {
                if http.method.trim().is_empty() {
                    return Err(Error::invalid_scenario(&scenario.name, number, "empty HTTP method"));
                }
                if http.path.trim().is_empty() {
                    return Err(Error::invalid_scenario(&scenario.name, number, "empty HTTP path"));
                }
            }
            StepKind::Cli(cli) => {
                if cli.command.trim().is_empty() {
                    return Err(Error::invalid_scenario(&scenario.name, number, "empty command"));
                }
            }
            StepKind::Unsupported { .. } => {}
        }

        for (name, path) in &step.extract {
            if name.trim().is_empty() || path.trim().is_empty() {
                return Err(Error::invalid_scenario(
                    &scenario.name,
                    number,
                    format!("extract entry '{name}: {path}' needs both a name and a path"),
                ));
            }
        }
    }
    Ok(())
}

/// Resolve one step, binding new synthetic values into `context` right away
fn resolve_step(
    resolver: &mut VariableResolver,
    kind: &StepKind,
    context: &mut Context,
) -> std::result::Result<StepKind, String> {
    let config = kind
        .config()
        .map_err(|e| format!("Failed to encode step configuration: {e}"))?;

    let resolution = resolver.resolve(&config, context);
    context.extend(
        resolution
            .new_bindings
            .into_iter()
            .map(|(key, value)| (key, Value::String(value))),
    );

    let unresolved = template::unresolved(&resolution.value);
    if !unresolved.is_empty() {
        debug!(?unresolved, "Step has unresolved placeholders");
    }

    kind.with_config(resolution.value)
        .map_err(|e| format!("Resolved step configuration is invalid: {e}"))
}

fn extract(step: &Step, result: &StepResult, context: &mut Context) {
    if step.extract.is_empty() {
        return;
    }
    let tree = result.to_value();
    for (name, path) in &step.extract {
        match lookup(&tree, path) {
            Some(value) if !value.is_null() => {
                debug!(name = %name, path = %path, "Extracted value");
                context.insert(name.clone(), value.clone());
            }
            _ => debug!(name = %name, path = %path, "Extraction path not found, skipping"),
        }
    }
}

/// Walk `value` by dot-separated keys; numeric segments index arrays
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    use crate::resolve::{Generator, Locale};
    use crate::runner::StepRunner;
    use crate::scenario::result::CliOutput;
    use crate::scenario::{CliStep, StepOutput};

    /// Echoes the resolved command back as output; `fail` prefixes fail
    struct EchoRunner {
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl StepRunner for EchoRunner {
        fn type_tag(&self) -> &'static str {
            "cli"
        }

        async fn execute(&self, step: &StepKind, _context: &Context) -> StepResult {
            let StepKind::Cli(CliStep { command, .. }) = step else {
                return StepResult::failure("not a cli step");
            };
            self.seen.lock().unwrap().push(command.clone());
            let ok = !command.starts_with("fail");
            StepResult {
                ok,
                duration_ms: 1,
                error: None,
                output: Some(StepOutput::Cli(CliOutput {
                    exit_code: Some(if ok { 0 } else { 1 }),
                    stdout: command.clone(),
                })),
            }
        }
    }

    fn orchestrator() -> (Orchestrator, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = RunnerRegistry::new();
        registry.register(EchoRunner { seen: seen.clone() });
        (Orchestrator::new(registry), seen)
    }

    fn seeded() -> VariableResolver {
        VariableResolver::new(Generator::with_seed(Locale::En, 3))
    }

    #[tokio::test]
    async fn test_zero_steps() {
        let (orch, _) = orchestrator();
        let initial = Context::new().with("baseUrl", "http://x");
        let result = orch
            .run_scenario(&Scenario::new("empty", vec![]), initial.clone(), None)
            .await
            .unwrap();
        assert!(result.ok);
        assert!(result.steps.is_empty());
        assert_eq!(result.context, initial);
        assert_eq!(result.metrics.steps.count, 0);
    }

    #[tokio::test]
    async fn test_extraction_feeds_later_steps() {
        let (orch, seen) = orchestrator();
        let scenario = Scenario::new(
            "chain",
            vec![
                Step::cli("first").extract("out", "stdout"),
                Step::cli("second {{out}}"),
                Step::cli("third {{out}} {{missing}}"),
            ],
        );
        let result = orch.run_scenario(&scenario, Context::new(), None).await.unwrap();

        assert!(result.ok);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["first", "second first", "third first {{missing}}"]
        );
        assert_eq!(result.context.get("out"), Some(&json!("first")));
    }

    #[tokio::test]
    async fn test_failed_step_does_not_extract_or_halt() {
        let (orch, seen) = orchestrator();
        let scenario = Scenario::new(
            "failing",
            vec![
                Step::cli("fail now").extract("out", "stdout"),
                Step::cli("after {{out}}"),
            ],
        );
        let result = orch.run_scenario(&scenario, Context::new(), None).await.unwrap();

        assert!(!result.ok);
        assert_eq!(result.steps.len(), 2);
        assert!(result.steps[1].ok);
        assert!(!result.context.contains_key("out"));
        assert_eq!(seen.lock().unwrap()[1], "after {{out}}");
    }

    #[tokio::test]
    async fn test_missing_extraction_path_is_skipped() {
        let (orch, _) = orchestrator();
        let scenario = Scenario::new(
            "paths",
            vec![Step::cli("x")
                .extract("code", "exit_code")
                .extract("nope", "data.token")
                .extract("err", "error")],
        );
        let result = orch.run_scenario(&scenario, Context::new(), None).await.unwrap();
        assert_eq!(result.context.get("code"), Some(&json!(0)));
        assert!(!result.context.contains_key("nope"));
        assert!(!result.context.contains_key("err"));
    }

    #[tokio::test]
    async fn test_unknown_type_fails_and_continues() {
        let (orch, seen) = orchestrator();
        let grpc = Step {
            kind: StepKind::Unsupported {
                type_tag: "grpc".into(),
                config: json!({"service": "generator.email:grpc_user"}),
            },
            extract: Default::default(),
        };
        let scenario = Scenario::new("mixed", vec![grpc, Step::cli("after {{grpc_user}}")]);

        let mut events = Vec::new();
        let mut observer = |index: usize, result: &StepResult, tag: &str| {
            events.push((index, result.ok, tag.to_string()));
        };
        let result = orch
            .run_with_resolver(&scenario, Context::new(), seeded(), Some(&mut observer))
            .await
            .unwrap();

        assert!(!result.ok);
        assert_eq!(result.steps[0].error.as_deref(), Some("Unknown step type: grpc"));
        assert!(result.steps[1].ok);
        assert_eq!(
            events,
            vec![(0, false, "grpc".to_string()), (1, true, "cli".to_string())]
        );
        // bindings from the unsupported step still land in the context
        let user = result.context.render("grpc_user").unwrap();
        assert_eq!(seen.lock().unwrap()[0], format!("after {user}"));
    }

    #[tokio::test]
    async fn test_binding_visible_in_same_and_later_steps() {
        let (orch, seen) = orchestrator();
        let scenario = Scenario::new(
            "bindings",
            vec![
                Step::cli("generator.password:pw"),
                Step::cli("password:pw"),
                Step::cli("echo {{pw}}"),
            ],
        );
        let result = orch
            .run_with_resolver(&scenario, Context::new(), seeded(), None)
            .await
            .unwrap();

        let pw = result.context.render("pw").unwrap();
        assert_ne!(pw, "generator.password:pw");
        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![pw.clone(), pw.clone(), format!("echo {pw}")]);
    }

    #[tokio::test]
    async fn test_invalid_scenario_aborts_before_running() {
        let (orch, seen) = orchestrator();
        let scenario = Scenario::new("bad", vec![Step::cli("ok"), Step::cli("  ")]);
        let err = orch
            .run_scenario(&scenario, Context::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidScenario { step: 2, .. }));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_lookup() {
        let value = json!({"data": {"items": [{"id": 7}], "token": null}});
        assert_eq!(lookup(&value, "data.items.0.id"), Some(&json!(7)));
        assert_eq!(lookup(&value, "data.items.1.id"), None);
        assert_eq!(lookup(&value, "data.token"), Some(&Value::Null));
        assert_eq!(lookup(&value, "data.items.x"), None);
    }
}
