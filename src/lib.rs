//! Scenario sandbox - a scenario-driven test harness
//!
//! Scenarios are ordered lists of HTTP and shell steps. Values flow between
//! steps through a shared context, synthetic test data is generated on
//! demand, and a local target server is started and stopped around runs.

pub mod cli;
pub mod commands;
pub mod common;
pub mod orchestrator;
pub mod project;
pub mod resolve;
pub mod runner;
pub mod scenario;
pub mod storage;
pub mod target;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use orchestrator::Orchestrator;
pub use resolve::VariableResolver;
pub use scenario::{Context, Scenario, ScenarioResult, Step, StepResult};
pub use target::{TargetProcessManager, TargetSpec};
