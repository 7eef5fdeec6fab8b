//! Scenario data model, run context and results

pub mod context;
pub mod loader;
pub mod model;
pub mod result;

pub use context::Context;
pub use loader::{CatalogEntry, GroupSummary, ScenarioCatalog};
pub use model::{CliStep, HttpStep, Scenario, Seconds, Step, StepKind};
pub use result::{ScenarioResult, StepOutput, StepResult};
