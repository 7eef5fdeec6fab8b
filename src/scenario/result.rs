//! Step and scenario results
//!
//! A `StepResult` serializes to one flat JSON object: the common fields
//! plus the runner payload. Extraction paths walk that object.

use std::time::Duration;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use super::context::Context;

/// Outcome of one step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    pub ok: bool,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub output: Option<StepOutput>,
}

/// Runner-specific payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StepOutput {
    Http(HttpOutput),
    Cli(CliOutput),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpOutput {
    /// Response status, 0 when no response arrived
    pub status: u16,
    pub url: String,
    pub request: HttpRequestRecord,
    pub headers: IndexMap<String, HeaderValue>,
    /// Raw response text
    pub body: String,
    /// Parsed JSON payload
    pub data: Option<Value>,
    /// Side file holding the body, set by run storage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_file: Option<String>,
}

/// What was sent
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct HttpRequestRecord {
    pub method: String,
    pub headers: IndexMap<String, String>,
    pub body: Option<Value>,
}

/// A response header seen once or several times
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Single(String),
    Multiple(Vec<String>),
}

impl HeaderValue {
    /// Add another occurrence, promoting to a list
    pub fn push(&mut self, value: String) {
        match self {
            HeaderValue::Single(first) => {
                *self = HeaderValue::Multiple(vec![std::mem::take(first), value]);
            }
            HeaderValue::Multiple(values) => values.push(value),
        }
    }

    pub fn first(&self) -> &str {
        match self {
            HeaderValue::Single(value) => value,
            HeaderValue::Multiple(values) => values.first().map(String::as_str).unwrap_or(""),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CliOutput {
    /// Missing when the process was killed
    pub exit_code: Option<i32>,
    /// Combined stdout and stderr
    pub stdout: String,
}

impl StepResult {
    /// A failed step that never produced a runner payload
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            duration_ms: 0,
            error: Some(error.into()),
            output: None,
        }
    }

    pub fn http_status(&self) -> Option<u16> {
        match &self.output {
            Some(StepOutput::Http(http)) => Some(http.status),
            _ => None,
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match &self.output {
            Some(StepOutput::Cli(cli)) => cli.exit_code,
            _ => None,
        }
    }

    /// The result as the JSON object extraction paths are evaluated against
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

pub fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Aggregate outcome of a scenario run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioResult {
    pub ok: bool,
    pub steps: Vec<StepResult>,
    pub context: Context,
    pub metrics: ScenarioMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct ScenarioMetrics {
    pub total_duration_seconds: f64,
    pub steps: StepMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct StepMetrics {
    pub count: usize,
    pub successful: usize,
    pub failed: usize,
    pub average_duration_ms: f64,
}

impl ScenarioMetrics {
    pub fn collect(steps: &[StepResult], elapsed: Duration) -> Self {
        let count = steps.len();
        let successful = steps.iter().filter(|s| s.ok).count();
        let total_ms: u64 = steps.iter().map(|s| s.duration_ms).sum();
        let average_duration_ms = if count == 0 {
            0.0
        } else {
            round2(total_ms as f64 / count as f64)
        };

        Self {
            total_duration_seconds: round2(elapsed.as_secs_f64()),
            steps: StepMetrics {
                count,
                successful,
                failed: count - successful,
                average_duration_ms,
            },
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
