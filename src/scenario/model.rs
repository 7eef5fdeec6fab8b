//! Scenario and step configuration types
//!
//! Steps are decoded once, at load time, into a closed set of variants.
//! The `type` tag picks both the variant and the runner that executes it.

use indexmap::IndexMap;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tag assumed when a step omits `type`
pub const DEFAULT_STEP_TYPE: &str = "cli";

/// A named, ordered list of steps
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<Step>,
}

/// Shape of a scenario file on disk
#[derive(Deserialize, Debug)]
pub struct ScenarioFile {
    /// Overrides the file stem as the scenario name
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            description: None,
            steps,
        }
    }

    /// Build from a parsed file, falling back to `stem` for the name
    pub fn from_file(stem: &str, file: ScenarioFile) -> Self {
        Self {
            name: file.name.unwrap_or_else(|| stem.to_string()),
            description: file.description,
            steps: file.steps,
        }
    }
}

/// One unit of scenario execution
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub kind: StepKind,
    /// Output name -> dotted path into the step result
    pub extract: IndexMap<String, String>,
}

/// Runner-specific step configuration
#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    Http(HttpStep),
    Cli(CliStep),
    /// A tag no runner is known for; the raw fields are kept for resolution
    Unsupported { type_tag: String, config: Value },
}

impl Step {
    pub fn http(config: HttpStep) -> Self {
        Self {
            kind: StepKind::Http(config),
            extract: IndexMap::new(),
        }
    }

    pub fn cli(command: impl Into<String>) -> Self {
        Self {
            kind: StepKind::Cli(CliStep {
                command: command.into(),
                timeout: None,
            }),
            extract: IndexMap::new(),
        }
    }

    /// Attach an extraction rule
    pub fn extract(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.extract.insert(name.into(), path.into());
        self
    }

    /// The tag used to look up a runner
    pub fn type_tag(&self) -> &str {
        self.kind.type_tag()
    }
}

impl StepKind {
    pub fn type_tag(&self) -> &str {
        match self {
            StepKind::Http(_) => "http",
            StepKind::Cli(_) => "cli",
            StepKind::Unsupported { type_tag, .. } => type_tag,
        }
    }

    /// Configuration as a JSON tree, without the tag
    pub fn config(&self) -> serde_json::Result<Value> {
        match self {
            StepKind::Http(step) => serde_json::to_value(step),
            StepKind::Cli(step) => serde_json::to_value(step),
            StepKind::Unsupported { config, .. } => Ok(config.clone()),
        }
    }

    /// Rebuild a step of the same kind from a (resolved) configuration tree
    pub fn with_config(&self, config: Value) -> serde_json::Result<StepKind> {
        Ok(match self {
            StepKind::Http(_) => StepKind::Http(serde_json::from_value(config)?),
            StepKind::Cli(_) => StepKind::Cli(serde_json::from_value(config)?),
            StepKind::Unsupported { type_tag, .. } => StepKind::Unsupported {
                type_tag: type_tag.clone(),
                config,
            },
        })
    }
}

impl<'de> Deserialize<'de> for Step {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut fields = Map::<String, Value>::deserialize(deserializer)?;

        let type_tag = match fields.remove("type") {
            None | Some(Value::Null) => DEFAULT_STEP_TYPE.to_string(),
            Some(Value::String(tag)) => tag.trim().to_ascii_lowercase(),
            Some(other) => {
                return Err(de::Error::custom(format!(
                    "step 'type' must be a string, got {other}"
                )))
            }
        };

        let extract = match fields.remove("extract") {
            None | Some(Value::Null) => IndexMap::new(),
            Some(value) => serde_json::from_value(value)
                .map_err(|e| de::Error::custom(format!("invalid 'extract' map: {e}")))?,
        };

        let config = Value::Object(fields);
        let kind = match type_tag.as_str() {
            "http" => StepKind::Http(
                serde_json::from_value(config)
                    .map_err(|e| de::Error::custom(format!("invalid http step: {e}")))?,
            ),
            "cli" => StepKind::Cli(
                serde_json::from_value(config)
                    .map_err(|e| de::Error::custom(format!("invalid cli step: {e}")))?,
            ),
            _ => StepKind::Unsupported { type_tag, config },
        };

        Ok(Step { kind, extract })
    }
}

/// HTTP request step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpStep {
    #[serde(default = "default_method")]
    pub method: String,

    #[serde(default = "default_path")]
    pub path: String,

    #[serde(default, deserialize_with = "scalar_strings")]
    pub headers: IndexMap<String, String>,

    /// Object or array bodies are JSON encoded, strings are sent as-is
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// Per-step timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Seconds>,
}

impl Default for HttpStep {
    fn default() -> Self {
        Self {
            method: default_method(),
            path: default_path(),
            headers: IndexMap::new(),
            body: None,
            timeout: None,
        }
    }
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_path() -> String {
    "/".to_string()
}

impl HttpStep {
    /// Content type declared in headers, matched case-insensitively
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_multipart(&self) -> bool {
        self.content_type()
            .map(|ct| ct.to_ascii_lowercase().starts_with("multipart/"))
            .unwrap_or(false)
    }
}

/// Shell command step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliStep {
    #[serde(alias = "cmd", default)]
    pub command: String,

    /// Per-step timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Seconds>,
}

/// A duration in seconds as written in a scenario
///
/// Strings are kept verbatim so `{{name}}` templates survive loading; they
/// count only once they parse as a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Seconds {
    Value(f64),
    Raw(String),
}

impl Seconds {
    pub fn as_secs(&self) -> Option<f64> {
        match self {
            Seconds::Value(secs) => Some(*secs),
            Seconds::Raw(text) => text.trim().parse().ok(),
        }
    }
}

/// Map of scalars read as strings; numbers and booleans are stringified
fn scalar_strings<'de, D>(deserializer: D) -> Result<IndexMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<IndexMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    raw.into_iter()
        .map(|(name, value)| {
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => String::new(),
                other => {
                    return Err(de::Error::custom(format!(
                        "header '{name}' must be a scalar, got {other}"
                    )))
                }
            };
            Ok((name, text))
        })
        .collect()
}
