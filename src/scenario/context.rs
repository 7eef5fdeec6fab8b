//! Run context threaded through a scenario
//!
//! Keys are only ever added or re-bound during a run, never removed.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Base URL for HTTP steps
pub const BASE_URL: &str = "baseUrl";
/// Locale for generated values
pub const LOCALE: &str = "locale";
/// Default step timeout in seconds
pub const TIMEOUT: &str = "timeout";
/// Object of environment variables for CLI steps
pub const ENV: &str = "env";

/// Ordered key/value store for one scenario run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    values: IndexMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Bind `key`, replacing any earlier value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn extend<I, K>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        for (key, value) in entries {
            self.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Template text for `key`; `None` when unbound or null
    pub fn render(&self, key: &str) -> Option<String> {
        self.values.get(key).and_then(stringify)
    }

    pub fn base_url(&self) -> Option<String> {
        self.render(BASE_URL)
    }

    pub fn locale(&self) -> Option<String> {
        self.render(LOCALE)
    }

    /// Timeout override in seconds, accepting numbers or numeric strings
    pub fn timeout_secs(&self) -> Option<f64> {
        match self.values.get(TIMEOUT)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
        .filter(|secs| *secs > 0.0)
    }

    /// Environment pairs exported to CLI steps
    pub fn env(&self) -> Vec<(String, String)> {
        match self.values.get(ENV) {
            Some(Value::Object(map)) => map
                .iter()
                .filter_map(|(key, value)| stringify(value).map(|v| (key.clone(), v)))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl From<IndexMap<String, Value>> for Context {
    fn from(values: IndexMap<String, Value>) -> Self {
        Self { values }
    }
}

/// Text form of a value as it appears inside a template
///
/// Strings are inserted bare, everything else as compact JSON.
pub fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_last_write_wins() {
        let mut ctx = Context::new().with("token", "a");
        ctx.insert("token", "b");
        assert_eq!(ctx.render("token").as_deref(), Some("b"));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_render_values() {
        let ctx = Context::new()
            .with("n", 42)
            .with("flag", true)
            .with("obj", json!({"a": 1}))
            .with("nothing", Value::Null);
        assert_eq!(ctx.render("n").as_deref(), Some("42"));
        assert_eq!(ctx.render("flag").as_deref(), Some("true"));
        assert_eq!(ctx.render("obj").as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(ctx.render("nothing"), None);
        assert_eq!(ctx.render("missing"), None);
    }

    #[test]
    fn test_well_known_keys() {
        let ctx = Context::new()
            .with(BASE_URL, "http://127.0.0.1:8080")
            .with(TIMEOUT, "2.5")
            .with(ENV, json!({"APP_ENV": "test", "DEBUG": 1, "SKIP": null}));
        assert_eq!(ctx.base_url().as_deref(), Some("http://127.0.0.1:8080"));
        assert_eq!(ctx.timeout_secs(), Some(2.5));
        assert_eq!(
            ctx.env(),
            vec![
                ("APP_ENV".to_string(), "test".to_string()),
                ("DEBUG".to_string(), "1".to_string())
            ]
        );
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let ctx = Context::new().with("a", 1).with("b", "x");
        assert_eq!(serde_json::to_value(&ctx).unwrap(), json!({"a": 1, "b": "x"}));
    }
}
