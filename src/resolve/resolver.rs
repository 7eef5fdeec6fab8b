//! Two-phase resolution of step configuration
//!
//! Phase one substitutes `{{name}}` from the context. Phase two expands
//! synthetic directives:
//!
//! - `generator.<kind>` produces a fresh value of that kind
//! - `<spec>:<key>` produces a value once and replays it for every later
//!   reference to `key` in the same run
//! - `{"_generate": "object", "schema": {...}}` builds one object and
//!   `{"_generate": "array", "of": {...}, "count": N}` builds N of them
//!
//! Anything that does not match resolves to itself.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::synthetic::{Generator, GeneratorKind, Locale};
use super::template;
use crate::scenario::Context;

/// Reserved key marking a structured directive node
pub const DIRECTIVE_KEY: &str = "_generate";

/// Prefix of a generator directive
pub const GENERATOR_PREFIX: &str = "generator.";

/// Output of one resolution pass
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub value: Value,
    /// Bindings created by this pass, in creation order
    pub new_bindings: Vec<(String, String)>,
}

/// Per-run resolver: a generator plus the binding cache
pub struct VariableResolver {
    generator: Generator,
    bindings: IndexMap<String, String>,
}

impl VariableResolver {
    pub fn new(generator: Generator) -> Self {
        Self {
            generator,
            bindings: IndexMap::new(),
        }
    }

    /// Resolver with a fresh random source for `locale`
    pub fn for_locale(locale: Option<&str>) -> Self {
        Self::new(Generator::new(locale.map(Locale::parse).unwrap_or_default()))
    }

    /// Every binding created so far in this run
    pub fn bindings(&self) -> &IndexMap<String, String> {
        &self.bindings
    }

    /// Resolve `value` against `context`, reporting newly created bindings
    pub fn resolve(&mut self, value: &Value, context: &Context) -> Resolution {
        let before = self.bindings.len();
        let substituted = template::substitute_value(value, context);
        let value = self.expand(substituted);

        let new_bindings = self
            .bindings
            .iter()
            .skip(before)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Resolution {
            value,
            new_bindings,
        }
    }

    fn expand(&mut self, value: Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.resolve_string(&s)),
            Value::Array(items) => Value::Array(items.into_iter().map(|v| self.expand(v)).collect()),
            Value::Object(map) => self.expand_object(map),
            other => other,
        }
    }

    fn expand_object(&mut self, map: Map<String, Value>) -> Value {
        let directive = map
            .get(DIRECTIVE_KEY)
            .and_then(Value::as_str)
            .map(str::to_owned);
        match directive.as_deref() {
            Some("object") => self.build_object(map.get("schema")),
            Some("array") => {
                let count = directive_count(map.get("count"));
                let schema = map.get("of");
                Value::Array((0..count).map(|_| self.build_object(schema)).collect())
            }
            _ => Value::Object(map.into_iter().map(|(k, v)| (k, self.expand(v))).collect()),
        }
    }

    /// One object from a field schema; bare strings are generator kinds
    fn build_object(&mut self, schema: Option<&Value>) -> Value {
        let Some(Value::Object(fields)) = schema else {
            return Value::Object(Map::new());
        };

        let mut out = Map::new();
        for (field, spec) in fields {
            let value = match spec {
                Value::String(s) if s.starts_with(GENERATOR_PREFIX) => {
                    Value::String(self.resolve_string(s))
                }
                Value::String(s) => {
                    Value::String(self.resolve_string(&format!("{GENERATOR_PREFIX}{s}")))
                }
                other => self.expand(other.clone()),
            };
            out.insert(field.clone(), value);
        }
        Value::Object(out)
    }

    fn resolve_string(&mut self, text: &str) -> String {
        if let Some((spec, key)) = text.split_once(':') {
            if let Some(cached) = self.bindings.get(key) {
                return cached.clone();
            }
            if let Some(generated) = self.generate_spec(spec) {
                if !key.is_empty() {
                    tracing::debug!(binding = key, "Created binding");
                    self.bindings.insert(key.to_string(), generated.clone());
                }
                return generated;
            }
        }

        self.generate_directive(text)
            .unwrap_or_else(|| text.to_string())
    }

    /// A `generator.*` directive or a shorthand word
    fn generate_spec(&mut self, spec: &str) -> Option<String> {
        self.generate_directive(spec).or_else(|| {
            GeneratorKind::shorthand(spec).map(|kind| self.generator.generate(kind))
        })
    }

    fn generate_directive(&mut self, text: &str) -> Option<String> {
        let raw_kind = text.strip_prefix(GENERATOR_PREFIX)?;
        match GeneratorKind::parse(raw_kind) {
            Some(kind) => Some(self.generator.generate(kind)),
            None => {
                tracing::debug!(kind = raw_kind, "Unknown generator kind, keeping literal");
                None
            }
        }
    }
}

fn directive_count(value: Option<&Value>) -> usize {
    let count = match value {
        None | Some(Value::Null) => 1,
        Some(Value::Number(n)) => n.as_i64().unwrap_or(1),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(1),
        Some(_) => 1,
    };
    usize::try_from(count.max(0)).unwrap_or(0)
}
