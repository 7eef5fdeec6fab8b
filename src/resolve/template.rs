//! `{{name}}` placeholder substitution

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

use crate::scenario::Context;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([^}]+)\}\}").expect("placeholder pattern is valid"));

/// Replace every `{{name}}` bound in `context`; unbound ones stay as written
pub fn substitute(text: &str, context: &Context) -> String {
    if !text.contains("{{") {
        return text.to_string();
    }
    PLACEHOLDER
        .replace_all(text, |caps: &Captures| {
            context
                .render(caps[1].trim())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Apply [`substitute`] to every string inside `value`; keys are left alone
pub fn substitute_value(value: &Value, context: &Context) -> Value {
    match value {
        Value::String(s) => Value::String(substitute(s, context)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| substitute_value(item, context))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_value(v, context)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Names of placeholders still present in `value`
pub fn unresolved(value: &Value) -> Vec<String> {
    let mut names = Vec::new();
    collect_unresolved(value, &mut names);
    names
}

fn collect_unresolved(value: &Value, names: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            for caps in PLACEHOLDER.captures_iter(s) {
                let name = caps[1].trim().to_string();
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_unresolved(v, names)),
        Value::Object(map) => map.values().for_each(|v| collect_unresolved(v, names)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_substitute_bound_names() {
        let ctx = Context::new().with("token", "abc123").with("id", 7);
        assert_eq!(substitute("Bearer {{token}}", &ctx), "Bearer abc123");
        assert_eq!(substitute("/users/{{ id }}/posts", &ctx), "/users/7/posts");
    }

    #[test]
    fn test_missing_placeholder_round_trips() {
        let ctx = Context::new();
        assert_eq!(substitute("{{missing}}", &ctx), "{{missing}}");
        let ctx = Context::new().with("nothing", Value::Null);
        assert_eq!(substitute("x={{nothing}}", &ctx), "x={{nothing}}");
    }

    #[test]
    fn test_substitute_nested_value() {
        let ctx = Context::new().with("email", "a@b.c").with("tags", json!(["x", "y"]));
        let input = json!({
            "user": {"email": "{{email}}", "age": 30},
            "list": ["{{email}}", "{{tags}}"],
            "{{email}}": true
        });
        let out = substitute_value(&input, &ctx);
        assert_eq!(
            out,
            json!({
                "user": {"email": "a@b.c", "age": 30},
                "list": ["a@b.c", r#"["x","y"]"#],
                "{{email}}": true
            })
        );
    }

    #[test]
    fn test_unresolved_names() {
        let value = json!({"a": "{{one}} and {{two}}", "b": ["{{one}}"]});
        assert_eq!(unresolved(&value), vec!["one".to_string(), "two".to_string()]);
    }
}
