//! HTTP step runner

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use indexmap::IndexMap;
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde_json::{Map, Value};
use tracing::debug;

use super::{effective_timeout, StepRunner};
use crate::scenario::result::{duration_ms, HeaderValue, HttpOutput, HttpRequestRecord};
use crate::scenario::{Context, HttpStep, StepKind, StepOutput, StepResult};

/// Used when the context carries no `baseUrl`
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1";

/// Sends one request per step
pub struct HttpRunner {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl HttpRunner {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            default_timeout,
        }
    }

    async fn send(&self, step: &HttpStep, context: &Context) -> StepResult {
        let started = Instant::now();
        let method_name = step.method.trim().to_ascii_uppercase();
        let base_url = context
            .base_url()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let url = join_url(&base_url, &step.path);
        let timeout = effective_timeout(step.timeout.as_ref(), context, self.default_timeout);

        let mut record = HttpRequestRecord {
            method: method_name.clone(),
            headers: step.headers.clone(),
            body: step.body.clone(),
        };

        let method = match Method::from_bytes(method_name.as_bytes()) {
            Ok(method) => method,
            Err(_) => {
                let error = format!("Invalid HTTP method '{}'", step.method);
                return transport_failure(url, record, error, started);
            }
        };

        let multipart = step.is_multipart();
        let mut request = self.client.request(method, &url).timeout(timeout);
        for (name, value) in &step.headers {
            if multipart && name.eq_ignore_ascii_case("content-type") {
                continue;
            }
            request = request.header(name.as_str(), value.as_str());
        }

        match &step.body {
            None | Some(Value::Null) => {}
            Some(body) if multipart => match build_form(body).await {
                Ok(form) => request = request.multipart(form),
                Err(error) => return transport_failure(url, record, error, started),
            },
            Some(body) => {
                let payload = match body {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                if step.content_type().is_none() {
                    request = request.header("Content-Type", "application/json");
                    record
                        .headers
                        .insert("Content-Type".to_string(), "application/json".to_string());
                }
                request = request.body(payload);
            }
        }

        debug!(method = %method_name, url = %url, timeout_ms = timeout.as_millis() as u64, "Sending request");

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let error = if e.is_timeout() {
                    format!("Request timed out after {:.1}s", timeout.as_secs_f64())
                } else {
                    format!("Request failed: {e}")
                };
                return transport_failure(url, record, error, started);
            }
        };

        let status = response.status().as_u16();
        let mut headers: IndexMap<String, HeaderValue> = IndexMap::new();
        for (name, value) in response.headers() {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            match headers.get_mut(name.as_str()) {
                Some(existing) => existing.push(value),
                None => {
                    headers.insert(name.as_str().to_string(), HeaderValue::Single(value));
                }
            }
        }
        let content_type = headers.get("content-type").map(|v| v.first().to_string());

        let (body, error) = match response.text().await {
            Ok(body) => (body, None),
            Err(e) => (String::new(), Some(format!("Failed to read response body: {e}"))),
        };
        let data = parse_payload(content_type.as_deref(), &body);
        let ok = (200..300).contains(&status) && error.is_none();

        debug!(status, ok, "Received response");

        StepResult {
            ok,
            duration_ms: duration_ms(started.elapsed()),
            error,
            output: Some(StepOutput::Http(HttpOutput {
                status,
                url,
                request: record,
                headers,
                body,
                data,
                body_file: None,
            })),
        }
    }
}

#[async_trait]
impl StepRunner for HttpRunner {
    fn type_tag(&self) -> &'static str {
        "http"
    }

    async fn execute(&self, step: &StepKind, context: &Context) -> StepResult {
        match step {
            StepKind::Http(step) => self.send(step, context).await,
            other => StepResult::failure(format!(
                "http runner cannot execute '{}' steps",
                other.type_tag()
            )),
        }
    }
}

/// `base` and `path` joined with exactly one slash
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn transport_failure(
    url: String,
    request: HttpRequestRecord,
    error: String,
    started: Instant,
) -> StepResult {
    debug!(url = %url, error = %error, "Request did not complete");
    StepResult {
        ok: false,
        duration_ms: duration_ms(started.elapsed()),
        error: Some(error),
        output: Some(StepOutput::Http(HttpOutput {
            status: 0,
            url,
            request,
            headers: IndexMap::new(),
            body: String::new(),
            data: None,
            body_file: None,
        })),
    }
}

/// Parsed JSON when the response says it is JSON or says nothing at all
fn parse_payload(content_type: Option<&str>, body: &str) -> Option<Value> {
    if body.trim().is_empty() {
        return None;
    }
    match content_type {
        Some(ct) if !ct.to_ascii_lowercase().contains("json") => None,
        _ => serde_json::from_str(body).ok(),
    }
}

/// Multipart form from an object body
///
/// Array values become repeated `name[]` parts. Objects with a `file` path
/// or a `base64` payload become file attachments.
async fn build_form(body: &Value) -> Result<Form, String> {
    let Value::Object(fields) = body else {
        return Err("Multipart body must be a mapping of field names to values".to_string());
    };

    let mut form = Form::new();
    for (name, value) in fields {
        match value {
            Value::Array(items) => {
                for item in items {
                    form = form.part(format!("{name}[]"), build_part(item).await?);
                }
            }
            other => form = form.part(name.clone(), build_part(other).await?),
        }
    }
    Ok(form)
}

async fn build_part(value: &Value) -> Result<Part, String> {
    match value {
        Value::Object(obj) if obj.contains_key("file") || obj.contains_key("base64") => {
            build_attachment(obj).await
        }
        Value::Null => Ok(Part::text("")),
        Value::String(s) => Ok(Part::text(s.clone())),
        other => Ok(Part::text(other.to_string())),
    }
}

async fn build_attachment(obj: &Map<String, Value>) -> Result<Part, String> {
    let (bytes, default_name) = if let Some(path) = obj.get("file").and_then(Value::as_str) {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| format!("Failed to read attachment '{path}': {e}"))?;
        let name = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());
        (bytes, name)
    } else {
        let payload = obj.get("base64").and_then(Value::as_str).unwrap_or_default();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| format!("Invalid base64 attachment: {e}"))?;
        (bytes, "upload.bin".to_string())
    };

    let file_name = obj
        .get("filename")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or(default_name);
    let mut part = Part::bytes(bytes).file_name(file_name);
    if let Some(content_type) = obj.get("content_type").and_then(Value::as_str) {
        part = part
            .mime_str(content_type)
            .map_err(|e| format!("Invalid attachment content type '{content_type}': {e}"))?;
    }
    Ok(part)
}
