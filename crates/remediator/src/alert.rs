//! Inbound alert decoding.
//!
//! Alert payloads are owned by the alerting source (Falco, Falcosidekick, or
//! anything speaking the same JSON), so only the fields the policy needs are
//! pulled out. The full document is kept in [`AlertEvent::raw`] for audit
//! logging.

use serde_json::{Map, Value};

use crate::error::RemediationError;

/// Top-level field carrying the alert priority.
const PRIORITY_FIELD: &str = "priority";

/// Top-level field carrying the human-readable alert line.
const OUTPUT_FIELD: &str = "output";

/// A decoded alert.
#[derive(Debug, Clone)]
pub struct AlertEvent {
    /// Alert priority ("Critical", "Warning", ...), if present as a string
    pub priority: Option<String>,
    /// Rendered alert message, if present as a string
    pub output: Option<String>,
    /// Targeted resource, resolved from the configured field path
    pub resource_identifier: Option<String>,
    /// The complete payload
    pub raw: Value,
}

impl AlertEvent {
    /// Rule name reported by the source, for logging only.
    #[must_use]
    pub fn rule(&self) -> &str {
        self.raw
            .get("rule")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
    }
}

/// Decode a webhook body into an [`AlertEvent`].
///
/// Only a body that is not a JSON object is an error. Missing or mistyped
/// fields simply leave the corresponding attribute empty.
pub fn decode(body: &[u8], identifier_path: &str) -> Result<AlertEvent, RemediationError> {
    let raw: Value = serde_json::from_slice(body)
        .map_err(|e| RemediationError::MalformedPayload(e.to_string()))?;

    let Some(object) = raw.as_object() else {
        return Err(RemediationError::MalformedPayload(format!(
            "expected a JSON object, got {}",
            kind_of(&raw)
        )));
    };

    let priority = string_field(object, PRIORITY_FIELD);
    let output = string_field(object, OUTPUT_FIELD);
    let resource_identifier = lookup_path(&raw, identifier_path).map(str::to_string);

    Ok(AlertEvent {
        priority,
        output,
        resource_identifier,
        raw,
    })
}

/// Resolve a dotted path against a JSON tree.
///
/// Each step first tries the longest remaining dotted suffix as a literal key,
/// so `output_fields.k8s.pod.name` matches both
/// `{"output_fields": {"k8s.pod.name": "x"}}` and fully nested objects.
/// Returns `None` for missing keys, non-object intermediates, and non-string
/// leaves.
#[must_use]
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a str> {
    let segments: Vec<&str> = path.split('.').collect();
    resolve(value, &segments)
}

fn resolve<'a>(value: &'a Value, segments: &[&str]) -> Option<&'a str> {
    if segments.is_empty() {
        return value.as_str();
    }

    let object = value.as_object()?;
    (1..=segments.len()).rev().find_map(|take| {
        let key = segments[..take].join(".");
        object
            .get(&key)
            .and_then(|child| resolve(child, &segments[take..]))
    })
}

fn string_field(object: &Map<String, Value>, field: &str) -> Option<String> {
    object.get(field).and_then(Value::as_str).map(str::to_string)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
