//! Redaction of personal data and credentials before anything reaches a log.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

pub const REDACTED: &str = "[REDACTED]";

const SENSITIVE_KEY_PARTS: [&str; 6] = ["password", "secret", "key", "token", "credential", "auth"];

static PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
        r"\b\d{3}-\d{2}-\d{4}\b",
        r"\b\d{4}[\s-]?\d{4}[\s-]?\d{4}[\s-]?\d{4}\b",
        r"(?i)\b(?:password|pwd|secret|key|token)[\s=:]+\S+\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid redaction pattern"))
    .collect()
});

/// Replace emails, SSNs, card numbers and inline credentials.
pub fn sanitize_message(message: &str) -> String {
    PATTERNS.iter().fold(message.to_string(), |text, pattern| {
        pattern.replace_all(&text, REDACTED).into_owned()
    })
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_lowercase();
    SENSITIVE_KEY_PARTS.iter().any(|part| key.contains(part))
}

fn sanitize_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_message(s)),
        Value::Object(map) => Value::Object(sanitize_map(map)),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_value).collect()),
        other => other.clone(),
    }
}

/// Copy of `map` with sensitive keys blanked and string values scrubbed.
pub fn sanitize_map(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| {
            let value = if is_sensitive_key(key) {
                Value::String(REDACTED.to_string())
            } else {
                sanitize_value(value)
            };
            (key.clone(), value)
        })
        .collect()
}
