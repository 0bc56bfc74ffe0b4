//! Locating the hypergraph and request fields inside an invocation event.
//!
//! Upstream steps hand the graph over in several wrappings: bare, under
//! `result`, or inside a function response whose `body` may itself be a
//! JSON string.

use crate::error::ExtractionError;
use serde_json::Value;

pub const UNKNOWN_FILE: &str = "unknown_file";

fn has_graph(value: &Value) -> bool {
    let has = |key: &str| value.get(key).is_some();
    (has("hypernodes") && has("hyperedges")) || (has("nodes") && has("edges"))
}

/// Objects pass through; strings are parsed as JSON.
fn decode(value: &Value) -> Option<Value> {
    match value {
        Value::Object(_) => Some(value.clone()),
        Value::String(s) => serde_json::from_str::<Value>(s).ok().filter(Value::is_object),
        _ => None,
    }
}

fn graph_from_body(body: &Value) -> Option<Value> {
    let body = decode(body)?;
    if let Some(result) = body.get("result").filter(|r| has_graph(r)) {
        return Some(result.clone());
    }
    has_graph(&body).then_some(body)
}

fn graph_from_result(result: &Value) -> Option<Value> {
    if has_graph(result) {
        return Some(result.clone());
    }
    if let Some(body) = result.get("Payload").and_then(|p| p.get("body")) {
        if let Some(graph) = graph_from_body(body) {
            return Some(graph);
        }
    }
    if let Some(body) = result.get("body") {
        if let Some(graph) = graph_from_body(body) {
            return Some(graph);
        }
    }
    result.get("result").filter(|r| has_graph(r)).cloned()
}

/// The hypergraph carried by `event`, if any wrapping holds one.
pub fn unwrap_hypergraph(event: &Value) -> Option<Value> {
    if has_graph(event) {
        return Some(event.clone());
    }
    let result = decode(event.get("result")?)?;
    graph_from_result(&result)
}

fn non_empty_str<'a>(value: Option<&'a Value>) -> Option<&'a str> {
    value.and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty())
}

pub fn customer_id(event: &Value) -> Result<String, ExtractionError> {
    if let Some(id) = non_empty_str(event.get("customer_id")) {
        return Ok(id.to_string());
    }
    if let Some(id) = non_empty_str(event.pointer("/agent_spec/processing_config/customer_id")) {
        return Ok(id.to_string());
    }
    if let Some(folder) = non_empty_str(event.get("customer_folder")) {
        let id = folder.replace('/', "");
        if !id.is_empty() {
            return Ok(id);
        }
    }
    Err(ExtractionError::Validation("customer_id is required".to_string()))
}

pub fn source_file(event: &Value) -> String {
    non_empty_str(event.get("source_file"))
        .or_else(|| non_empty_str(event.pointer("/agent_spec/processing_config/file_path")))
        .unwrap_or(UNKNOWN_FILE)
        .to_string()
}

/// Caller-supplied execution id, or a fresh one.
pub fn execution_id(event: &Value) -> String {
    non_empty_str(event.get("execution_id"))
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}
