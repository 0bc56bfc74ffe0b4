//! Normalization of builder output into stored node and edge records.

use crate::error::ExtractionError;
use hypergraph::{EdgeType, NodeType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::warn;

pub const EXTRACTION_METHOD: &str = "hypergraph_builder";
const DEFAULT_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedNode {
    pub id: String,
    pub customer_id: String,
    pub label: String,
    pub node_type: String,
    pub confidence: f64,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    pub source_file: String,
    pub created_at: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedEdge {
    pub id: String,
    pub customer_id: String,
    pub source_node_id: String,
    pub target_node_id: String,
    pub relationship_type: String,
    pub weight: f64,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    pub source_file: String,
    pub created_at: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

fn hash16(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..8])
}

pub fn node_record_id(customer_id: &str, node_type: &str, content: &str) -> String {
    format!("node_{}", hash16(&format!("{}:{}:{}", customer_id, node_type, content)))
}

pub fn edge_record_id(customer_id: &str, source: &str, target: &str, edge_type: &str) -> String {
    format!("edge_{}", hash16(&format!("{}:{}:{}:{}", customer_id, source, target, edge_type)))
}

/// First string field present among `keys`.
fn first_str<'a>(item: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| item.get(*k).and_then(Value::as_str))
}

/// Numbers or numeric strings, clamped to [0, 1].
fn confidence_of(item: &Value, keys: &[&str]) -> f64 {
    let raw = keys.iter().find_map(|k| match item.get(*k) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    });
    raw.filter(|c| c.is_finite()).unwrap_or(DEFAULT_CONFIDENCE).clamp(0.0, 1.0)
}

fn normalize_node_type(raw: Option<&str>) -> String {
    raw.and_then(NodeType::parse).unwrap_or(NodeType::Concept).as_str().to_string()
}

fn normalize_edge_type(raw: Option<&str>) -> String {
    raw.and_then(EdgeType::parse).unwrap_or(EdgeType::RelatesTo).as_str().to_string()
}

fn object_field(item: &Value, key: &str) -> Option<Map<String, Value>> {
    item.get(key).and_then(Value::as_object).filter(|m| !m.is_empty()).cloned()
}

fn node_attributes(item: &Value) -> Map<String, Value> {
    let mut attributes = Map::new();
    if let Some(ts) = item.get("timestamp").filter(|v| !v.is_null()) {
        attributes.insert("original_timestamp".into(), ts.clone());
    }
    if let Some(source) = item.get("source").and_then(Value::as_str) {
        attributes.insert("extraction_source".into(), json!(source));
    }

    if let Some(scores) = object_field(item, "needs_classification") {
        let dominant = scores
            .iter()
            .filter_map(|(need, score)| score.as_f64().map(|s| (need.clone(), s)))
            .fold(None::<(String, f64)>, |best, (need, score)| match best {
                Some((_, b)) if b >= score => best,
                _ => Some((need, score)),
            });
        attributes.insert("needs_scores".into(), Value::Object(scores));
        if let Some((need, score)) = dominant {
            attributes.insert("dominant_need".into(), json!(need));
            attributes.insert("dominant_need_score".into(), json!(score));
        }
    }

    if let Some(properties) = object_field(item, "domain_specific_properties") {
        attributes.extend(properties);
    }
    attributes
}

fn edge_attributes(item: &Value) -> Map<String, Value> {
    let mut attributes = Map::new();
    if let Some(ts) = item.get("timestamp").filter(|v| !v.is_null()) {
        attributes.insert("original_timestamp".into(), ts.clone());
    }
    if let Some(evidence) = item.get("evidence").and_then(Value::as_array) {
        attributes.insert("evidence".into(), Value::Array(evidence.clone()));
        attributes.insert("evidence_count".into(), json!(evidence.len()));
    }
    if let Some(reasoning) = item.get("reasoning").and_then(Value::as_str).filter(|r| !r.is_empty()) {
        attributes.insert("reasoning".into(), json!(reasoning));
    }
    attributes
}

fn record_metadata(item: &Value, created_at: &str) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert(
        "original_metadata".into(),
        item.get("metadata").cloned().unwrap_or_else(|| json!({})),
    );
    metadata.insert("extraction_method".into(), json!(EXTRACTION_METHOD));
    metadata.insert("extraction_timestamp".into(), json!(created_at));
    metadata
}

/// Turns a hypergraph (builder or loose shape) into records for one customer.
pub struct HypergraphParser {
    customer_id: String,
    source_file: String,
    created_at: String,
}

impl HypergraphParser {
    pub fn new(customer_id: impl Into<String>, source_file: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            source_file: source_file.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn parse(&self, graph: &Value) -> Result<(Vec<ExtractedNode>, Vec<ExtractedEdge>), ExtractionError> {
        let node_items = graph
            .get("hypernodes")
            .or_else(|| graph.get("nodes"))
            .and_then(Value::as_array)
            .ok_or_else(|| ExtractionError::Parsing("hypergraph has no node list".to_string()))?;
        let edge_items = graph
            .get("hyperedges")
            .or_else(|| graph.get("edges"))
            .and_then(Value::as_array)
            .ok_or_else(|| ExtractionError::Parsing("hypergraph has no edge list".to_string()))?;

        let mut nodes: Vec<ExtractedNode> = Vec::with_capacity(node_items.len());
        // builder id, record id or lowercase label -> record id
        let mut resolve: HashMap<String, String> = HashMap::new();

        for (index, item) in node_items.iter().enumerate() {
            if !item.is_object() {
                warn!(index, "Skipping node that is not an object");
                continue;
            }
            let node = self.parse_node(item);
            if let Some(original) = first_str(item, &["id", "node_id"]) {
                resolve.entry(original.to_string()).or_insert_with(|| node.id.clone());
            }
            resolve.entry(node.id.clone()).or_insert_with(|| node.id.clone());
            resolve
                .entry(node.label.to_lowercase())
                .or_insert_with(|| node.id.clone());

            if nodes.iter().any(|n| n.id == node.id) {
                continue;
            }
            nodes.push(node);
        }

        let mut edges: Vec<ExtractedEdge> = Vec::with_capacity(edge_items.len());
        for (index, item) in edge_items.iter().enumerate() {
            let endpoint = |keys: &[&str]| {
                first_str(item, keys).and_then(|raw| {
                    resolve
                        .get(raw)
                        .or_else(|| resolve.get(&raw.to_lowercase()))
                        .cloned()
                })
            };
            let source = endpoint(&["source_node_id", "source", "source_id", "from"]);
            let target = endpoint(&["target_node_id", "target", "target_id", "to"]);

            let (Some(source), Some(target)) = (source, target) else {
                warn!(index, "Skipping edge with missing or unknown endpoint");
                continue;
            };

            let edge = self.parse_edge(item, source, target);
            if edges.iter().any(|e| e.id == edge.id) {
                continue;
            }
            edges.push(edge);
        }

        Ok((nodes, edges))
    }

    fn parse_node(&self, item: &Value) -> ExtractedNode {
        let content = first_str(item, &["content", "text", "label"]).unwrap_or_default();
        let node_type = normalize_node_type(first_str(item, &["node_type", "type"]));
        let id = node_record_id(&self.customer_id, &node_type, content);

        let label = match content.trim() {
            "" => format!("Node_{}", &id[..8]),
            trimmed => trimmed.to_string(),
        };

        ExtractedNode {
            customer_id: self.customer_id.clone(),
            label,
            node_type,
            confidence: confidence_of(item, &["confidence", "weight"]),
            attributes: node_attributes(item),
            source_file: self.source_file.clone(),
            created_at: self.created_at.clone(),
            metadata: record_metadata(item, &self.created_at),
            id,
        }
    }

    fn parse_edge(&self, item: &Value, source: String, target: String) -> ExtractedEdge {
        let relationship_type = normalize_edge_type(first_str(item, &["edge_type", "type", "relationship"]));

        ExtractedEdge {
            id: edge_record_id(&self.customer_id, &source, &target, &relationship_type),
            customer_id: self.customer_id.clone(),
            source_node_id: source,
            target_node_id: target,
            relationship_type,
            weight: confidence_of(item, &["confidence", "weight"]),
            attributes: edge_attributes(item),
            source_file: self.source_file.clone(),
            created_at: self.created_at.clone(),
            metadata: record_metadata(item, &self.created_at),
        }
    }
}
