use crate::schema::{EdgeType, NodeType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

pub const SOURCE_FILE_ANALYSIS: &str = "file_analysis";
pub const SOURCE_NEEDS_ANALYSIS: &str = "needs_analysis";
pub const SOURCE_METADATA: &str = "metadata";
pub const SOURCE_INTERVIEW: &str = "interview_analysis";
pub const SOURCE_COOCCURRENCE: &str = "cooccurrence";
pub const SOURCE_LLM_SEMANTIC: &str = "llm_semantic";

/// An entity proposed for the graph, before it becomes a node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateEntity {
    pub text: String,
    pub entity_type: NodeType,
    pub confidence: f64,
    pub context: String,
    pub source: String,
    pub properties: Map<String, Value>,
    pub domain_relevance: f64,
}

impl CandidateEntity {
    pub fn new(text: impl Into<String>, entity_type: NodeType, confidence: f64, source: &str) -> Self {
        Self {
            text: text.into(),
            entity_type,
            confidence: confidence.clamp(0.0, 1.0),
            context: String::new(),
            source: source.to_string(),
            properties: Map::new(),
            domain_relevance: 0.8,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_relevance(mut self, domain_relevance: f64) -> Self {
        self.domain_relevance = domain_relevance;
        self
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    pub fn is_primary(&self) -> bool {
        self.properties
            .get("primary")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn category(&self) -> Option<&str> {
        self.property("category")
    }

    pub fn key(&self) -> (String, NodeType) {
        (self.text.to_lowercase(), self.entity_type)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateRelationship {
    pub source_entity: String,
    pub target_entity: String,
    pub relationship_type: EdgeType,
    pub confidence: f64,
    pub evidence: Vec<String>,
    pub reasoning: String,
    pub source: String,
}

impl CandidateRelationship {
    pub fn new(
        source_entity: &str,
        target_entity: &str,
        relationship_type: EdgeType,
        confidence: f64,
        source: &str,
    ) -> Self {
        Self {
            source_entity: source_entity.to_string(),
            target_entity: target_entity.to_string(),
            relationship_type,
            confidence: confidence.clamp(0.0, 1.0),
            evidence: Vec::new(),
            reasoning: String::new(),
            source: source.to_string(),
        }
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence.push(evidence.into());
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn key(&self) -> (String, String, EdgeType) {
        (
            self.source_entity.to_lowercase(),
            self.target_entity.to_lowercase(),
            self.relationship_type,
        )
    }
}

/// Keep one item per key: the slot of the first occurrence, holding the
/// highest-confidence version.
fn dedup_by_key<T, K>(items: Vec<T>, key: impl Fn(&T) -> K, confidence: impl Fn(&T) -> f64) -> Vec<T>
where
    K: std::hash::Hash + Eq,
{
    let mut slots: HashMap<K, usize> = HashMap::new();
    let mut kept: Vec<T> = Vec::with_capacity(items.len());

    for item in items {
        match slots.get(&key(&item)) {
            Some(&idx) => {
                if confidence(&item) > confidence(&kept[idx]) {
                    kept[idx] = item;
                }
            }
            None => {
                slots.insert(key(&item), kept.len());
                kept.push(item);
            }
        }
    }

    kept
}

pub fn dedup_entities(entities: Vec<CandidateEntity>) -> Vec<CandidateEntity> {
    dedup_by_key(entities, CandidateEntity::key, |e| e.confidence)
}

pub fn dedup_relationships(relationships: Vec<CandidateRelationship>) -> Vec<CandidateRelationship> {
    dedup_by_key(relationships, CandidateRelationship::key, |r| r.confidence)
}
