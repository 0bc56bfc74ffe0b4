use crate::candidates::{dedup_entities, dedup_relationships, CandidateEntity, CandidateRelationship};
use crate::cooccurrence::cooccurrence_relationships;
use crate::entities::{customer_fallback, file_entities, is_interview_format, llm_entities, needs_entities};
use crate::ids::{edge_id, node_id};
use crate::metrics::{graph_insights, graph_metrics};
use crate::relations::{rule_relationships, semantic_relationships};
use crate::schema::{HyperEdge, HyperNode, Hypergraph, NodeType, ProcessingMetadata};
use extract::{DisabledLlm, EntityMention, InterviewResult, KeyInsights, LlmClient};
use needs::NeedsAnalysis;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

/// Minimum entity count below which the customer is added as a fallback node.
const MIN_ENTITIES: usize = 3;

/// Everything the builder reads: interview-stage output plus optional needs analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildInput {
    pub file_path: String,
    pub customer_name: Option<String>,
    pub raw_text: String,
    pub entities: Vec<EntityMention>,
    pub key_insights: KeyInsights,
    pub needs: Option<NeedsAnalysis>,
}

impl BuildInput {
    pub fn from_interview(
        interview: &InterviewResult,
        customer_name: Option<String>,
        needs: Option<NeedsAnalysis>,
    ) -> Self {
        Self {
            file_path: interview.file_path.clone(),
            customer_name,
            raw_text: interview.raw_text.clone(),
            entities: interview.entities.clone(),
            key_insights: interview.key_insights.clone(),
            needs,
        }
    }

    pub fn customer(&self) -> Option<&str> {
        self.customer_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    pub fn is_interview_format(&self) -> bool {
        is_interview_format(&self.file_path, &self.raw_text)
    }
}

pub struct HypergraphBuilder {
    llm: Arc<dyn LlmClient>,
}

impl HypergraphBuilder {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Rule-based builder with no LLM calls.
    pub fn offline() -> Self {
        Self::new(Arc::new(DisabledLlm))
    }

    pub async fn extract_entities(&self, input: &BuildInput, interview_format: bool) -> (Vec<CandidateEntity>, usize) {
        let mut from_file = file_entities(input, interview_format);
        let from_llm = llm_entities(self.llm.as_ref(), &input.raw_text).await;
        let llm_count = from_llm.len();
        from_file.extend(from_llm);
        let from_file = dedup_entities(from_file);

        let from_needs = input
            .needs
            .as_ref()
            .map(|needs| dedup_entities(needs_entities(needs)))
            .unwrap_or_default();

        let mut entities = dedup_entities(from_file.into_iter().chain(from_needs).collect());

        if entities.len() < MIN_ENTITIES {
            if let Some(customer) = input.customer() {
                tracing::debug!(count = entities.len(), "Few entities found, adding customer");
                entities.push(customer_fallback(customer));
                entities = dedup_entities(entities);
            }
        }

        (entities, llm_count)
    }

    pub async fn extract_relationships(
        &self,
        entities: &[CandidateEntity],
        input: &BuildInput,
        interview_format: bool,
        metadata: &mut ProcessingMetadata,
    ) -> Vec<CandidateRelationship> {
        let dominant = input
            .needs
            .as_ref()
            .map(|n| n.dominant_needs.clone())
            .unwrap_or_default();

        let mut relationships = rule_relationships(entities, &dominant, interview_format);

        let cooccurring = cooccurrence_relationships(entities, &input.raw_text);
        metadata.cooccurrence_relationships = cooccurring.len();
        relationships.extend(cooccurring);

        let semantic = semantic_relationships(self.llm.as_ref(), entities, &input.raw_text).await;
        metadata.semantic_relationships = semantic.len();
        relationships.extend(semantic);

        dedup_relationships(relationships)
    }

    pub async fn build(&self, input: &BuildInput) -> Hypergraph {
        let start = Instant::now();
        let interview_format = input.is_interview_format();
        let mut metadata = ProcessingMetadata {
            interview_format,
            ..Default::default()
        };

        let (entities, llm_count) = self.extract_entities(input, interview_format).await;
        metadata.llm_entities = llm_count;

        let relationships = self
            .extract_relationships(&entities, input, interview_format, &mut metadata)
            .await;

        let timestamp = chrono::Utc::now().to_rfc3339();
        let source = if input.file_path.is_empty() {
            "unknown"
        } else {
            input.file_path.as_str()
        };

        let needs_scores: BTreeMap<String, f64> = input
            .needs
            .as_ref()
            .map(|n| n.needs_scores.iter().map(|(need, s)| (need.as_str().to_string(), s)).collect())
            .unwrap_or_default();

        let hypernodes = create_nodes(&entities, &timestamp, source, &needs_scores);
        let (hyperedges, dropped) = create_edges(&relationships, &hypernodes, &timestamp);
        metadata.dropped_relationships = dropped;

        let graph_metrics = graph_metrics(&hypernodes, &hyperedges);
        let graph_insights = graph_insights(&hypernodes, &hyperedges);

        tracing::info!(
            file = %input.file_path,
            nodes = hypernodes.len(),
            edges = hyperedges.len(),
            interview_format,
            quality = graph_insights.quality_score,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Built hypergraph"
        );

        Hypergraph {
            total_nodes: hypernodes.len(),
            total_edges: hyperedges.len(),
            hypernodes,
            hyperedges,
            graph_metrics,
            graph_insights,
            processing_metadata: metadata,
        }
    }
}

pub fn create_nodes(
    entities: &[CandidateEntity],
    timestamp: &str,
    source: &str,
    needs_scores: &BTreeMap<String, f64>,
) -> Vec<HyperNode> {
    let primary = entities
        .iter()
        .position(|e| e.entity_type == NodeType::Person && e.is_primary());

    entities
        .iter()
        .enumerate()
        .map(|(i, entity)| {
            let mut metadata = Map::new();
            metadata.insert("extraction_source".to_string(), json!(entity.source));
            metadata.insert("context".to_string(), json!(entity.context));
            metadata.insert("domain_relevance".to_string(), json!(entity.domain_relevance));

            HyperNode {
                id: node_id(&entity.text, entity.entity_type),
                content: entity.text.clone(),
                node_type: entity.entity_type,
                confidence: entity.confidence,
                timestamp: timestamp.to_string(),
                source: source.to_string(),
                metadata,
                needs_classification: if Some(i) == primary {
                    needs_scores.clone()
                } else {
                    BTreeMap::new()
                },
                domain_specific_properties: entity.properties.clone(),
            }
        })
        .collect()
}

/// Resolve relationship endpoints by node content. Returns the edges and the
/// number of relationships dropped because an endpoint has no node.
pub fn create_edges(
    relationships: &[CandidateRelationship],
    nodes: &[HyperNode],
    timestamp: &str,
) -> (Vec<HyperEdge>, usize) {
    let mut lookup: HashMap<String, &str> = HashMap::new();
    for node in nodes {
        lookup
            .entry(node.content.to_lowercase())
            .or_insert(node.id.as_str());
    }

    let mut edges = Vec::with_capacity(relationships.len());
    let mut dropped = 0;

    for rel in relationships {
        let endpoints = (
            lookup.get(&rel.source_entity.to_lowercase()),
            lookup.get(&rel.target_entity.to_lowercase()),
        );
        let (Some(&source_id), Some(&target_id)) = endpoints else {
            tracing::debug!(
                source = %rel.source_entity,
                target = %rel.target_entity,
                "Dropping relationship with unknown endpoint"
            );
            dropped += 1;
            continue;
        };

        let mut metadata = Map::new();
        metadata.insert("extraction_source".to_string(), Value::from(rel.source.as_str()));
        metadata.insert("relationship_strength".to_string(), Value::from(rel.confidence));

        edges.push(HyperEdge {
            id: edge_id(source_id, target_id, rel.relationship_type),
            source_node_id: source_id.to_string(),
            target_node_id: target_id.to_string(),
            edge_type: rel.relationship_type,
            confidence: rel.confidence,
            timestamp: timestamp.to_string(),
            metadata,
            evidence: rel.evidence.clone(),
            reasoning: rel.reasoning.clone(),
        });
    }

    (edges, dropped)
}
