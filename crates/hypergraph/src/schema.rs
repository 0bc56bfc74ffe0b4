use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Person,
    Organization,
    Concept,
    Skill,
    Need,
    BehavioralPattern,
    PersonalityTrait,
    FinancialInstrument,
    BusinessConcept,
    Topic,
}

impl NodeType {
    pub const ALL: [NodeType; 10] = [
        NodeType::Person,
        NodeType::Organization,
        NodeType::Concept,
        NodeType::Skill,
        NodeType::Need,
        NodeType::BehavioralPattern,
        NodeType::PersonalityTrait,
        NodeType::FinancialInstrument,
        NodeType::BusinessConcept,
        NodeType::Topic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Person => "person",
            NodeType::Organization => "organization",
            NodeType::Concept => "concept",
            NodeType::Skill => "skill",
            NodeType::Need => "need",
            NodeType::BehavioralPattern => "behavioral_pattern",
            NodeType::PersonalityTrait => "personality_trait",
            NodeType::FinancialInstrument => "financial_instrument",
            NodeType::BusinessConcept => "business_concept",
            NodeType::Topic => "topic",
        }
    }

    /// Case-insensitive; accepts `snake_case` and `SCREAMING_CASE` names.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Demonstrates,
    RelatesTo,
    Influences,
    Requires,
    Enables,
    PartOf,
    SimilarTo,
    WorksWith,
    SpecializesIn,
    Interviews,
    Discusses,
    AffiliatedWith,
    Uses,
}

impl EdgeType {
    pub const ALL: [EdgeType; 13] = [
        EdgeType::Demonstrates,
        EdgeType::RelatesTo,
        EdgeType::Influences,
        EdgeType::Requires,
        EdgeType::Enables,
        EdgeType::PartOf,
        EdgeType::SimilarTo,
        EdgeType::WorksWith,
        EdgeType::SpecializesIn,
        EdgeType::Interviews,
        EdgeType::Discusses,
        EdgeType::AffiliatedWith,
        EdgeType::Uses,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Demonstrates => "demonstrates",
            EdgeType::RelatesTo => "relates_to",
            EdgeType::Influences => "influences",
            EdgeType::Requires => "requires",
            EdgeType::Enables => "enables",
            EdgeType::PartOf => "part_of",
            EdgeType::SimilarTo => "similar_to",
            EdgeType::WorksWith => "works_with",
            EdgeType::SpecializesIn => "specializes_in",
            EdgeType::Interviews => "interviews",
            EdgeType::Discusses => "discusses",
            EdgeType::AffiliatedWith => "affiliated_with",
            EdgeType::Uses => "uses",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HyperNode {
    pub id: String,
    pub content: String,
    pub node_type: NodeType,
    pub confidence: f64,
    pub timestamp: String,
    pub source: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Per-need scores; only the primary person carries them
    #[serde(default)]
    pub needs_classification: BTreeMap<String, f64>,
    #[serde(default)]
    pub domain_specific_properties: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HyperEdge {
    pub id: String,
    pub source_node_id: String,
    pub target_node_id: String,
    pub edge_type: EdgeType,
    pub confidence: f64,
    pub timestamp: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphMetrics {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub node_type_distribution: BTreeMap<String, usize>,
    pub edge_type_distribution: BTreeMap<String, usize>,
    pub average_confidence: f64,
    pub relationship_diversity: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphInsights {
    pub central_entities: Vec<String>,
    pub graph_density: f64,
    /// `none` for a graph without edges
    pub most_common_relationship: String,
    pub entity_diversity: usize,
    pub quality_score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProcessingMetadata {
    pub interview_format: bool,
    pub llm_entities: usize,
    pub semantic_relationships: usize,
    pub cooccurrence_relationships: usize,
    pub dropped_relationships: usize,
}

/// Builder output: typed nodes and binary edges plus summary statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Hypergraph {
    pub hypernodes: Vec<HyperNode>,
    pub hyperedges: Vec<HyperEdge>,
    pub graph_metrics: GraphMetrics,
    pub graph_insights: GraphInsights,
    pub total_nodes: usize,
    pub total_edges: usize,
    #[serde(default)]
    pub processing_metadata: ProcessingMetadata,
}

impl Hypergraph {
    pub fn node(&self, id: &str) -> Option<&HyperNode> {
        self.hypernodes.iter().find(|n| n.id == id)
    }

    pub fn nodes_of(&self, node_type: NodeType) -> impl Iterator<Item = &HyperNode> {
        self.hypernodes.iter().filter(move |n| n.node_type == node_type)
    }

    pub fn edges_of(&self, edge_type: EdgeType) -> impl Iterator<Item = &HyperEdge> {
        self.hyperedges.iter().filter(move |e| e.edge_type == edge_type)
    }
}
