//! Builds a typed knowledge graph of a person from interview and needs analysis output.
//!
//! Entities come from pattern matches, key insights, needs analysis and an
//! optional LLM pass. Relationships come from role rules, token proximity and
//! LLM pairwise checks. Node and edge ids are content hashes, so rebuilding
//! from the same input gives the same ids.

pub mod builder;
pub mod candidates;
pub mod cooccurrence;
pub mod entities;
pub mod ids;
pub mod metrics;
pub mod prompt;
pub mod relations;
pub mod schema;

pub use builder::{BuildInput, HypergraphBuilder};
pub use candidates::{CandidateEntity, CandidateRelationship};
pub use entities::is_interview_format;
pub use ids::{edge_id, node_id};
pub use schema::{
    EdgeType, GraphInsights, GraphMetrics, HyperEdge, HyperNode, Hypergraph, NodeType,
    ProcessingMetadata,
};

use anyhow::{Context, Result};
use std::path::Path;

/// Write a built graph as pretty JSON.
pub async fn save_hypergraph(graph: &Hypergraph, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(graph).context("Failed to serialize hypergraph")?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write hypergraph to {}", path.display()))
}

pub async fn load_hypergraph(path: &Path) -> Result<Hypergraph> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read hypergraph from {}", path.display()))?;
    serde_json::from_str(&json).context("Failed to parse hypergraph")
}
