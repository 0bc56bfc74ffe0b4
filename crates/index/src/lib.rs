//! Turns built hypergraphs into per-customer node and edge records, stores
//! them in an object store and optionally mirrors them into Neo4j.

pub mod envelope;
pub mod error;
pub mod neo4j_index;
pub mod records;
pub mod retry;
pub mod sanitize;
pub mod storage;

pub use envelope::unwrap_hypergraph;
pub use error::{ErrorCategory, ExtractionError, StorageError};
pub use neo4j_index::{GraphStats, GraphSummary, Neo4jIndexer};
pub use records::{ExtractedEdge, ExtractedNode, HypergraphParser};
pub use retry::RetryPolicy;
pub use sanitize::{sanitize_map, sanitize_message};
pub use storage::{ExtractionResult, GraphStorage, LocalObjectStore, ObjectStore};

use serde_json::{Value, json};
use tracing::{error, info};

pub fn extraction_id(unix_seconds: i64, execution_id: &str) -> String {
    let short: String = execution_id.chars().take(8).collect();
    format!("extraction_{}_{}", unix_seconds, short)
}

/// Parses an invocation event and stores the resulting records.
pub struct GraphExtractor {
    storage: GraphStorage,
}

impl GraphExtractor {
    pub fn new(storage: GraphStorage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &GraphStorage {
        &self.storage
    }

    pub async fn extract(&self, event: &Value) -> Result<ExtractionResult, ExtractionError> {
        let execution_id = envelope::execution_id(event);
        match self.run(event, &execution_id).await {
            Ok(result) => Ok(result),
            Err(e) => {
                let category = ErrorCategory::of(&e);
                error!(
                    execution_id = %execution_id,
                    category = category.as_str(),
                    retry = category.should_retry(),
                    alert = category.should_alert(),
                    error = %sanitize_message(&e.to_string()),
                    "Graph extraction failed"
                );
                Err(e)
            }
        }
    }

    async fn run(&self, event: &Value, execution_id: &str) -> Result<ExtractionResult, ExtractionError> {
        let customer_id = envelope::customer_id(event)?;
        let source_file = envelope::source_file(event);
        let graph = unwrap_hypergraph(event)
            .ok_or_else(|| ExtractionError::Validation("hypergraph data is required".to_string()))?;

        let (nodes, edges) = HypergraphParser::new(&customer_id, &source_file).parse(&graph)?;

        let now = chrono::Utc::now();
        let extraction_id = extraction_id(now.timestamp(), execution_id);
        let extraction_metadata = json!({
            "execution_id": execution_id,
            "extraction_timestamp": now.to_rfc3339(),
            "source_file": source_file,
            "nodes_extracted": nodes.len(),
            "edges_extracted": edges.len(),
            "hypergraph_metrics": graph.get("graph_metrics").cloned().unwrap_or_else(|| json!({})),
            "processing_metadata": graph.get("processing_metadata").cloned().unwrap_or_else(|| json!({})),
            "correlation_id": event.get("correlation_id").cloned().unwrap_or_else(|| json!(execution_id)),
        });

        let mut result = ExtractionResult {
            extraction_id,
            customer_id,
            extracted_nodes: nodes,
            extracted_edges: edges,
            location: None,
            extraction_metadata,
        };
        let location = self.storage.store(&result).await?;
        result.location = Some(location);

        info!(
            extraction_id = %result.extraction_id,
            customer_id = %result.customer_id,
            nodes = result.extracted_nodes.len(),
            edges = result.extracted_edges.len(),
            "Graph extraction complete"
        );
        Ok(result)
    }
}
