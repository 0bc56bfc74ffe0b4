use crate::records::{ExtractedEdge, ExtractedNode};
use anyhow::{Context, Result};
use neo4rs::{Graph, Query};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info};

pub struct Neo4jIndexer {
    graph: Graph,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NodeRow {
    pub id: String,
    pub label: String,
    pub node_type: String,
    pub confidence: f64,
    pub attributes: Value,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EdgeRow {
    pub id: String,
    pub label: String,
    pub source: String,
    pub target: String,
    pub properties: Value,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct GraphSummary {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub node_types: BTreeMap<String, usize>,
    pub edge_types: BTreeMap<String, usize>,
}

impl GraphSummary {
    pub fn from_counts(node_counts: Vec<(String, i64)>, edge_counts: Vec<(String, i64)>) -> Self {
        let fold = |counts: Vec<(String, i64)>| -> BTreeMap<String, usize> {
            let mut map = BTreeMap::new();
            for (name, count) in counts {
                *map.entry(name).or_insert(0) += count.max(0) as usize;
            }
            map
        };
        let node_types = fold(node_counts);
        let edge_types = fold(edge_counts);
        Self {
            total_nodes: node_types.values().sum(),
            total_edges: edge_types.values().sum(),
            node_types,
            edge_types,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct UploadReport {
    pub nodes: usize,
    pub edges: usize,
}

/// Map attributes are stored as a JSON string property.
fn encode_attributes(attributes: &Map<String, Value>) -> String {
    serde_json::to_string(attributes).unwrap_or_else(|_| "{}".to_string())
}

fn decode_attributes(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::Object(Map::new()))
}

impl Neo4jIndexer {
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .with_context(|| format!("Failed to connect to Neo4j at {}", uri))?;
        Ok(Self::new(graph))
    }

    pub async fn ping(&self) -> Result<()> {
        self.graph.run(neo4rs::query("RETURN 1")).await.context("Neo4j ping failed")
    }

    /// Create lookup indexes on entity id and owning customer
    pub async fn init_schema(&self) -> Result<()> {
        let query = Query::new("CREATE INDEX entity_id_index IF NOT EXISTS FOR (e:Entity) ON (e.id)".to_string());
        self.graph.run(query).await
            .context("Failed to create index on Entity.id")?;

        let query = Query::new(
            "CREATE INDEX entity_customer_index IF NOT EXISTS FOR (e:Entity) ON (e.customer_id)".to_string(),
        );
        self.graph.run(query).await
            .context("Failed to create index on Entity.customer_id")?;

        info!("Neo4j indexes ready");
        Ok(())
    }

    pub async fn upsert_node(&self, node: &ExtractedNode) -> Result<()> {
        let query = Query::new(
            r#"
            MERGE (e:Entity {id: $id})
            SET e.customer_id = $customer_id,
                e.label = $label,
                e.node_type = $node_type,
                e.confidence = $confidence,
                e.source_file = $source_file,
                e.created_at = $created_at,
                e.attributes = $attributes
            "#.to_string(),
        )
        .param("id", node.id.clone())
        .param("customer_id", node.customer_id.clone())
        .param("label", node.label.clone())
        .param("node_type", node.node_type.clone())
        .param("confidence", node.confidence)
        .param("source_file", node.source_file.clone())
        .param("created_at", node.created_at.clone())
        .param("attributes", encode_attributes(&node.attributes));

        self.graph.run(query).await
            .with_context(|| format!("Failed to upsert node {}", node.id))
    }

    /// Both endpoints must already exist; otherwise nothing is created.
    pub async fn upsert_edge(&self, edge: &ExtractedEdge) -> Result<()> {
        let query = Query::new(
            r#"
            MATCH (source:Entity {id: $source_id})
            MATCH (target:Entity {id: $target_id})
            MERGE (source)-[r:RELATION {id: $id}]->(target)
            SET r.relationship_type = $relationship_type,
                r.weight = $weight,
                r.customer_id = $customer_id,
                r.attributes = $attributes
            "#.to_string(),
        )
        .param("id", edge.id.clone())
        .param("source_id", edge.source_node_id.clone())
        .param("target_id", edge.target_node_id.clone())
        .param("relationship_type", edge.relationship_type.clone())
        .param("weight", edge.weight)
        .param("customer_id", edge.customer_id.clone())
        .param("attributes", encode_attributes(&edge.attributes));

        self.graph.run(query).await
            .with_context(|| format!("Failed to upsert edge {}", edge.id))
    }

    /// Nodes first so edges can match their endpoints.
    pub async fn upload(&self, nodes: &[ExtractedNode], edges: &[ExtractedEdge]) -> Result<UploadReport> {
        for node in nodes {
            self.upsert_node(node).await?;
        }
        for edge in edges {
            self.upsert_edge(edge).await?;
        }
        info!(nodes = nodes.len(), edges = edges.len(), "Uploaded graph to Neo4j");
        Ok(UploadReport { nodes: nodes.len(), edges: edges.len() })
    }

    pub async fn query_nodes(&self, customer_id: &str, limit: usize) -> Result<Vec<NodeRow>> {
        let query = Query::new(
            r#"
            MATCH (e:Entity {customer_id: $customer_id})
            RETURN e.id AS id, e.label AS label, e.node_type AS node_type,
                   e.confidence AS confidence, e.attributes AS attributes
            LIMIT $limit
            "#.to_string(),
        )
        .param("customer_id", customer_id.to_string())
        .param("limit", limit as i64);

        let mut result = self.graph.execute(query).await
            .context("Failed to query nodes")?;
        let mut rows = Vec::new();
        while let Some(row) = result.next().await? {
            rows.push(NodeRow {
                id: row.get::<String>("id").unwrap_or_default(),
                label: row.get::<String>("label").unwrap_or_default(),
                node_type: row.get::<String>("node_type").unwrap_or_default(),
                confidence: row.get::<f64>("confidence").unwrap_or_default(),
                attributes: decode_attributes(&row.get::<String>("attributes").unwrap_or_default()),
            });
        }
        debug!(customer_id, count = rows.len(), "Queried nodes");
        Ok(rows)
    }

    /// Edges whose endpoints both belong to the customer.
    pub async fn query_edges(&self, customer_id: &str, limit: usize) -> Result<Vec<EdgeRow>> {
        let query = Query::new(
            r#"
            MATCH (s:Entity {customer_id: $customer_id})-[r:RELATION]->(t:Entity {customer_id: $customer_id})
            RETURN r.id AS id, r.relationship_type AS label, s.id AS source, t.id AS target,
                   r.weight AS weight, r.attributes AS attributes
            LIMIT $limit
            "#.to_string(),
        )
        .param("customer_id", customer_id.to_string())
        .param("limit", limit as i64);

        let mut result = self.graph.execute(query).await
            .context("Failed to query edges")?;
        let mut rows = Vec::new();
        while let Some(row) = result.next().await? {
            let mut properties = match decode_attributes(&row.get::<String>("attributes").unwrap_or_default()) {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            properties.insert("weight".into(), row.get::<f64>("weight").unwrap_or_default().into());
            rows.push(EdgeRow {
                id: row.get::<String>("id").unwrap_or_default(),
                label: row.get::<String>("label").unwrap_or_default(),
                source: row.get::<String>("source").unwrap_or_default(),
                target: row.get::<String>("target").unwrap_or_default(),
                properties: Value::Object(properties),
            });
        }
        debug!(customer_id, count = rows.len(), "Queried edges");
        Ok(rows)
    }

    async fn type_counts(&self, cypher: &str, customer_id: &str) -> Result<Vec<(String, i64)>> {
        let query = Query::new(cypher.to_string()).param("customer_id", customer_id.to_string());
        let mut result = self.graph.execute(query).await?;
        let mut counts = Vec::new();
        while let Some(row) = result.next().await? {
            counts.push((
                row.get::<String>("kind").unwrap_or_default(),
                row.get::<i64>("count").unwrap_or(0),
            ));
        }
        Ok(counts)
    }

    pub async fn summary(&self, customer_id: &str) -> Result<GraphSummary> {
        let nodes = self
            .type_counts(
                "MATCH (e:Entity {customer_id: $customer_id}) RETURN e.node_type AS kind, count(e) AS count",
                customer_id,
            )
            .await
            .context("Failed to count nodes")?;
        let edges = self
            .type_counts(
                "MATCH (:Entity {customer_id: $customer_id})-[r:RELATION]->(:Entity {customer_id: $customer_id}) \
                 RETURN r.relationship_type AS kind, count(r) AS count",
                customer_id,
            )
            .await
            .context("Failed to count edges")?;
        Ok(GraphSummary::from_counts(nodes, edges))
    }

    /// Totals across all customers
    pub async fn get_stats(&self) -> Result<GraphStats> {
        let entity_query = Query::new("MATCH (e:Entity) RETURN count(e) as count".to_string());
        let mut result = self.graph.execute(entity_query).await?;
        let entity_count = if let Some(row) = result.next().await? {
            row.get::<i64>("count").unwrap_or(0) as usize
        } else {
            0
        };

        let relation_query = Query::new("MATCH ()-[r:RELATION]->() RETURN count(r) as count".to_string());
        let mut result = self.graph.execute(relation_query).await?;
        let relation_count = if let Some(row) = result.next().await? {
            row.get::<i64>("count").unwrap_or(0) as usize
        } else {
            0
        };

        Ok(GraphStats {
            entity_count,
            relation_count,
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct GraphStats {
    pub entity_count: usize,
    pub relation_count: usize,
}
