use crate::schema::{EdgeType, GraphInsights, GraphMetrics, HyperEdge, HyperNode};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet, HashMap};

const CENTRAL_ENTITY_COUNT: usize = 3;

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

pub fn graph_metrics(nodes: &[HyperNode], edges: &[HyperEdge]) -> GraphMetrics {
    let mut node_type_distribution = BTreeMap::new();
    for node in nodes {
        *node_type_distribution
            .entry(node.node_type.as_str().to_string())
            .or_insert(0) += 1;
    }

    let mut edge_type_distribution = BTreeMap::new();
    for edge in edges {
        *edge_type_distribution
            .entry(edge.edge_type.as_str().to_string())
            .or_insert(0) += 1;
    }

    GraphMetrics {
        total_nodes: nodes.len(),
        total_edges: edges.len(),
        relationship_diversity: edge_type_distribution.len(),
        node_type_distribution,
        edge_type_distribution,
        average_confidence: mean(nodes.iter().map(|n| n.confidence)),
    }
}

/// Node degrees (in + out), in node order.
pub fn degrees(nodes: &[HyperNode], edges: &[HyperEdge]) -> Vec<usize> {
    let mut graph: DiGraph<(), ()> = DiGraph::with_capacity(nodes.len(), edges.len());
    let index: HashMap<&str, NodeIndex> = nodes
        .iter()
        .map(|n| (n.id.as_str(), graph.add_node(())))
        .collect();

    for edge in edges {
        if let (Some(&s), Some(&t)) = (
            index.get(edge.source_node_id.as_str()),
            index.get(edge.target_node_id.as_str()),
        ) {
            graph.add_edge(s, t, ());
        }
    }

    graph
        .node_indices()
        .map(|i| {
            graph.edges_directed(i, Direction::Outgoing).count()
                + graph.edges_directed(i, Direction::Incoming).count()
        })
        .collect()
}

/// Content of the most connected nodes; ties keep node order.
pub fn central_entities(nodes: &[HyperNode], edges: &[HyperEdge]) -> Vec<String> {
    let mut ranked: Vec<(usize, &HyperNode)> = degrees(nodes, edges)
        .into_iter()
        .zip(nodes)
        .filter(|(degree, _)| *degree > 0)
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0));

    ranked
        .into_iter()
        .take(CENTRAL_ENTITY_COUNT)
        .map(|(_, node)| node.content.clone())
        .collect()
}

pub fn graph_density(node_count: usize, edge_count: usize) -> f64 {
    if node_count <= 1 {
        return 0.0;
    }
    edge_count as f64 / (node_count * (node_count - 1)) as f64
}

/// The edge type with the most edges; ties go to the type declared first.
pub fn most_common_relationship(edges: &[HyperEdge]) -> Option<EdgeType> {
    let mut counts: BTreeMap<EdgeType, usize> = BTreeMap::new();
    for edge in edges {
        *counts.entry(edge.edge_type).or_insert(0) += 1;
    }

    let mut best: Option<(EdgeType, usize)> = None;
    for (edge_type, count) in counts {
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((edge_type, count));
        }
    }
    best.map(|(edge_type, _)| edge_type)
}

/// Weighted blend of node confidence, edge confidence and type diversity.
pub fn quality_score(nodes: &[HyperNode], edges: &[HyperEdge]) -> f64 {
    if nodes.is_empty() {
        return 0.0;
    }

    let node_confidence = mean(nodes.iter().map(|n| n.confidence));
    let edge_confidence = mean(edges.iter().map(|e| e.confidence));
    let node_types = nodes.iter().map(|n| n.node_type).collect::<BTreeSet<_>>().len();
    let edge_types = edges.iter().map(|e| e.edge_type).collect::<BTreeSet<_>>().len();

    0.3 * node_confidence
        + 0.3 * edge_confidence
        + 0.2 * (node_types as f64 / 6.0).min(1.0)
        + 0.2 * (edge_types as f64 / 5.0).min(1.0)
}

pub fn graph_insights(nodes: &[HyperNode], edges: &[HyperEdge]) -> GraphInsights {
    GraphInsights {
        central_entities: central_entities(nodes, edges),
        graph_density: graph_density(nodes.len(), edges.len()),
        most_common_relationship: most_common_relationship(edges)
            .map(|t| t.as_str().to_string())
            .unwrap_or_else(|| "none".to_string()),
        entity_diversity: nodes.iter().map(|n| n.node_type).collect::<BTreeSet<_>>().len(),
        quality_score: quality_score(nodes, edges),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::NodeType;
    use serde_json::Map;

    fn node(id: &str, node_type: NodeType, confidence: f64) -> HyperNode {
        HyperNode {
            id: id.to_string(),
            content: id.to_uppercase(),
            node_type,
            confidence,
            timestamp: String::new(),
            source: "test".to_string(),
            metadata: Map::new(),
            needs_classification: BTreeMap::new(),
            domain_specific_properties: Map::new(),
        }
    }

    fn edge(source: &str, target: &str, edge_type: EdgeType, confidence: f64) -> HyperEdge {
        HyperEdge {
            id: format!("{}-{}", source, target),
            source_node_id: source.to_string(),
            target_node_id: target.to_string(),
            edge_type,
            confidence,
            timestamp: String::new(),
            metadata: Map::new(),
            evidence: Vec::new(),
            reasoning: String::new(),
        }
    }

    fn sample() -> (Vec<HyperNode>, Vec<HyperEdge>) {
        let nodes = vec![
            node("a", NodeType::Person, 1.0),
            node("b", NodeType::Skill, 0.8),
            node("c", NodeType::Skill, 0.6),
            node("d", NodeType::Need, 0.6),
            node("e", NodeType::Concept, 0.5),
        ];
        let edges = vec![
            edge("a", "b", EdgeType::SpecializesIn, 0.8),
            edge("a", "c", EdgeType::SpecializesIn, 0.8),
            edge("a", "d", EdgeType::Demonstrates, 0.6),
            edge("b", "c", EdgeType::RelatesTo, 0.4),
        ];
        (nodes, edges)
    }

    #[test]
    fn metrics_count_types() {
        let (nodes, edges) = sample();
        let metrics = graph_metrics(&nodes, &edges);
        assert_eq!(metrics.total_nodes, 5);
        assert_eq!(metrics.node_type_distribution["skill"], 2);
        assert_eq!(metrics.edge_type_distribution["specializes_in"], 2);
        assert_eq!(metrics.relationship_diversity, 3);
        assert!((metrics.average_confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn central_entities_skip_isolated_nodes() {
        let (nodes, edges) = sample();
        // a: 3, b: 2, c: 2, d: 1, e: 0
        assert_eq!(central_entities(&nodes, &edges), vec!["A", "B", "C"]);
        assert_eq!(central_entities(&nodes, &edges[..1]), vec!["A", "B"]);
    }

    #[test]
    fn insights_follow_formulas() {
        let (nodes, edges) = sample();
        let insights = graph_insights(&nodes, &edges);

        assert!((insights.graph_density - 4.0 / 20.0).abs() < 1e-9);
        assert_eq!(insights.most_common_relationship, "specializes_in");
        assert_eq!(insights.entity_diversity, 4);

        let expected = 0.3 * 0.7 + 0.3 * 0.65 + 0.2 * (4.0 / 6.0) + 0.2 * (3.0 / 5.0);
        assert!((insights.quality_score - expected).abs() < 1e-9);
    }

    #[test]
    fn most_common_relationship_ties_use_declaration_order() {
        let edges = vec![
            edge("a", "b", EdgeType::Uses, 0.5),
            edge("a", "c", EdgeType::Demonstrates, 0.5),
        ];
        assert_eq!(most_common_relationship(&edges), Some(EdgeType::Demonstrates));
        assert_eq!(most_common_relationship(&[]), None);
    }

    #[test]
    fn empty_graph_has_zero_quality() {
        let insights = graph_insights(&[], &[]);
        assert_eq!(insights.quality_score, 0.0);
        assert_eq!(insights.graph_density, 0.0);
        assert_eq!(insights.most_common_relationship, "none");
        assert!(insights.central_entities.is_empty());
    }
}
