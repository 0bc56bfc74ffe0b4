use crate::schema::{EdgeType, NodeType};
use sha2::{Digest, Sha256};

fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

/// `{node_type}_{16 hex chars}`; content is compared case-insensitively.
pub fn node_id(content: &str, node_type: NodeType) -> String {
    format!("{}_{}", node_type.as_str(), short_hash(&content.to_lowercase()))
}

pub fn edge_id(source_id: &str, target_id: &str, edge_type: EdgeType) -> String {
    format!(
        "edge_{}",
        short_hash(&format!("{}:{}:{}", source_id, target_id, edge_type.as_str()))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_ignore_case_but_not_type() {
        let a = node_id("Financial Planning", NodeType::Skill);
        assert_eq!(a, node_id("financial planning", NodeType::Skill));
        assert_ne!(a, node_id("financial planning", NodeType::Concept));
        assert!(a.starts_with("skill_"));
        assert_eq!(a.len(), "skill_".len() + 16);
    }

    #[test]
    fn edge_ids_depend_on_direction_and_type() {
        let forward = edge_id("person_a", "skill_b", EdgeType::SpecializesIn);
        assert_eq!(forward, edge_id("person_a", "skill_b", EdgeType::SpecializesIn));
        assert_ne!(forward, edge_id("skill_b", "person_a", EdgeType::SpecializesIn));
        assert_ne!(forward, edge_id("person_a", "skill_b", EdgeType::RelatesTo));
        assert!(forward.starts_with("edge_"));
    }
}
