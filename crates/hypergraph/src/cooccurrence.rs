use crate::candidates::{CandidateEntity, CandidateRelationship, SOURCE_COOCCURRENCE};
use crate::schema::{EdgeType, NodeType};

const MIN_STRENGTH: f64 = 0.4;

const RELATED_PAIRS: [(NodeType, NodeType); 4] = [
    (NodeType::Person, NodeType::Skill),
    (NodeType::Skill, NodeType::Concept),
    (NodeType::Need, NodeType::BehavioralPattern),
    (NodeType::Person, NodeType::Topic),
];

/// Type pairs worth checking for proximity, in either order. Skills are the
/// only type paired with itself.
pub fn is_related_pair(a: NodeType, b: NodeType) -> bool {
    if a == b {
        return a == NodeType::Skill;
    }
    RELATED_PAIRS
        .iter()
        .any(|&(x, y)| (a, b) == (x, y) || (b, a) == (x, y))
}

/// Lowercased whitespace tokens of a text.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Token indexes where `phrase` starts. Each phrase word must be contained in
/// the token at the same offset, so "planning," still matches "planning".
pub fn phrase_positions(tokens: &[String], phrase: &str) -> Vec<usize> {
    let parts = tokenize(phrase);
    if parts.is_empty() || parts.len() > tokens.len() {
        return Vec::new();
    }

    (0..=tokens.len() - parts.len())
        .filter(|&start| {
            parts
                .iter()
                .enumerate()
                .all(|(offset, part)| tokens[start + offset].contains(part.as_str()))
        })
        .collect()
}

fn strength_for_distance(distance: usize) -> f64 {
    match distance {
        0..=5 => 0.9,
        6..=20 => 0.7,
        21..=50 => 0.5,
        _ => 0.3,
    }
}

/// Proximity strength of two phrases in the token stream, or 0 when either
/// does not occur.
pub fn cooccurrence_strength(tokens: &[String], first: &str, second: &str) -> f64 {
    let first_positions = phrase_positions(tokens, first);
    let second_positions = phrase_positions(tokens, second);

    first_positions
        .iter()
        .flat_map(|a| second_positions.iter().map(move |b| a.abs_diff(*b)))
        .min()
        .map(strength_for_distance)
        .unwrap_or(0.0)
}

pub fn cooccurrence_relationships(entities: &[CandidateEntity], raw_text: &str) -> Vec<CandidateRelationship> {
    let tokens = tokenize(raw_text);
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut relationships = Vec::new();
    for (i, first) in entities.iter().enumerate() {
        for second in &entities[i + 1..] {
            if !is_related_pair(first.entity_type, second.entity_type) {
                continue;
            }
            let strength = cooccurrence_strength(&tokens, &first.text, &second.text);
            if strength > MIN_STRENGTH {
                relationships.push(
                    CandidateRelationship::new(&first.text, &second.text, EdgeType::RelatesTo, strength, SOURCE_COOCCURRENCE)
                        .with_evidence(format!("{} and {} appear close together in the text", first.text, second.text))
                        .with_reasoning("Co-occurrence in source text"),
                );
            }
        }
    }

    tracing::debug!(count = relationships.len(), "Co-occurrence relationships");
    relationships
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn related_pairs_are_symmetric() {
        assert!(is_related_pair(NodeType::Skill, NodeType::Person));
        assert!(is_related_pair(NodeType::BehavioralPattern, NodeType::Need));
        assert!(is_related_pair(NodeType::Skill, NodeType::Skill));
        assert!(!is_related_pair(NodeType::Person, NodeType::Person));
        assert!(!is_related_pair(NodeType::Person, NodeType::Organization));
    }

    #[test]
    fn multi_word_phrases_match_consecutive_tokens() {
        let tokens = tokenize("I do Financial planning, and later financial reviews.");
        assert_eq!(phrase_positions(&tokens, "financial planning"), vec![2]);
        assert_eq!(phrase_positions(&tokens, "financial"), vec![2, 6]);
        assert!(phrase_positions(&tokens, "planning financial").is_empty());
        assert!(phrase_positions(&tokens, "").is_empty());
    }

    #[test]
    fn strength_falls_with_distance() {
        let near = tokenize("Jane enjoys budgeting");
        assert_eq!(cooccurrence_strength(&near, "Jane", "Budgeting"), 0.9);

        let text = format!("Jane {} budgeting", "word ".repeat(30));
        assert_eq!(cooccurrence_strength(&tokenize(&text), "Jane", "Budgeting"), 0.5);

        assert_eq!(cooccurrence_strength(&near, "Jane", "Coding"), 0.0);
    }

    #[test]
    fn weak_cooccurrence_is_not_kept() {
        let entities = vec![
            CandidateEntity::new("Jane", NodeType::Person, 0.9, "file_analysis"),
            CandidateEntity::new("Budgeting", NodeType::Skill, 0.8, "file_analysis"),
            CandidateEntity::new("Acme", NodeType::Organization, 0.8, "file_analysis"),
            CandidateEntity::new("Tax law", NodeType::Skill, 0.8, "file_analysis"),
        ];
        let text = format!("Jane loves budgeting at Acme. {} tax law", "filler ".repeat(60));

        let rels = cooccurrence_relationships(&entities, &text);
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].source_entity, "Jane");
        assert_eq!(rels[0].target_entity, "Budgeting");
        assert_eq!(rels[0].confidence, 0.9);
        assert_eq!(rels[0].relationship_type, EdgeType::RelatesTo);
    }
}
