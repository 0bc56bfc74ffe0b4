use crate::candidates::{
    CandidateEntity, CandidateRelationship, SOURCE_FILE_ANALYSIS, SOURCE_INTERVIEW,
    SOURCE_LLM_SEMANTIC, SOURCE_NEEDS_ANALYSIS,
};
use crate::prompt::build_relationship_prompt;
use crate::schema::{EdgeType, NodeType};
use extract::{GenerationOptions, LlmClient};
use needs::{DominantNeed, HumanNeed};
use serde::Deserialize;

const MAX_SEMANTIC_PAIRS: usize = 10;
const SEMANTIC_THRESHOLD: f64 = 0.6;
const DEMONSTRATES_THRESHOLD: f64 = 0.5;
const INFLUENCE_THRESHOLD: f64 = 0.6;

const FINANCIAL_SKILLS: [&str; 5] = ["financial", "investment", "insurance", "planning", "advisory"];
const FINANCIAL_CONCEPTS: [&str; 6] = [
    "financial",
    "investment",
    "insurance",
    "planning",
    "advisory",
    "wealth",
];

/// Behavior keywords that a need is expected to drive.
fn behavior_keywords(need: HumanNeed) -> &'static [&'static str] {
    match need {
        HumanNeed::Certainty => &["strategic", "planner", "risk", "manager", "cautious", "analytical"],
        HumanNeed::Variety => &["innovative", "creative", "explorer", "adventurous"],
        HumanNeed::Significance => &["leader", "achiever", "competitive", "ambitious"],
        HumanNeed::Connection => &["collaborative", "team", "social", "helper"],
        HumanNeed::Growth => &["learner", "developer", "improver", "student"],
        HumanNeed::Contribution => &["helper", "mentor", "teacher", "giver"],
    }
}

fn of_type(entities: &[CandidateEntity], node_type: NodeType) -> impl Iterator<Item = &CandidateEntity> {
    entities.iter().filter(move |e| e.entity_type == node_type)
}

fn concepts_in<'a>(entities: &'a [CandidateEntity], category: &'a str) -> impl Iterator<Item = &'a CandidateEntity> {
    of_type(entities, NodeType::Concept).filter(move |e| e.category() == Some(category))
}

fn primary_person(entities: &[CandidateEntity]) -> Option<&CandidateEntity> {
    of_type(entities, NodeType::Person).find(|e| e.is_primary())
}

/// Strength with which a need drives a behavior: high when the behavior
/// names one of the need's keywords.
pub fn need_behavior_strength(need_text: &str, behavior_text: &str) -> f64 {
    let need_text = need_text.to_lowercase();
    let behavior_text = behavior_text.to_lowercase();

    let matches = HumanNeed::ALL
        .into_iter()
        .filter(|need| need_text.contains(need.as_str()))
        .any(|need| behavior_keywords(need).iter().any(|kw| behavior_text.contains(kw)));

    if matches { 0.8 } else { 0.3 }
}

pub fn is_financial_pair(skill: &str, concept: &str) -> bool {
    let skill = skill.to_lowercase();
    let concept = concept.to_lowercase();
    FINANCIAL_SKILLS.iter().any(|k| skill.contains(k)) && FINANCIAL_CONCEPTS.iter().any(|k| concept.contains(k))
}

fn demonstrates(entities: &[CandidateEntity], dominant: &[DominantNeed]) -> Vec<CandidateRelationship> {
    let Some(person) = primary_person(entities) else {
        return Vec::new();
    };

    of_type(entities, NodeType::Need)
        .filter_map(|need| {
            let need_text = need.text.to_lowercase();
            let score = dominant
                .iter()
                .find(|d| need_text.contains(d.need.as_str()))
                .map(|d| d.score)?;
            (score > DEMONSTRATES_THRESHOLD).then(|| {
                CandidateRelationship::new(&person.text, &need.text, EdgeType::Demonstrates, score, SOURCE_NEEDS_ANALYSIS)
                    .with_evidence(format!("{} shows strong {} need (score: {:.2})", person.text, need.text, score))
                    .with_reasoning(format!("Needs analysis indicates {} has high {} need", person.text, need.text))
            })
        })
        .collect()
}

fn interview_relationships(entities: &[CandidateEntity], dominant: &[DominantNeed]) -> Vec<CandidateRelationship> {
    let mut relationships = Vec::new();

    let interviewer = of_type(entities, NodeType::Person)
        .filter(|p| p.property("role") == Some("interviewer"))
        .last();
    let interviewee = of_type(entities, NodeType::Person)
        .filter(|p| p.property("role") == Some("interviewee") || p.is_primary())
        .last();
    if let (Some(interviewer), Some(interviewee)) = (interviewer, interviewee) {
        relationships.push(
            CandidateRelationship::new(&interviewer.text, &interviewee.text, EdgeType::Interviews, 0.95, SOURCE_INTERVIEW)
                .with_evidence(format!("{} conducts interview with {}", interviewer.text, interviewee.text))
                .with_reasoning("Interview participant relationship"),
        );
    }

    let primary = primary_person(entities);
    if let Some(person) = primary {
        for topic in concepts_in(entities, "topic") {
            relationships.push(
                CandidateRelationship::new(&person.text, &topic.text, EdgeType::Discusses, 0.8, SOURCE_INTERVIEW)
                    .with_evidence(format!("{} discusses {} in interview", person.text, topic.text))
                    .with_reasoning("Interview participant discusses topic"),
            );
        }
        for org in of_type(entities, NodeType::Organization) {
            relationships.push(
                CandidateRelationship::new(&person.text, &org.text, EdgeType::AffiliatedWith, 0.7, SOURCE_INTERVIEW)
                    .with_evidence(format!("{} mentions {} in interview", person.text, org.text))
                    .with_reasoning("Organization mentioned by interview participant"),
            );
        }
    }

    for topic in concepts_in(entities, "topic") {
        for org in of_type(entities, NodeType::Organization) {
            relationships.push(
                CandidateRelationship::new(&topic.text, &org.text, EdgeType::RelatesTo, 0.6, SOURCE_INTERVIEW)
                    .with_evidence(format!("{} discussed in context of {}", topic.text, org.text))
                    .with_reasoning("Topic and organization discussed in same interview context"),
            );
        }
    }

    relationships.extend(demonstrates(entities, dominant));

    if let Some(person) = primary {
        for tech in concepts_in(entities, "technology") {
            relationships.push(
                CandidateRelationship::new(&person.text, &tech.text, EdgeType::Uses, 0.7, SOURCE_INTERVIEW)
                    .with_evidence(format!("{} discusses {} in interview", person.text, tech.text))
                    .with_reasoning("Technology discussed by interview participant"),
            );
        }
    }

    relationships
}

fn standard_relationships(entities: &[CandidateEntity], dominant: &[DominantNeed]) -> Vec<CandidateRelationship> {
    let mut relationships = Vec::new();

    for person in of_type(entities, NodeType::Person).filter(|p| p.is_primary()) {
        for skill in of_type(entities, NodeType::Skill) {
            relationships.push(
                CandidateRelationship::new(&person.text, &skill.text, EdgeType::SpecializesIn, 0.8, SOURCE_FILE_ANALYSIS)
                    .with_evidence(format!("{} demonstrates {}", person.text, skill.text))
                    .with_reasoning(format!("Primary customer {} shows expertise in {}", person.text, skill.text)),
            );
        }
    }

    relationships.extend(demonstrates(entities, dominant));

    for need in of_type(entities, NodeType::Need) {
        for behavior in of_type(entities, NodeType::BehavioralPattern) {
            let strength = need_behavior_strength(&need.text, &behavior.text);
            if strength > INFLUENCE_THRESHOLD {
                relationships.push(
                    CandidateRelationship::new(&need.text, &behavior.text, EdgeType::Influences, strength, SOURCE_NEEDS_ANALYSIS)
                        .with_evidence(format!("{} need drives {} behavior", need.text, behavior.text))
                        .with_reasoning(format!(
                            "Psychological need {} manifests as {} pattern",
                            need.text, behavior.text
                        )),
                );
            }
        }
    }

    for skill in of_type(entities, NodeType::Skill) {
        for concept in of_type(entities, NodeType::Concept) {
            if is_financial_pair(&skill.text, &concept.text) {
                relationships.push(
                    CandidateRelationship::new(&skill.text, &concept.text, EdgeType::RelatesTo, 0.7, SOURCE_FILE_ANALYSIS)
                        .with_evidence(format!("{} skill applies to {}", skill.text, concept.text))
                        .with_reasoning(format!("Professional skill {} is relevant to {}", skill.text, concept.text)),
                );
            }
        }
    }

    relationships
}

/// Relationships implied by entity roles, categories and needs scores.
pub fn rule_relationships(
    entities: &[CandidateEntity],
    dominant: &[DominantNeed],
    interview_format: bool,
) -> Vec<CandidateRelationship> {
    if interview_format {
        interview_relationships(entities, dominant)
    } else {
        standard_relationships(entities, dominant)
    }
}

#[derive(Debug, Deserialize)]
struct SemanticVerdict {
    #[serde(default)]
    has_relationship: bool,
    #[serde(default)]
    relationship_type: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    evidence: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

fn semantic_edge_type(label: Option<&str>) -> EdgeType {
    match label.and_then(EdgeType::parse) {
        Some(t @ (EdgeType::Enables | EdgeType::Requires | EdgeType::WorksWith)) => t,
        _ => EdgeType::RelatesTo,
    }
}

fn parse_semantic_verdict(
    json: &str,
    first: &CandidateEntity,
    second: &CandidateEntity,
) -> Option<CandidateRelationship> {
    let verdict: SemanticVerdict = serde_json::from_str(json).ok()?;
    let confidence = verdict.confidence.unwrap_or(0.7);
    if !verdict.has_relationship || confidence <= SEMANTIC_THRESHOLD {
        return None;
    }

    let edge_type = semantic_edge_type(verdict.relationship_type.as_deref());
    let mut relationship =
        CandidateRelationship::new(&first.text, &second.text, edge_type, confidence, SOURCE_LLM_SEMANTIC)
            .with_reasoning(verdict.reasoning.unwrap_or_default());
    if let Some(evidence) = verdict.evidence.filter(|e| !e.trim().is_empty()) {
        relationship = relationship.with_evidence(evidence);
    }
    Some(relationship)
}

/// The first pairs of differently-typed entities, in entity order.
pub fn semantic_pairs(entities: &[CandidateEntity]) -> Vec<(&CandidateEntity, &CandidateEntity)> {
    entities
        .iter()
        .enumerate()
        .flat_map(|(i, first)| {
            entities[i + 1..]
                .iter()
                .filter(move |second| second.entity_type != first.entity_type)
                .map(move |second| (first, second))
        })
        .take(MAX_SEMANTIC_PAIRS)
        .collect()
}

/// Ask the LLM about each candidate pair. Stops at the first transport
/// error, since the remaining calls would fail the same way.
pub async fn semantic_relationships(
    llm: &dyn LlmClient,
    entities: &[CandidateEntity],
    raw_text: &str,
) -> Vec<CandidateRelationship> {
    let options = GenerationOptions::default()
        .with_max_tokens(300)
        .with_temperature(0.1);
    let mut relationships = Vec::new();

    for (first, second) in semantic_pairs(entities) {
        let prompt = build_relationship_prompt(first, second, raw_text);
        match llm.generate_json_with_retry(&prompt, &options, 1).await {
            Ok(json) => {
                if let Some(relationship) = parse_semantic_verdict(&json, first, second) {
                    relationships.push(relationship);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "LLM relationship analysis failed, skipping remaining pairs");
                break;
            }
        }
    }

    relationships
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn entity(text: &str, node_type: NodeType) -> CandidateEntity {
        CandidateEntity::new(text, node_type, 0.8, SOURCE_FILE_ANALYSIS)
    }

    fn primary(text: &str, role: &str) -> CandidateEntity {
        entity(text, NodeType::Person)
            .with_property("role", role)
            .with_property("primary", true)
    }

    fn dominant(need: HumanNeed, score: f64) -> DominantNeed {
        DominantNeed { need, score }
    }

    #[test]
    fn interview_rules_connect_participants_topics_and_orgs() {
        let entities = vec![
            primary("Jane", "interviewee"),
            entity("Tom", NodeType::Person).with_property("role", "interviewer"),
            entity("Retirement", NodeType::Concept).with_property("category", "topic"),
            entity("Acme", NodeType::Organization),
            entity("Python", NodeType::Concept).with_property("category", "technology"),
            entity("Growth", NodeType::Need),
            entity("Variety", NodeType::Need),
        ];
        let dominant = [dominant(HumanNeed::Growth, 0.7), dominant(HumanNeed::Variety, 0.4)];

        let rels = rule_relationships(&entities, &dominant, true);
        let summary: Vec<(&str, &str, EdgeType)> = rels
            .iter()
            .map(|r| (r.source_entity.as_str(), r.target_entity.as_str(), r.relationship_type))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("Tom", "Jane", EdgeType::Interviews),
                ("Jane", "Retirement", EdgeType::Discusses),
                ("Jane", "Acme", EdgeType::AffiliatedWith),
                ("Retirement", "Acme", EdgeType::RelatesTo),
                ("Jane", "Growth", EdgeType::Demonstrates),
                ("Jane", "Python", EdgeType::Uses),
            ]
        );
        assert_eq!(rels[4].confidence, 0.7);
    }

    #[test]
    fn standard_rules_link_skills_needs_and_behaviors() {
        let entities = vec![
            primary("Jane", "customer"),
            entity("Financial planning", NodeType::Skill),
            entity("Wealth management", NodeType::Concept),
            entity("Family", NodeType::Concept),
            entity("Certainty", NodeType::Need),
            entity("Strategic planner", NodeType::BehavioralPattern),
            entity("Night owl", NodeType::BehavioralPattern),
        ];
        let dominant = [dominant(HumanNeed::Certainty, 0.9)];

        let rels = rule_relationships(&entities, &dominant, false);
        let has = |src: &str, tgt: &str, t: EdgeType| {
            rels.iter()
                .any(|r| r.source_entity == src && r.target_entity == tgt && r.relationship_type == t)
        };

        assert!(has("Jane", "Financial planning", EdgeType::SpecializesIn));
        assert!(has("Jane", "Certainty", EdgeType::Demonstrates));
        assert!(has("Certainty", "Strategic planner", EdgeType::Influences));
        assert!(!has("Certainty", "Night owl", EdgeType::Influences));
        assert!(has("Financial planning", "Wealth management", EdgeType::RelatesTo));
        assert!(!has("Financial planning", "Family", EdgeType::RelatesTo));
    }

    #[test]
    fn need_behavior_strength_uses_keyword_table() {
        assert_eq!(need_behavior_strength("Contribution", "Mentor to juniors"), 0.8);
        assert_eq!(need_behavior_strength("Growth", "Team player"), 0.3);
    }

    #[test]
    fn semantic_pairs_skip_same_type_and_cap_at_ten() {
        let entities: Vec<CandidateEntity> = (0..6)
            .map(|i| entity(&format!("Skill {}", i), NodeType::Skill))
            .chain((0..6).map(|i| entity(&format!("Org {}", i), NodeType::Organization)))
            .collect();

        let pairs = semantic_pairs(&entities);
        assert_eq!(pairs.len(), MAX_SEMANTIC_PAIRS);
        assert!(pairs.iter().all(|(a, b)| a.entity_type != b.entity_type));
        assert_eq!(pairs[0].0.text, "Skill 0");
        assert_eq!(pairs[0].1.text, "Org 0");
    }

    #[test]
    fn verdicts_below_threshold_or_negative_are_dropped() {
        let a = entity("Jane", NodeType::Person);
        let b = entity("Index funds", NodeType::FinancialInstrument);

        let kept = parse_semantic_verdict(
            r#"{"has_relationship": true, "relationship_type": "WORKS_WITH", "confidence": 0.9, "evidence": "uses them"}"#,
            &a,
            &b,
        )
        .unwrap();
        assert_eq!(kept.relationship_type, EdgeType::WorksWith);
        assert_eq!(kept.evidence, vec!["uses them"]);

        let odd_type = parse_semantic_verdict(
            r#"{"has_relationship": true, "relationship_type": "OWNS", "confidence": 0.7}"#,
            &a,
            &b,
        )
        .unwrap();
        assert_eq!(odd_type.relationship_type, EdgeType::RelatesTo);

        assert!(parse_semantic_verdict(r#"{"has_relationship": true, "confidence": 0.6}"#, &a, &b).is_none());
        assert!(parse_semantic_verdict(r#"{"has_relationship": false, "confidence": 0.9}"#, &a, &b).is_none());
    }

    struct FailingAfter {
        calls: AtomicUsize,
        ok_calls: usize,
    }

    #[async_trait]
    impl LlmClient for FailingAfter {
        async fn generate(&self, _prompt: &str, _options: &GenerationOptions) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.ok_calls {
                Ok(r#"{"has_relationship": true, "relationship_type": "ENABLES", "confidence": 0.8}"#.to_string())
            } else {
                anyhow::bail!("connection refused")
            }
        }
    }

    #[tokio::test]
    async fn semantic_analysis_stops_at_first_transport_error() {
        let llm = FailingAfter {
            calls: AtomicUsize::new(0),
            ok_calls: 2,
        };
        let entities = vec![
            entity("Jane", NodeType::Person),
            entity("Planning", NodeType::Skill),
            entity("Acme", NodeType::Organization),
            entity("Wealth", NodeType::Concept),
        ];

        let rels = semantic_relationships(&llm, &entities, "context").await;
        assert_eq!(rels.len(), 2);
        assert!(rels.iter().all(|r| r.relationship_type == EdgeType::Enables));
        assert_eq!(llm.calls.load(Ordering::SeqCst), 3);
    }
}
