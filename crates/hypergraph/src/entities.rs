use crate::builder::BuildInput;
use crate::candidates::{
    CandidateEntity, SOURCE_FILE_ANALYSIS, SOURCE_METADATA, SOURCE_NEEDS_ANALYSIS,
};
use crate::prompt::build_entity_prompt;
use crate::schema::NodeType;
use extract::{clean_entity_text, EntityMention, GenerationOptions, LlmClient, MentionType};
use needs::NeedsAnalysis;
use serde::Deserialize;
use serde_json::Value;

const PATH_INDICATORS: [&str; 4] = ["interview", "transcript", "dialog", "conversation"];
const DIALOG_MARKERS: [&str; 6] = ["interviewer:", "interviewee:", "q:", "a:", "host:", "guest:"];
const INTERVIEWER_CLUES: [&str; 3] = ["host", "interviewer", "anchor"];

const LLM_ENTITY_TYPES: [NodeType; 3] = [
    NodeType::FinancialInstrument,
    NodeType::BusinessConcept,
    NodeType::Topic,
];

/// Dialog transcripts get participant-centred extraction. A file counts as one
/// when its path says so or a line opens with a dialog marker.
pub fn is_interview_format(file_path: &str, raw_text: &str) -> bool {
    let path = file_path.to_lowercase();
    if PATH_INDICATORS.iter().any(|i| path.contains(i)) {
        return true;
    }

    raw_text.lines().any(|line| {
        let line = line.trim_start().to_lowercase();
        DIALOG_MARKERS.iter().any(|m| line.starts_with(m))
    })
}

fn mentions<'a>(
    input: &'a BuildInput,
    entity_type: MentionType,
    min_confidence: f64,
) -> impl Iterator<Item = &'a EntityMention> {
    input
        .entities
        .iter()
        .filter(move |m| m.entity_type == entity_type && m.confidence > min_confidence)
}

fn is_customer(text: &str, customer: Option<&str>) -> bool {
    customer.is_some_and(|c| c.eq_ignore_ascii_case(text.trim()))
}

fn cleaned(items: &[String], limit: usize) -> impl Iterator<Item = String> + '_ {
    items.iter().take(limit).filter_map(|s| clean_entity_text(s))
}

fn interview_entities(input: &BuildInput) -> Vec<CandidateEntity> {
    let customer = input.customer();
    let mut entities = Vec::new();

    if let Some(name) = customer {
        entities.push(
            CandidateEntity::new(name, NodeType::Person, 0.95, SOURCE_FILE_ANALYSIS)
                .with_context("Interview participant (interviewee)")
                .with_relevance(1.0)
                .with_property("role", "interviewee")
                .with_property("primary", true),
        );
    }

    for mention in mentions(input, MentionType::Person, 0.7) {
        if is_customer(&mention.text, customer) {
            continue;
        }
        let context = mention.context.to_lowercase();
        let role = if INTERVIEWER_CLUES.iter().any(|c| context.contains(c)) {
            "interviewer"
        } else {
            "mentioned_person"
        };
        entities.push(
            CandidateEntity::new(&mention.text, NodeType::Person, mention.confidence, SOURCE_FILE_ANALYSIS)
                .with_context(format!("Interview participant ({})", role))
                .with_relevance(0.8)
                .with_property("role", role),
        );
    }

    for theme in cleaned(&input.key_insights.main_themes, 5) {
        entities.push(
            CandidateEntity::new(theme, NodeType::Concept, 0.8, SOURCE_FILE_ANALYSIS)
                .with_context("Interview discussion topic")
                .with_relevance(0.9)
                .with_property("category", "topic")
                .with_property("format", "interview"),
        );
    }

    for mention in mentions(input, MentionType::Organization, 0.6) {
        entities.push(
            CandidateEntity::new(&mention.text, NodeType::Organization, mention.confidence, SOURCE_FILE_ANALYSIS)
                .with_context("Organization discussed in interview")
                .with_property("role", "discussed_organization")
                .with_property("format", "interview"),
        );
    }

    for mention in mentions(input, MentionType::Person, 0.6) {
        if is_customer(&mention.text, customer) {
            continue;
        }
        entities.push(
            CandidateEntity::new(&mention.text, NodeType::Person, mention.confidence, SOURCE_FILE_ANALYSIS)
                .with_context("Person mentioned in interview")
                .with_relevance(0.7)
                .with_property("role", "mentioned_person")
                .with_property("format", "interview"),
        );
    }

    for mention in mentions(input, MentionType::Technology, 0.6) {
        entities.push(
            CandidateEntity::new(&mention.text, NodeType::Concept, mention.confidence, SOURCE_FILE_ANALYSIS)
                .with_context("Technology discussed in interview")
                .with_property("category", "technology")
                .with_property("format", "interview"),
        );
    }

    entities
}

fn standard_entities(input: &BuildInput) -> Vec<CandidateEntity> {
    let mut entities = Vec::new();

    if let Some(name) = input.customer().filter(|n| n.split_whitespace().count() <= 3) {
        entities.push(
            CandidateEntity::new(name, NodeType::Person, 0.95, SOURCE_FILE_ANALYSIS)
                .with_context("Primary customer/subject")
                .with_relevance(1.0)
                .with_property("role", "customer")
                .with_property("primary", true),
        );
    }

    for mention in mentions(input, MentionType::Person, 0.7) {
        let context = if mention.context.is_empty() {
            "Mentioned person".to_string()
        } else {
            mention.context.clone()
        };
        entities.push(
            CandidateEntity::new(&mention.text, NodeType::Person, mention.confidence, SOURCE_FILE_ANALYSIS)
                .with_context(context)
                .with_relevance(0.7)
                .with_property("role", "mentioned"),
        );
    }

    let insights = &input.key_insights;
    for skill in cleaned(&insights.skills_and_competencies, 5) {
        entities.push(
            CandidateEntity::new(skill, NodeType::Skill, 0.8, SOURCE_FILE_ANALYSIS)
                .with_context("Professional competency")
                .with_relevance(0.9)
                .with_property("category", "professional")
                .with_property("domain", "expertise"),
        );
    }

    for theme in cleaned(&insights.main_themes, 3) {
        entities.push(
            CandidateEntity::new(theme, NodeType::Concept, 0.7, SOURCE_FILE_ANALYSIS)
                .with_context("Main discussion theme")
                .with_property("category", "theme")
                .with_property("domain", "content"),
        );
    }

    for goal in cleaned(&insights.goals_and_aspirations, 3) {
        entities.push(
            CandidateEntity::new(goal, NodeType::Concept, 0.6, SOURCE_FILE_ANALYSIS)
                .with_context("Future aspiration or goal")
                .with_relevance(0.7)
                .with_property("category", "goal")
                .with_property("temporal", "future"),
        );
    }

    for mention in mentions(input, MentionType::Organization, 0.6) {
        let context = if mention.context.is_empty() {
            "Mentioned organization".to_string()
        } else {
            mention.context.clone()
        };
        entities.push(
            CandidateEntity::new(&mention.text, NodeType::Organization, mention.confidence, SOURCE_FILE_ANALYSIS)
                .with_context(context)
                .with_property("role", "organization"),
        );
    }

    entities
}

/// Rule-based entities from the interview stage output.
pub fn file_entities(input: &BuildInput, interview_format: bool) -> Vec<CandidateEntity> {
    if interview_format {
        interview_entities(input)
    } else {
        standard_entities(input)
    }
}

#[derive(Debug, Deserialize)]
struct LlmEntity {
    text: String,
    #[serde(rename = "type")]
    entity_type: String,
    confidence: Option<f64>,
    #[serde(default)]
    context: String,
}

fn parse_llm_entities(json: &str) -> Vec<CandidateEntity> {
    let Ok(value) = serde_json::from_str::<Value>(json) else {
        return Vec::new();
    };
    let items = match value {
        Value::Object(mut map) => match map.remove("entities") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        Value::Array(items) => items,
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<LlmEntity>(item).ok())
        .filter_map(|entity| {
            let node_type = NodeType::parse(&entity.entity_type)
                .filter(|t| LLM_ENTITY_TYPES.contains(t))?;
            let text = entity.text.trim();
            if text.is_empty() {
                return None;
            }
            Some(
                CandidateEntity::new(text, node_type, entity.confidence.unwrap_or(0.7), SOURCE_FILE_ANALYSIS)
                    .with_context(entity.context)
                    .with_property("extraction_method", "llm"),
            )
        })
        .collect()
}

/// Financial instruments, business concepts and topics proposed by the LLM
/// for the opening of the text. Empty when the LLM is unavailable.
pub async fn llm_entities(llm: &dyn LlmClient, raw_text: &str) -> Vec<CandidateEntity> {
    if raw_text.trim().is_empty() {
        return Vec::new();
    }

    let options = GenerationOptions::default()
        .with_max_tokens(800)
        .with_temperature(0.1);

    match llm
        .generate_json_with_retry(&build_entity_prompt(raw_text), &options, 1)
        .await
    {
        Ok(json) => parse_llm_entities(&json),
        Err(e) => {
            tracing::warn!(error = %e, "LLM entity extraction failed");
            Vec::new()
        }
    }
}

/// Patterns, traits, significant needs and life themes from needs analysis.
pub fn needs_entities(needs: &NeedsAnalysis) -> Vec<CandidateEntity> {
    let mut entities = Vec::new();

    for pattern in cleaned(&needs.behavioral_patterns, 5) {
        entities.push(
            CandidateEntity::new(pattern, NodeType::BehavioralPattern, 0.8, SOURCE_NEEDS_ANALYSIS)
                .with_context("Observed behavioral pattern")
                .with_relevance(0.9)
                .with_property("category", "behavior"),
        );
    }

    for personality_trait in cleaned(&needs.personality_traits, 5) {
        entities.push(
            CandidateEntity::new(personality_trait, NodeType::PersonalityTrait, 0.8, SOURCE_NEEDS_ANALYSIS)
                .with_context("Identified personality trait")
                .with_relevance(0.9)
                .with_property("category", "personality"),
        );
    }

    for (need, score) in needs.needs_scores.iter().filter(|(_, score)| *score > 0.4) {
        entities.push(
            CandidateEntity::new(need.title(), NodeType::Need, score, SOURCE_NEEDS_ANALYSIS)
                .with_context(format!("Human need with score {:.2}", score))
                .with_relevance(1.0)
                .with_property("category", "human_need")
                .with_property("score", score),
        );
    }

    for theme in cleaned(&needs.life_themes, 3) {
        entities.push(
            CandidateEntity::new(theme, NodeType::Concept, 0.7, SOURCE_NEEDS_ANALYSIS)
                .with_context("Major life theme")
                .with_property("category", "life_theme"),
        );
    }

    entities
}

/// Added when extraction found almost nothing, so the subject still anchors the graph.
pub fn customer_fallback(customer: &str) -> CandidateEntity {
    CandidateEntity::new(customer, NodeType::Person, 0.9, SOURCE_METADATA)
        .with_context("Primary customer")
        .with_relevance(1.0)
        .with_property("role", "customer")
        .with_property("primary", true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::KeyInsights;
    use needs::{ContentType, NeedsScores};

    fn mention(text: &str, entity_type: MentionType, confidence: f64, context: &str) -> EntityMention {
        EntityMention {
            text: text.to_string(),
            entity_type,
            confidence,
            start: 0,
            end: text.len(),
            context: context.to_string(),
        }
    }

    fn input(file_path: &str) -> BuildInput {
        BuildInput {
            file_path: file_path.to_string(),
            customer_name: Some("Jane Doe".to_string()),
            raw_text: "Jane talked about planning.".to_string(),
            entities: vec![
                mention("Jane Doe", MentionType::Person, 0.9, "I am Jane Doe"),
                mention("Tom Hale", MentionType::Person, 0.8, "the host Tom Hale asked"),
                mention("Ann Lee", MentionType::Person, 0.65, "my friend Ann Lee"),
                mention("Acme Corp", MentionType::Organization, 0.7, "worked at Acme Corp"),
                mention("Python", MentionType::Technology, 0.7, "we use Python"),
            ],
            key_insights: KeyInsights {
                skills_and_competencies: vec!["Has financial planning".to_string(), "ab".to_string()],
                main_themes: vec!["retirement".to_string()],
                goals_and_aspirations: vec!["Open an office".to_string()],
                ..Default::default()
            },
            needs: None,
        }
    }

    #[test]
    fn interview_detection_uses_path_or_line_markers() {
        assert!(is_interview_format("data/Interview_01.txt", ""));
        assert!(is_interview_format("notes.txt", "intro\nQ: Why?\nA: Because."));
        assert!(!is_interview_format("notes.txt", "The data: a list of numbers."));
    }

    #[test]
    fn interview_entities_assign_roles() {
        let entities = file_entities(&input("interview.txt"), true);

        let jane = entities.iter().find(|e| e.text == "Jane Doe").unwrap();
        assert_eq!(jane.property("role"), Some("interviewee"));
        assert!(jane.is_primary());
        assert_eq!(entities.iter().filter(|e| e.text == "Jane Doe").count(), 1);

        let tom = entities.iter().find(|e| e.text == "Tom Hale").unwrap();
        assert_eq!(tom.property("role"), Some("interviewer"));

        // below the participant threshold but above the mentioned-person one
        let ann = entities.iter().find(|e| e.text == "Ann Lee").unwrap();
        assert_eq!(ann.property("role"), Some("mentioned_person"));
        assert_eq!(ann.domain_relevance, 0.7);

        let topic = entities.iter().find(|e| e.text == "Retirement").unwrap();
        assert_eq!(topic.category(), Some("topic"));
        let tech = entities.iter().find(|e| e.text == "Python").unwrap();
        assert_eq!(tech.entity_type, NodeType::Concept);
        assert_eq!(tech.category(), Some("technology"));
    }

    #[test]
    fn standard_entities_cover_skills_themes_goals() {
        let entities = file_entities(&input("profile.txt"), false);

        let types: Vec<(&str, NodeType)> = entities
            .iter()
            .map(|e| (e.text.as_str(), e.entity_type))
            .collect();
        assert!(types.contains(&("Jane Doe", NodeType::Person)));
        assert!(types.contains(&("Financial planning", NodeType::Skill)));
        assert!(types.contains(&("Retirement", NodeType::Concept)));
        assert!(types.contains(&("Open an office", NodeType::Concept)));
        assert!(types.contains(&("Acme Corp", NodeType::Organization)));
        assert!(!types.iter().any(|(t, _)| *t == "Ann Lee" || *t == "Python"));
        assert!(!types.iter().any(|(t, _)| t.eq_ignore_ascii_case("ab")));
    }

    #[test]
    fn long_customer_names_are_skipped_in_standard_format() {
        let mut data = input("profile.txt");
        data.customer_name = Some("The Very Long Customer Name".to_string());
        let entities = file_entities(&data, false);
        assert!(!entities.iter().any(|e| e.is_primary()));
    }

    #[test]
    fn llm_entities_keep_supported_types() {
        let json = r#"{"entities": [
            {"text": "Index funds", "type": "FINANCIAL_INSTRUMENT", "confidence": 0.9},
            {"text": "Lean startup", "type": "BUSINESS_CONCEPT"},
            {"text": "Bob", "type": "PERSON", "confidence": 0.9},
            {"text": " ", "type": "TOPIC"}
        ]}"#;
        let entities = parse_llm_entities(json);
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].entity_type, NodeType::FinancialInstrument);
        assert_eq!(entities[1].confidence, 0.7);
        assert_eq!(entities[1].property("extraction_method"), Some("llm"));
    }

    #[tokio::test]
    async fn llm_entities_are_empty_when_llm_is_disabled() {
        assert!(llm_entities(&extract::DisabledLlm, "Some text").await.is_empty());
    }

    #[test]
    fn needs_entities_include_only_significant_needs() {
        let analysis = NeedsAnalysis {
            content_type: ContentType::InterviewTranscript,
            needs_scores: NeedsScores {
                growth: 0.8,
                certainty: 0.4,
                ..Default::default()
            },
            dominant_needs: Vec::new(),
            behavioral_patterns: vec!["Strategic planner".to_string()],
            personality_traits: vec!["analytical".to_string()],
            life_themes: vec!["Family".to_string(), "Service".to_string()],
            confidence_score: 0.5,
            keyword_scores: NeedsScores::default(),
            llm_scores: NeedsScores::default(),
            llm_fallback: false,
        };

        let entities = needs_entities(&analysis);
        let needs: Vec<&str> = entities
            .iter()
            .filter(|e| e.entity_type == NodeType::Need)
            .map(|e| e.text.as_str())
            .collect();
        assert_eq!(needs, vec!["Growth"]);
        assert!(entities.iter().any(|e| e.text == "Analytical" && e.entity_type == NodeType::PersonalityTrait));
        assert_eq!(entities.iter().filter(|e| e.category() == Some("life_theme")).count(), 2);
    }
}
