use crate::llm::{GenerationOptions, LlmClient};
use crate::prompt::build_insights_prompt;
use crate::schema::{EntityMention, KeyInsights, MentionType};
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

const MAX_MATCHES_PER_PATTERN: usize = 3;

static GOAL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?:want to|hope to|plan to|aspire to|goal is to|looking to) ([^.!?]+)",
        r"(?:future|next|upcoming) ([^.!?]*(?:project|role|position|opportunity)[^.!?]*)",
    ])
});

static ACHIEVEMENT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?:achieved|accomplished|completed|delivered|built|created|led) ([^.!?]+)",
        r"(?:successful|successfully) ([^.!?]+)",
    ])
});

const SKILL_KEYWORDS: [&str; 6] = ["skill", "experience", "expertise", "proficient", "knowledge", "ability"];
const ACHIEVEMENT_KEYWORDS: [&str; 6] = ["achieved", "accomplished", "successful", "led", "managed", "created"];
const GOAL_KEYWORDS: [&str; 6] = ["goal", "aspire", "want to", "plan to", "hope to", "future"];

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("valid insight pattern"))
        .collect()
}

fn captures(patterns: &[Regex], text: &str) -> Vec<String> {
    let mut found = Vec::new();
    for pattern in patterns {
        found.extend(
            pattern
                .captures_iter(text)
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string())
                .take(MAX_MATCHES_PER_PATTERN),
        );
    }
    found
}

fn keyword_hits(text: &str, keywords: &[&str], verb: &str) -> Vec<String> {
    keywords
        .iter()
        .filter(|kw| text.contains(*kw))
        .map(|kw| format!("{} {}", verb, kw))
        .collect()
}

/// Themes implied by which entity types were found.
pub fn entity_themes(entities: &[EntityMention]) -> Vec<String> {
    let mut themes = Vec::new();
    if entities.iter().any(|e| e.entity_type == MentionType::Organization) {
        themes.push("professional_experience".to_string());
    }
    if entities.iter().any(|e| e.entity_type == MentionType::Person) {
        themes.push("relationships".to_string());
    }
    themes
}

/// Pattern-based insights used when the LLM is unavailable.
pub fn fallback_insights(text: &str, entities: &[EntityMention]) -> KeyInsights {
    let lowered = text.to_lowercase();

    let mut insights = KeyInsights {
        skills_and_competencies: entities
            .iter()
            .filter(|e| e.entity_type == MentionType::Skill)
            .map(|e| e.text.clone())
            .collect(),
        professional_experience: entities
            .iter()
            .filter(|e| e.entity_type == MentionType::Organization)
            .map(|e| format!("Experience at {}", e.text))
            .collect(),
        goals_and_aspirations: captures(&GOAL_PATTERNS, &lowered),
        achievements_and_experiences: captures(&ACHIEVEMENT_PATTERNS, &lowered),
        main_themes: entity_themes(entities),
        ..Default::default()
    };

    insights
        .skills_and_competencies
        .extend(keyword_hits(&lowered, &SKILL_KEYWORDS, "Mentioned"));
    insights
        .achievements_and_experiences
        .extend(keyword_hits(&lowered, &ACHIEVEMENT_KEYWORDS, "Discussed"));
    insights
        .goals_and_aspirations
        .extend(keyword_hits(&lowered, &GOAL_KEYWORDS, "Mentioned"));

    insights
}

fn entity_summary(entities: &[EntityMention]) -> BTreeMap<String, Vec<String>> {
    let mut summary: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for entity in entities {
        summary
            .entry(entity.entity_type.as_str().to_string())
            .or_default()
            .push(entity.text.clone());
    }
    summary
}

async fn request_insights(
    llm: &dyn LlmClient,
    text: &str,
    entities: &[EntityMention],
) -> Result<KeyInsights> {
    let prompt = build_insights_prompt(text, &entity_summary(entities));
    let json = llm
        .generate_json_with_retry(&prompt, &GenerationOptions::default(), 2)
        .await
        .context("Failed to generate key insights")?;

    serde_json::from_str(&json).context("Failed to parse key insights")
}

/// Ask the LLM for insights, falling back to pattern matching on any failure.
pub async fn llm_insights(llm: &dyn LlmClient, text: &str, entities: &[EntityMention]) -> KeyInsights {
    match request_insights(llm, text, entities).await {
        Ok(mut insights) => {
            if insights.main_themes.is_empty() {
                insights.main_themes = entity_themes(entities);
            }
            insights
        }
        Err(e) => {
            tracing::warn!(error = %e, "LLM insights failed, using pattern fallback");
            fallback_insights(text, entities)
        }
    }
}
