use crate::schema::{EntityMention, MentionType};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

const CONTEXT_WINDOW: usize = 50;
const BASE_CONFIDENCE: f64 = 0.7;
const CONTEXT_BOOST: f64 = 0.2;
const MIN_CONFIDENCE: f64 = 0.5;

/// Name-shape patterns are case sensitive; vocabulary patterns are not.
const PATTERNS: &[(MentionType, &str)] = &[
    (MentionType::Person, r"\b[A-Z][a-z]+ [A-Z][a-z]+\b"),
    (MentionType::Person, r"\b(?:Mr|Mrs|Ms|Dr|Prof)\.? [A-Z][a-z]+\b"),
    (MentionType::Organization, r"\b[A-Z][a-zA-Z]+ (?:Inc|Corp|LLC|Ltd|Company|Corporation)\b"),
    (MentionType::Organization, r"(?i)\b(?:Google|Microsoft|Apple|Amazon|Meta|Tesla|Netflix)\b"),
    (MentionType::Organization, r"\bUniversity of [A-Z][a-z]+\b"),
    (MentionType::Skill, r"(?i)\b(?:Python|JavaScript|Java|React|Angular|Vue|Node\.js)\b"),
    (MentionType::Skill, r"(?i)\b(?:machine learning|artificial intelligence|data science)\b"),
    (MentionType::Skill, r"(?i)\b(?:leadership|management|communication|teamwork)\b"),
    (MentionType::Location, r"\b[A-Z][a-z]+, [A-Z]{2}\b"),
    (MentionType::Location, r"(?i)\b(?:New York|Los Angeles|Chicago|Houston|Phoenix|Philadelphia)\b"),
    (
        MentionType::Date,
        r"(?i)\b(?:January|February|March|April|May|June|July|August|September|October|November|December) \d{1,2}, \d{4}\b",
    ),
    (MentionType::Date, r"\b\d{1,2}/\d{1,2}/\d{4}\b"),
    (MentionType::Date, r"\b\d{4}-\d{2}-\d{2}\b"),
    (
        MentionType::Technology,
        r"(?i)\b(?:cloud computing|blockchain|kubernetes|aws|azure|iphone|android|software|platform|AI)\b",
    ),
];

static COMPILED: LazyLock<Vec<(MentionType, Regex)>> = LazyLock::new(|| {
    PATTERNS
        .iter()
        .map(|(kind, pattern)| (*kind, Regex::new(pattern).expect("valid entity pattern")))
        .collect()
});

fn context_cues(entity_type: MentionType) -> &'static [&'static str] {
    match entity_type {
        MentionType::Person => &["worked with", "colleague", "manager", "team member"],
        MentionType::Organization => &["worked at", "company", "employer", "organization"],
        MentionType::Skill => &["experience with", "skilled in", "proficient", "expertise"],
        _ => &[],
    }
}

fn floor_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_boundary(text: &str, mut idx: usize) -> usize {
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

fn context_around(text: &str, start: usize, end: usize) -> String {
    let from = floor_boundary(text, start.saturating_sub(CONTEXT_WINDOW));
    let to = ceil_boundary(text, (end + CONTEXT_WINDOW).min(text.len()));
    text[from..to].trim().to_string()
}

pub fn mention_confidence(entity_type: MentionType, context: &str) -> f64 {
    let context = context.to_lowercase();
    let boosted = context_cues(entity_type)
        .iter()
        .any(|cue| context.contains(cue));

    let confidence = if boosted {
        BASE_CONFIDENCE + CONTEXT_BOOST
    } else {
        BASE_CONFIDENCE
    };
    confidence.min(1.0)
}

/// Keep the most confident mention per (lowercase text, type), in first-seen order.
pub fn deduplicate_mentions(mentions: Vec<EntityMention>) -> Vec<EntityMention> {
    let mut index: HashMap<(String, MentionType), usize> = HashMap::new();
    let mut unique: Vec<EntityMention> = Vec::new();

    for mention in mentions {
        let key = (mention.text.to_lowercase(), mention.entity_type);
        match index.get(&key) {
            Some(&i) if mention.confidence > unique[i].confidence => unique[i] = mention,
            Some(_) => {}
            None => {
                index.insert(key, unique.len());
                unique.push(mention);
            }
        }
    }

    unique
}

pub fn extract_entities(text: &str) -> Vec<EntityMention> {
    let mut mentions = Vec::new();

    for (entity_type, pattern) in COMPILED.iter() {
        for m in pattern.find_iter(text) {
            let context = context_around(text, m.start(), m.end());
            mentions.push(EntityMention {
                text: m.as_str().to_string(),
                entity_type: *entity_type,
                confidence: mention_confidence(*entity_type, &context),
                start: m.start(),
                end: m.end(),
                context,
            });
        }
    }

    let mut mentions = deduplicate_mentions(mentions);
    mentions.retain(|m| m.confidence > MIN_CONFIDENCE);

    tracing::debug!(count = mentions.len(), "Extracted entity mentions");
    mentions
}

/// Blend of average confidence, type diversity, and coverage per 50 words.
pub fn entity_quality(entities: &[EntityMention], text: &str) -> f64 {
    if entities.is_empty() {
        return 0.0;
    }

    let avg_confidence = entities.iter().map(|e| e.confidence).sum::<f64>() / entities.len() as f64;
    let distinct_types: HashSet<MentionType> = entities.iter().map(|e| e.entity_type).collect();
    let diversity = distinct_types.len() as f64 / 5.0;
    let words = text.split_whitespace().count() as f64;
    let coverage = entities.len() as f64 / (words / 50.0).max(1.0);

    (avg_confidence * 0.5 + diversity * 0.3 + coverage.min(1.0) * 0.2).min(1.0)
}
