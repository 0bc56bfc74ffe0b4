use crate::indicators::{indicators, pattern_label, trait_label};
use crate::prompt::{build_patterns_prompt, build_themes_prompt, build_traits_prompt};
use crate::schema::{ContentType, DominantNeed, HumanNeed, NeedsScores};
use anyhow::{Context, Result};
use extract::{GenerationOptions, LlmClient};
use serde_json::Value;

const MAX_FALLBACK_PATTERNS: usize = 5;
const TRAIT_THRESHOLD: f64 = 0.5;

/// Keys checked, in order, when a list item comes back as an object.
const LABEL_KEYS: [&str; 5] = ["name", "pattern", "trait", "theme", "label"];

fn item_label(item: &Value) -> Option<String> {
    let label = match item {
        Value::String(s) => s.trim().to_string(),
        Value::Object(map) => LABEL_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .or_else(|| map.values().find_map(Value::as_str))?
            .trim()
            .to_string(),
        _ => return None,
    };
    (!label.is_empty()).then_some(label)
}

/// Read a JSON array of labels. Strings are kept as-is; objects contribute
/// their name-like field.
pub fn parse_label_list(json: &str) -> Result<Vec<String>> {
    let value: Value = serde_json::from_str(json).context("Failed to parse label list")?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .into_iter()
            .find_map(|(_, v)| match v {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .context("Expected a JSON array of labels")?,
        _ => anyhow::bail!("Expected a JSON array of labels"),
    };
    Ok(items.iter().filter_map(item_label).collect())
}

async fn ask_for_labels(llm: &dyn LlmClient, prompt: &str, max_tokens: u32) -> Result<Vec<String>> {
    let options = GenerationOptions::default().with_max_tokens(max_tokens);
    let json = llm.generate_json_with_retry(prompt, &options, 2).await?;
    parse_label_list(&json)
}

/// Typical patterns, traits and themes for a kind of document.
struct ContentProfile {
    patterns: [&'static str; 3],
    traits: [&'static str; 3],
    themes: [&'static str; 3],
}

fn content_profile(content_type: ContentType) -> ContentProfile {
    match content_type {
        ContentType::FinancialAdvice => ContentProfile {
            patterns: ["Strategic planner", "Risk manager", "Client educator"],
            traits: ["Analytical", "Cautious", "Helpful"],
            themes: ["Financial security", "Professional expertise", "Client success"],
        },
        ContentType::InterviewTranscript => ContentProfile {
            patterns: ["Leadership-oriented", "Growth-focused", "Collaborative"],
            traits: ["Confident", "Articulate", "Visionary"],
            themes: ["Career advancement", "Innovation", "Leadership impact"],
        },
        ContentType::PersonalStory | ContentType::General => ContentProfile {
            patterns: ["Analytical thinker", "Goal-oriented", "Relationship-builder"],
            traits: ["Thoughtful", "Practical", "Communicative"],
            themes: ["Personal growth", "Achievement", "Relationships"],
        },
    }
}

fn owned(labels: [&str; 3]) -> Vec<String> {
    labels.iter().map(|l| l.to_string()).collect()
}

/// Patterns inferred from which needs have keyword evidence, strongest
/// first. Without any evidence the content type decides.
pub fn fallback_patterns(content: &str, keyword: &NeedsScores, content_type: ContentType) -> Vec<String> {
    let lowered = content.to_lowercase();
    let mut evident: Vec<(HumanNeed, f64)> = keyword
        .iter()
        .filter(|(need, _)| indicators(*need).keywords.iter().any(|kw| lowered.contains(kw)))
        .collect();
    if evident.is_empty() {
        return owned(content_profile(content_type).patterns);
    }
    evident.sort_by(|a, b| b.1.total_cmp(&a.1));

    evident
        .into_iter()
        .take(MAX_FALLBACK_PATTERNS)
        .map(|(need, _)| pattern_label(need).to_string())
        .collect()
}

/// Traits for every need scoring above the threshold, or the content type's
/// usual traits.
pub fn fallback_traits(scores: &NeedsScores, content_type: ContentType) -> Vec<String> {
    let traits: Vec<String> = scores
        .iter()
        .filter(|(_, score)| *score > TRAIT_THRESHOLD)
        .map(|(need, _)| trait_label(need).to_string())
        .collect();

    if traits.is_empty() {
        owned(content_profile(content_type).traits)
    } else {
        traits
    }
}

pub fn fallback_themes(main_themes: &[String], content_type: ContentType) -> Vec<String> {
    if !main_themes.is_empty() {
        return main_themes.to_vec();
    }
    owned(content_profile(content_type).themes)
}

pub async fn behavioral_patterns(
    llm: &dyn LlmClient,
    content: &str,
    insights_json: &str,
    keyword: &NeedsScores,
    content_type: ContentType,
) -> Vec<String> {
    match ask_for_labels(llm, &build_patterns_prompt(content, insights_json), 500).await {
        Ok(patterns) if !patterns.is_empty() => patterns,
        Ok(_) => fallback_patterns(content, keyword, content_type),
        Err(e) => {
            tracing::warn!(error = %e, "Behavioral pattern extraction failed, using keyword fallback");
            fallback_patterns(content, keyword, content_type)
        }
    }
}

pub async fn personality_traits(
    llm: &dyn LlmClient,
    content: &str,
    scores: &NeedsScores,
    content_type: ContentType,
) -> Vec<String> {
    match ask_for_labels(llm, &build_traits_prompt(content, scores), 400).await {
        Ok(traits) if !traits.is_empty() => traits,
        Ok(_) => fallback_traits(scores, content_type),
        Err(e) => {
            tracing::warn!(error = %e, "Personality trait extraction failed, using score fallback");
            fallback_traits(scores, content_type)
        }
    }
}

pub async fn life_themes(
    llm: &dyn LlmClient,
    content: &str,
    insights_json: &str,
    main_themes: &[String],
    dominant: &[DominantNeed],
    content_type: ContentType,
) -> Vec<String> {
    match ask_for_labels(llm, &build_themes_prompt(content, insights_json, dominant), 500).await {
        Ok(themes) if !themes.is_empty() => themes,
        Ok(_) => fallback_themes(main_themes, content_type),
        Err(e) => {
            tracing::warn!(error = %e, "Life theme extraction failed, using theme fallback");
            fallback_themes(main_themes, content_type)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::keyword_scores;

    #[test]
    fn label_lists_accept_strings_and_objects() {
        let labels =
            parse_label_list(r#"[" Team builder ", {"theme": "Career growth", "description": "x"}, 3, ""]"#)
                .unwrap();
        assert_eq!(labels, vec!["Team builder", "Career growth"]);
    }

    #[test]
    fn label_lists_unwrap_single_key_objects() {
        let labels = parse_label_list(r#"{"patterns": ["Planner"]}"#).unwrap();
        assert_eq!(labels, vec!["Planner"]);
        assert!(parse_label_list("42").is_err());
    }

    #[test]
    fn fallback_patterns_follow_keyword_evidence() {
        let content = "I love my family and my team. I also want to learn.";
        let patterns = fallback_patterns(content, &keyword_scores(content), ContentType::General);
        assert_eq!(patterns.first().map(String::as_str), Some("Builds relationships"));
        assert!(patterns.contains(&"Continuous learning".to_string()));
    }

    #[test]
    fn fallbacks_without_evidence_depend_on_content_type() {
        let content = "The quarterly figures were reviewed.";
        let keyword = keyword_scores(content);
        let low = NeedsScores::default();

        let financial = fallback_patterns(content, &keyword, ContentType::FinancialAdvice);
        let interview = fallback_patterns(content, &keyword, ContentType::InterviewTranscript);
        assert_eq!(financial, vec!["Strategic planner", "Risk manager", "Client educator"]);
        assert_eq!(interview, vec!["Leadership-oriented", "Growth-focused", "Collaborative"]);

        assert_eq!(fallback_traits(&low, ContentType::FinancialAdvice), vec!["Analytical", "Cautious", "Helpful"]);
        assert_eq!(fallback_traits(&low, ContentType::InterviewTranscript), vec!["Confident", "Articulate", "Visionary"]);
        assert_eq!(fallback_themes(&[], ContentType::FinancialAdvice)[0], "Financial security");
        assert_eq!(fallback_themes(&[], ContentType::PersonalStory)[0], "Personal growth");
    }

    #[test]
    fn fallback_traits_prefer_high_scores() {
        let scores = NeedsScores {
            growth: 0.7,
            ..Default::default()
        };
        assert_eq!(fallback_traits(&scores, ContentType::FinancialAdvice), vec!["Curious"]);
    }

    #[test]
    fn fallback_themes_prefer_insight_themes() {
        assert_eq!(
            fallback_themes(&["relationships".to_string()], ContentType::InterviewTranscript),
            vec!["relationships"]
        );
    }
}
