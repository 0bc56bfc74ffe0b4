use crate::schema::{ContentType, DominantNeed, HumanNeed, NeedsScores};
use extract::prompt::truncate_chars;

const FRAMEWORK: &str = "Score the text against six human needs:
1. certainty (security, comfort, predictability)
2. variety (adventure, change, novelty)
3. significance (importance, uniqueness, recognition)
4. connection (love, belonging, intimacy)
5. growth (learning, developing, expanding)
6. contribution (giving, serving, making a difference)";

fn focus(content_type: ContentType, themes: &[String]) -> &'static str {
    let entrepreneurial = themes
        .iter()
        .any(|t| t.to_lowercase().contains("entrepreneurship"));

    match content_type {
        ContentType::InterviewTranscript => {
            "FOCUS: career motivations, leadership style, responses to challenges, relationships with others."
        }
        ContentType::FinancialAdvice => {
            "FOCUS: motivations behind the advice, security versus growth orientation, advisor-audience relationship."
        }
        _ if content_type == ContentType::PersonalStory || entrepreneurial => {
            "FOCUS: core driving motivations, risk tolerance, growth mindset, desire for impact."
        }
        _ => "FOCUS: explicit and implicit motivations, value systems, attitudes toward change and stability.",
    }
}

pub fn build_needs_prompt(
    content: &str,
    content_type: ContentType,
    themes: &[String],
    entities: &[String],
) -> String {
    let themes_line = if themes.is_empty() {
        "None detected".to_string()
    } else {
        themes.join(", ")
    };
    let entities_line = if entities.is_empty() {
        "None detected".to_string()
    } else {
        entities.iter().take(5).cloned().collect::<Vec<_>>().join(", ")
    };

    format!(
        r#"{}

CONTENT TYPE: {}
KEY THEMES: {}
KEY ENTITIES: {}

{}

TEXT:
{}

Return ONLY a JSON object:
{{"needs_scores": {{"certainty": 0.0, "variety": 0.0, "significance": 0.0, "connection": 0.0, "growth": 0.0, "contribution": 0.0}}}}
Scores are between 0.0 and 1.0 and should reflect the evidence in this text.

JSON OUTPUT:"#,
        FRAMEWORK,
        content_type.as_str(),
        themes_line,
        entities_line,
        focus(content_type, themes),
        content
    )
}

pub fn build_patterns_prompt(content: &str, insights_json: &str) -> String {
    format!(
        r#"List the behavioral patterns shown in this text (leadership style, problem-solving approach, decision-making, learning style, goal orientation).

TEXT:
{}

INSIGHTS:
{}

Return ONLY a JSON array of short pattern names."#,
        truncate_chars(content, 1500),
        insights_json
    )
}

pub fn build_traits_prompt(content: &str, scores: &NeedsScores) -> String {
    let score_lines = HumanNeed::ALL
        .iter()
        .map(|need| format!("- {}: {:.2}", need.title(), scores.get(*need)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"List the personality traits suggested by this text and its needs scores (for example analytical, collaborative, risk-taking, optimistic).

TEXT:
{}

NEEDS SCORES:
{}

Return ONLY a JSON array of short trait names."#,
        truncate_chars(content, 1000),
        score_lines
    )
}

pub fn build_themes_prompt(content: &str, insights_json: &str, dominant: &[DominantNeed]) -> String {
    let dominant_line = dominant
        .iter()
        .map(|d| format!("{} ({:.2})", d.need, d.score))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"List the major life themes in this text (career progression, family, personal development, overcoming challenges, service).

TEXT:
{}

INSIGHTS:
{}

DOMINANT NEEDS: {}

Return ONLY a JSON array of short theme names."#,
        truncate_chars(content, 1200),
        insights_json,
        dominant_line
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entrepreneurial_themes_switch_focus() {
        let themes = vec!["Entrepreneurship".to_string()];
        let prompt = build_needs_prompt("text", ContentType::General, &themes, &[]);
        assert!(prompt.contains("risk tolerance"));
        assert!(prompt.contains("KEY ENTITIES: None detected"));
    }

    #[test]
    fn only_first_five_entities_are_listed() {
        let entities: Vec<String> = (1..=7).map(|i| format!("E{}", i)).collect();
        let prompt = build_needs_prompt("text", ContentType::InterviewTranscript, &[], &entities);
        assert!(prompt.contains("E5"));
        assert!(!prompt.contains("E6"));
    }
}
