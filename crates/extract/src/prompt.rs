use std::collections::BTreeMap;

/// First `max_chars` characters of `text`, never splitting a character.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn build_insights_prompt(text: &str, entity_summary: &BTreeMap<String, Vec<String>>) -> String {
    let entities = serde_json::to_string(entity_summary).unwrap_or_default();
    format!(
        r#"Analyze this interview transcript and extract key insights.

TEXT:
{}

EXTRACTED ENTITIES:
{}

Return ONLY a JSON object with these keys, each a list of short strings:
{{
  "skills_and_competencies": [],
  "professional_experience": [],
  "achievements_and_experiences": [],
  "goals_and_aspirations": [],
  "challenges_and_problem_solving": [],
  "leadership_and_teamwork": [],
  "learning_and_development": [],
  "main_themes": []
}}

JSON OUTPUT:"#,
        truncate_chars(text, 2000),
        entities
    )
}

pub fn build_retry_prompt(invalid_json: &str) -> String {
    format!(
        r#"The following JSON is invalid:

{}

Fix this JSON. Output only valid JSON with no markdown formatting, no code blocks, no explanations. Just the raw JSON object."#,
        invalid_json
    )
}
