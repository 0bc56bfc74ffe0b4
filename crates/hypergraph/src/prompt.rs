use crate::candidates::CandidateEntity;
use extract::prompt::truncate_chars;

pub fn build_entity_prompt(text: &str) -> String {
    format!(
        r#"Extract high-quality entities from this text. Focus on:
- FINANCIAL_INSTRUMENT: specific financial products or investment types
- BUSINESS_CONCEPT: business strategies, methodologies, frameworks
- TOPIC: specific subject areas or domains discussed

TEXT:
{}

Return only clear, specific entities. Avoid generic terms.

Return ONLY a JSON object:
{{"entities": [{{"text": "entity name", "type": "FINANCIAL_INSTRUMENT|BUSINESS_CONCEPT|TOPIC", "confidence": 0.0, "context": "why it matters"}}]}}

JSON OUTPUT:"#,
        truncate_chars(text, 1000)
    )
}

pub fn build_relationship_prompt(first: &CandidateEntity, second: &CandidateEntity, text: &str) -> String {
    format!(
        r#"Decide whether there is a meaningful relationship between "{a}" and "{b}".

Entity 1: {a} (type: {a_type})
Entity 2: {b} (type: {b_type})

CONTEXT:
{context}

Return ONLY a JSON object:
{{"has_relationship": true, "relationship_type": "RELATES_TO|ENABLES|REQUIRES|WORKS_WITH", "confidence": 0.0, "evidence": "brief evidence", "reasoning": "why they are related"}}

JSON OUTPUT:"#,
        a = first.text,
        b = second.text,
        a_type = first.entity_type,
        b_type = second.entity_type,
        context = truncate_chars(text, 800)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::NodeType;

    #[test]
    fn relationship_prompt_names_both_entities_and_limits_context() {
        let a = CandidateEntity::new("Jane", NodeType::Person, 0.9, "file_analysis");
        let b = CandidateEntity::new("Annuities", NodeType::FinancialInstrument, 0.8, "file_analysis");
        let text = "x".repeat(2000);

        let prompt = build_relationship_prompt(&a, &b, &text);
        assert!(prompt.contains("Entity 1: Jane (type: person)"));
        assert!(prompt.contains("(type: financial_instrument)"));
        assert!(!prompt.contains(&"x".repeat(801)));
    }
}
