pub mod conversation;
pub mod entities;
pub mod insights;
pub mod llm;
pub mod normalizer;
pub mod prompt;
pub mod schema;

pub use conversation::{analyze_conversation, overall_confidence};
pub use entities::{entity_quality, extract_entities};
pub use insights::{fallback_insights, llm_insights};
pub use llm::{extract_json_block, DisabledLlm, GenerationOptions, LlmClient, OllamaClient};
pub use normalizer::clean_entity_text;
pub use schema::{
    CommunicationStyle, ConversationAnalysis, EntityMention, InterviewResult, KeyInsights,
    MentionType, SentimentDistribution,
};

use anyhow::{Context, Result};
use ingest::{estimate_duration_minutes, parse_interview_structure, speaker_dynamics, strip_front_matter};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Turns a raw transcript into entities, insights and conversation metrics.
pub struct InterviewProcessor {
    llm: Arc<dyn LlmClient>,
}

impl Default for InterviewProcessor {
    fn default() -> Self {
        Self::new(Arc::new(OllamaClient::default()))
    }
}

impl InterviewProcessor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Process a transcript. Any front-matter header is stripped first.
    pub async fn process(&self, file_path: &str, text: &str) -> Result<InterviewResult> {
        let start = Instant::now();
        let body = strip_front_matter(text);

        let structure = parse_interview_structure(body);
        let dynamics = speaker_dynamics(&structure);
        let entities = extract_entities(body);
        let key_insights = llm_insights(self.llm.as_ref(), body, &entities).await;
        let conversation_analysis = analyze_conversation(body);

        let entity_quality_score = entity_quality(&entities, body);
        let confidence = overall_confidence(&entities, &key_insights, &conversation_analysis);

        tracing::info!(
            file = file_path,
            entities = entities.len(),
            insights = key_insights.total(),
            confidence,
            "Processed interview"
        );

        Ok(InterviewResult {
            file_path: file_path.to_string(),
            raw_text: body.to_string(),
            structure,
            speaker_dynamics: dynamics,
            entities,
            key_insights,
            conversation_analysis,
            confidence,
            entity_quality_score,
            duration_estimate_minutes: estimate_duration_minutes(body),
            processing_time_secs: start.elapsed().as_secs_f64(),
        })
    }

    pub async fn process_file(&self, path: &Path) -> Result<InterviewResult> {
        let text = ingest::FileReader::read_file(path)
            .await
            .context("Failed to load transcript")?;
        self.process(&path.to_string_lossy(), &text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSCRIPT: &str = "---\n{\"content_type\": \"interview_transcript\"}\n---\n\
        Host: Welcome Jon Fortt. What was it like at Microsoft?\n\
        Jon Fortt: It was great. I worked with Satya Nadella and I want to build new products.";

    #[tokio::test]
    async fn process_without_llm_uses_fallbacks() {
        let processor = InterviewProcessor::new(Arc::new(DisabledLlm));
        let result = processor.process("interviews/jon.txt", TRANSCRIPT).await.unwrap();

        assert!(!result.raw_text.starts_with("---"));
        assert_eq!(result.structure.speakers, vec!["Host", "Jon Fortt"]);
        assert!(result.speaker_dynamics.is_some());
        assert!(result
            .entities
            .iter()
            .any(|e| e.entity_type == MentionType::Organization && e.text == "Microsoft"));
        assert!(result
            .key_insights
            .goals_and_aspirations
            .contains(&"build new products".to_string()));
        assert!(result.confidence > 0.0 && result.confidence <= 1.0);
    }

    #[tokio::test]
    async fn process_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("interview.txt");
        std::fs::write(&path, "Host: Hi\nGuest: Hello, good to be here.").unwrap();

        let processor = InterviewProcessor::new(Arc::new(DisabledLlm));
        let result = processor.process_file(&path).await.unwrap();
        assert_eq!(result.structure.total_segments, 2);
    }
}
