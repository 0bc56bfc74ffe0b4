pub mod indicators;
pub mod profile;
pub mod prompt;
pub mod schema;
pub mod scoring;

pub use indicators::{indicators, NeedIndicators};
pub use schema::{ContentType, DominantNeed, HumanNeed, NeedsAnalysis, NeedsScores};
pub use scoring::{
    combine, confidence, content_aware_scores, dominant_needs, keyword_scores, parse_llm_scores,
};

use extract::{GenerationOptions, InterviewResult, KeyInsights, LlmClient};
use std::sync::Arc;

/// Text plus context handed to the needs analyzer.
#[derive(Debug, Clone, Default)]
pub struct NeedsInput {
    pub content: String,
    pub content_type: ContentType,
    pub themes: Vec<String>,
    pub entities: Vec<String>,
    pub insights: Option<KeyInsights>,
}

impl NeedsInput {
    pub fn from_text(text: &str, content_type: ContentType) -> Self {
        Self {
            content: text.to_string(),
            content_type,
            ..Default::default()
        }
    }

    pub fn from_interview(interview: &InterviewResult, content_type: ContentType) -> Self {
        Self {
            content: analysis_content(interview),
            content_type,
            themes: interview.key_insights.main_themes.clone(),
            entities: interview.entities.iter().map(|e| e.text.clone()).collect(),
            insights: Some(interview.key_insights.clone()),
        }
    }
}

/// Raw transcript followed by the serialized insights and conversation dynamics.
pub fn analysis_content(interview: &InterviewResult) -> String {
    let mut parts = vec![interview.raw_text.clone()];

    if let Ok(insights) = serde_json::to_string(&interview.key_insights) {
        parts.push(format!("Key insights: {}", insights));
    }
    if let Ok(dynamics) = serde_json::to_string(&interview.conversation_analysis) {
        parts.push(format!("Conversation dynamics: {}", dynamics));
    }

    parts.join(" ")
}

pub struct NeedsAnalyzer {
    llm: Arc<dyn LlmClient>,
}

impl NeedsAnalyzer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// LLM need scores, or content-aware scores when the reply is unusable.
    /// The flag is true when the fallback was taken.
    pub async fn llm_scores(&self, input: &NeedsInput) -> (NeedsScores, bool) {
        let prompt = prompt::build_needs_prompt(
            &input.content,
            input.content_type,
            &input.themes,
            &input.entities,
        );
        let options = GenerationOptions::default()
            .with_max_tokens(2000)
            .with_temperature(0.4);

        match self.llm.generate(&prompt, &options).await {
            Ok(reply) => match parse_llm_scores(&reply, input.content_type) {
                Some(scores) => (scores, false),
                None => {
                    tracing::warn!(
                        content_type = input.content_type.as_str(),
                        "Could not parse LLM needs scores, using content-aware scores"
                    );
                    (content_aware_scores(input.content_type, &input.themes), true)
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "LLM needs scoring failed, using content-aware scores");
                (content_aware_scores(input.content_type, &input.themes), true)
            }
        }
    }

    pub async fn analyze(&self, input: &NeedsInput) -> NeedsAnalysis {
        let keyword = keyword_scores(&input.content);
        let (llm, llm_fallback) = self.llm_scores(input).await;
        let final_scores = combine(&keyword, &llm);
        let dominant = dominant_needs(&final_scores);

        let insights_json = input
            .insights
            .as_ref()
            .and_then(|i| serde_json::to_string(i).ok())
            .unwrap_or_else(|| "{}".to_string());
        let main_themes = input
            .insights
            .as_ref()
            .map(|i| i.main_themes.clone())
            .unwrap_or_else(|| input.themes.clone());

        let llm_client = self.llm.as_ref();
        let behavioral_patterns =
            profile::behavioral_patterns(llm_client, &input.content, &insights_json, &keyword, input.content_type)
                .await;
        let personality_traits =
            profile::personality_traits(llm_client, &input.content, &final_scores, input.content_type).await;
        let life_themes = profile::life_themes(
            llm_client,
            &input.content,
            &insights_json,
            &main_themes,
            &dominant,
            input.content_type,
        )
        .await;

        let confidence_score = confidence(&keyword, &llm, &input.content);

        tracing::info!(
            content_type = input.content_type.as_str(),
            top_need = ?dominant.first().map(|d| d.need),
            confidence = confidence_score,
            llm_fallback,
            "Needs analysis complete"
        );

        NeedsAnalysis {
            content_type: input.content_type,
            needs_scores: final_scores,
            dominant_needs: dominant,
            behavioral_patterns,
            personality_traits,
            life_themes,
            confidence_score,
            keyword_scores: keyword,
            llm_scores: llm,
            llm_fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use extract::{DisabledLlm, InterviewProcessor};

    /// Answers need scoring with fixed scores and every list prompt with one label.
    struct Scripted;

    #[async_trait]
    impl LlmClient for Scripted {
        async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> Result<String> {
            if prompt.contains("needs_scores") {
                Ok(r#"{"needs_scores": {"certainty": 0.2, "variety": 0.1, "significance": 0.8, "connection": {"score": 0.7}, "growth": 0.9, "contribution": 0.4}}"#.to_string())
            } else if prompt.contains("behavioral patterns") {
                Ok(r#"["Leads by example"]"#.to_string())
            } else if prompt.contains("personality traits") {
                Ok(r#"["Driven"]"#.to_string())
            } else {
                Ok(r#"[{"theme": "Career progression"}]"#.to_string())
            }
        }
    }

    const TEXT: &str = "I lead my team and I always want to learn and grow. Recognition matters to me.";

    #[tokio::test]
    async fn analyze_with_llm() {
        let analyzer = NeedsAnalyzer::new(Arc::new(Scripted));
        let analysis = analyzer
            .analyze(&NeedsInput::from_text(TEXT, ContentType::InterviewTranscript))
            .await;

        assert!(!analysis.llm_fallback);
        assert_eq!(analysis.llm_scores.connection, 0.7);
        assert_eq!(analysis.top_need().map(|d| d.need), Some(HumanNeed::Growth));
        assert_eq!(analysis.behavioral_patterns, vec!["Leads by example"]);
        assert_eq!(analysis.personality_traits, vec!["Driven"]);
        assert_eq!(analysis.life_themes, vec!["Career progression"]);

        let expected = 0.3 * analysis.keyword_scores.growth + 0.7 * 0.9;
        assert!((analysis.needs_scores.growth - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn analyze_without_llm_uses_fallbacks() {
        let analyzer = NeedsAnalyzer::new(Arc::new(DisabledLlm));
        let analysis = analyzer
            .analyze(&NeedsInput::from_text(TEXT, ContentType::General))
            .await;

        assert!(analysis.llm_fallback);
        assert_eq!(analysis.llm_scores, content_aware_scores(ContentType::General, &[]));
        assert_eq!(analysis.dominant_needs.len(), 3);
        assert!(!analysis.behavioral_patterns.is_empty());
        assert!(!analysis.personality_traits.is_empty());
        assert_eq!(analysis.life_themes.len(), 3);
        assert!(analysis.confidence_score > 0.0 && analysis.confidence_score <= 1.0);
    }

    /// Replies to need scoring in prose and fails every list prompt.
    struct Prose;

    #[async_trait]
    impl LlmClient for Prose {
        async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> Result<String> {
            if prompt.contains("needs_scores") {
                Ok("Scores:\nCertainty: 9\nGrowth: 0.6\nSignificance: 0.2".to_string())
            } else {
                anyhow::bail!("list prompts unsupported")
            }
        }
    }

    #[tokio::test]
    async fn prose_scores_are_used_with_content_fallbacks() {
        let analyzer = NeedsAnalyzer::new(Arc::new(Prose));
        let input = NeedsInput::from_text("The quarterly figures were reviewed.", ContentType::FinancialAdvice);
        let analysis = analyzer.analyze(&input).await;

        assert!(!analysis.llm_fallback);
        assert!((analysis.llm_scores.certainty - 0.9).abs() < 1e-9);
        assert_eq!(analysis.llm_scores.growth, 0.6);
        assert_eq!(analysis.llm_scores.contribution, 0.5);
        assert_eq!(analysis.behavioral_patterns, vec!["Strategic planner", "Risk manager", "Client educator"]);
        assert_eq!(analysis.life_themes[0], "Financial security");
    }

    #[tokio::test]
    async fn failed_scoring_uses_content_type_and_themes() {
        let analyzer = NeedsAnalyzer::new(Arc::new(DisabledLlm));
        let input = NeedsInput {
            themes: vec!["Leadership".to_string()],
            ..NeedsInput::from_text("We met on Tuesday.", ContentType::InterviewTranscript)
        };
        let analysis = analyzer.analyze(&input).await;

        assert!(analysis.llm_fallback);
        assert_eq!(analysis.llm_scores.significance, 1.0);
        assert_eq!(analysis.top_need().map(|d| d.need), Some(HumanNeed::Significance));
        assert_eq!(analysis.life_themes, vec!["Leadership"]);
    }

    #[tokio::test]
    async fn interview_content_includes_insights_and_dynamics() {
        let processor = InterviewProcessor::new(Arc::new(DisabledLlm));
        let interview = processor
            .process("jon.txt", "Host: Why do you work?\nJon: To help others and give back.")
            .await
            .unwrap();

        let input = NeedsInput::from_interview(&interview, ContentType::InterviewTranscript);
        assert!(input.content.starts_with("Host: Why do you work?"));
        assert!(input.content.contains("Key insights: "));
        assert!(input.content.contains("Conversation dynamics: "));
        assert!(keyword_scores(&input.content).contribution > 0.0);
    }
}
