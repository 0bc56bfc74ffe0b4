use crate::frontmatter::{parse_front_matter, DocumentMetadata};
use crate::reader::FileReader;
use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

static SPEAKER_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^([A-Za-z\s]+):\s*").expect("valid speaker regex"));

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("valid sentence regex"));

const TECHNICAL_KEYWORDS: [&str; 6] = [
    "technology",
    "software",
    "engineering",
    "development",
    "system",
    "algorithm",
];

const NLP_MIN_WORDS: usize = 50;

/// Downstream stages a document is routed through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Agent {
    InterviewProcessing,
    NlpProcessing,
    NeedsAnalysis,
    HypergraphBuilder,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentAnalysis {
    pub content_type: String,
    pub word_count: usize,
    pub character_count: usize,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessingRequirements {
    pub processing_depth: String,
    pub estimated_time_secs: f64,
    pub priority: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileAnalysis {
    pub file_path: String,
    pub file_type: String,
    pub content_type: String,
    pub complexity_score: f64,
    pub required_agents: Vec<Agent>,
    pub metadata: DocumentMetadata,
    pub content_analysis: ContentAnalysis,
    pub requirements: ProcessingRequirements,
}

impl FileAnalysis {
    pub fn requires(&self, agent: Agent) -> bool {
        self.required_agents.contains(&agent)
    }
}

/// Raw counts that feed the complexity score.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TextStats {
    pub words: usize,
    pub sentences: usize,
    pub paragraphs: usize,
    pub speakers: usize,
    pub technical_hits: usize,
}

impl TextStats {
    pub fn of(content: &str) -> Self {
        let speakers: HashSet<&str> = SPEAKER_PREFIX
            .captures_iter(content)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .collect();

        let lowered = content.to_lowercase();

        Self {
            words: content.split_whitespace().count(),
            sentences: SENTENCE_END.split(content).count(),
            paragraphs: content.split("\n\n").count(),
            speakers: speakers.len(),
            technical_hits: TECHNICAL_KEYWORDS
                .iter()
                .filter(|kw| lowered.contains(*kw))
                .count(),
        }
    }
}

pub fn complexity_score(content: &str) -> f64 {
    let stats = TextStats::of(content);

    let word_factor = (stats.words as f64 / 2000.0).min(1.0);
    let speaker_factor = (stats.speakers as f64 / 5.0).min(1.0);
    let paragraph_factor = (stats.paragraphs as f64 / 20.0).min(1.0);
    let technical_factor = stats.technical_hits as f64 / TECHNICAL_KEYWORDS.len() as f64;

    let score = word_factor * 0.3 + speaker_factor * 0.3 + paragraph_factor * 0.2 + technical_factor * 0.2;
    score.min(1.0)
}

pub fn required_agents(content: &str, metadata: &DocumentMetadata) -> Vec<Agent> {
    let mut agents = vec![Agent::InterviewProcessing];

    if content.split_whitespace().count() > NLP_MIN_WORDS {
        agents.push(Agent::NlpProcessing);
    }
    if metadata.content_type == "interview_transcript" {
        agents.push(Agent::NeedsAnalysis);
    }

    agents.push(Agent::HypergraphBuilder);
    agents
}

pub fn processing_requirements(complexity: f64) -> ProcessingRequirements {
    ProcessingRequirements {
        processing_depth: if complexity > 0.7 { "detailed" } else { "standard" }.to_string(),
        estimated_time_secs: complexity * 60.0,
        priority: if complexity > 0.8 { "high" } else { "normal" }.to_string(),
    }
}

pub struct FileAnalyzer;

impl FileAnalyzer {
    pub async fn analyze(path: &Path) -> Result<FileAnalysis> {
        let content = FileReader::read_file(path).await?;
        let file_path = path.to_string_lossy().to_string();
        Ok(Self::analyze_content(&file_path, &content))
    }

    /// Analyze content that is already in memory.
    pub fn analyze_content(file_path: &str, content: &str) -> FileAnalysis {
        let metadata = parse_front_matter(content);
        let complexity = complexity_score(content);
        let agents = required_agents(content, &metadata);

        let file_type = Path::new(file_path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_lowercase()))
            .unwrap_or_default();

        tracing::debug!(
            file = file_path,
            complexity,
            agents = agents.len(),
            "Analyzed file"
        );

        FileAnalysis {
            file_path: file_path.to_string(),
            file_type,
            content_type: metadata.content_type.clone(),
            complexity_score: complexity,
            required_agents: agents,
            content_analysis: ContentAnalysis {
                content_type: metadata.content_type.clone(),
                word_count: content.split_whitespace().count(),
                character_count: content.chars().count(),
                language: metadata.language.clone(),
            },
            requirements: processing_requirements(complexity),
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_distinct_speakers_and_keywords() {
        let content = "Host: Tell me about the system.\nGuest: I build software.\nHost: And?";
        let stats = TextStats::of(content);

        assert_eq!(stats.speakers, 2);
        assert_eq!(stats.technical_hits, 2);
        assert_eq!(stats.paragraphs, 1);
    }

    #[test]
    fn complexity_matches_weighted_factors() {
        let content = "A: one\n\nB: two";
        // 4 words, 2 speakers, 2 paragraphs, no keywords
        let expected = (4.0 / 2000.0) * 0.3 + (2.0 / 5.0) * 0.3 + (2.0 / 20.0) * 0.2;
        assert!((complexity_score(content) - expected).abs() < 1e-9);
    }

    #[test]
    fn complexity_is_capped() {
        let mut content = String::new();
        for name in ["Ann", "Bob", "Cat", "Dan", "Eve", "Fay"] {
            for _ in 0..5 {
                content.push_str(name);
                content.push_str(": technology software engineering development system algorithm ");
                content.push_str(&"word ".repeat(100));
                content.push_str("\n\n");
            }
        }
        assert!(complexity_score(&content) <= 1.0);
    }

    #[test]
    fn short_non_interview_skips_nlp_and_needs() {
        let metadata = DocumentMetadata {
            content_type: "financial_advice".to_string(),
            ..Default::default()
        };
        let agents = required_agents("short text", &metadata);
        assert_eq!(agents, vec![Agent::InterviewProcessing, Agent::HypergraphBuilder]);
    }

    #[test]
    fn long_interview_gets_every_agent() {
        let content = "word ".repeat(60);
        let agents = required_agents(&content, &DocumentMetadata::default());
        assert_eq!(agents.len(), 4);
        assert!(agents.contains(&Agent::NeedsAnalysis));
    }

    #[test]
    fn requirements_follow_thresholds() {
        let high = processing_requirements(0.85);
        assert_eq!(high.processing_depth, "detailed");
        assert_eq!(high.priority, "high");

        let mid = processing_requirements(0.75);
        assert_eq!(mid.processing_depth, "detailed");
        assert_eq!(mid.priority, "normal");

        let low = processing_requirements(0.2);
        assert_eq!(low.processing_depth, "standard");
        assert!((low.estimated_time_secs - 12.0).abs() < 1e-9);
    }

    #[test]
    fn analyze_content_reads_front_matter() {
        let content = "---\n{\"content_type\": \"personal_story\"}\n---\nI grew up by the sea.";
        let analysis = FileAnalyzer::analyze_content("stories/tim.MD", content);

        assert_eq!(analysis.file_type, ".md");
        assert_eq!(analysis.content_type, "personal_story");
        assert!(!analysis.requires(Agent::NeedsAnalysis));
    }
}
