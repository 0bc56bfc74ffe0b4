use ingest::{InterviewStructure, SpeakerDynamics};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MentionType {
    Person,
    Organization,
    Skill,
    Location,
    Date,
    Technology,
}

impl MentionType {
    pub const ALL: [MentionType; 6] = [
        MentionType::Person,
        MentionType::Organization,
        MentionType::Skill,
        MentionType::Location,
        MentionType::Date,
        MentionType::Technology,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MentionType::Person => "PERSON",
            MentionType::Organization => "ORGANIZATION",
            MentionType::Skill => "SKILL",
            MentionType::Location => "LOCATION",
            MentionType::Date => "DATE",
            MentionType::Technology => "TECHNOLOGY",
        }
    }
}

/// An entity found in the raw text by pattern matching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityMention {
    pub text: String,
    pub entity_type: MentionType,
    pub confidence: f64,
    /// Byte offsets into the source text
    pub start: usize,
    pub end: usize,
    pub context: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KeyInsights {
    pub skills_and_competencies: Vec<String>,
    pub professional_experience: Vec<String>,
    pub achievements_and_experiences: Vec<String>,
    pub goals_and_aspirations: Vec<String>,
    pub challenges_and_problem_solving: Vec<String>,
    pub leadership_and_teamwork: Vec<String>,
    pub learning_and_development: Vec<String>,
    pub main_themes: Vec<String>,
}

impl KeyInsights {
    pub fn total(&self) -> usize {
        self.categories().iter().map(|(_, items)| items.len()).sum()
    }

    pub fn categories(&self) -> [(&'static str, &Vec<String>); 8] {
        [
            ("skills_and_competencies", &self.skills_and_competencies),
            ("professional_experience", &self.professional_experience),
            ("achievements_and_experiences", &self.achievements_and_experiences),
            ("goals_and_aspirations", &self.goals_and_aspirations),
            ("challenges_and_problem_solving", &self.challenges_and_problem_solving),
            ("leadership_and_teamwork", &self.leadership_and_teamwork),
            ("learning_and_development", &self.learning_and_development),
            ("main_themes", &self.main_themes),
        ]
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SentimentDistribution {
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
}

impl Default for SentimentDistribution {
    fn default() -> Self {
        Self {
            positive: 0.5,
            negative: 0.1,
            neutral: 0.4,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationStyle {
    Inquisitive,
    Enthusiastic,
    Detailed,
    Concise,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationAnalysis {
    pub speaker_turns: usize,
    pub avg_response_length: f64,
    pub sentiment_distribution: SentimentDistribution,
    pub engagement_score: f64,
    pub communication_style: CommunicationStyle,
}

/// Everything the interview stage knows about one transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewResult {
    pub file_path: String,
    pub raw_text: String,
    pub structure: InterviewStructure,
    pub speaker_dynamics: Option<SpeakerDynamics>,
    pub entities: Vec<EntityMention>,
    pub key_insights: KeyInsights,
    pub conversation_analysis: ConversationAnalysis,
    pub confidence: f64,
    pub entity_quality_score: f64,
    pub duration_estimate_minutes: f64,
    pub processing_time_secs: f64,
}

impl InterviewResult {
    pub fn entities_of(&self, entity_type: MentionType) -> impl Iterator<Item = &EntityMention> {
        self.entities
            .iter()
            .filter(move |e| e.entity_type == entity_type)
    }
}
