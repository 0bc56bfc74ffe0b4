use serde::{Deserialize, Serialize};
use std::fmt;

/// The six motivational needs text is scored against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum HumanNeed {
    Certainty,
    Variety,
    Significance,
    Connection,
    Growth,
    Contribution,
}

impl HumanNeed {
    pub const ALL: [HumanNeed; 6] = [
        HumanNeed::Certainty,
        HumanNeed::Variety,
        HumanNeed::Significance,
        HumanNeed::Connection,
        HumanNeed::Growth,
        HumanNeed::Contribution,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HumanNeed::Certainty => "certainty",
            HumanNeed::Variety => "variety",
            HumanNeed::Significance => "significance",
            HumanNeed::Connection => "connection",
            HumanNeed::Growth => "growth",
            HumanNeed::Contribution => "contribution",
        }
    }

    /// Display name, e.g. `Certainty`.
    pub fn title(&self) -> &'static str {
        match self {
            HumanNeed::Certainty => "Certainty",
            HumanNeed::Variety => "Variety",
            HumanNeed::Significance => "Significance",
            HumanNeed::Connection => "Connection",
            HumanNeed::Growth => "Growth",
            HumanNeed::Contribution => "Contribution",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|need| need.as_str().eq_ignore_ascii_case(s.trim()))
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for HumanNeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of document is being analysed; selects prompt guidance.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[default]
    InterviewTranscript,
    FinancialAdvice,
    PersonalStory,
    General,
}

impl ContentType {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "interview_transcript" => ContentType::InterviewTranscript,
            "financial_advice" => ContentType::FinancialAdvice,
            "personal_story" => ContentType::PersonalStory,
            _ => ContentType::General,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::InterviewTranscript => "interview_transcript",
            ContentType::FinancialAdvice => "financial_advice",
            ContentType::PersonalStory => "personal_story",
            ContentType::General => "general",
        }
    }
}

/// One score in [0, 1] per need. Serializes as a map keyed by need name.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct NeedsScores {
    #[serde(default)]
    pub certainty: f64,
    #[serde(default)]
    pub variety: f64,
    #[serde(default)]
    pub significance: f64,
    #[serde(default)]
    pub connection: f64,
    #[serde(default)]
    pub growth: f64,
    #[serde(default)]
    pub contribution: f64,
}

impl NeedsScores {
    pub fn from_fn(mut f: impl FnMut(HumanNeed) -> f64) -> Self {
        let mut scores = Self::default();
        for need in HumanNeed::ALL {
            scores.set(need, f(need));
        }
        scores
    }

    pub fn get(&self, need: HumanNeed) -> f64 {
        self.as_array()[need.index()]
    }

    pub fn set(&mut self, need: HumanNeed, score: f64) {
        match need {
            HumanNeed::Certainty => self.certainty = score,
            HumanNeed::Variety => self.variety = score,
            HumanNeed::Significance => self.significance = score,
            HumanNeed::Connection => self.connection = score,
            HumanNeed::Growth => self.growth = score,
            HumanNeed::Contribution => self.contribution = score,
        }
    }

    fn as_array(&self) -> [f64; 6] {
        [
            self.certainty,
            self.variety,
            self.significance,
            self.connection,
            self.growth,
            self.contribution,
        ]
    }

    /// Scores in need order.
    pub fn iter(&self) -> impl Iterator<Item = (HumanNeed, f64)> + '_ {
        HumanNeed::ALL.into_iter().map(move |need| (need, self.get(need)))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DominantNeed {
    pub need: HumanNeed,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NeedsAnalysis {
    pub content_type: ContentType,
    pub needs_scores: NeedsScores,
    pub dominant_needs: Vec<DominantNeed>,
    pub behavioral_patterns: Vec<String>,
    pub personality_traits: Vec<String>,
    pub life_themes: Vec<String>,
    pub confidence_score: f64,
    pub keyword_scores: NeedsScores,
    pub llm_scores: NeedsScores,
    /// True when the LLM scores came from the fixed fallback rotation
    pub llm_fallback: bool,
}

impl NeedsAnalysis {
    pub fn top_need(&self) -> Option<DominantNeed> {
        self.dominant_needs.first().copied()
    }
}
