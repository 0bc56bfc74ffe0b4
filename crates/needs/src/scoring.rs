use crate::indicators::indicators;
use crate::schema::{ContentType, DominantNeed, HumanNeed, NeedsScores};
use extract::extract_json_block;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

const KEYWORD_WEIGHT: f64 = 0.3;
const LLM_WEIGHT: f64 = 0.7;

/// Baseline for needs with no content-type prior.
pub const BASE_NEED_SCORE: f64 = 0.4;

/// `Growth: 0.7`, `certainty 8` and similar lines in a prose reply.
static TEXT_SCORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(certainty|variety|significance|connection|growth|contribution)\b\s*:?\s*(\d+(?:\.\d+)?)")
        .expect("valid text score regex")
});

pub fn keyword_scores(content: &str) -> NeedsScores {
    let lowered = content.to_lowercase();
    let words = content.split_whitespace().count() as f64;

    NeedsScores::from_fn(|need| {
        let signals = indicators(need);

        let keyword_hits: usize = signals
            .keywords
            .iter()
            .map(|kw| lowered.matches(kw).count())
            .sum();
        let phrase_hits = signals.phrases.iter().filter(|p| lowered.contains(*p)).count();
        let clue_hits = signals
            .context_clues
            .iter()
            .filter(|c| lowered.contains(*c))
            .count();

        let keyword_score = (keyword_hits as f64 / (words / 100.0).max(1.0)).min(1.0) * 0.4;
        let phrase_score = (phrase_hits as f64 / signals.phrases.len().max(1) as f64).min(1.0) * 0.3;
        let clue_score = (clue_hits as f64 / signals.context_clues.len().max(1) as f64).min(1.0) * 0.3;

        (keyword_score + phrase_score + clue_score).min(1.0)
    })
}

/// Prior for a need the LLM reply leaves out.
pub fn content_fallback_score(need: HumanNeed, content_type: ContentType) -> f64 {
    match (content_type, need) {
        (ContentType::FinancialAdvice, HumanNeed::Certainty) => 0.8,
        (ContentType::FinancialAdvice, HumanNeed::Growth) => 0.6,
        (ContentType::FinancialAdvice, HumanNeed::Significance | HumanNeed::Contribution) => 0.5,
        (ContentType::FinancialAdvice, HumanNeed::Variety) => 0.3,
        (ContentType::InterviewTranscript, HumanNeed::Significance) => 0.8,
        (ContentType::InterviewTranscript, HumanNeed::Growth) => 0.7,
        (ContentType::InterviewTranscript, HumanNeed::Connection) => 0.6,
        (ContentType::InterviewTranscript, HumanNeed::Variety) => 0.5,
        _ => BASE_NEED_SCORE,
    }
}

/// Scores used when the LLM gives nothing usable: a content-type prior
/// nudged by the document's themes, clamped to [0, 1].
pub fn content_aware_scores(content_type: ContentType, themes: &[String]) -> NeedsScores {
    let mut scores = NeedsScores::from_fn(|need| match (content_type, need) {
        (ContentType::FinancialAdvice, HumanNeed::Certainty) => 0.8,
        (ContentType::FinancialAdvice, HumanNeed::Growth) => 0.6,
        (ContentType::FinancialAdvice, HumanNeed::Significance) => 0.5,
        (ContentType::InterviewTranscript, _) => content_fallback_score(need, content_type),
        _ => BASE_NEED_SCORE,
    });

    for theme in themes {
        let theme = theme.to_lowercase();
        let bumps: &[(HumanNeed, f64)] = if theme.contains("leadership") {
            &[(HumanNeed::Significance, 0.2), (HumanNeed::Connection, 0.1)]
        } else if theme.contains("innovation") || theme.contains("technology") {
            &[(HumanNeed::Growth, 0.2), (HumanNeed::Variety, 0.1)]
        } else if theme.contains("risk") || theme.contains("security") {
            &[(HumanNeed::Certainty, 0.2)]
        } else {
            &[]
        };
        for (need, bump) in bumps {
            scores.set(*need, scores.get(*need) + bump);
        }
    }

    NeedsScores::from_fn(|need| scores.get(need).clamp(0.0, 1.0))
}

fn score_value(value: &Value) -> Option<f64> {
    let raw = match value {
        Value::Object(map) => map.get("score").map(score_value).unwrap_or(Some(0.0))?,
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Some(raw.clamp(0.0, 1.0))
}

fn json_scores(reply: &str) -> Option<Vec<(HumanNeed, Option<f64>)>> {
    let json = extract_json_block(reply)?;
    let value: Value = serde_json::from_str(&json).ok()?;
    let root = value.as_object()?;
    let scores = match root.get("needs_scores") {
        Some(Value::Object(inner)) => inner,
        _ => root,
    };

    Some(
        HumanNeed::ALL
            .into_iter()
            .filter_map(|need| scores.get(need.as_str()).map(|v| (need, score_value(v))))
            .collect(),
    )
}

/// Scores written as prose. The first mention of a need wins; values above 1
/// are read as a ten-point scale.
pub fn text_scores(reply: &str) -> Vec<(HumanNeed, f64)> {
    let mut found: Vec<(HumanNeed, f64)> = Vec::new();
    for caps in TEXT_SCORE.captures_iter(reply) {
        let (Some(need), Ok(raw)) = (HumanNeed::parse(&caps[1]), caps[2].parse::<f64>()) else {
            continue;
        };
        if found.iter().any(|(n, _)| *n == need) {
            continue;
        }
        let score = if raw > 1.0 { raw / 10.0 } else { raw };
        found.push((need, score.clamp(0.0, 1.0)));
    }
    found
}

/// Parse need scores out of an LLM completion. JSON is tried first, with
/// scores under `needs_scores` or at the top level, as numbers or
/// `{"score": ..}` objects; otherwise `Need: 0.8` lines are read. Needs the
/// reply leaves out get the content-type prior. Returns `None` when the reply
/// is unusable.
pub fn parse_llm_scores(reply: &str, content_type: ContentType) -> Option<NeedsScores> {
    let found: Vec<(HumanNeed, f64)> = match json_scores(reply) {
        Some(found) => found
            .into_iter()
            .map(|(need, score)| score.map(|s| (need, s)))
            .collect::<Option<_>>()?,
        None => {
            let found = text_scores(reply);
            if found.is_empty() {
                return None;
            }
            found
        }
    };

    Some(NeedsScores::from_fn(|need| {
        found
            .iter()
            .find(|(n, _)| *n == need)
            .map(|(_, score)| *score)
            .unwrap_or_else(|| content_fallback_score(need, content_type))
    }))
}

pub fn combine(keyword: &NeedsScores, llm: &NeedsScores) -> NeedsScores {
    NeedsScores::from_fn(|need| KEYWORD_WEIGHT * keyword.get(need) + LLM_WEIGHT * llm.get(need))
}

/// Top three needs, highest first. Ties keep need order.
pub fn dominant_needs(scores: &NeedsScores) -> Vec<DominantNeed> {
    let mut ranked: Vec<DominantNeed> = scores
        .iter()
        .map(|(need, score)| DominantNeed { need, score })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(3);
    ranked
}

pub fn confidence(keyword: &NeedsScores, llm: &NeedsScores, content: &str) -> f64 {
    let length_factor = (content.split_whitespace().count() as f64 / 1000.0).min(1.0) * 0.3;

    let agreement = HumanNeed::ALL
        .iter()
        .map(|need| 1.0 - (keyword.get(*need) - llm.get(*need)).abs())
        .sum::<f64>()
        / HumanNeed::ALL.len() as f64;
    let agreement_factor = agreement * 0.4;

    let clear = llm.iter().filter(|(_, score)| *score > 0.6).count();
    let indicator_factor = (clear as f64 / 3.0).min(1.0) * 0.3;

    (length_factor + agreement_factor + indicator_factor).min(1.0)
}
