use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static SPEAKER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z\s]+):\s*(.+)$").expect("valid speaker regex"));

/// Words per minute used for the spoken-duration estimate.
const SPEAKING_RATE_WPM: f64 = 150.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub speaker: String,
    pub text: String,
    pub word_count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InterviewStructure {
    /// Speakers in order of first appearance
    pub speakers: Vec<String>,
    pub segments: Vec<Segment>,
    pub total_segments: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpeakerDynamics {
    /// Percentage of all spoken words per speaker
    pub speaking_time_distribution: BTreeMap<String, f64>,
    pub total_exchanges: usize,
    pub average_response_length: f64,
    pub conversation_flow: String,
}

fn push_segment(segments: &mut Vec<Segment>, speaker: Option<&String>, parts: &[String]) {
    if let Some(speaker) = speaker {
        if !parts.is_empty() {
            let text = parts.join(" ");
            let word_count = text.split_whitespace().count();
            segments.push(Segment {
                speaker: speaker.clone(),
                text,
                word_count,
            });
        }
    }
}

/// Split a transcript into speaker segments. A line of the form `Name: text`
/// opens a new segment; other non-empty lines continue the current one.
pub fn parse_interview_structure(content: &str) -> InterviewStructure {
    let mut speakers: Vec<String> = Vec::new();
    let mut segments = Vec::new();
    let mut current_speaker: Option<String> = None;
    let mut current_text: Vec<String> = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(caps) = SPEAKER_LINE.captures(line) {
            push_segment(&mut segments, current_speaker.as_ref(), &current_text);

            let speaker = caps[1].trim().to_string();
            if !speakers.contains(&speaker) {
                speakers.push(speaker.clone());
            }
            current_text = vec![caps[2].trim().to_string()];
            current_speaker = Some(speaker);
        } else if !current_text.is_empty() {
            current_text.push(line.to_string());
        }
    }
    push_segment(&mut segments, current_speaker.as_ref(), &current_text);

    InterviewStructure {
        speakers,
        total_segments: segments.len(),
        segments,
    }
}

/// Who talked how much. `None` when the transcript has no speaker segments.
pub fn speaker_dynamics(structure: &InterviewStructure) -> Option<SpeakerDynamics> {
    if structure.segments.is_empty() {
        return None;
    }

    let total_words: usize = structure.segments.iter().map(|s| s.word_count).sum();
    let mut words_by_speaker: BTreeMap<String, usize> = BTreeMap::new();
    for segment in &structure.segments {
        *words_by_speaker.entry(segment.speaker.clone()).or_insert(0) += segment.word_count;
    }

    let distribution: BTreeMap<String, f64> = words_by_speaker
        .into_iter()
        .map(|(speaker, words)| {
            let share = if total_words > 0 {
                words as f64 / total_words as f64 * 100.0
            } else {
                0.0
            };
            (speaker, share)
        })
        .collect();

    let mut shares = distribution.values();
    let balanced = match shares.next() {
        Some(first) => shares.all(|share| (share - first).abs() < f64::EPSILON),
        None => true,
    };

    Some(SpeakerDynamics {
        speaking_time_distribution: distribution,
        total_exchanges: structure.segments.len(),
        average_response_length: total_words as f64 / structure.segments.len() as f64,
        conversation_flow: if balanced { "balanced" } else { "unbalanced" }.to_string(),
    })
}

pub fn estimate_duration_minutes(content: &str) -> f64 {
    content.split_whitespace().count() as f64 / SPEAKING_RATE_WPM
}
