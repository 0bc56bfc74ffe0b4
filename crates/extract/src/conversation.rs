use crate::schema::{
    CommunicationStyle, ConversationAnalysis, EntityMention, KeyInsights, SentimentDistribution,
};

const POSITIVE_WORDS: [&str; 8] = ["good", "great", "excellent", "amazing", "wonderful", "fantastic", "love", "enjoy"];
const NEGATIVE_WORDS: [&str; 8] = ["bad", "terrible", "awful", "hate", "dislike", "difficult", "challenging", "problem"];

fn count_occurrences(text: &str, words: &[&str]) -> usize {
    words.iter().map(|w| text.matches(w).count()).sum()
}

pub fn sentiment(text: &str) -> SentimentDistribution {
    let lowered = text.to_lowercase();
    let positive = count_occurrences(&lowered, &POSITIVE_WORDS);
    let negative = count_occurrences(&lowered, &NEGATIVE_WORDS);
    let total = positive + negative;

    if total == 0 {
        return SentimentDistribution::default();
    }

    let positive = positive as f64 / total as f64;
    let negative = negative as f64 / total as f64;
    SentimentDistribution {
        positive,
        negative,
        neutral: (1.0 - positive - negative).max(0.0),
    }
}

pub fn analyze_conversation(text: &str) -> ConversationAnalysis {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let speaker_turns = lines
        .iter()
        .filter(|line| line.contains(':') || line.ends_with('?'))
        .count();

    let total_words: usize = lines.iter().map(|line| line.split_whitespace().count()).sum();
    let avg_response_length = total_words as f64 / lines.len().max(1) as f64;

    let sentiment_distribution = sentiment(text);
    let engagement_score = (avg_response_length / 20.0).min(1.0) * sentiment_distribution.positive;

    let questions = text.matches('?').count();
    let exclamations = text.matches('!').count();
    let communication_style = if questions > exclamations * 2 {
        CommunicationStyle::Inquisitive
    } else if exclamations > questions {
        CommunicationStyle::Enthusiastic
    } else if avg_response_length > 30.0 {
        CommunicationStyle::Detailed
    } else {
        CommunicationStyle::Concise
    };

    ConversationAnalysis {
        speaker_turns,
        avg_response_length,
        sentiment_distribution,
        engagement_score,
        communication_style,
    }
}

pub fn overall_confidence(
    entities: &[EntityMention],
    insights: &KeyInsights,
    conversation: &ConversationAnalysis,
) -> f64 {
    let entity_conf = if entities.is_empty() {
        0.0
    } else {
        entities.iter().map(|e| e.confidence).sum::<f64>() / entities.len() as f64
    };
    let insights_conf = (insights.total() as f64 / 10.0).min(1.0);
    let conversation_conf = (conversation.engagement_score + 0.3).min(1.0);

    (entity_conf * 0.4 + insights_conf * 0.4 + conversation_conf * 0.2).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_text_uses_default_sentiment() {
        let analysis = analyze_conversation("Host: Hello there\nGuest: Hi");
        assert_eq!(analysis.sentiment_distribution, SentimentDistribution::default());
        assert_eq!(analysis.speaker_turns, 2);
        assert!((analysis.avg_response_length - 2.5).abs() < 1e-9);
    }

    #[test]
    fn sentiment_shares_sum_to_one() {
        let s = sentiment("A great day, a good day, but one problem.");
        assert!((s.positive - 2.0 / 3.0).abs() < 1e-9);
        assert!((s.negative - 1.0 / 3.0).abs() < 1e-9);
        assert!(s.neutral.abs() < 1e-9);
    }

    #[test]
    fn style_follows_punctuation() {
        let inquisitive = analyze_conversation("Why?\nHow?\nWhen?");
        assert_eq!(inquisitive.communication_style, CommunicationStyle::Inquisitive);

        let enthusiastic = analyze_conversation("Wow!\nAmazing!\nReally?");
        assert_eq!(enthusiastic.communication_style, CommunicationStyle::Enthusiastic);

        let concise = analyze_conversation("Fine.");
        assert_eq!(concise.communication_style, CommunicationStyle::Concise);
    }

    #[test]
    fn engagement_scales_with_length_and_positivity() {
        let line = format!("Guest: {} great", "word ".repeat(40));
        let analysis = analyze_conversation(&line);
        assert!((analysis.engagement_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn confidence_without_signals() {
        let conversation = analyze_conversation("");
        let confidence = overall_confidence(&[], &KeyInsights::default(), &conversation);
        // engagement = 0, so only the conversation floor contributes
        assert!((confidence - 0.06).abs() < 1e-9);
    }
}
