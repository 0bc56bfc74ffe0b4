use crate::schema::HumanNeed;

/// Text signals for one need.
#[derive(Debug, Clone, Copy)]
pub struct NeedIndicators {
    pub keywords: &'static [&'static str],
    pub phrases: &'static [&'static str],
    pub context_clues: &'static [&'static str],
}

pub fn indicators(need: HumanNeed) -> NeedIndicators {
    match need {
        HumanNeed::Certainty => NeedIndicators {
            keywords: &["security", "stable", "predictable", "safe", "routine", "control", "plan", "structure"],
            phrases: &["need to know", "want certainty", "feel secure", "have control", "planned approach"],
            context_clues: &["risk aversion", "detailed planning", "systematic approach"],
        },
        HumanNeed::Variety => NeedIndicators {
            keywords: &["adventure", "new", "different", "change", "explore", "variety", "diverse", "exciting"],
            phrases: &["try new things", "love variety", "get bored easily", "need change", "different experiences"],
            context_clues: &["career changes", "multiple interests", "travel experiences"],
        },
        HumanNeed::Significance => NeedIndicators {
            keywords: &["important", "special", "unique", "recognition", "achievement", "success", "impact", "leader"],
            phrases: &["make a difference", "be recognized", "stand out", "achieve something", "be remembered"],
            context_clues: &["leadership roles", "awards", "achievements", "public speaking"],
        },
        HumanNeed::Connection => NeedIndicators {
            keywords: &["family", "friends", "team", "community", "relationship", "together", "belong", "love"],
            phrases: &["work with others", "part of team", "close relationships", "feel connected", "belong to"],
            context_clues: &["team projects", "mentoring", "collaboration", "family mentions"],
        },
        HumanNeed::Growth => NeedIndicators {
            keywords: &["learn", "develop", "grow", "improve", "progress", "evolve", "better", "skills"],
            phrases: &["keep learning", "personal growth", "develop skills", "get better", "continuous improvement"],
            context_clues: &["education", "training", "skill development", "career progression"],
        },
        HumanNeed::Contribution => NeedIndicators {
            keywords: &["help", "serve", "give", "contribute", "impact", "difference", "society", "world"],
            phrases: &["help others", "give back", "make impact", "serve community", "contribute to"],
            context_clues: &["volunteering", "social causes", "mentoring others", "community service"],
        },
    }
}

/// Behavior label used when patterns have to be inferred from keyword hits.
pub fn pattern_label(need: HumanNeed) -> &'static str {
    match need {
        HumanNeed::Certainty => "Systematic planning",
        HumanNeed::Variety => "Seeks new experiences",
        HumanNeed::Significance => "Drives for recognition",
        HumanNeed::Connection => "Builds relationships",
        HumanNeed::Growth => "Continuous learning",
        HumanNeed::Contribution => "Helps others",
    }
}

pub fn trait_label(need: HumanNeed) -> &'static str {
    match need {
        HumanNeed::Certainty => "Risk-averse",
        HumanNeed::Variety => "Innovative",
        HumanNeed::Significance => "Ambitious",
        HumanNeed::Connection => "Collaborative",
        HumanNeed::Growth => "Curious",
        HumanNeed::Contribution => "Altruistic",
    }
}
