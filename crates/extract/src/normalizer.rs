use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Prefixes produced by keyword-hit insights that carry no meaning of their own.
const FILLER_PREFIXES: [&str; 4] = ["Mentioned ", "Discussed ", "Has ", "Shows "];

const MIN_ENTITY_CHARS: usize = 3;

/// Tidy free text into an entity label. Returns `None` when too short to be useful.
pub fn clean_entity_text(text: &str) -> Option<String> {
    let collapsed = WHITESPACE.replace_all(text.trim(), " ");
    let mut cleaned: &str = &collapsed;

    for prefix in FILLER_PREFIXES {
        if let Some(rest) = cleaned.strip_prefix(prefix) {
            cleaned = rest;
        }
    }

    let mut chars = cleaned.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };

    (capitalized.chars().count() >= MIN_ENTITY_CHARS).then_some(capitalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_prefixes_and_whitespace() {
        assert_eq!(clean_entity_text("  Mentioned   expertise "), Some("Expertise".to_string()));
        assert_eq!(clean_entity_text("Discussed led"), Some("Led".to_string()));
        assert_eq!(clean_entity_text("Has ab"), None);
        assert_eq!(clean_entity_text("ok"), None);
        assert_eq!(clean_entity_text("öl price"), Some("Öl price".to_string()));
    }
}
