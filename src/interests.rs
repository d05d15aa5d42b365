//! Interest extraction
//!
//! Pulls coarse categories (keyword sets) and free-text interest phrases
//! (regex captures) out of a chat message.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

use crate::models::InterestQuery;

/// Category tag → trigger keywords, matched as substrings.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("gaming", &["game", "gaming", "play", "player", "gamer"]),
    ("vr", &["vr", "virtual reality", "virtual", "metaverse"]),
    ("social", &["social", "community", "group", "team", "together"]),
    ("learning", &["learn", "study", "education", "course", "class"]),
    ("fitness", &["fitness", "exercise", "workout", "sport", "health"]),
    ("art", &["art", "creative", "design", "draw", "paint"]),
    ("music", &["music", "song", "concert", "band", "dance"]),
];

const INTEREST_PATTERNS: &[&str] = &[
    r"i like (.*?)[.,!?]",
    r"i love (.*?)[.,!?]",
    r"i enjoy (.*?)[.,!?]",
    r"i want to (.*?)[.,!?]",
    r"i am interested in (.*?)[.,!?]",
];

lazy_static! {
    static ref INTEREST_REGEXES: Vec<Regex> = INTEREST_PATTERNS
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect();
}

/// Build the interest query for one message.
///
/// Interests are collected pattern by pattern, each in match order, with
/// duplicates kept. A phrase with no closing punctuation is not captured.
pub fn extract_interests(message: &str) -> InterestQuery {
    let lowered = message.to_lowercase();

    InterestQuery {
        categories: match_categories(&lowered),
        interests: match_interests(&lowered),
        raw_message: message.to_string(),
    }
}

fn match_categories(lowered: &str) -> BTreeSet<String> {
    CATEGORY_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| lowered.contains(kw)))
        .map(|(category, _)| category.to_string())
        .collect()
}

fn match_interests(lowered: &str) -> Vec<String> {
    INTEREST_REGEXES
        .iter()
        .flat_map(|re| {
            re.captures_iter(lowered)
                .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patterns_compile() {
        assert_eq!(INTEREST_REGEXES.len(), INTEREST_PATTERNS.len());
    }

    #[test]
    fn test_extracts_interests_and_categories() {
        let query = extract_interests("I love hiking, and I enjoy painting.");

        assert!(query.interests.contains(&"hiking".to_string()));
        assert!(query.interests.contains(&"painting".to_string()));
        assert!(query.categories.contains("art"));
        assert!(!query.categories.contains("vr"));
        assert_eq!(query.raw_message, "I love hiking, and I enjoy painting.");
    }

    #[test]
    fn test_pattern_order_then_match_order() {
        let query = extract_interests("I enjoy chess. I like go, I like chess! I enjoy chess?");
        assert_eq!(query.interests, vec!["go", "chess", "chess", "chess"]);
    }

    #[test]
    fn test_trailing_phrase_without_punctuation_is_dropped() {
        let query = extract_interests("I like board games");
        assert!(query.interests.is_empty());
        assert!(query.categories.contains("gaming"));
    }

    #[test]
    fn test_multiple_categories() {
        let query = extract_interests("A VR concert with my team");
        let expected: Vec<&str> = vec!["music", "social", "vr"];
        let got: Vec<&str> = query.categories.iter().map(String::as_str).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_interested_in_phrase() {
        let query = extract_interests("I am interested in rock climbing!");
        assert_eq!(query.interests, vec!["rock climbing"]);
        assert!(query.categories.is_empty());
    }
}
