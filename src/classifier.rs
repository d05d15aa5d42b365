//! Intent Classifier
//!
//! Decides whether a chat message is asking for an activity recommendation
//! or is ordinary conversation for the language model.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Recommendation,
    Chat,
}

/// Static trigger phrases
const RECOMMENDATION_KEYWORDS: &[&str] = &[
    // Direct asks
    "recommend", "suggest",
    // Searching
    "find", "look for", "search for", "looking for",
    // Open questions
    "what activities", "what events", "what to do", "what can i do",
    // Stated intent
    "interested in", "want to join", "want to participate",
];

/// Intent classifier
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn classify(message: &str) -> Intent {
        if is_recommendation_request(message) {
            Intent::Recommendation
        } else {
            Intent::Chat
        }
    }
}

/// True when any trigger phrase occurs anywhere in the lower-cased message.
/// No tokenization and no negation handling.
pub fn is_recommendation_request(message: &str) -> bool {
    let lowered = message.to_lowercase();
    RECOMMENDATION_KEYWORDS
        .iter()
        .any(|kw| lowered.contains(kw))
}
