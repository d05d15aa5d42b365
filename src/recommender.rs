//! Recommendation orchestrator
//!
//! Routes each inbound chat message:
//! CLASSIFY → EXTRACT → STORE SEARCH → GENERATE FALLBACK → PARSE & PERSIST → FORMAT
//!
//! Plain conversation goes straight to the completion service. Every path
//! ends in a displayable reply; no error crosses this boundary.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::classifier::{Intent, IntentClassifier};
use crate::completion::CompletionService;
use crate::formatter::format_activities;
use crate::interests::extract_interests;
use crate::memory::{ConversationLog, MessageRole, TranscriptEntry};
use crate::models::{Activity, ActivityDraft, InterestQuery};
use crate::repository::{ActivityRepository, DEFAULT_SEARCH_LIMIT};

/// Reply when the model's suggestions cannot be parsed.
pub const PARSE_APOLOGY: &str =
    "Sorry, there was an error processing the response. Please try again later.";

/// Reply when the completion service itself fails.
pub const REQUEST_APOLOGY: &str =
    "Sorry, there was an error processing your request. Please try again later.";

/// Reply when the model returns an empty suggestion list.
pub const BE_MORE_SPECIFIC: &str = "Sorry, I couldn't find any matching activities. \
     Please try providing more specific interests or categories.";

pub struct Recommender {
    completion: Arc<dyn CompletionService>,
    repository: Option<ActivityRepository>,
    conversations: Option<ConversationLog>,
    persist_generated: bool,
    search_limit: usize,
}

impl Recommender {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self {
            completion,
            repository: None,
            conversations: None,
            persist_generated: true,
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn with_repository(mut self, repository: ActivityRepository) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn with_conversation_log(mut self, log: ConversationLog) -> Self {
        self.conversations = Some(log);
        self
    }

    /// Write valid generated activities back to the store (on by default).
    pub fn persist_generated(mut self, enabled: bool) -> Self {
        self.persist_generated = enabled;
        self
    }

    pub fn search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }

    /// Entry point for the bot adapter. Records the exchange in the user's
    /// transcript when a user id and a conversation log are available.
    pub async fn handle_message(&self, user_id: Option<&str>, message: &str) -> String {
        let reply = self.reply(message).await;

        if let (Some(user_id), Some(log)) = (user_id, &self.conversations) {
            let entries = vec![
                TranscriptEntry::new(MessageRole::User, message),
                TranscriptEntry::new(MessageRole::Assistant, reply.clone()),
            ];
            if let Err(e) = log.append(user_id, entries).await {
                warn!("Conversation log append failed for user {}: {}", user_id, e);
            }
        }

        reply
    }

    pub async fn reply(&self, message: &str) -> String {
        let intent = IntentClassifier::classify(message);
        debug!("Intent: {:?}", intent);

        match intent {
            Intent::Chat => self.chat(message).await,
            Intent::Recommendation => self.recommend(message).await,
        }
    }

    async fn chat(&self, message: &str) -> String {
        match self.completion.submit(message).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Completion call failed: {}", e);
                REQUEST_APOLOGY.to_string()
            }
        }
    }

    /// Store first, model second.
    pub async fn recommend(&self, message: &str) -> String {
        let query = extract_interests(message);
        info!(
            interests = ?query.interests,
            categories = ?query.categories,
            "Handling recommendation request"
        );

        if let Some(repository) = &self.repository {
            match repository
                .search(&query.interests, &query.category_list(), self.search_limit)
                .await
            {
                Ok(found) if !found.is_empty() => {
                    info!("Found {} stored activities", found.len());
                    return format_activities(&found);
                }
                Ok(_) => debug!("No stored activity matched"),
                Err(e) => warn!("Activity store unavailable, generating instead: {}", e),
            }
        }

        self.generate(&query).await
    }

    async fn generate(&self, query: &InterestQuery) -> String {
        let prompt = build_generation_prompt(query);

        let raw = match self.completion.submit(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Fallback generation failed: {}", e);
                return REQUEST_APOLOGY.to_string();
            }
        };

        let Some(drafts) = parse_generated(&raw) else {
            error!(raw = %raw, "Generated activities are not valid JSON");
            return PARSE_APOLOGY.to_string();
        };

        if drafts.is_empty() {
            info!("Model returned no activities");
            return BE_MORE_SPECIFIC.to_string();
        }

        if self.persist_generated {
            self.persist(&drafts).await;
        }

        let activities: Vec<Activity> = drafts.into_iter().map(ActivityDraft::normalize).collect();
        format_activities(&activities)
    }

    /// Best-effort write-back of complete drafts.
    async fn persist(&self, drafts: &[ActivityDraft]) {
        let Some(repository) = &self.repository else {
            return;
        };

        for draft in drafts {
            if let Err(reason) = draft.validate() {
                info!("Not storing generated activity {:?}: {}", draft.name, reason);
                continue;
            }

            if let Err(e) = repository.create(draft.clone()).await {
                warn!("Failed to store generated activity {:?}: {}", draft.name, e);
            }
        }
    }
}

/// Prompt asking the model for activities as a JSON object.
pub fn build_generation_prompt(query: &InterestQuery) -> String {
    let interests = query.interests.join(", ");
    let categories = if query.categories.is_empty() {
        "Any category".to_string()
    } else {
        query.category_list().join(", ")
    };

    format!(
        r#"Based on the following user interests and categories, recommend some activities:
Interests: {interests}
Categories: {categories}
User message: {message}

Please provide the response in JSON format with the following structure:
{{
    "activities": [
        {{
            "name": "Activity Name",
            "description": "Activity Description",
            "keywords": ["keyword1", "keyword2"],
            "link": "Activity Link",
            "category": "Activity Category"
        }}
    ]
}}
Respond with the JSON object only."#,
        interests = interests,
        categories = categories,
        message = query.raw_message,
    )
}

/// Parse model output into drafts. `None` when no JSON can be recovered.
///
/// Code fences are stripped first; when the remainder still does not parse,
/// the outermost `{ ... }` slice is tried. A bare array is accepted as the
/// activity list. Non-object entries are dropped.
pub fn parse_generated(raw: &str) -> Option<Vec<ActivityDraft>> {
    let cleaned = raw.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();

    let value = serde_json::from_str::<Value>(cleaned)
        .ok()
        .or_else(|| outermost_object(cleaned).and_then(|s| serde_json::from_str(s).ok()))?;

    let items = match value {
        Value::Object(mut map) => match map.remove("activities") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(_) => return None,
        },
        Value::Array(items) => items,
        _ => return None,
    };

    Some(
        items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<ActivityDraft>(item) {
                Ok(draft) => Some(draft),
                Err(e) => {
                    warn!("Dropping unreadable generated activity: {}", e);
                    None
                }
            })
            .collect(),
    )
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompletionError;
    use crate::store::testing::UnreachableStore;
    use crate::store::InMemoryDocumentStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Completion stub with one scripted reply; records every prompt.
    struct ScriptedCompletion {
        reply: Option<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedCompletion {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionService for ScriptedCompletion {
        async fn submit(&self, message: &str) -> Result<String, CompletionError> {
            self.prompts.lock().unwrap().push(message.to_string());
            self.reply.clone().ok_or(CompletionError::Status {
                status: 500,
                body: "Error: upstream exploded".to_string(),
            })
        }
    }

    const GENERATED: &str = "```json\n{\"activities\": [\
        {\"name\": \"Sketch Walk\", \"description\": \"Draw outdoors\", \
         \"keywords\": \"art, drawing\", \"link\": \"https://sketch.example\", \"category\": \"art\"},\
        {\"name\": \"Half Idea\", \"description\": \"No link given\"}\
        ]}\n```";

    async fn store_with_foo() -> ActivityRepository {
        let repository = ActivityRepository::new(Arc::new(InMemoryDocumentStore::new()));
        repository
            .create(
                serde_json::from_value(json!({
                    "name": "A", "description": "Stored pick", "keywords": ["foo"],
                    "link": "https://a.example", "category": "x"
                }))
                .unwrap(),
            )
            .await
            .unwrap();
        repository
    }

    #[tokio::test]
    async fn test_chat_reply_is_verbatim() {
        let completion = ScriptedCompletion::replying("I'm doing well!");
        let recommender = Recommender::new(completion.clone());

        assert_eq!(recommender.reply("How are you?").await, "I'm doing well!");
        assert_eq!(completion.prompts(), vec!["How are you?"]);
    }

    #[tokio::test]
    async fn test_chat_failure_never_leaks_error_text() {
        let recommender = Recommender::new(ScriptedCompletion::failing());
        let reply = recommender.reply("How are you?").await;

        assert_eq!(reply, REQUEST_APOLOGY);
        assert!(!reply.contains("Error:"));
    }

    #[tokio::test]
    async fn test_store_hit_skips_generation() {
        let completion = ScriptedCompletion::replying(GENERATED);
        let repository = store_with_foo().await;
        let recommender = Recommender::new(completion.clone()).with_repository(repository);

        let reply = recommender.reply("Can you recommend something? I like foo.").await;

        assert!(reply.contains("Name: A"));
        assert!(reply.contains("Description: Stored pick"));
        assert!(completion.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_store_miss_generates_and_persists_valid_items() {
        let completion = ScriptedCompletion::replying(GENERATED);
        let repository = store_with_foo().await;
        let recommender = Recommender::new(completion.clone()).with_repository(repository.clone());

        let reply = recommender
            .reply("What can I do this weekend? I enjoy painting.")
            .await;

        let prompts = completion.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Interests: painting"));
        assert!(prompts[0].contains("Categories: art"));

        assert!(reply.contains("Name: Sketch Walk"));
        assert!(reply.contains("Name: Half Idea"));
        assert!(reply.contains("Link: \n"));

        let stored = repository.read("Sketch Walk").await.unwrap().unwrap();
        assert_eq!(stored.keywords, vec!["art", "drawing"]);
        assert!(repository.read("Half Idea").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bad_json_returns_apology_without_writes() {
        let completion = ScriptedCompletion::replying("Sure! Try hiking, painting or chess.");
        let repository = ActivityRepository::new(Arc::new(InMemoryDocumentStore::new()));
        let recommender = Recommender::new(completion).with_repository(repository.clone());

        let reply = recommender.reply("Please suggest a hobby.").await;

        assert_eq!(reply, PARSE_APOLOGY);
        assert!(repository.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_activity_list_asks_for_more_detail() {
        let completion = ScriptedCompletion::replying(r#"{"activities": []}"#);
        let recommender = Recommender::new(completion);

        assert_eq!(recommender.reply("recommend anything").await, BE_MORE_SPECIFIC);
    }

    #[tokio::test]
    async fn test_generation_failure_is_apology() {
        let recommender = Recommender::new(ScriptedCompletion::failing());
        assert_eq!(recommender.reply("recommend anything").await, REQUEST_APOLOGY);
    }

    #[tokio::test]
    async fn test_unreachable_store_falls_back_to_generation() {
        let completion = ScriptedCompletion::replying(GENERATED);
        let recommender = Recommender::new(completion.clone())
            .with_repository(ActivityRepository::new(Arc::new(UnreachableStore)));

        let reply = recommender.reply("suggest something, I like foo.").await;

        assert!(reply.contains("Name: Sketch Walk"));
        assert_eq!(completion.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_persistence_can_be_disabled() {
        let completion = ScriptedCompletion::replying(GENERATED);
        let repository = ActivityRepository::new(Arc::new(InMemoryDocumentStore::new()));
        let recommender = Recommender::new(completion)
            .with_repository(repository.clone())
            .persist_generated(false);

        recommender.reply("recommend an art thing").await;
        assert!(repository.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_handle_message_records_transcript() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let log = ConversationLog::new(store.clone());
        let recommender = Recommender::new(ScriptedCompletion::replying("Hi!"))
            .with_conversation_log(log.clone());

        let reply = recommender.handle_message(Some("user-7"), "hello").await;
        assert_eq!(reply, "Hi!");

        let history = log.history("user-7").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, MessageRole::User);
        assert_eq!(history[0].content, "hello");
        assert_eq!(history[1].content, "Hi!");

        recommender.handle_message(None, "hello again").await;
        assert_eq!(log.history("user-7").await.unwrap().len(), 2);
    }

    #[test]
    fn test_prompt_without_categories() {
        let query = extract_interests("recommend something");
        let prompt = build_generation_prompt(&query);
        assert!(prompt.contains("Categories: Any category"));
        assert!(prompt.contains("\"activities\""));
    }

    #[test]
    fn test_parse_generated_repairs_surrounding_prose() {
        let drafts = parse_generated(
            "Here you go: {\"activities\": [{\"name\": \"Go Club\"}]} Enjoy!",
        )
        .unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].name.as_deref(), Some("Go Club"));
    }

    #[test]
    fn test_parse_generated_shapes() {
        assert_eq!(parse_generated(r#"{"other": 1}"#).map(|d| d.len()), Some(0));
        assert_eq!(parse_generated(r#"[{"name": "X"}, 5]"#).map(|d| d.len()), Some(1));
        assert!(parse_generated(r#"{"activities": "none"}"#).is_none());
        assert!(parse_generated("no json here").is_none());
        assert!(parse_generated("} backwards {").is_none());
    }
}
