//! Conversation transcript storage
//!
//! Append-only per-user transcripts kept in the `users` collection. Each
//! write appends in place on the user document instead of replacing it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::StoreError;
use crate::store::DocumentStore;

pub const USERS_COLLECTION: &str = "users";

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A single transcript line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptEntry {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl TranscriptEntry {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct ConversationLog {
    store: Arc<dyn DocumentStore>,
}

impl ConversationLog {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Full transcript for a user, oldest first. Unknown users have none.
    pub async fn history(&self, user_id: &str) -> Result<Vec<TranscriptEntry>, StoreError> {
        let Some(doc) = self.store.get(USERS_COLLECTION, user_id).await? else {
            return Ok(Vec::new());
        };

        match doc.get("messages") {
            Some(messages) => Ok(serde_json::from_value(messages.clone())?),
            None => Ok(Vec::new()),
        }
    }

    /// Append entries to the user's transcript and bump `last_updated`.
    /// Other fields on the user document are left alone.
    pub async fn append(&self, user_id: &str, entries: Vec<TranscriptEntry>) -> Result<(), StoreError> {
        let items = entries
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<Value>, _>>()?;

        let mut fields = Map::new();
        fields.insert("last_updated".into(), Value::String(Utc::now().to_rfc3339()));

        self.store
            .append_array(USERS_COLLECTION, user_id, "messages", items, fields)
            .await
    }
}
