//! Conversation memory
//!
//! Per-user chat transcripts persisted next to the activity collection.

pub mod store;

pub use store::{ConversationLog, MessageRole, TranscriptEntry, USERS_COLLECTION};
