//! Activity Recommender
//!
//! A chat assistant that:
//! - Tells recommendation requests apart from ordinary conversation
//! - Extracts interests and coarse categories from the message
//! - Searches a document store of curated activities
//! - Falls back to asking a chat-completion model for suggestions
//! - Persists well-formed suggestions so the store grows over time
//!
//! FLOW:
//! MESSAGE → CLASSIFY → EXTRACT → SEARCH → GENERATE? → PERSIST? → FORMAT

pub mod api;
pub mod classifier;
pub mod completion;
pub mod config;
pub mod error;
pub mod formatter;
pub mod interests;
pub mod memory;
pub mod models;
pub mod recommender;
pub mod repository;
pub mod store;

pub use error::Result;

// Re-export common types
pub use classifier::{Intent, IntentClassifier};
pub use completion::{CompletionClient, CompletionService};
pub use config::{AppConfig, CompletionConfig, ConfigSource};
pub use models::*;
pub use recommender::Recommender;
pub use repository::ActivityRepository;
pub use store::{build_store, DocumentStore, InMemoryDocumentStore};
