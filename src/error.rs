//! Error types for the activity recommender

use thiserror::Error;

/// Result type alias for recommender operations
pub type Result<T> = std::result::Result<T, RecommenderError>;

#[derive(Error, Debug)]
pub enum RecommenderError {

    // =============================
    // Layer Errors
    // =============================

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Startup configuration failures. Always fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configurations: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("Failed to read configuration file: {0}")]
    File(#[from] config::ConfigError),
}

/// Failures of a single chat-completion call.
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("Completion endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Completion request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed completion response: {0}")]
    MalformedResponse(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Document serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Document {collection}/{key} not found")]
    NotFound { collection: String, key: String },
}

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid activity: {0}")]
    Validation(String),

    #[error("Activity not found: {0}")]
    NotFound(String),

    #[error("Activity file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Activity file is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}
