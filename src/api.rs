//! HTTP surface for the recommender bot
//!
//! A chat platform adapter forwards each inbound message here and relays
//! the reply text back to the user.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::recommender::Recommender;

/// =============================
/// Request / Response Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MessageRequest {
    pub text: String,
    pub user_id: Option<String>,
    pub chat_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct MessageResponse {
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub recommender: Arc<Recommender>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Message Endpoint
/// =============================

async fn message_handler(
    State(state): State<ApiState>,
    Json(req): Json<MessageRequest>,
) -> Json<MessageResponse> {
    // Transcripts are keyed by user; a chat id stands in when no user is given.
    let transcript_key = req
        .user_id
        .as_deref()
        .or(req.chat_id.as_deref())
        .filter(|id| !id.trim().is_empty());

    info!(
        "message_handler ids => user_id={:?} chat_id={:?}",
        req.user_id, req.chat_id
    );

    let reply = state
        .recommender
        .handle_message(transcript_key, &req.text)
        .await;

    Json(MessageResponse {
        reply,
        chat_id: req.chat_id,
    })
}

/// =============================
/// Router
/// =============================

pub fn create_router(recommender: Arc<Recommender>) -> Router {
    let state = ApiState { recommender };

    Router::new()
        .route("/health", get(health))
        .route("/api/message", post(message_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    recommender: Arc<Recommender>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(recommender);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("Bot server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
