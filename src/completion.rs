//! Chat-completion client
//!
//! One single-turn POST per call against a deployment-style chat-completions
//! endpoint. Uses a long-lived reqwest::Client for connection pooling.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use crate::config::CompletionConfig;
use crate::error::CompletionError;

/// Anything that can answer a single user message.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn submit(&self, message: &str) -> Result<String, CompletionError>;
}

/// Reusable completion client (connection-pooled)
pub struct CompletionClient {
    client: Client,
    config: CompletionConfig,
}

impl CompletionClient {
    pub fn new(config: CompletionConfig) -> Result<Self, CompletionError> {
        let mut builder = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8);

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    /// `{basic_url}/deployments/{model}/chat/completions/?api-version={v}`.
    /// A trailing `/` on the base URL is dropped so it never doubles up.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/deployments/{}/chat/completions/?api-version={}",
            self.config.basic_url.trim_end_matches('/'),
            self.config.model_name,
            self.config.api_version
        )
    }
}

#[async_trait]
impl CompletionService for CompletionClient {
    async fn submit(&self, message: &str) -> Result<String, CompletionError> {
        let request = CompletionRequest::single_turn(message);

        info!(model = %self.config.model_name, "Calling completion endpoint");

        let response = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .header("api-key", &self.config.access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Completion request failed: {}", e);
                CompletionError::Transport(e)
            })?;

        let status = response.status();
        let body = response.text().await?;

        if status != reqwest::StatusCode::OK {
            error!("Completion endpoint returned {}: {}", status, body);
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        extract_content(&body)
    }
}

/// Pull `choices[0].message.content` out of a success body.
fn extract_content(body: &str) -> Result<String, CompletionError> {
    let parsed: CompletionResponse = serde_json::from_str(body).map_err(|e| {
        error!("Failed to parse completion response: {}", e);
        CompletionError::MalformedResponse(format!("undecodable body: {}", e))
    })?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .ok_or_else(|| {
            CompletionError::MalformedResponse("missing choices[0].message.content".to_string())
        })
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    messages: Vec<ChatTurn>,
}

impl CompletionRequest {
    fn single_turn(content: &str) -> Self {
        Self {
            messages: vec![ChatTurn {
                role: "user".to_string(),
                content: content.to_string(),
            }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatTurn {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<AssistantMessage>,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}
