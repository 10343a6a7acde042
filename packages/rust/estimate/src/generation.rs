//! Generation collaborator: "given a prompt, returns free text".
//!
//! [`Generator`] is the seam the estimate flow depends on. [`ChatClient`]
//! implements it against an OpenAI-compatible `/chat/completions` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use welfarebridge_shared::{AppConfig, Result, WelfareBridgeError, generation_api_key};

/// User-Agent string for generation requests.
const USER_AGENT: &str = concat!("welfarebridge/", env!("CARGO_PKG_VERSION"));

/// A system instruction plus one user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Anything that turns a prompt into free text.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Identifier of the underlying model, for logs.
    fn model(&self) -> &str;

    async fn generate(&self, prompt: &Prompt) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// ChatClient
// ---------------------------------------------------------------------------

/// OpenAI-compatible chat completions client. No retries.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl ChatClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                WelfareBridgeError::Network(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
        })
    }

    /// Build from the `[generation]` section; fails if the API key env var is unset.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let g = &config.generation;
        Self::new(
            &g.base_url,
            generation_api_key(config)?,
            g.model.clone(),
            g.temperature,
            Duration::from_secs(g.timeout_secs),
        )
    }
}

#[async_trait]
impl Generator for ChatClient {
    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| WelfareBridgeError::Network(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let detail: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(200)
                .collect();
            return Err(WelfareBridgeError::Generation(format!(
                "HTTP {status}: {detail}"
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            WelfareBridgeError::Generation(format!("invalid completion envelope: {e}"))
        })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| WelfareBridgeError::Generation("completion has no content".into()))?;

        debug!(chars = text.len(), "completion received");
        Ok(text.trim().to_string())
    }
}
