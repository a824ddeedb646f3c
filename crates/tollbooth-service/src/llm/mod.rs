//! The LLM completion gateway.
//!
//! Invokes an OpenAI-compatible chat-completions API and narrows the
//! response into a [`Completion`] at the boundary. The token count is the
//! provider's own `usage.total_tokens` figure, the billing source of truth,
//! captured before anything else touches the response.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Per-call timeout for the completion provider.
///
/// Bounds the pipeline even when the caller propagates no cancellation; a
/// timeout surfaces as a provider error like any other failure.
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(120);

/// A normalized completion result.
#[derive(Debug, Clone)]
pub struct Completion {
    /// The generated text.
    pub output: String,
    /// Provider-reported total token consumption (input + output).
    pub tokens_used: u64,
    /// The model identifier the provider answered with.
    pub model: String,
}

/// Errors from the completion provider boundary.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// The provider was unreachable or returned an error.
    #[error("completion provider unavailable: {0}")]
    Provider(String),
}

/// Invokes the LLM provider for one completion.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Complete a prompt.
    ///
    /// # Errors
    ///
    /// Returns `CompletionError::Provider` if the provider is unreachable,
    /// answers with a non-success status, or omits the fields this gateway
    /// depends on.
    async fn complete(&self, prompt: &str) -> Result<Completion, CompletionError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: String,
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: u64,
}

/// Reqwest-backed completion client.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl CompletionClient {
    /// Create a client for an OpenAI-compatible endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(COMPLETION_TIMEOUT)
            .build()
            .map_err(|e| CompletionError::Provider(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl CompletionGateway for CompletionClient {
    async fn complete(&self, prompt: &str) -> Result<Completion, CompletionError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CompletionError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Completion provider returned an error");
            return Err(CompletionError::Provider(format!(
                "provider returned {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Provider(format!("malformed provider response: {e}")))?;

        // Billing depends on the provider's own accounting; a response
        // without a usage block is unusable, not a free completion.
        let tokens_used = parsed
            .usage
            .ok_or_else(|| {
                CompletionError::Provider("provider response missing usage figures".into())
            })?
            .total_tokens;

        let output = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CompletionError::Provider("provider response has no content".into()))?;

        Ok(Completion {
            output,
            tokens_used,
            model: parsed.model,
        })
    }
}
