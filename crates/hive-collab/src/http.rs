// hive-collab/src/http.rs
// ============================================================================
// Module: HTTP Collaborator
// Description: `CollaboratorClient` implementation backed by a remote
//              chat-completion HTTP endpoint.
// Purpose: Supply the reference production adapter between the engine and
//          a real LLM provider, without the core depending on any one
//          provider's SDK or wire format.
// Dependencies: hive_core::{CollaboratorClient, CollaboratorRequest,
//              CollaboratorResponse}, reqwest, serde_json, url
// ============================================================================

//! ## Overview
//! Speaks a minimal OpenAI-compatible chat-completions wire format:
//! POSTs `{model, messages: [{role, content}], ...}` to a configurable
//! base URL and parses `choices[0].message.content` plus `usage` back
//! into a [`hive_core::CollaboratorResponse`]. Bearer auth is read from
//! an environment variable named by the caller rather than hard-coded,
//! so the same adapter works against OpenAI, a self-hosted gateway, or a
//! provider-compatible proxy.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hive_core::CollaboratorClient;
use hive_core::CollaboratorError;
use hive_core::CollaboratorRequest;
use hive_core::CollaboratorResponse;
use hive_core::RateLimitConfig;
use hive_core::RateLimiter;
use hive_core::TokenUsage;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Rough chars-per-token ratio used to estimate a request's token cost
/// before the provider reports the real `usage` figures. Conservative on
/// purpose: overestimating throttles slightly early rather than blowing a
/// budget the rate limiter was supposed to enforce.
const CHARS_PER_TOKEN_ESTIMATE: usize = 4;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for an [`HttpCollaborator`].
#[derive(Debug, Clone)]
pub struct HttpCollaboratorConfig {
    /// Base URL of the chat-completions endpoint, e.g.
    /// `https://api.openai.com/v1/chat/completions`.
    pub endpoint: Url,
    /// Model identifier sent in the request body and reported by
    /// [`CollaboratorClient::model_name`].
    pub model: String,
    /// Bearer token sent as `Authorization: Bearer <token>`, if any.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Sampling temperature forwarded to the provider.
    pub temperature: f32,
    /// Maximum tokens requested from the provider.
    pub max_tokens: u32,
}

impl HttpCollaboratorConfig {
    /// Builds a configuration pointed at `endpoint` for `model`, with no
    /// API key and conservative defaults.
    ///
    /// # Errors
    ///
    /// Returns [`HttpCollaboratorError::InvalidEndpoint`] if `endpoint`
    /// does not parse as a URL.
    pub fn new(endpoint: &str, model: impl Into<String>) -> Result<Self, HttpCollaboratorError> {
        let endpoint = Url::parse(endpoint).map_err(|_| HttpCollaboratorError::InvalidEndpoint(endpoint.to_string()))?;
        Ok(Self {
            endpoint,
            model: model.into(),
            api_key: None,
            timeout: Duration::from_secs(60),
            temperature: 0.2,
            max_tokens: 2048,
        })
    }

    /// Returns this configuration with `api_key` set.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while building or driving an [`HttpCollaborator`].
#[derive(Debug, Error)]
pub enum HttpCollaboratorError {
    /// The configured endpoint string was not a valid URL.
    #[error("invalid collaborator endpoint: {0}")]
    InvalidEndpoint(String),
    /// The underlying HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}

// ============================================================================
// SECTION: Wire Format
// ============================================================================

/// A single chat message in the wire request/response.
#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

// ============================================================================
// SECTION: HTTP Collaborator
// ============================================================================

/// A [`CollaboratorClient`] backed by a remote OpenAI-compatible
/// chat-completions endpoint.
pub struct HttpCollaborator {
    config: HttpCollaboratorConfig,
    client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
}

impl HttpCollaborator {
    /// Builds a new HTTP collaborator from `config`, rate-limited by the
    /// conservative default budget until [`Self::with_rate_limit`] overrides
    /// it for this model.
    ///
    /// # Errors
    ///
    /// Returns [`HttpCollaboratorError::ClientBuild`] if the underlying
    /// `reqwest` client cannot be constructed (e.g. TLS backend
    /// initialization failure).
    pub fn new(config: HttpCollaboratorConfig) -> Result<Self, HttpCollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| HttpCollaboratorError::ClientBuild(err.to_string()))?;
        Ok(Self { config, client, rate_limiter: Arc::new(RateLimiter::new()) })
    }

    /// Shares an existing [`RateLimiter`] across multiple collaborators
    /// (e.g. several models billed against one provider budget) instead of
    /// each one tracking its own window.
    #[must_use]
    pub fn with_shared_rate_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// Overrides the requests-per-minute/tokens-per-minute budget for this
    /// collaborator's model, replacing the conservative default.
    #[must_use]
    pub fn with_rate_limit(self, budget: RateLimitConfig) -> Self {
        self.rate_limiter.configure(&self.config.model, budget);
        self
    }

    /// Estimates a request's total token cost (input + reserved output)
    /// ahead of the call, since the rate limiter must gate before the
    /// provider's real `usage` figures are known.
    fn estimate_tokens(&self, request: &CollaboratorRequest) -> u64 {
        let input_chars = request.system_prompt.len() + request.user_content.len();
        let input_tokens = (input_chars / CHARS_PER_TOKEN_ESTIMATE) as u64;
        input_tokens + u64::from(self.config.max_tokens)
    }
}

#[async_trait]
impl CollaboratorClient for HttpCollaborator {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: CollaboratorRequest) -> Result<CollaboratorResponse, CollaboratorError> {
        let estimated_tokens = self.estimate_tokens(&request);
        self.rate_limiter
            .acquire(&self.config.model, estimated_tokens)
            .await
            .map_err(|err| CollaboratorError::BudgetExhausted(err.to_string()))?;

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage { role: "system".to_string(), content: request.system_prompt },
                ChatMessage { role: "user".to_string(), content: request.user_content },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut builder = self.client.post(self.config.endpoint.clone()).json(&body);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| CollaboratorError::CallFailed(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::CallFailed(format!("HTTP {status}: {text}")));
        }

        let parsed: ChatResponse =
            response.json().await.map_err(|err| CollaboratorError::Malformed(err.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CollaboratorError::Malformed("no choices in response".to_string()))?;

        let usage = parsed
            .usage
            .map(|u| TokenUsage { prompt_tokens: u.prompt_tokens, completion_tokens: u.completion_tokens });
        if let Some(actual) = &usage {
            self.rate_limiter.record_usage(&self.config.model, actual.prompt_tokens + actual.completion_tokens);
        }

        Ok(CollaboratorResponse { content: choice.message.content, tool_calls: Vec::new(), usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_rejects_an_unparsable_endpoint() {
        let result = HttpCollaboratorConfig::new("not a url", "gpt-test");
        assert!(result.is_err());
    }

    #[test]
    fn config_accepts_a_valid_endpoint_and_applies_defaults() {
        let config = HttpCollaboratorConfig::new("https://api.example.com/v1/chat/completions", "gpt-test")
            .expect("valid endpoint");
        assert_eq!(config.model, "gpt-test");
        assert!(config.api_key.is_none());
        assert_eq!(config.max_tokens, 2048);
    }

    #[test]
    fn with_api_key_sets_the_bearer_token() {
        let config = HttpCollaboratorConfig::new("https://api.example.com/v1/chat/completions", "gpt-test")
            .expect("valid endpoint")
            .with_api_key("secret-token");
        assert_eq!(config.api_key.as_deref(), Some("secret-token"));
    }

    #[tokio::test]
    async fn a_request_over_budget_is_rejected_before_any_network_call() {
        let config = HttpCollaboratorConfig::new("https://api.example.com/v1/chat/completions", "gpt-test")
            .expect("valid endpoint");
        let collaborator = HttpCollaborator::new(config)
            .expect("client builds")
            .with_rate_limit(RateLimitConfig { requests_per_minute: 10, tokens_per_minute: 10 });
        let request = CollaboratorRequest {
            system_prompt: "you are a careful assistant".to_string(),
            user_content: "summarize the quarterly report".to_string(),
            allowed_tools: Vec::new(),
        };

        let err = collaborator.complete(request).await;
        assert!(matches!(err, Err(CollaboratorError::BudgetExhausted(_))));
    }
}
