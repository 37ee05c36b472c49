// hive-collab/src/logging.rs
// ============================================================================
// Module: Logging Collaborator
// Description: A `CollaboratorClient` decorator that records every call.
// Purpose: Give operators a structured audit trail of collaborator traffic
//          without changing the call site.
// Dependencies: hive_core::{CollaboratorClient, CollaboratorRequest,
//              CollaboratorResponse}, tracing
// ============================================================================

//! ## Overview
//! Wraps an inner [`hive_core::CollaboratorClient`] and emits a
//! [`tracing`] event before and after each call, recording the model
//! name, prompt length, and (on success) response length and token
//! usage. Errors from the inner client are logged and passed through
//! unchanged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use hive_core::CollaboratorClient;
use hive_core::CollaboratorError;
use hive_core::CollaboratorRequest;
use hive_core::CollaboratorResponse;

// ============================================================================
// SECTION: Logging Collaborator
// ============================================================================

/// Decorates a [`CollaboratorClient`] with `tracing` spans around each call.
pub struct LoggingCollaborator<C> {
    inner: C,
}

impl<C> LoggingCollaborator<C> {
    /// Wraps `inner` with logging.
    pub const fn new(inner: C) -> Self {
        Self { inner }
    }

    /// Returns the wrapped collaborator.
    pub const fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: CollaboratorClient> CollaboratorClient for LoggingCollaborator<C> {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    async fn complete(&self, request: CollaboratorRequest) -> Result<CollaboratorResponse, CollaboratorError> {
        let model = self.inner.model_name().to_string();
        tracing::info!(
            model = %model,
            system_prompt_len = request.system_prompt.len(),
            user_content_len = request.user_content.len(),
            allowed_tools = request.allowed_tools.len(),
            "collaborator call started"
        );

        match self.inner.complete(request).await {
            Ok(response) => {
                tracing::info!(
                    model = %model,
                    content_len = response.content.len(),
                    tool_calls = response.tool_calls.len(),
                    prompt_tokens = response.usage.map(|u| u.prompt_tokens),
                    completion_tokens = response.usage.map(|u| u.completion_tokens),
                    "collaborator call succeeded"
                );
                Ok(response)
            }
            Err(err) => {
                tracing::warn!(model = %model, error = %err, "collaborator call failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedCollaborator;

    #[tokio::test]
    async fn delegates_and_passes_through_the_response() {
        let response =
            CollaboratorResponse { content: "hi".to_string(), tool_calls: Vec::new(), usage: None };
        let inner = ScriptedCollaborator::new("inner-model", response);
        let logged = LoggingCollaborator::new(inner);

        let request = CollaboratorRequest {
            system_prompt: "sys".to_string(),
            user_content: "hello".to_string(),
            allowed_tools: Vec::new(),
        };

        let result = logged.complete(request).await.expect("call");
        assert_eq!(result.content, "hi");
        assert_eq!(logged.model_name(), "inner-model");
    }
}
