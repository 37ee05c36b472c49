// hive-collab/src/scripted.rs
// ============================================================================
// Module: Scripted Collaborators
// Description: Deterministic stand-ins for a real LLM collaborator.
// Purpose: Drive the planner, orchestrator, and pipeline end to end in
//          tests and demos without a network dependency.
// Dependencies: hive_core::{CollaboratorClient, CollaboratorRequest,
//              CollaboratorResponse}
// ============================================================================

//! ## Overview
//! [`ScriptedCollaborator`] always returns the same canned response;
//! [`SequencedCollaborator`] cycles through a fixed list, one response per
//! call, repeating the last entry once the list is exhausted. Both record
//! every request they receive so a test can assert on what was actually
//! asked, mirroring the teacher's inline-fixture style for exercising a
//! trait boundary without a live backend.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;

use async_trait::async_trait;
use hive_core::CollaboratorClient;
use hive_core::CollaboratorError;
use hive_core::CollaboratorRequest;
use hive_core::CollaboratorResponse;

// ============================================================================
// SECTION: Scripted Collaborator
// ============================================================================

/// Always answers with the same response, regardless of the request.
pub struct ScriptedCollaborator {
    model_name: String,
    response: CollaboratorResponse,
    requests: Mutex<Vec<CollaboratorRequest>>,
}

impl ScriptedCollaborator {
    /// Creates a collaborator that always returns `response`.
    #[must_use]
    pub fn new(model_name: impl Into<String>, response: CollaboratorResponse) -> Self {
        Self { model_name: model_name.into(), response, requests: Mutex::new(Vec::new()) }
    }

    /// Returns every request this collaborator has received, in call order.
    ///
    /// # Panics
    ///
    /// Panics only if the internal mutex is poisoned by a prior panic while
    /// held, which indicates a bug elsewhere in the process.
    #[must_use]
    pub fn requests(&self) -> Vec<CollaboratorRequest> {
        self.requests.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl CollaboratorClient for ScriptedCollaborator {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CollaboratorRequest) -> Result<CollaboratorResponse, CollaboratorError> {
        self.requests.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(request);
        Ok(self.response.clone())
    }
}

// ============================================================================
// SECTION: Sequenced Collaborator
// ============================================================================

/// Cycles through a fixed list of responses, one per call; once exhausted,
/// repeats the final entry. Useful for scripting a multi-turn conversation
/// (e.g. planner then per-task worker calls) deterministically.
pub struct SequencedCollaborator {
    model_name: String,
    responses: Vec<CollaboratorResponse>,
    next: Mutex<usize>,
}

impl SequencedCollaborator {
    /// Creates a collaborator that answers with `responses` in order.
    ///
    /// # Panics
    ///
    /// Panics if `responses` is empty; a sequenced collaborator with no
    /// scripted answers cannot honor its contract.
    #[must_use]
    pub fn new(model_name: impl Into<String>, responses: Vec<CollaboratorResponse>) -> Self {
        assert!(!responses.is_empty(), "SequencedCollaborator requires at least one response");
        Self { model_name: model_name.into(), responses, next: Mutex::new(0) }
    }
}

#[async_trait]
impl CollaboratorClient for SequencedCollaborator {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, _request: CollaboratorRequest) -> Result<CollaboratorResponse, CollaboratorError> {
        let mut next = self.next.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let index = (*next).min(self.responses.len() - 1);
        *next += 1;
        Ok(self.responses[index].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(content: &str) -> CollaboratorResponse {
        CollaboratorResponse { content: content.to_string(), tool_calls: Vec::new(), usage: None }
    }

    fn request() -> CollaboratorRequest {
        CollaboratorRequest {
            system_prompt: "sys".to_string(),
            user_content: "hello".to_string(),
            allowed_tools: Vec::new(),
        }
    }

    #[tokio::test]
    async fn scripted_collaborator_repeats_the_same_answer() {
        let collaborator = ScriptedCollaborator::new("test-model", response("ok"));
        let first = collaborator.complete(request()).await.expect("first call");
        let second = collaborator.complete(request()).await.expect("second call");
        assert_eq!(first.content, "ok");
        assert_eq!(second.content, "ok");
        assert_eq!(collaborator.requests().len(), 2);
    }

    #[tokio::test]
    async fn sequenced_collaborator_advances_then_holds_last() {
        let collaborator =
            SequencedCollaborator::new("test-model", vec![response("first"), response("second")]);
        assert_eq!(collaborator.complete(request()).await.expect("call 1").content, "first");
        assert_eq!(collaborator.complete(request()).await.expect("call 2").content, "second");
        assert_eq!(collaborator.complete(request()).await.expect("call 3").content, "second");
    }
}
