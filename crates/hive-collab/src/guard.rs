// hive-collab/src/guard.rs
// ============================================================================
// Module: Heuristic Guard
// Description: Lightweight stand-in for a quality-review collaborator.
// Purpose: Let the pipeline's Plan-Verify/Post-Verify Guard stages run end
//          to end without a real review model wired in.
// Dependencies: hive_core::{CollaboratorClient, CollaboratorRequest,
//              CollaboratorResponse}
// ============================================================================

//! ## Overview
//! The pipeline's Guard stages ask a [`hive_core::CollaboratorClient`] to
//! render a `{"verdict": "pass"|"conditional"|"fail", "reason": string}`
//! verdict over a plan or a task's result. A real deployment wires in a
//! model fine-tuned for review; this crate ships a heuristic Guard that
//! inspects the request content for a small set of red-flag keywords
//! (`"delete"`, `"drop table"`, `"rm -rf"`, `"format"`) and otherwise
//! passes, so demos and tests can exercise the Guard stage without a live
//! backend. It is not a substitute for real review.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use hive_core::CollaboratorClient;
use hive_core::CollaboratorError;
use hive_core::CollaboratorRequest;
use hive_core::CollaboratorResponse;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Verdict
// ============================================================================

/// Shape of the JSON the pipeline expects back from a Guard call, echoed
/// in [`CollaboratorResponse::content`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GuardVerdictPayload {
    /// `"pass"` or `"fail"`, matching `hive_orchestrator::pipeline`'s
    /// expected Guard vocabulary.
    verdict: &'static str,
    /// Human-readable justification for the verdict.
    reason: String,
}

/// Phrases that cause the heuristic Guard to reject a request outright.
const RED_FLAGS: &[&str] = &["drop table", "rm -rf", "delete", "format c:"];

// ============================================================================
// SECTION: Heuristic Guard
// ============================================================================

/// A deterministic, keyword-based Guard collaborator.
///
/// Flags content containing an obviously destructive phrase as `"fail"`;
/// everything else is `"pass"`. Intended as a reference implementation
/// and test fixture, not a production review gate.
pub struct HeuristicGuard {
    model_name: String,
}

impl HeuristicGuard {
    /// Creates a new heuristic Guard identified as `model_name`.
    #[must_use]
    pub fn new(model_name: impl Into<String>) -> Self {
        Self { model_name: model_name.into() }
    }
}

impl Default for HeuristicGuard {
    fn default() -> Self {
        Self::new("heuristic-guard")
    }
}

#[async_trait]
impl CollaboratorClient for HeuristicGuard {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CollaboratorRequest) -> Result<CollaboratorResponse, CollaboratorError> {
        let haystack = request.user_content.to_lowercase();
        let flagged = RED_FLAGS.iter().find(|flag| haystack.contains(*flag));

        let payload = match flagged {
            Some(flag) => GuardVerdictPayload {
                verdict: "fail",
                reason: format!("content contains a red-flag phrase: {flag}"),
            },
            None => GuardVerdictPayload { verdict: "pass", reason: "no red-flag phrases found".to_string() },
        };

        let content = serde_json::to_string(&payload)
            .map_err(|err| CollaboratorError::Malformed(err.to_string()))?;

        Ok(CollaboratorResponse { content, tool_calls: Vec::new(), usage: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(content: &str) -> CollaboratorRequest {
        CollaboratorRequest {
            system_prompt: "review this".to_string(),
            user_content: content.to_string(),
            allowed_tools: Vec::new(),
        }
    }

    #[tokio::test]
    async fn approves_benign_content() {
        let guard = HeuristicGuard::default();
        let response = guard.complete(request("create a report summarizing sales")).await.expect("call");
        assert!(response.content.contains("\"pass\""));
    }

    #[tokio::test]
    async fn rejects_destructive_content() {
        let guard = HeuristicGuard::default();
        let response = guard.complete(request("run rm -rf / on the target host")).await.expect("call");
        assert!(response.content.contains("\"fail\""));
    }
}
