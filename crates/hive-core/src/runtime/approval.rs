// hive-core/src/runtime/approval.rs
// ============================================================================
// Module: HiveForge Approval Loop
// Description: Suspend-on-handle / resume-on-resolve machinery for
//              Requirements.
// Purpose: Let a task executor block until a human (or policy) resolves the
//          Requirement the policy gate raised for it.
// Dependencies: crate::core::identifiers, tokio::sync::oneshot
// ============================================================================

//! ## Overview
//! When the policy gate returns `RequireApproval`, the orchestrator creates
//! a Requirement and registers a handle here, then awaits it. An external
//! `resolve` command (approve/reject) or an emergency-stop/force-complete
//! command completes the handle. A Requirement can be resolved at most
//! once; resolving twice is rejected rather than silently ignored.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;
use tokio::sync::oneshot;

use crate::core::RequirementId;

/// The terminal outcome of a Requirement's approval wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// The resolver approved the request.
    Approved {
        /// Selected option, if the Requirement offered a choice.
        selected_option: Option<String>,
        /// Free-text comment.
        comment: Option<String>,
    },
    /// The resolver rejected the request.
    Rejected {
        /// Free-text comment.
        comment: Option<String>,
    },
    /// The Requirement was cancelled without a resolver decision (e.g. by
    /// emergency-stop or force-complete).
    Cancelled,
}

/// Errors raised by the approval registry.
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// No pending wait is registered for this Requirement.
    #[error("no pending approval for requirement {0}")]
    NotPending(String),
    /// The Requirement was already resolved or its waiter already dropped.
    #[error("requirement {0} approval channel already closed")]
    Closed(String),
}

/// A waitable handle for a single Requirement's resolution.
pub struct ApprovalHandle {
    requirement_id: RequirementId,
    receiver: oneshot::Receiver<ApprovalOutcome>,
}

impl ApprovalHandle {
    /// Blocks until the Requirement is resolved or cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::Closed`] if the registry is dropped before
    /// resolving.
    pub async fn wait(self) -> Result<ApprovalOutcome, ApprovalError> {
        self.receiver
            .await
            .map_err(|_| ApprovalError::Closed(self.requirement_id.to_string()))
    }
}

/// Tracks in-flight Requirement waits, keyed by Requirement identifier.
#[derive(Default)]
pub struct ApprovalRegistry {
    pending: Mutex<HashMap<RequirementId, oneshot::Sender<ApprovalOutcome>>>,
}

impl ApprovalRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new pending wait, returning a handle the caller awaits.
    ///
    /// # Panics
    ///
    /// Panics only if the internal mutex is poisoned by a prior panic while
    /// held, which indicates a bug elsewhere in the process.
    #[must_use]
    pub fn register(&self, requirement_id: RequirementId) -> ApprovalHandle {
        let (tx, rx) = oneshot::channel();
        let mut guard = self.pending.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.insert(requirement_id.clone(), tx);
        ApprovalHandle { requirement_id, receiver: rx }
    }

    /// Resolves a pending Requirement wait, waking its awaiter.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::NotPending`] if no wait is registered, or
    /// [`ApprovalError::Closed`] if the awaiter already dropped its handle.
    pub fn resolve(&self, requirement_id: &RequirementId, outcome: ApprovalOutcome) -> Result<(), ApprovalError> {
        let sender = {
            let mut guard = self.pending.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            guard.remove(requirement_id)
        };
        let sender = sender.ok_or_else(|| ApprovalError::NotPending(requirement_id.to_string()))?;
        sender.send(outcome).map_err(|_| ApprovalError::Closed(requirement_id.to_string()))
    }

    /// Cancels every pending wait, e.g. on emergency-stop. Waiters receive
    /// [`ApprovalOutcome::Cancelled`]; send failures (awaiter already gone)
    /// are ignored since there is nothing left to notify.
    pub fn cancel_all(&self) {
        let mut guard = self.pending.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for (_, sender) in guard.drain() {
            let _ = sender.send(ApprovalOutcome::Cancelled);
        }
    }

    /// Returns the number of pending waits, for diagnostics and tests.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_wakes_the_waiter() {
        let registry = ApprovalRegistry::new();
        let handle = registry.register(RequirementId::new("req-1"));
        registry
            .resolve(&RequirementId::new("req-1"), ApprovalOutcome::Approved { selected_option: None, comment: None })
            .expect("resolve");
        let outcome = handle.wait().await.expect("wait");
        assert_eq!(outcome, ApprovalOutcome::Approved { selected_option: None, comment: None });
    }

    #[tokio::test]
    async fn cancel_all_wakes_every_waiter_as_cancelled() {
        let registry = ApprovalRegistry::new();
        let a = registry.register(RequirementId::new("req-a"));
        let b = registry.register(RequirementId::new("req-b"));
        registry.cancel_all();
        assert_eq!(a.wait().await.expect("wait a"), ApprovalOutcome::Cancelled);
        assert_eq!(b.wait().await.expect("wait b"), ApprovalOutcome::Cancelled);
    }

    #[test]
    fn resolving_unknown_requirement_errors() {
        let registry = ApprovalRegistry::new();
        let err = registry.resolve(&RequirementId::new("missing"), ApprovalOutcome::Cancelled);
        assert!(matches!(err, Err(ApprovalError::NotPending(_))));
    }
}
