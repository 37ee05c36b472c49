// hive-orchestrator/src/result.rs
// ============================================================================
// Module: Colony Result
// Description: Aggregated outcome of running a plan to completion.
// Purpose: Feed Post-Verify and the Run's terminal event.
// Dependencies: hive_core::TaskId
// ============================================================================

use std::collections::BTreeMap;

use hive_core::TaskId;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// The terminal outcome of a single Task's execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// The Task's worker returned a result.
    Completed {
        /// Opaque result payload produced by the worker.
        result: Value,
    },
    /// The Task failed, either after exhausting retries, non-retryably, or
    /// because it was aborted by a cancellation signal (reason `"aborted"`).
    Failed {
        /// Human-readable failure reason.
        reason: String,
        /// Whether the failure was classified as transient by the worker.
        retryable: bool,
    },
}

impl TaskOutcome {
    /// Returns `true` if this outcome represents a successful completion.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Aggregated outcome of running an entire plan: every Task's terminal
/// outcome, keyed by Task id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColonyResult {
    /// Per-task terminal outcomes, in the order tasks completed.
    pub task_outcomes: BTreeMap<TaskId, TaskOutcome>,
}

impl ColonyResult {
    /// Returns `true` if every task outcome was a success.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.task_outcomes.values().all(TaskOutcome::is_success)
    }

    /// Returns the ids of every task that failed or was cancelled.
    #[must_use]
    pub fn failed_task_ids(&self) -> Vec<TaskId> {
        self.task_outcomes
            .iter()
            .filter(|(_, outcome)| !outcome.is_success())
            .map(|(id, _)| id.clone())
            .collect()
    }
}
