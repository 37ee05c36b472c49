// hive-core/src/core/entities.rs
// ============================================================================
// Module: HiveForge Entities
// Description: Hive, Colony, Run, Task, and Requirement attribute structs.
// Purpose: Define the canonical shape of projected entity state.
// Dependencies: crate::core::identifiers, crate::core::time, serde
// ============================================================================

//! ## Overview
//! These structs are the entity shapes produced by projecting an event
//! stream (see [`crate::runtime::projection`]). They are pure data: nothing
//! here mutates state directly, and nothing here is authoritative — the
//! event log is authoritative, projections are derived caches.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ColonyId;
use crate::core::identifiers::HiveId;
use crate::core::identifiers::RequirementId;
use crate::core::identifiers::RunId;
use crate::core::identifiers::TaskId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Hive
// ============================================================================

/// Lifecycle status of a Hive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HiveStatus {
    /// Accepting new Colonies and Runs.
    Active,
    /// No active work; retained for history.
    Idle,
    /// Permanently closed; no further children may be created.
    Closed,
}

/// A Hive: a project-scope container owning zero or more Colonies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hive {
    /// Hive identifier.
    pub hive_id: HiveId,
    /// Human-readable name.
    pub name: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Current lifecycle status.
    pub status: HiveStatus,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Child Colony identifiers, in creation order.
    pub colonies: Vec<ColonyId>,
}

// ============================================================================
// SECTION: Colony
// ============================================================================

/// Lifecycle status of a Colony.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColonyStatus {
    /// Created but no Run has started yet.
    Pending,
    /// At least one Run is active.
    InProgress,
    /// All Runs reached a successful terminal state.
    Completed,
    /// At least one Run failed and no recovery Run is active.
    Failed,
    /// Suspended by Sentinel or an explicit operator command.
    Suspended,
}

/// A Colony: a domain-scope workgroup inside a Hive, owning exactly one
/// planner-scheduler and zero or more Runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Colony {
    /// Colony identifier.
    pub colony_id: ColonyId,
    /// Owning Hive identifier.
    pub hive_id: HiveId,
    /// Human-readable name.
    pub name: String,
    /// Optional high-level goal description for the Colony as a whole.
    pub goal: Option<String>,
    /// Current lifecycle status.
    pub status: ColonyStatus,
    /// Explicit suspend flag set by Sentinel (distinct from `status`, which
    /// is otherwise a pure function of child Run statuses per the Colony
    /// state machine).
    pub suspended: bool,
    /// Child Run identifiers, in creation order.
    pub runs: Vec<RunId>,
}

// ============================================================================
// SECTION: Run
// ============================================================================

/// Terminal and non-terminal states of a Run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Actively executing.
    Running,
    /// Reached a successful terminal state.
    Completed,
    /// Reached a failure terminal state.
    Failed,
    /// Aborted via emergency-stop.
    Aborted,
    /// Exceeded its heartbeat/timeout budget.
    TimedOut,
}

impl RunStatus {
    /// Returns `true` for any terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// A Run: one execution pass within a Colony, owning Tasks and
/// Requirements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Run identifier.
    pub run_id: RunId,
    /// Owning Colony identifier, nullable for back-compat with Runs created
    /// before Colonies existed.
    pub colony_id: Option<ColonyId>,
    /// Original goal string supplied to the planner.
    pub goal: String,
    /// Current lifecycle state.
    pub state: RunStatus,
    /// Run start timestamp.
    pub started_at: Timestamp,
    /// Completion timestamp, set once the Run reaches a terminal state.
    pub completed_at: Option<Timestamp>,
    /// Timestamp of the most recent heartbeat.
    pub last_heartbeat: Timestamp,
    /// Total number of events appended to this Run's log.
    pub event_count: u64,
    /// Child Task identifiers, in creation order.
    pub tasks: Vec<TaskId>,
    /// Child Requirement identifiers, in creation order.
    pub requirements: Vec<RequirementId>,
}

// ============================================================================
// SECTION: Task
// ============================================================================

/// Lifecycle state of a Task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not yet assigned to a worker.
    Pending,
    /// Assigned to a worker, not yet started.
    Assigned,
    /// Actively executing.
    InProgress,
    /// Completed successfully.
    Completed,
    /// Failed (terminal unless retried).
    Failed,
    /// Blocked on an unmet dependency or external condition.
    Blocked,
    /// Cancelled via force-complete or emergency-stop.
    Cancelled,
}

impl TaskStatus {
    /// Returns `true` for any terminal state (no further transitions).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Risk classification of a Task's underlying action, used by the policy
/// gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionClass {
    /// No side effects (reads, queries, analysis).
    ReadOnly,
    /// Side effects that can be undone (file edits under version control,
    /// draft PRs, …).
    Reversible,
    /// Side effects that cannot be cleanly undone (force-push, deletes,
    /// external API calls with side effects, …).
    Irreversible,
}

/// A Task: a unit of work inside a Run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Task identifier.
    pub task_id: TaskId,
    /// Owning Run identifier.
    pub run_id: RunId,
    /// Optional parent Task identifier, for sub-tasks.
    pub parent_task_id: Option<TaskId>,
    /// Short human-readable title.
    pub title: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// Current lifecycle state.
    pub state: TaskStatus,
    /// Progress percentage, `0..=100`.
    pub progress: u8,
    /// Current assignee (worker/agent identifier), if assigned.
    pub assignee: Option<String>,
    /// Number of retry attempts made so far.
    pub retry_count: u32,
    /// Declared dependency Task identifiers.
    pub dependencies: Vec<TaskId>,
    /// Risk classification feeding the policy gate.
    pub action_class: ActionClass,
}

// ============================================================================
// SECTION: Requirement
// ============================================================================

/// Lifecycle state of a Requirement (user-approval request).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementStatus {
    /// Awaiting a decision.
    Pending,
    /// Approved by the resolver.
    Approved,
    /// Rejected by the resolver.
    Rejected,
    /// Cancelled (e.g. by emergency-stop or force-complete).
    Cancelled,
}

impl RequirementStatus {
    /// Returns `true` for any terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// A Requirement: a user-approval prompt raised by the policy gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    /// Requirement identifier.
    pub requirement_id: RequirementId,
    /// Owning Run identifier.
    pub run_id: RunId,
    /// Human-readable description of what is being requested.
    pub description: String,
    /// Current lifecycle state.
    pub state: RequirementStatus,
    /// Selectable options presented to the resolver, empty for a plain
    /// approve/reject decision.
    pub options: Vec<String>,
    /// Option selected by the resolver, if any.
    pub selected_option: Option<String>,
    /// Free-text comment supplied by the resolver.
    pub comment: Option<String>,
}

// ============================================================================
// SECTION: Episode
// ============================================================================

/// A post-Run learning record: goal fingerprint, outcome, and KPI scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    /// Episode identifier.
    pub episode_id: crate::core::identifiers::EpisodeId,
    /// Run the episode summarizes.
    pub run_id: RunId,
    /// Owning Colony, if any.
    pub colony_id: Option<ColonyId>,
    /// Content hash of the Run's goal string, for cross-Run comparison
    /// without retaining the raw goal text.
    pub goal_fingerprint: String,
    /// Terminal Run status.
    pub outcome: RunStatus,
    /// Named KPI scores computed at Run termination.
    pub kpi_scores: BTreeMap<String, f64>,
    /// Number of Sentinel enforcement actions taken during the Run.
    pub intervention_count: u32,
    /// Wall-clock duration of the Run in milliseconds.
    pub duration_ms: i64,
    /// Timestamp the episode was recorded.
    pub created_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_status_terminal_set_matches_spec() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Assigned.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
        assert!(!TaskStatus::Blocked.is_terminal());
    }

    #[test]
    fn run_status_terminal_set_matches_spec() {
        assert!(!RunStatus::Running.is_terminal());
        for terminal in [RunStatus::Completed, RunStatus::Failed, RunStatus::Aborted, RunStatus::TimedOut] {
            assert!(terminal.is_terminal());
        }
    }

    #[test]
    fn action_class_orders_by_risk() {
        assert!(ActionClass::ReadOnly < ActionClass::Reversible);
        assert!(ActionClass::Reversible < ActionClass::Irreversible);
    }
}
