// hive-core/src/runtime/state_machine.rs
// ============================================================================
// Module: HiveForge State Machines
// Description: Legal transition tables for Hive, Colony, Run, Task, and
//              Requirement lifecycles.
// Purpose: Reject illegal transitions before an event is appended.
// Dependencies: crate::core::{entities, events}
// ============================================================================

//! ## Overview
//! Each entity's lifecycle is a small finite state machine. A command that
//! would cause an illegal transition is rejected before any event is
//! appended — illegal transitions never reach the log, so the log always
//! reflects only valid history.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::ColonyStatus;
use crate::core::HiveStatus;
use crate::core::RequirementStatus;
use crate::core::RunStatus;
use crate::core::TaskStatus;

/// An attempted transition that the state machine forbids.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("illegal {entity} transition: {from} -> {to}")]
pub struct IllegalTransition {
    /// Entity kind, e.g. `"task"`.
    pub entity: &'static str,
    /// Source state, as text.
    pub from: String,
    /// Attempted destination state, as text.
    pub to: String,
}

impl IllegalTransition {
    fn new<T: std::fmt::Debug>(entity: &'static str, from: T, to: T) -> Self {
        Self { entity, from: format!("{from:?}"), to: format!("{to:?}") }
    }
}

// ============================================================================
// SECTION: Hive
// ============================================================================

/// Validates a Hive status transition.
///
/// # Errors
///
/// Returns [`IllegalTransition`] if `to` is not reachable from `from`.
pub fn hive_transition(from: HiveStatus, to: HiveStatus) -> Result<(), IllegalTransition> {
    use HiveStatus::{Active, Closed, Idle};
    let legal = matches!(
        (from, to),
        (Active, Idle) | (Idle, Active) | (Active, Closed) | (Idle, Closed)
    );
    if legal || from == to {
        Ok(())
    } else {
        Err(IllegalTransition::new("hive", from, to))
    }
}

// ============================================================================
// SECTION: Colony
// ============================================================================

/// Validates a Colony status transition.
///
/// # Errors
///
/// Returns [`IllegalTransition`] if `to` is not reachable from `from`.
pub fn colony_transition(from: ColonyStatus, to: ColonyStatus) -> Result<(), IllegalTransition> {
    use ColonyStatus::{Completed, Failed, InProgress, Pending, Suspended};
    let legal = matches!(
        (from, to),
        (Pending, InProgress)
            | (InProgress, Completed)
            | (InProgress, Failed)
            | (InProgress, Suspended)
            | (Suspended, InProgress)
            | (Suspended, Failed)
            | (Failed, InProgress)
    );
    if legal || from == to {
        Ok(())
    } else {
        Err(IllegalTransition::new("colony", from, to))
    }
}

// ============================================================================
// SECTION: Run
// ============================================================================

/// Validates a Run status transition.
///
/// # Errors
///
/// Returns [`IllegalTransition`] if `to` is not reachable from `from`, or if
/// `from` is already terminal (terminal states never transition further).
pub fn run_transition(from: RunStatus, to: RunStatus) -> Result<(), IllegalTransition> {
    use RunStatus::{Aborted, Completed, Failed, Running, TimedOut};
    if from.is_terminal() {
        return Err(IllegalTransition::new("run", from, to));
    }
    let legal = matches!((from, to), (Running, Completed | Failed | Aborted | TimedOut));
    if legal {
        Ok(())
    } else {
        Err(IllegalTransition::new("run", from, to))
    }
}

// ============================================================================
// SECTION: Task
// ============================================================================

/// Validates a Task status transition.
///
/// # Errors
///
/// Returns [`IllegalTransition`] if `to` is not reachable from `from`, or if
/// `from` is already terminal.
pub fn task_transition(from: TaskStatus, to: TaskStatus) -> Result<(), IllegalTransition> {
    use TaskStatus::{Assigned, Blocked, Cancelled, Completed, Failed, InProgress, Pending};
    if from.is_terminal() {
        return Err(IllegalTransition::new("task", from, to));
    }
    let legal = matches!(
        (from, to),
        (Pending, Assigned)
            | (Pending, Blocked)
            | (Pending, Cancelled)
            | (Assigned, InProgress)
            | (Assigned, Completed)
            | (Assigned, Failed)
            | (Assigned, Blocked)
            | (Assigned, Cancelled)
            | (InProgress, Completed)
            | (InProgress, Failed)
            | (InProgress, Blocked)
            | (InProgress, Cancelled)
            | (Blocked, Pending)
            | (Blocked, Assigned)
            | (Blocked, Cancelled)
    );
    if legal {
        Ok(())
    } else {
        Err(IllegalTransition::new("task", from, to))
    }
}

// ============================================================================
// SECTION: Requirement
// ============================================================================

/// Validates a Requirement status transition.
///
/// # Errors
///
/// Returns [`IllegalTransition`] if `to` is not reachable from `from`, or if
/// `from` is already terminal.
pub fn requirement_transition(
    from: RequirementStatus,
    to: RequirementStatus,
) -> Result<(), IllegalTransition> {
    use RequirementStatus::{Approved, Cancelled, Pending, Rejected};
    if from.is_terminal() {
        return Err(IllegalTransition::new("requirement", from, to));
    }
    let legal = matches!((from, to), (Pending, Approved | Rejected | Cancelled));
    if legal {
        Ok(())
    } else {
        Err(IllegalTransition::new("requirement", from, to))
    }
}
