// hive-control/src/error.rs
// ============================================================================
// Module: Engine Errors
// Description: Typed errors returned by every `Engine` command.
// Purpose: Give Control RPC callers a stable, matchable error taxonomy
//          instead of a single opaque failure type.
// Dependencies: hive_core, hive_orchestrator, thiserror
// ============================================================================

//! ## Overview
//! Every [`crate::engine::Engine`] command returns [`EngineError`] on
//! failure. Variants distinguish validation/state errors a caller can react
//! to programmatically (`UnknownHive`, `IllegalTransition`, `Denied`) from
//! infrastructure failures (`Store`, `Chain`) that only differ in their
//! root cause.

use hive_core::ApprovalError;
use hive_core::EventError;
use hive_core::IllegalTransition;
use hive_core::EventStoreError;
use hive_core::ProjectionError;
use hive_orchestrator::ChainError;
use hive_orchestrator::PipelineError;
use thiserror::Error;

/// Errors raised by an [`crate::engine::Engine`] command.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The event store rejected a read or append.
    #[error(transparent)]
    Store(#[from] EventStoreError),
    /// An event could not be constructed or hashed.
    #[error(transparent)]
    Event(#[from] EventError),
    /// Constructing or appending a chained event failed.
    #[error(transparent)]
    Chain(#[from] ChainError),
    /// Folding the event log into a projection failed.
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    /// The command would cause an illegal entity state transition.
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),
    /// The approval registry rejected a wait/resolve.
    #[error(transparent)]
    Approval(#[from] ApprovalError),
    /// The pipeline itself failed while executing a Run.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    /// No Hive with this id has been created.
    #[error("unknown hive: {0}")]
    UnknownHive(String),
    /// No Colony with this id has been created.
    #[error("unknown colony: {0}")]
    UnknownColony(String),
    /// No Run with this id has been started.
    #[error("unknown run: {0}")]
    UnknownRun(String),
    /// No Task with this id exists within the given Run.
    #[error("unknown task: {0}")]
    UnknownTask(String),
    /// No Requirement with this id exists within the given Run.
    #[error("unknown requirement: {0}")]
    UnknownRequirement(String),
    /// The policy gate denied the action outright.
    #[error("policy gate denied action in scope {scope}")]
    Denied {
        /// The scope the action was evaluated against.
        scope: String,
    },
    /// The policy gate required approval for a command with no Run to
    /// attach a Requirement to (Hive/Colony-scope commands never raise a
    /// [`hive_core::Requirement`] since it is defined Run-scoped only).
    #[error("approval required for a Hive/Colony-scope command, but Requirements are Run-scoped only: {0}")]
    ApprovalUnsupported(String),
    /// A Requirement the command depended on was rejected.
    #[error("requirement rejected: {0}")]
    RequirementRejected(String),
    /// A Requirement the command depended on was cancelled.
    #[error("requirement cancelled")]
    RequirementCancelled,
    /// `run.complete` was called without `force` while Tasks/Requirements
    /// remain non-terminal.
    #[error("run {0} still has open tasks or requirements; pass force=true to cancel them")]
    RunNotQuiescent(String),
    /// The same `command-id` was already used for a different command
    /// shape (its cached result could not be decoded as the type this call
    /// expects).
    #[error("command {0} was already used with an incompatible result shape")]
    IdempotencyConflict(String),
}
