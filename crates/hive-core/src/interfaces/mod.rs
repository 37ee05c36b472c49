// hive-core/src/interfaces/mod.rs
// ============================================================================
// Module: HiveForge Interfaces
// Description: Backend-agnostic traits for event storage, collaborators, and
//              clocks.
// Purpose: Define the contract surfaces implemented by other HiveForge crates.
// Dependencies: crate::core, async-trait
// ============================================================================

//! ## Overview
//! Interfaces define how the core integrates with external systems without
//! embedding backend-specific details. Implementations must be deterministic
//! given their inputs and must fail closed on missing or invalid data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::ColonyId;
use crate::core::Episode;
use crate::core::Event;
use crate::core::RunId;
use crate::core::Timestamp;

// ============================================================================
// SECTION: Event Store
// ============================================================================

/// Errors raised by an [`EventStore`] implementation.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// Underlying I/O failure.
    #[error("event store io error: {0}")]
    Io(String),
    /// The append violated the hash chain (stale `prev_hash`, concurrent
    /// writer, or corrupted tail).
    #[error("event store chain violation: {0}")]
    ChainViolation(String),
    /// A scope (Run/Colony) referenced by a read was not found.
    #[error("event store scope not found: {0}")]
    ScopeNotFound(String),
}

/// Append-only, hash-chained event storage, keyed by Run.
///
/// Implementations MUST serialize concurrent appends to the same scope (see
/// `docs/open_questions` on per-scope single-writer locking) and MUST
/// preserve append order on replay.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends an event to the store, returning once it is durable.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::ChainViolation`] if `event.prev_hash` does
    /// not match the scope's current head hash.
    async fn append(&self, event: Event) -> Result<(), EventStoreError>;

    /// Reads all events for a Run in append order.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::ScopeNotFound`] if the Run has no events.
    async fn read_run(&self, run_id: &RunId) -> Result<Vec<Event>, EventStoreError>;

    /// Reads all events for every Run belonging to a Colony, in append
    /// order within each Run.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::Io`] on underlying I/O failure.
    async fn read_colony(&self, colony_id: &ColonyId) -> Result<Vec<Event>, EventStoreError>;

    /// Lists the Run identifiers known to the store.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::Io`] on underlying I/O failure.
    async fn list_runs(&self) -> Result<Vec<RunId>, EventStoreError>;

    /// Returns the hash of the most recently appended event for a Run, or
    /// `None` if the Run has no events yet.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::Io`] on underlying I/O failure.
    async fn head_hash(&self, run_id: &RunId) -> Result<Option<String>, EventStoreError>;

    /// Returns the hash of the most recently appended event for a Colony's
    /// own scope (Colony-lifecycle events with no Run, e.g. Sentinel
    /// enforcement), or `None` if the scope has no events yet.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::Io`] on underlying I/O failure.
    async fn head_hash_for_colony(&self, colony_id: &ColonyId) -> Result<Option<String>, EventStoreError>;

    /// Reads every event with neither a Run nor a Colony scope — Hive
    /// lifecycle events (`hive.created`, `hive.closed`) and any other
    /// top-level meta-decision, in append order.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::Io`] on underlying I/O failure.
    async fn read_meta(&self) -> Result<Vec<Event>, EventStoreError>;

    /// Returns the hash of the most recently appended meta-scope event, or
    /// `None` if the scope is empty.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::Io`] on underlying I/O failure.
    async fn head_hash_for_meta(&self) -> Result<Option<String>, EventStoreError>;
}

// ============================================================================
// SECTION: Episode Store
// ============================================================================

/// Durable storage for [`Episode`] summaries, one append-only log per
/// Colony. Episodes are derived, non-chained records (no `prev_hash`, no
/// `hash`): they summarize a terminated Run rather than recording the
/// authoritative history of one, so they never participate in the event
/// hash chain and a corrupt or missing episode log never blocks replay of
/// the real event log.
#[async_trait]
pub trait EpisodeStore: Send + Sync {
    /// Appends an episode to its Colony's log.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::Io`] on underlying I/O failure.
    async fn append_episode(&self, episode: Episode) -> Result<(), EventStoreError>;

    /// Reads every episode recorded for a Colony, in append order.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::Io`] on underlying I/O failure.
    async fn list_episodes(&self, colony_id: &ColonyId) -> Result<Vec<Episode>, EventStoreError>;
}

// ============================================================================
// SECTION: Collaborator
// ============================================================================

/// A single turn of conversation exchanged with an external collaborator
/// (an LLM, or a scripted stand-in used in tests).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaboratorRequest {
    /// System/instruction prompt.
    pub system_prompt: String,
    /// User-role content for this turn.
    pub user_content: String,
    /// Opaque tool/capability names the collaborator may invoke.
    pub allowed_tools: Vec<String>,
}

/// A collaborator's response to a [`CollaboratorRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaboratorResponse {
    /// Free-text content returned by the collaborator.
    pub content: String,
    /// Structured tool invocations requested by the collaborator, if any.
    pub tool_calls: Vec<ToolCall>,
    /// Token usage reported by the collaborator, if available.
    pub usage: Option<TokenUsage>,
}

/// A tool invocation requested by a collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool name.
    pub name: String,
    /// Opaque JSON arguments.
    pub arguments: serde_json::Value,
}

/// Token usage reported alongside a collaborator response, used by the
/// cost tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens consumed.
    pub prompt_tokens: u64,
    /// Completion tokens produced.
    pub completion_tokens: u64,
}

/// Errors raised by a [`CollaboratorClient`] implementation.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The remote collaborator returned an error or was unreachable.
    #[error("collaborator call failed: {0}")]
    CallFailed(String),
    /// The collaborator's response could not be parsed into the expected
    /// shape.
    #[error("collaborator response malformed: {0}")]
    Malformed(String),
    /// The configured rate or cost budget was exhausted.
    #[error("collaborator budget exhausted: {0}")]
    BudgetExhausted(String),
}

/// Backend-agnostic external collaborator (an LLM, or a tool-using agent
/// runtime) invoked by the planner and by task workers.
#[async_trait]
pub trait CollaboratorClient: Send + Sync {
    /// Identifies the model/collaborator this client targets, used by the
    /// rate limiter and cost tracker to key per-model budgets.
    fn model_name(&self) -> &str;

    /// Sends a request and awaits a response.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError`] when the call fails, the response is
    /// malformed, or the budget is exhausted.
    async fn complete(&self, request: CollaboratorRequest) -> Result<CollaboratorResponse, CollaboratorError>;
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Supplies wall-clock timestamps to hosts that append events.
///
/// The core itself never reads the clock; only hosts (control surface,
/// orchestrator) depend on this trait, keeping replay and unit tests
/// deterministic via a fixed/test implementation.
pub trait Clock: Send + Sync {
    /// Returns the current timestamp.
    fn now(&self) -> Timestamp;
}
