// hive-control/src/lib.rs
// ============================================================================
// Module: Hive Control
// Description: The Control RPC engine: validates, policy-gates, and appends
//              every command that mutates Hive/Colony/Run/Task/Requirement
//              state.
// Purpose: Give every host (CLI, future network server) one place that
//          implements the full command surface over the event-sourced core.
// Dependencies: hive-core, hive-orchestrator, hive-planner, hive-sentinel,
//               hive-store, ret-logic
// ============================================================================

//! ## Overview
//! `hive-control` is the only crate that mutates HiveForge state. Its
//! [`Engine`] owns the event store, the policy gate, the approval loop, and
//! Sentinel, and exposes one method per Control RPC command (`hive.create`,
//! `run.start`, `task.complete`, …). Every command is wrapped in an
//! [`IdempotencyCache`] keyed by a caller-supplied `command-id`, so replaying
//! a command is a no-op rather than a double-apply.
//!
//! Two chain appenders live one level below `Engine`: [`HiveChain`] and
//! [`ColonyChain`] serialize writes to the shared meta-decisions and
//! per-Colony scopes respectively; `hive_orchestrator::RunChain` (re-exported
//! by `hive-orchestrator`, not this crate) does the same for a Run's own
//! scope and is cached per-Run inside `Engine` to keep its sequence-numbered
//! event ids unique across commands.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod clock;
pub mod engine;
pub mod error;
pub mod idempotency;
pub mod ids;
pub mod meta;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use clock::SystemClock;
pub use engine::ColonyResultDto;
pub use engine::Engine;
pub use engine::EventsListResult;
pub use engine::HeartbeatResult;
pub use engine::HiveResult;
pub use engine::RequirementResult;
pub use engine::RunResult;
pub use engine::TaskResult;
pub use error::EngineError;
pub use idempotency::IdempotencyCache;
pub use ids::mint_id;
pub use meta::ColonyChain;
pub use meta::HiveChain;
