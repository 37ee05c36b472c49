// hive-orchestrator/src/lib.rs
// ============================================================================
// Module: HiveForge Orchestrator Library
// Description: Public API surface for the layered DAG executor and the
//              Plan/Verify/Approve/Execute/Verify/Finalize pipeline.
// Purpose: Expose the executor, per-Run chain appender, task context, and
//          result types the pipeline and its hosts depend on.
// Dependencies: crate::{chain, context, executor, pipeline, result}
// ============================================================================

//! ## Overview
//! The orchestrator turns a [`hive_planner::Plan`] into executed Tasks: the
//! executor (L9) runs one DAG layer at a time under a bounded concurrency
//! budget, retrying retryable failures; the pipeline (L10) wraps a full Run
//! in its Plan/Plan-Verify/Plan-Approval/Execute/Post-Verify/Finalize
//! stages, appending every stage transition to a [`chain::RunChain`] so the
//! Run's event log is the single source of truth for what happened.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod chain;
pub mod context;
pub mod executor;
pub mod pipeline;
pub mod result;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use chain::ChainError;
pub use chain::EventFields;
pub use chain::RunChain;
pub use context::TaskContext;
pub use executor::ExecutorConfig;
pub use executor::OrchestratorError;
pub use executor::execute_plan;
pub use pipeline::GuardVerdict;
pub use pipeline::PipelineConfig;
pub use pipeline::PipelineError;
pub use pipeline::PipelineOutcome;
pub use pipeline::run_pipeline;
pub use result::ColonyResult;
pub use result::TaskOutcome;
