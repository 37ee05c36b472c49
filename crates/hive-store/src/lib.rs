// hive-store/src/lib.rs
// ============================================================================
// Module: HiveForge Vault Store
// Description: Durable EventStore backed by append-only, hash-chained JSONL
//              files, one per scope.
// Purpose: Give the orchestrator, planner, and Sentinel a concrete, durable
//          event log without any SQL/relational dependency.
// Dependencies: hive-core
// ============================================================================

//! ## Overview
//! The vault is a directory of newline-delimited JSON event logs, one file
//! per scope (a Run, a Hive, or the meta-decisions scope). Each scope is
//! single-writer: appends to the same scope serialize through a per-scope
//! file lock, while appends to different scopes proceed independently.
//! Every append is checked against the scope's last hash before the new
//! line is written, so a concurrent writer race produces a rejected append
//! rather than a silently forked chain.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod vault;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use vault::VaultConfig;
pub use vault::VaultError;
pub use vault::VaultStore;
pub use vault::VaultSyncMode;
