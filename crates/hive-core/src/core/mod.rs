// hive-core/src/core/mod.rs
// ============================================================================
// Module: HiveForge Core Types
// Description: Canonical event, entity, identifier, time, and hashing types.
// Purpose: Provide stable, serializable types shared by every other crate.
// Dependencies: ret-logic, serde
// ============================================================================

//! ## Overview
//! Core types define the event model, projected entity shapes, opaque
//! identifiers, the time representation, and canonical hashing. These types
//! are the single source of truth consumed by the store, the projections,
//! the planner, the orchestrator, Sentinel, and the control surface.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod entities;
pub mod events;
pub mod hashing;
pub mod identifiers;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use entities::ActionClass;
pub use entities::Colony;
pub use entities::ColonyStatus;
pub use entities::Episode;
pub use entities::Hive;
pub use entities::HiveStatus;
pub use entities::Requirement;
pub use entities::RequirementStatus;
pub use entities::Run;
pub use entities::RunStatus;
pub use entities::Task;
pub use entities::TaskStatus;
pub use events::Event;
pub use events::EventError;
pub use events::EventType;
pub use events::NewEvent;
pub use events::compute_hash;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use hashing::hash_bytes;
pub use identifiers::Actor;
pub use identifiers::ColonyId;
pub use identifiers::CommandId;
pub use identifiers::EpisodeId;
pub use identifiers::EventId;
pub use identifiers::HiveId;
pub use identifiers::RequirementId;
pub use identifiers::RunId;
pub use identifiers::TaskId;
pub use identifiers::TrustLevel;
pub use time::Timestamp;
