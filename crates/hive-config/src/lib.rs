// hive-config/src/lib.rs
// ============================================================================
// Module: Hive Config Library
// Description: Canonical config model, validation, and artifact generation.
// Purpose: Single source of truth for hive.toml semantics.
// Dependencies: hive_core, hive_sentinel, serde, toml
// ============================================================================

//! ## Overview
//! `hive-config` defines the canonical configuration model for a HiveForge
//! deployment. It provides strict, fail-closed validation and deterministic
//! generators for config schema, examples, and docs.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod docs;
pub mod examples;
pub mod schema;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use docs::config_docs_markdown;
pub use docs::verify_config_docs;
pub use docs::write_config_docs;
pub use examples::config_toml_example;
pub use schema::config_schema;
