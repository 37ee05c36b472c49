// hive-core/src/core/identifiers.rs
// ============================================================================
// Module: HiveForge Identifiers
// Description: Canonical opaque identifiers for Hives, Colonies, Runs, Tasks,
//              Requirements, and Events.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the opaque string-based identifiers used throughout
//! HiveForge. Identifiers are opaque and serialize as strings; validation is
//! handled at the command boundary rather than within these simple wrappers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Macro
// ============================================================================

/// Generates an opaque, transparently serialized string identifier newtype.
macro_rules! string_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the identifier, returning the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id!(HiveId, "Identifier for a Hive (project-scope container).");
string_id!(ColonyId, "Identifier for a Colony (domain-scope workgroup).");
string_id!(RunId, "Identifier for a Run (one execution pass).");
string_id!(TaskId, "Identifier for a Task (a unit of work inside a Run).");
string_id!(RequirementId, "Identifier for a Requirement (a user-approval request).");
string_id!(EventId, "Time-sortable unique identifier for an Event.");
string_id!(EpisodeId, "Identifier for an Episode (post-run learning record).");
string_id!(CommandId, "Idempotency key supplied by a control-surface caller.");

// ============================================================================
// SECTION: Actor
// ============================================================================

/// Identifies who or what caused an event: a human user, an agent worker, or
/// the system itself (e.g. Sentinel enforcement, timeouts).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Actor {
    /// A human user, identified by an opaque string (email, username, …).
    User {
        /// Opaque user identifier.
        id: String,
    },
    /// An agent worker executing a Task.
    Agent {
        /// Opaque agent/worker identifier.
        id: String,
    },
    /// The system itself (Sentinel, timeout handlers, the orchestrator).
    System {
        /// Subsystem name that produced the event (e.g. `"sentinel"`).
        subsystem: String,
    },
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User { id } => write!(f, "user:{id}"),
            Self::Agent { id } => write!(f, "agent:{id}"),
            Self::System { subsystem } => write!(f, "system:{subsystem}"),
        }
    }
}

// ============================================================================
// SECTION: Trust Level
// ============================================================================

/// Authorization attribute of an actor, combined with action class in the
/// policy gate (see `crate::runtime::policy`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    /// No elevated trust; all actions require approval except read-only.
    Untrusted,
    /// Baseline trust; reversible actions still require approval.
    Basic,
    /// Elevated trust; reversible actions are allowed without approval.
    Trusted,
    /// Full administrative trust.
    Admin,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trust_level_orders_by_privilege() {
        assert!(TrustLevel::Untrusted < TrustLevel::Basic);
        assert!(TrustLevel::Basic < TrustLevel::Trusted);
        assert!(TrustLevel::Trusted < TrustLevel::Admin);
    }

    #[test]
    fn identifier_round_trips_through_json() {
        let id = RunId::new("run-1");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"run-1\"");
        let back: RunId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }

    #[test]
    fn actor_display_matches_kind() {
        assert_eq!(Actor::User { id: "alice".into() }.to_string(), "user:alice");
        assert_eq!(Actor::Agent { id: "bee-1".into() }.to_string(), "agent:bee-1");
        assert_eq!(
            Actor::System { subsystem: "sentinel".into() }.to_string(),
            "system:sentinel"
        );
    }
}
