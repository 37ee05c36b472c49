// hive-core/src/runtime/policy.rs
// ============================================================================
// Module: HiveForge Policy Gate
// Description: (actor, action_class, trust_level, scope) -> decision gate.
// Purpose: Decide whether a Task's action may proceed, needs approval, or is
//          denied outright.
// Dependencies: crate::core::entities, ret-logic
// ============================================================================

//! ## Overview
//! The policy gate composes two tri-state judgments — "is this scope
//! permitted at all" and "does this actor's trust level clear this action
//! class" — using ret-logic's Kleene/Bochvar tables, then maps the combined
//! tri-state to a final decision. `Unknown` always becomes
//! [`PolicyDecision::RequireApproval`]: the gate fails toward asking a human
//! rather than toward silently allowing or silently blocking.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use ret_logic::LogicMode;
use ret_logic::TriLogic;
use ret_logic::TriState;

use crate::core::ActionClass;
use crate::core::TrustLevel;

// ============================================================================
// SECTION: Decision
// ============================================================================

/// The policy gate's verdict for a proposed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    /// The action may proceed without further confirmation.
    Allow,
    /// The action requires a Requirement to be created and approved before
    /// it may proceed.
    RequireApproval,
    /// The action is denied outright; no Requirement is raised.
    Deny,
}

// ============================================================================
// SECTION: Policy Gate
// ============================================================================

/// Evaluates actions against trust level, action class, and scope.
#[derive(Debug, Clone)]
pub struct PolicyGate {
    logic: LogicMode,
    denied_scopes: BTreeSet<String>,
    level3_irreversible_requires_approval: bool,
}

impl PolicyGate {
    /// Creates a gate using the given tri-state logic table. Strong Kleene
    /// logic is the conventional default: an `Unknown` input never silently
    /// resolves to `True`.
    ///
    /// Irreversible actions require approval even at `Admin` trust by
    /// default, matching the config-overridable
    /// `level3_irreversible_requires_approval` default of `true`; use
    /// [`Self::with_level3_irreversible_requires_approval`] to relax it.
    #[must_use]
    pub fn new(logic: LogicMode) -> Self {
        Self { logic, denied_scopes: BTreeSet::new(), level3_irreversible_requires_approval: true }
    }

    /// Overrides whether `Admin`-trust irreversible actions still require
    /// approval. Passing `false` lets `Admin` clear irreversible actions
    /// outright, mirroring the `policy.level3_irreversible_requires_approval`
    /// config key.
    #[must_use]
    pub const fn with_level3_irreversible_requires_approval(mut self, required: bool) -> Self {
        self.level3_irreversible_requires_approval = required;
        self
    }

    /// Adds a scope to the deny list. Denials are monotonic: once a scope is
    /// denied it stays denied until the gate is reconstructed.
    pub fn deny_scope(&mut self, scope: impl Into<String>) {
        self.denied_scopes.insert(scope.into());
    }

    /// Evaluates a proposed action.
    #[must_use]
    pub fn evaluate(&self, action_class: ActionClass, trust_level: TrustLevel, scope: &str) -> PolicyDecision {
        let scope_permitted = if self.denied_scopes.contains(scope) { TriState::False } else { TriState::True };
        let trust_clears =
            trust_clears_action_class(action_class, trust_level, self.level3_irreversible_requires_approval);
        match self.logic.and(scope_permitted, trust_clears) {
            TriState::True => PolicyDecision::Allow,
            TriState::False => PolicyDecision::Deny,
            TriState::Unknown => PolicyDecision::RequireApproval,
        }
    }
}

/// Tri-state judgment of whether `trust_level` alone clears `action_class`,
/// independent of scope.
///
/// - Read-only actions always clear, at any trust level.
/// - Reversible actions clear outright at `Trusted` and above; below that
///   the result is `Unknown` (ask, don't assume).
/// - Irreversible actions never clear below `Trusted`; at `Trusted` they are
///   `Unknown` (ask); at `Admin` they still resolve to `Unknown` when
///   `level3_requires_approval` is set (the default), so even an admin actor
///   is asked before an irreversible action proceeds.
fn trust_clears_action_class(
    action_class: ActionClass,
    trust_level: TrustLevel,
    level3_requires_approval: bool,
) -> TriState {
    match action_class {
        ActionClass::ReadOnly => TriState::True,
        ActionClass::Reversible => match trust_level {
            TrustLevel::Untrusted | TrustLevel::Basic => TriState::Unknown,
            TrustLevel::Trusted | TrustLevel::Admin => TriState::True,
        },
        ActionClass::Irreversible => match trust_level {
            TrustLevel::Untrusted | TrustLevel::Basic => TriState::False,
            TrustLevel::Trusted => TriState::Unknown,
            TrustLevel::Admin => {
                if level3_requires_approval {
                    TriState::Unknown
                } else {
                    TriState::True
                }
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_always_allowed() {
        let gate = PolicyGate::new(LogicMode::Kleene);
        for trust in [TrustLevel::Untrusted, TrustLevel::Basic, TrustLevel::Trusted, TrustLevel::Admin] {
            assert_eq!(gate.evaluate(ActionClass::ReadOnly, trust, "fs"), PolicyDecision::Allow);
        }
    }

    #[test]
    fn reversible_requires_approval_below_trusted() {
        let gate = PolicyGate::new(LogicMode::Kleene);
        assert_eq!(gate.evaluate(ActionClass::Reversible, TrustLevel::Basic, "fs"), PolicyDecision::RequireApproval);
        assert_eq!(gate.evaluate(ActionClass::Reversible, TrustLevel::Trusted, "fs"), PolicyDecision::Allow);
    }

    #[test]
    fn irreversible_denied_below_trusted_and_gated_at_trusted_and_admin_by_default() {
        let gate = PolicyGate::new(LogicMode::Kleene);
        assert_eq!(gate.evaluate(ActionClass::Irreversible, TrustLevel::Basic, "fs"), PolicyDecision::Deny);
        assert_eq!(gate.evaluate(ActionClass::Irreversible, TrustLevel::Trusted, "fs"), PolicyDecision::RequireApproval);
        assert_eq!(gate.evaluate(ActionClass::Irreversible, TrustLevel::Admin, "fs"), PolicyDecision::RequireApproval);
    }

    #[test]
    fn irreversible_admin_allowed_when_level3_approval_disabled() {
        let gate = PolicyGate::new(LogicMode::Kleene).with_level3_irreversible_requires_approval(false);
        assert_eq!(gate.evaluate(ActionClass::Irreversible, TrustLevel::Admin, "fs"), PolicyDecision::Allow);
        assert_eq!(gate.evaluate(ActionClass::Irreversible, TrustLevel::Trusted, "fs"), PolicyDecision::RequireApproval);
    }

    #[test]
    fn denied_scope_overrides_trust() {
        let mut gate = PolicyGate::new(LogicMode::Kleene);
        gate.deny_scope("billing");
        assert_eq!(gate.evaluate(ActionClass::ReadOnly, TrustLevel::Admin, "billing"), PolicyDecision::Deny);
    }
}
