// hive-core/src/core/time.rs
// ============================================================================
// Module: HiveForge Time Model
// Description: Canonical UTC timestamp representation for events.
// Purpose: Keep replay deterministic by never reading wall-clock time here.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Events carry an explicit timestamp supplied by the caller. The core never
//! reads wall-clock time directly; hosts (the control surface, the
//! orchestrator) supply timestamps so that replay and tests stay
//! deterministic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// UTC timestamp expressed as milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from Unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as Unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns the number of milliseconds elapsed between `self` and `later`.
    ///
    /// Negative when `later` precedes `self`.
    #[must_use]
    pub const fn millis_until(self, later: Self) -> i64 {
        later.0 - self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_until_is_signed_difference() {
        let a = Timestamp::from_unix_millis(1_000);
        let b = Timestamp::from_unix_millis(1_500);
        assert_eq!(a.millis_until(b), 500);
        assert_eq!(b.millis_until(a), -500);
    }

    #[test]
    fn timestamps_order_chronologically() {
        let a = Timestamp::from_unix_millis(1);
        let b = Timestamp::from_unix_millis(2);
        assert!(a < b);
    }
}
