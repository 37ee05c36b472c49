// hive-control/src/ids.rs
// ============================================================================
// Module: Control-Surface Id Minting
// Description: Process-unique identifier generation for newly created
//              entities.
// Purpose: Give `Engine` a stable way to mint Hive/Colony/Run/Task/
//          Requirement ids without a database sequence.
// Dependencies: hive_core::Clock, std::sync::atomic
// ============================================================================

//! ## Overview
//! Entity ids are minted from the host clock's current timestamp plus a
//! process-wide monotonic counter, so two ids minted in the same
//! millisecond on the same process never collide. This mirrors how
//! `hive_orchestrator::chain::RunChain` and `hive_sentinel`'s internal
//! Colony chain derive event ids from a sequence counter, generalized here
//! to entity ids rather than event ids.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use hive_core::Clock;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Mints a new opaque id of the form `{prefix}-{millis}-{sequence}`.
#[must_use]
pub fn mint_id(prefix: &str, clock: &dyn Clock) -> String {
    let n = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{n:08}", clock.now().as_unix_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClock;
    impl Clock for FixedClock {
        fn now(&self) -> hive_core::Timestamp {
            hive_core::Timestamp::from_unix_millis(1_000)
        }
    }

    #[test]
    fn successive_ids_never_collide() {
        let clock = FixedClock;
        let a = mint_id("hive", &clock);
        let b = mint_id("hive", &clock);
        assert_ne!(a, b);
        assert!(a.starts_with("hive-1000-"));
    }
}
