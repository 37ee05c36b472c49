// hive-control/src/clock.rs
// ============================================================================
// Module: System Clock
// Description: Wall-clock-backed `hive_core::Clock` implementation.
// Purpose: Supply real timestamps to the control surface; `hive_core` itself
//          never reads wall-clock time (see `hive_core::core::time`), so a
//          host must.
// Dependencies: hive_core::{Clock, Timestamp}, std::time
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use hive_core::Clock;
use hive_core::Timestamp;

/// Reads the real wall clock, truncated to millisecond precision.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX));
        Timestamp::from_unix_millis(millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_returns_a_plausible_unix_timestamp() {
        let clock = SystemClock;
        // 2020-01-01T00:00:00Z, sanity floor so a clock bug reading 0 is caught.
        assert!(clock.now().as_unix_millis() > 1_577_836_800_000);
    }
}
