// hive-sentinel/src/window.rs
// ============================================================================
// Module: Per-Colony Sliding Windows
// Description: Rolling counters a Colony's detectors consume.
// Purpose: Keep detection state keyed by event timestamp (not wall clock),
//          so replaying a log reproduces the same alerts deterministically.
// Dependencies: hive_core::Timestamp, std::collections
// ============================================================================

//! ## Overview
//! Every counter here is keyed by `Event::timestamp`, never by wall-clock
//! time: feeding the same event stream twice — live or on replay — must
//! raise exactly the same alerts at exactly the same points.

use std::collections::BTreeMap;
use std::collections::VecDeque;

use hive_core::Timestamp;

/// One Colony's accumulated detector state.
#[derive(Debug, Clone, Default)]
pub struct ColonyWindow {
    /// `(timestamp, title, error)` for every `task.failed` seen, newest last.
    pub(crate) failures: VecDeque<(Timestamp, String, String)>,
    /// Timestamp of every event seen, newest last, for the runaway detector.
    pub(crate) event_times: VecDeque<Timestamp>,
    /// `(timestamp, tokens)` token usage recorded against this Colony.
    pub(crate) token_usage: VecDeque<(Timestamp, u64)>,
    /// `(timestamp, dollars)` dollar cost recorded against this Colony.
    pub(crate) dollar_usage: VecDeque<(Timestamp, f64)>,
    /// Cumulative token total across `token_usage` (avoids re-summing).
    pub(crate) token_total: u64,
    /// Cumulative dollar total across `dollar_usage`.
    pub(crate) dollar_total: f64,
    /// Most recent KPI scores reported for this Colony.
    pub(crate) kpi_scores: BTreeMap<String, f64>,
    /// Per-pattern identifier of the last sliding window that raised an
    /// alert, so the same window never fires twice.
    pub(crate) last_fired_window: BTreeMap<&'static str, i64>,
}

impl ColonyWindow {
    /// Drops failure records older than `window_ms` relative to `now`.
    pub(crate) fn evict_stale_failures(&mut self, now: Timestamp, window_ms: i64) {
        while let Some((ts, _, _)) = self.failures.front() {
            if ts.millis_until(now) > window_ms {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }

    /// Drops event timestamps older than 60 seconds relative to `now`.
    pub(crate) fn evict_stale_events(&mut self, now: Timestamp) {
        while let Some(ts) = self.event_times.front() {
            if ts.millis_until(now) > 60_000 {
                self.event_times.pop_front();
            } else {
                break;
            }
        }
    }

    /// Records usage and rebuilds running totals. Usage windows accumulate
    /// for the life of the Colony (the cost detector is a cumulative
    /// budget, not a rolling one), so nothing is evicted here.
    pub(crate) fn record_tokens(&mut self, now: Timestamp, tokens: u64) {
        self.token_usage.push_back((now, tokens));
        self.token_total += tokens;
    }

    /// Records dollar usage, mirroring [`Self::record_tokens`].
    pub(crate) fn record_dollars(&mut self, now: Timestamp, dollars: f64) {
        self.dollar_usage.push_back((now, dollars));
        self.dollar_total += dollars;
    }

    /// Returns `true` and records `window_key` as fired if `pattern` has
    /// not already fired for this exact window, so the same anomaly never
    /// double-alerts within one sliding window.
    pub(crate) fn try_fire(&mut self, pattern: &'static str, window_key: i64) -> bool {
        if self.last_fired_window.get(pattern) == Some(&window_key) {
            return false;
        }
        self.last_fired_window.insert(pattern, window_key);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_fire_is_true_once_per_window() {
        let mut window = ColonyWindow::default();
        assert!(window.try_fire("loop", 100));
        assert!(!window.try_fire("loop", 100));
        assert!(window.try_fire("loop", 200));
    }

    #[test]
    fn evict_stale_failures_drops_entries_outside_window() {
        let mut window = ColonyWindow::default();
        window.failures.push_back((Timestamp::from_unix_millis(0), "t".into(), "e".into()));
        window.failures.push_back((Timestamp::from_unix_millis(20_000), "t".into(), "e".into()));
        window.evict_stale_failures(Timestamp::from_unix_millis(20_000), 10_000);
        assert_eq!(window.failures.len(), 1);
    }
}
