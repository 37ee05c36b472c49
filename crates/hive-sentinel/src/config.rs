// hive-sentinel/src/config.rs
// ============================================================================
// Module: Sentinel Configuration
// Description: Per-pattern detection thresholds with conservative defaults.
// Purpose: Keep every detector's trigger point config-driven rather than
//          hard-coded, per spec.md §4.12 ("thresholds are config-driven with
//          conservative defaults").
// Dependencies: hive_core::ActionClass
// ============================================================================

//! ## Overview
//! Defaults here are deliberately conservative: a deployment that never
//! tunes Sentinel still gets meaningful protection. Every threshold is a
//! plain field rather than a builder method, mirroring the teacher's
//! "config objects are data, not call sites" convention.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use hive_core::ActionClass;

/// Thresholds controlling every Sentinel detector.
#[derive(Debug, Clone, PartialEq)]
pub struct SentinelConfig {
    /// Number of `task.failed` events with an identical `(title, error)`
    /// pair, within [`Self::loop_window_ms`], that triggers a loop alert.
    pub loop_threshold: u32,
    /// Width of the loop-detection sliding window, in event-timestamp
    /// milliseconds.
    pub loop_window_ms: i64,
    /// Maximum events per rolling 60-second window (by event timestamp)
    /// before the runaway detector fires.
    pub runaway_events_per_minute: u32,
    /// Cumulative token budget per Colony before the cost detector fires.
    pub cost_budget_tokens: u64,
    /// Cumulative dollar budget per Colony before the cost detector fires.
    /// `None` disables dollar-based budgeting (token budgeting still
    /// applies).
    pub cost_budget_dollars: Option<f64>,
    /// `(action_class, tool_name)` combinations that are always flagged as
    /// a security anomaly regardless of policy-gate outcome.
    pub flagged_tool_actions: BTreeSet<(ActionClass, String)>,
    /// Minimum acceptable score per named KPI; a Honeycomb-computed score
    /// below its threshold triggers a KPI-degradation alert.
    pub kpi_thresholds: BTreeMap<String, f64>,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            loop_threshold: 5,
            loop_window_ms: 10 * 60 * 1000,
            runaway_events_per_minute: 500,
            cost_budget_tokens: 1_000_000,
            cost_budget_dollars: None,
            flagged_tool_actions: BTreeSet::from([(ActionClass::Irreversible, "shell.exec".to_string())]),
            kpi_thresholds: BTreeMap::from([("incident_rate".to_string(), 0.5)]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_conservative_but_non_zero() {
        let config = SentinelConfig::default();
        assert!(config.loop_threshold > 0);
        assert!(config.runaway_events_per_minute > 0);
        assert!(config.cost_budget_tokens > 0);
    }
}
