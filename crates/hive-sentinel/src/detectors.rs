// hive-sentinel/src/detectors.rs
// ============================================================================
// Module: Sentinel Detectors
// Description: Pure functions mapping one incoming event plus a Colony's
//              rolling window to an optional anomaly detection.
// Purpose: Encode the five detection categories from spec.md §4.12: Loop,
//          Runaway, Cost, Security, and KPI degradation.
// Dependencies: crate::{config, window}, hive_core
// ============================================================================

//! ## Overview
//! Each `detect_*` function is given the already-updated [`ColonyWindow`]
//! and returns `Some(Detection)` when its pattern's threshold is crossed for
//! a window that has not already fired (`ColonyWindow::try_fire` is the
//! dedup gate). Detectors never decide enforcement; [`crate::monitor`] maps
//! a [`Detection`] to the enforcement action it triggers.

use hive_core::ActionClass;
use hive_core::Event;
use hive_core::EventType;
use serde_json::Value;
use serde_json::json;

use crate::config::SentinelConfig;
use crate::window::ColonyWindow;

/// One of the five anomaly categories Sentinel watches for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionKind {
    /// Identical `(title, error)` `task.failed` events repeating.
    Loop,
    /// Event emission rate exceeding the per-Colony ceiling.
    Runaway,
    /// Cumulative token/dollar spend exceeding budget.
    Cost,
    /// A flagged action-class/tool combination was attempted.
    Security,
    /// A Honeycomb-computed KPI crossed below its threshold.
    KpiDegradation,
}

impl DetectionKind {
    /// Stable dedup key used by [`ColonyWindow::try_fire`].
    #[must_use]
    pub const fn dedup_key(self) -> &'static str {
        match self {
            Self::Loop => "loop",
            Self::Runaway => "runaway",
            Self::Cost => "cost",
            Self::Security => "security",
            Self::KpiDegradation => "kpi_degradation",
        }
    }
}

/// A single anomaly detection, carrying enough detail to build both the
/// `sentinel.alert_raised` payload and the decision of which enforcement
/// event follows it.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Which pattern fired.
    pub kind: DetectionKind,
    /// Structured detail for the alert payload.
    pub detail: Value,
}

/// Detects a repeating identical-failure loop within the configured window.
pub(crate) fn detect_loop(window: &mut ColonyWindow, config: &SentinelConfig, now: hive_core::Timestamp) -> Option<Detection> {
    window.evict_stale_failures(now, config.loop_window_ms);
    let Some((_, title, error)) = window.failures.back().cloned() else { return None };
    let count = window.failures.iter().filter(|(_, t, e)| *t == title && *e == error).count();
    if count as u32 >= config.loop_threshold {
        let window_key = now.as_unix_millis() / config.loop_window_ms.max(1);
        if window.try_fire(DetectionKind::Loop.dedup_key(), window_key) {
            return Some(Detection {
                kind: DetectionKind::Loop,
                detail: json!({ "title": title, "error": error, "count": count }),
            });
        }
    }
    None
}

/// Detects an event emission rate above the per-Colony ceiling.
pub(crate) fn detect_runaway(window: &mut ColonyWindow, config: &SentinelConfig, now: hive_core::Timestamp) -> Option<Detection> {
    window.evict_stale_events(now);
    let count = window.event_times.len();
    if count as u32 > config.runaway_events_per_minute {
        let window_key = now.as_unix_millis() / 60_000;
        if window.try_fire(DetectionKind::Runaway.dedup_key(), window_key) {
            return Some(Detection {
                kind: DetectionKind::Runaway,
                detail: json!({ "events_per_minute": count, "ceiling": config.runaway_events_per_minute }),
            });
        }
    }
    None
}

/// Detects cumulative token/dollar spend crossing the configured budget.
pub(crate) fn detect_cost(window: &mut ColonyWindow, config: &SentinelConfig, now: hive_core::Timestamp) -> Option<Detection> {
    let token_over = window.token_total > config.cost_budget_tokens;
    let dollar_over = config.cost_budget_dollars.is_some_and(|budget| window.dollar_total > budget);
    if token_over || dollar_over {
        // A cumulative budget crosses its threshold at most once per Colony
        // lifetime (it never resets), so the dedup key is constant.
        if window.try_fire(DetectionKind::Cost.dedup_key(), 0) {
            return Some(Detection {
                kind: DetectionKind::Cost,
                detail: json!({
                    "tokens_spent": window.token_total,
                    "token_budget": config.cost_budget_tokens,
                    "dollars_spent": window.dollar_total,
                    "dollar_budget": config.cost_budget_dollars,
                    "timestamp": now.as_unix_millis(),
                }),
            });
        }
    }
    None
}

/// Detects an event carrying a flagged action-class/tool combination.
pub(crate) fn detect_security(event: &Event, window: &mut ColonyWindow, config: &SentinelConfig) -> Option<Detection> {
    if !matches!(event.event_type, EventType::TaskAssigned | EventType::WorkerStarted | EventType::TaskCreated) {
        return None;
    }
    let tool = event.payload.get("tool").and_then(Value::as_str)?;
    let action_class_raw = event.payload.get("action_class").and_then(Value::as_str)?;
    let action_class = match action_class_raw {
        "read_only" => ActionClass::ReadOnly,
        "reversible" => ActionClass::Reversible,
        "irreversible" => ActionClass::Irreversible,
        _ => return None,
    };
    if config.flagged_tool_actions.contains(&(action_class, tool.to_string())) {
        let window_key = event.timestamp.as_unix_millis();
        if window.try_fire(DetectionKind::Security.dedup_key(), window_key) {
            return Some(Detection {
                kind: DetectionKind::Security,
                detail: json!({ "tool": tool, "action_class": action_class_raw, "event_id": event.id.as_str() }),
            });
        }
    }
    None
}

/// Detects a reported KPI score crossing below its configured threshold.
///
/// The correctness KPI in particular may use a placeholder "incident-rate"
/// computed as failed-episode ratio; per spec.md §9 this is not promoted to
/// a hard invariant, so KPI degradation is advisory (alert only), never the
/// sole trigger for quarantine without corroborating evidence from another
/// detector.
pub(crate) fn detect_kpi_degradation(window: &mut ColonyWindow, config: &SentinelConfig, now: hive_core::Timestamp) -> Option<Detection> {
    for (name, threshold) in &config.kpi_thresholds {
        let Some(score) = window.kpi_scores.get(name).copied() else { continue };
        if score < *threshold {
            let window_key = now.as_unix_millis();
            if window.try_fire(DetectionKind::KpiDegradation.dedup_key(), window_key) {
                return Some(Detection {
                    kind: DetectionKind::KpiDegradation,
                    detail: json!({ "kpi": name, "score": score, "threshold": threshold }),
                });
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use hive_core::Timestamp;

    use super::*;

    #[test]
    fn loop_detector_fires_once_threshold_reached() {
        let config = SentinelConfig { loop_threshold: 3, ..SentinelConfig::default() };
        let mut window = ColonyWindow::default();
        let mut detection = None;
        for i in 0..3 {
            window.failures.push_back((Timestamp::from_unix_millis(i), "build".into(), "oom".into()));
            detection = detect_loop(&mut window, &config, Timestamp::from_unix_millis(i));
        }
        assert!(detection.is_some());
    }

    #[test]
    fn loop_detector_does_not_double_fire_same_window() {
        let config = SentinelConfig { loop_threshold: 2, ..SentinelConfig::default() };
        let mut window = ColonyWindow::default();
        window.failures.push_back((Timestamp::from_unix_millis(0), "t".into(), "e".into()));
        window.failures.push_back((Timestamp::from_unix_millis(1), "t".into(), "e".into()));
        assert!(detect_loop(&mut window, &config, Timestamp::from_unix_millis(1)).is_some());
        window.failures.push_back((Timestamp::from_unix_millis(2), "t".into(), "e".into()));
        assert!(detect_loop(&mut window, &config, Timestamp::from_unix_millis(2)).is_none());
    }

    #[test]
    fn cost_detector_fires_once_budget_exceeded() {
        let config = SentinelConfig { cost_budget_tokens: 100, ..SentinelConfig::default() };
        let mut window = ColonyWindow::default();
        window.record_tokens(Timestamp::from_unix_millis(0), 150);
        assert!(detect_cost(&mut window, &config, Timestamp::from_unix_millis(0)).is_some());
        assert!(detect_cost(&mut window, &config, Timestamp::from_unix_millis(1)).is_none());
    }
}
