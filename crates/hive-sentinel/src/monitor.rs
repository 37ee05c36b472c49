// hive-sentinel/src/monitor.rs
// ============================================================================
// Module: Sentinel Monitor
// Description: Consumes the event stream, drives the five detectors per
//              Colony, and appends alert + enforcement events.
// Purpose: L11 — independent anomaly monitor and enforcement.
// Dependencies: hive_core::{Event, EventStore, Clock}, crate::{config,
//              detectors, window}
// ============================================================================

//! ## Overview
//! Sentinel never decides policy and never blocks a caller directly: it
//! observes events already appended by the orchestrator/control surface and
//! reacts by appending its own events (`sentinel.alert_raised`, then one
//! enforcement event) through the normal append path. Enforcement then
//! drives state-machine transitions the same way any other event does —
//! Sentinel has no private side channel into the orchestrator. It is
//! monotonically additive: nothing else in the system can suppress or
//! override an alert once `observe` decides to raise one.

use std::collections::HashMap;
use std::sync::Arc;

use hive_core::Actor;
use hive_core::Clock;
use hive_core::ColonyId;
use hive_core::Event;
use hive_core::EventError;
use hive_core::EventId;
use hive_core::EventStore;
use hive_core::EventStoreError;
use hive_core::EventType;
use hive_core::NewEvent;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use crate::config::SentinelConfig;
use crate::detectors;
use crate::detectors::Detection;
use crate::detectors::DetectionKind;
use crate::window::ColonyWindow;

/// Errors raised while observing an event or appending Sentinel's own
/// events.
#[derive(Debug, Error)]
pub enum SentinelError {
    /// The alert or enforcement event could not be hashed.
    #[error(transparent)]
    Event(#[from] EventError),
    /// The event store rejected the append.
    #[error(transparent)]
    Store(#[from] EventStoreError),
}

/// Maps a [`DetectionKind`] to the enforcement event it issues. Loop and
/// Runaway stop the Colony outright; Cost does the same once a cumulative
/// budget is exhausted (no amount of waiting recovers it); Security
/// isolates the Colony for inspection rather than merely pausing it;
/// KPI degradation is advisory and rolls back to a prior snapshot rather
/// than stopping the Colony, per spec.md §9's note that the incident-rate
/// placeholder is not a hard invariant.
#[must_use]
pub fn enforcement_for(kind: DetectionKind) -> EventType {
    match kind {
        DetectionKind::Loop | DetectionKind::Runaway | DetectionKind::Cost => EventType::ColonySuspended,
        DetectionKind::Security => EventType::SentinelQuarantine,
        DetectionKind::KpiDegradation => EventType::SentinelRollback,
    }
}

/// Serializes Sentinel's own appends to one Colony's event scope, mirroring
/// `hive_orchestrator::chain::RunChain` but seeded from
/// [`hive_core::EventStore::head_hash_for_colony`] instead of a Run head.
struct ColonyChain {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    colony_id: ColonyId,
    head: Mutex<Option<String>>,
    seq: Mutex<u64>,
}

impl ColonyChain {
    async fn append(&self, event_type: EventType, payload: Value) -> Result<Event, SentinelError> {
        let mut head = self.head.lock().await;
        let mut seq = self.seq.lock().await;
        *seq += 1;
        let event = Event::new(
            EventId::new(format!("sentinel-{}-{:06}", self.colony_id.as_str(), *seq)),
            NewEvent {
                event_type,
                timestamp: self.clock.now(),
                actor: Actor::System { subsystem: "sentinel".to_string() },
                run_id: None,
                task_id: None,
                colony_id: Some(self.colony_id.clone()),
                requirement_id: None,
                payload,
                parents: Vec::new(),
                prev_hash: head.clone(),
            },
        )?;
        self.store.append(event.clone()).await?;
        *head = Some(event.hash.clone());
        Ok(event)
    }
}

/// Consumes the event stream and issues Sentinel's alert/enforcement
/// events.
pub struct SentinelMonitor {
    config: SentinelConfig,
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    windows: std::sync::Mutex<HashMap<ColonyId, ColonyWindow>>,
    chains: Mutex<HashMap<ColonyId, Arc<ColonyChain>>>,
}

impl SentinelMonitor {
    /// Creates a monitor with the given thresholds, store, and clock.
    #[must_use]
    pub fn new(config: SentinelConfig, store: Arc<dyn EventStore>, clock: Arc<dyn Clock>) -> Self {
        Self { config, store, clock, windows: std::sync::Mutex::new(HashMap::new()), chains: Mutex::new(HashMap::new()) }
    }

    /// Records a KPI score for a Colony, consumed by the next
    /// [`Self::observe`] call that touches that Colony. Exposed separately
    /// because KPI scores are computed by an external "Honeycomb" quality
    /// heuristic (out of core scope per spec.md §1) rather than carried on
    /// ordinary lifecycle events.
    pub fn report_kpi(&self, colony_id: &ColonyId, name: &str, score: f64) {
        let mut windows = self.windows.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        windows.entry(colony_id.clone()).or_default().kpi_scores.insert(name.to_string(), score);
    }

    /// Feeds one event to every detector and appends any alerts/enforcement
    /// that result. Returns the events Sentinel itself appended, in order
    /// (empty if nothing fired or the event carries no Colony scope).
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError`] if an alert or enforcement event cannot be
    /// hashed or appended.
    pub async fn observe(&self, event: &Event) -> Result<Vec<Event>, SentinelError> {
        let Some(colony_id) = event.colony_id.clone() else {
            return Ok(Vec::new());
        };

        let detections = {
            let mut windows = self.windows.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let window = windows.entry(colony_id.clone()).or_default();
            self.update_window(window, event);
            self.run_detectors(window, event)
        };
        if detections.is_empty() {
            return Ok(Vec::new());
        }

        let chain = self.chain_for(&colony_id).await?;
        let mut appended = Vec::new();
        for detection in detections {
            info!(colony_id = %colony_id, pattern = detection.kind.dedup_key(), "sentinel alert raised");
            let alert =
                chain.append(EventType::SentinelAlertRaised, json!({ "pattern": detection.kind.dedup_key(), "detail": detection.detail })).await?;
            appended.push(alert);
            let enforcement = chain.append(enforcement_for(detection.kind), json!({ "reason": detection.kind.dedup_key() })).await?;
            appended.push(enforcement);
        }
        Ok(appended)
    }

    async fn chain_for(&self, colony_id: &ColonyId) -> Result<Arc<ColonyChain>, SentinelError> {
        let mut chains = self.chains.lock().await;
        if let Some(chain) = chains.get(colony_id) {
            return Ok(Arc::clone(chain));
        }
        let head = self.store.head_hash_for_colony(colony_id).await?;
        let chain = Arc::new(ColonyChain {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            colony_id: colony_id.clone(),
            head: Mutex::new(head),
            seq: Mutex::new(0),
        });
        chains.insert(colony_id.clone(), Arc::clone(&chain));
        Ok(chain)
    }

    fn update_window(&self, window: &mut ColonyWindow, event: &Event) {
        window.event_times.push_back(event.timestamp);
        if event.event_type == EventType::TaskFailed {
            let title = event.payload.get("title").and_then(Value::as_str).unwrap_or_default().to_string();
            let error = event.payload.get("reason").and_then(Value::as_str).unwrap_or_default().to_string();
            window.failures.push_back((event.timestamp, title, error));
        }
        if let Some(tokens) = event.payload.get("tokens_used").and_then(Value::as_u64) {
            window.record_tokens(event.timestamp, tokens);
        }
        if let Some(dollars) = event.payload.get("dollars_spent").and_then(Value::as_f64) {
            window.record_dollars(event.timestamp, dollars);
        }
        if let Some(scores) = event.payload.get("kpi_scores").and_then(Value::as_object) {
            for (name, value) in scores {
                if let Some(score) = value.as_f64() {
                    window.kpi_scores.insert(name.clone(), score);
                }
            }
        }
    }

    fn run_detectors(&self, window: &mut ColonyWindow, event: &Event) -> Vec<Detection> {
        let now = event.timestamp;
        [
            detectors::detect_loop(window, &self.config, now),
            detectors::detect_runaway(window, &self.config, now),
            detectors::detect_cost(window, &self.config, now),
            detectors::detect_security(event, window, &self.config),
            detectors::detect_kpi_degradation(window, &self.config, now),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hive_core::ColonyId;
    use hive_core::RunId;
    use hive_core::Timestamp;

    use super::*;

    struct FixedClock;
    impl Clock for FixedClock {
        fn now(&self) -> Timestamp {
            Timestamp::from_unix_millis(0)
        }
    }

    #[derive(Default)]
    struct MemStore {
        events: std::sync::Mutex<Vec<Event>>,
    }

    #[async_trait::async_trait]
    impl EventStore for MemStore {
        async fn append(&self, event: Event) -> Result<(), EventStoreError> {
            self.events.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(event);
            Ok(())
        }
        async fn read_run(&self, _run_id: &RunId) -> Result<Vec<Event>, EventStoreError> {
            Ok(Vec::new())
        }
        async fn read_colony(&self, colony_id: &ColonyId) -> Result<Vec<Event>, EventStoreError> {
            let events = self.events.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            Ok(events.iter().filter(|e| e.colony_id.as_ref() == Some(colony_id)).cloned().collect())
        }
        async fn list_runs(&self) -> Result<Vec<RunId>, EventStoreError> {
            Ok(Vec::new())
        }
        async fn head_hash(&self, _run_id: &RunId) -> Result<Option<String>, EventStoreError> {
            Ok(None)
        }
        async fn head_hash_for_colony(&self, colony_id: &ColonyId) -> Result<Option<String>, EventStoreError> {
            let events = self.read_colony(colony_id).await?;
            Ok(events.last().map(|e| e.hash.clone()))
        }
        async fn read_meta(&self) -> Result<Vec<Event>, EventStoreError> {
            Ok(Vec::new())
        }
        async fn head_hash_for_meta(&self) -> Result<Option<String>, EventStoreError> {
            Ok(None)
        }
    }

    fn failed_event(colony_id: &ColonyId, seq: i64) -> Event {
        Event::new(
            EventId::new(format!("evt-{seq}")),
            NewEvent {
                event_type: EventType::TaskFailed,
                timestamp: Timestamp::from_unix_millis(seq),
                actor: Actor::System { subsystem: "orchestrator".to_string() },
                run_id: Some(RunId::new("run-1")),
                task_id: None,
                colony_id: Some(colony_id.clone()),
                requirement_id: None,
                payload: json!({ "title": "build", "reason": "oom" }),
                parents: Vec::new(),
                prev_hash: None,
            },
        )
        .expect("construct event")
    }

    #[tokio::test]
    async fn loop_detection_suspends_the_colony() {
        let config = SentinelConfig { loop_threshold: 3, ..SentinelConfig::default() };
        let store: Arc<dyn EventStore> = Arc::new(MemStore::default());
        let monitor = SentinelMonitor::new(config, store, Arc::new(FixedClock));
        let colony_id = ColonyId::new("colony-1");

        let mut appended = Vec::new();
        for i in 0..3 {
            appended = monitor.observe(&failed_event(&colony_id, i)).await.expect("observe");
        }
        assert_eq!(appended.len(), 2);
        assert_eq!(appended[0].event_type, EventType::SentinelAlertRaised);
        assert_eq!(appended[1].event_type, EventType::ColonySuspended);
    }

    #[tokio::test]
    async fn does_not_double_fire_for_the_same_window() {
        let config = SentinelConfig { loop_threshold: 2, ..SentinelConfig::default() };
        let store: Arc<dyn EventStore> = Arc::new(MemStore::default());
        let monitor = SentinelMonitor::new(config, store, Arc::new(FixedClock));
        let colony_id = ColonyId::new("colony-1");

        monitor.observe(&failed_event(&colony_id, 0)).await.expect("observe 0");
        let first = monitor.observe(&failed_event(&colony_id, 1)).await.expect("observe 1");
        assert_eq!(first.len(), 2);
        let second = monitor.observe(&failed_event(&colony_id, 2)).await.expect("observe 2");
        assert!(second.is_empty());
    }
}
