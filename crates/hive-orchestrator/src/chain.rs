// hive-orchestrator/src/chain.rs
// ============================================================================
// Module: Run Chain Appender
// Description: Serializes event construction and append for a single Run's
//              scope, tracking the running head hash.
// Purpose: Every orchestrator-emitted event must chain off the Run's true
//          current head; this is the single point that does so.
// Dependencies: hive_core::{Event, EventStore}
// ============================================================================

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
use hive_core::RequirementId;
use hive_core::RunId;
use hive_core::TaskId;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::AcquireError;
use tokio::sync::Mutex;

/// Errors raised while appending a chained event.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The event could not be hashed.
    #[error(transparent)]
    Event(#[from] EventError),
    /// The event store rejected the append.
    #[error(transparent)]
    Store(#[from] EventStoreError),
    /// The concurrency-limiting semaphore was closed out from under a
    /// waiting task; this only happens if the executor tore down the
    /// layer's semaphore while a permit acquisition was still in flight.
    #[error(transparent)]
    Semaphore(#[from] AcquireError),
}

/// Fields that vary per appended event; everything else is filled in from
/// the appender's fixed Run/clock context.
#[derive(Debug, Default, Clone)]
pub struct EventFields {
    /// Owning Task, if any.
    pub task_id: Option<TaskId>,
    /// Owning Colony, if any.
    pub colony_id: Option<ColonyId>,
    /// Owning Requirement, if any.
    pub requirement_id: Option<RequirementId>,
    /// Causal parents.
    pub parents: Vec<EventId>,
}

/// Serializes appends to one Run's event scope, tracking the running head
/// hash so every new event's `prev_hash` is correct without a store
/// round-trip per append. Owns `Arc` handles to the store and clock so it
/// can be shared across spawned task futures.
pub struct RunChain {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    run_id: RunId,
    head: Mutex<Option<String>>,
    seq: Mutex<u64>,
}

impl RunChain {
    /// Creates a chain appender seeded with the Run's current head hash.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>, run_id: RunId, head: Option<String>) -> Self {
        Self { store, clock, run_id, head: Mutex::new(head), seq: Mutex::new(0) }
    }

    /// Constructs, hashes, appends, and chains one event for this Run.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError`] if hashing or the append itself fails.
    pub async fn append(
        &self,
        event_type: EventType,
        actor: Actor,
        payload: Value,
        fields: EventFields,
    ) -> Result<Event, ChainError> {
        let mut head = self.head.lock().await;
        let mut seq = self.seq.lock().await;
        *seq += 1;
        let id = EventId::new(format!("{}-{:06}", self.run_id.as_str(), *seq));
        let event = Event::new(
            id,
            hive_core::NewEvent {
                event_type,
                timestamp: self.clock.now(),
                actor,
                run_id: Some(self.run_id.clone()),
                task_id: fields.task_id,
                colony_id: fields.colony_id,
                requirement_id: fields.requirement_id,
                payload,
                parents: fields.parents,
                prev_hash: head.clone(),
            },
        )?;
        self.store.append(event.clone()).await?;
        *head = Some(event.hash.clone());
        Ok(event)
    }

    /// Returns the current head hash, for callers that need to seed a
    /// sibling chain (e.g. a Colony-scope appender).
    pub async fn head_hash(&self) -> Option<String> {
        self.head.lock().await.clone()
    }

    /// Returns the Run this chain appends events for.
    #[must_use]
    pub const fn run_id(&self) -> &RunId {
        &self.run_id
    }
}
