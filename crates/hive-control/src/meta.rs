// hive-control/src/meta.rs
// ============================================================================
// Module: Hive/Colony Chain Appenders
// Description: Serializes event construction and append for the shared
//              meta-decisions scope (Hives) and for a Colony's own scope.
// Purpose: Mirror `hive_orchestrator::chain::RunChain`'s pattern one level
//          up the entity hierarchy, where `hive_core::Event` has no
//          dedicated Hive-scope field to route on.
// Dependencies: hive_core::{Event, EventStore}
// ============================================================================

//! ## Overview
//! `hive_core::core::events::Event` has `run_id`/`task_id`/`colony_id`/
//! `requirement_id` fields but no `hive_id` field, and
//! `hive_store::vault::scope_key` routes an event with neither `run_id` nor
//! `colony_id` set to the shared `"meta-decisions"` scope. Every Hive's
//! lifecycle therefore lives in that one shared stream, multiplexed across
//! every Hive in the vault. [`HiveProjection::apply_created`] derives a
//! Hive's id from the literal `EventId` of its `hive.created` event (see
//! `hive_core::runtime::projection`), so [`HiveChain::append_created`] mints
//! that id directly as the event id. Every later Hive-scope event embeds
//! `"hive_id"` in its JSON payload, which is how a reader filtering
//! `read_meta()` for one Hive's history tells its events apart from a
//! sibling Hive's events sharing the same stream.

use std::sync::Arc;

use hive_core::Actor;
use hive_core::Clock;
use hive_core::ColonyId;
use hive_core::Event;
use hive_core::EventId;
use hive_core::EventStore;
use hive_core::EventType;
use hive_core::HiveId;
use hive_core::NewEvent;
use serde_json::Value;
use serde_json::json;
use tokio::sync::Mutex;

use crate::error::EngineError;
use crate::ids::mint_id;

/// Appends events to the shared meta-decisions scope on a single Hive's
/// behalf.
pub struct HiveChain {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    hive_id: HiveId,
    head: Mutex<Option<String>>,
}

impl HiveChain {
    /// Creates a chain appender seeded with the meta scope's current head
    /// hash, for an existing Hive.
    #[must_use]
    pub fn existing(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>, hive_id: HiveId, head: Option<String>) -> Self {
        Self { store, clock, hive_id, head: Mutex::new(head) }
    }

    /// Mints a new Hive id and appends its `hive.created` event, seeding
    /// the returned chain's head. The minted id is the literal `EventId` of
    /// that event, matching how [`hive_core::runtime::projection::HiveProjection`]
    /// derives a Hive's id.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if hashing or the append fails.
    pub async fn create(
        store: Arc<dyn EventStore>,
        clock: Arc<dyn Clock>,
        actor: Actor,
        name: String,
        description: Option<String>,
    ) -> Result<(Self, Event), EngineError> {
        let head = store.head_hash_for_meta().await?;
        let hive_id = HiveId::new(mint_id("hive", clock.as_ref()));
        let event = Event::new(
            EventId::new(hive_id.as_str()),
            NewEvent {
                event_type: EventType::HiveCreated,
                timestamp: clock.now(),
                actor,
                run_id: None,
                task_id: None,
                colony_id: None,
                requirement_id: None,
                payload: json!({ "name": name, "description": description }),
                parents: Vec::new(),
                prev_hash: head,
            },
        )?;
        store.append(event.clone()).await?;
        let chain = Self { store, clock, hive_id, head: Mutex::new(Some(event.hash.clone())) };
        Ok((chain, event))
    }

    /// Appends a follow-up Hive-scope event (e.g. `hive.closed`), embedding
    /// `hive_id` into `payload` so a reader can attribute it to this Hive
    /// within the shared meta stream.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if hashing or the append fails.
    pub async fn append(&self, event_type: EventType, actor: Actor, mut payload: Value) -> Result<Event, EngineError> {
        if let Value::Object(map) = &mut payload {
            map.insert("hive_id".to_string(), json!(self.hive_id.as_str()));
        }
        let mut head = self.head.lock().await;
        let event = Event::new(
            EventId::new(mint_id(self.hive_id.as_str(), self.clock.as_ref())),
            NewEvent {
                event_type,
                timestamp: self.clock.now(),
                actor,
                run_id: None,
                task_id: None,
                colony_id: None,
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

    /// Returns the Hive this chain appends events for.
    #[must_use]
    pub const fn hive_id(&self) -> &HiveId {
        &self.hive_id
    }
}

/// Appends events to a single Colony's own scope (`colony.created`,
/// `colony.started`, `colony.completed`) — distinct from
/// `hive_sentinel::monitor`'s private Colony-scope appender, which only
/// ever writes enforcement events. Both appenders write the same scope;
/// see `DESIGN.md` for the acknowledged single-writer tension this
/// creates.
pub struct ColonyChain {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    colony_id: ColonyId,
    head: Mutex<Option<String>>,
}

impl ColonyChain {
    /// Creates a chain appender seeded with the Colony's current head hash,
    /// for an existing Colony.
    #[must_use]
    pub fn existing(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>, colony_id: ColonyId, head: Option<String>) -> Self {
        Self { store, clock, colony_id, head: Mutex::new(head) }
    }

    /// Mints a new Colony id and appends its `colony.created` event.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if hashing or the append fails.
    pub async fn create(
        store: Arc<dyn EventStore>,
        clock: Arc<dyn Clock>,
        actor: Actor,
        hive_id: &HiveId,
        name: String,
        goal: Option<String>,
    ) -> Result<(Self, Event), EngineError> {
        let colony_id = ColonyId::new(mint_id("colony", clock.as_ref()));
        let head = store.head_hash_for_colony(&colony_id).await?;
        let event = Event::new(
            EventId::new(colony_id.as_str()),
            NewEvent {
                event_type: EventType::ColonyCreated,
                timestamp: clock.now(),
                actor,
                run_id: None,
                task_id: None,
                colony_id: Some(colony_id.clone()),
                requirement_id: None,
                payload: json!({ "hive_id": hive_id.as_str(), "name": name, "goal": goal }),
                parents: Vec::new(),
                prev_hash: head,
            },
        )?;
        store.append(event.clone()).await?;
        let chain = Self { store, clock, colony_id, head: Mutex::new(Some(event.hash.clone())) };
        Ok((chain, event))
    }

    /// Appends a follow-up Colony-scope event (`colony.started`,
    /// `colony.completed`).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if hashing or the append fails.
    pub async fn append(&self, event_type: EventType, actor: Actor, payload: Value) -> Result<Event, EngineError> {
        let mut head = self.head.lock().await;
        let event = Event::new(
            EventId::new(mint_id(self.colony_id.as_str(), self.clock.as_ref())),
            NewEvent {
                event_type,
                timestamp: self.clock.now(),
                actor,
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

    /// Returns the Colony this chain appends events for.
    #[must_use]
    pub const fn colony_id(&self) -> &ColonyId {
        &self.colony_id
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use hive_core::EventStoreError;
    use hive_core::RunId;
    use hive_core::Timestamp;

    use super::*;

    struct FixedClock;
    impl Clock for FixedClock {
        fn now(&self) -> Timestamp {
            Timestamp::from_unix_millis(1_000)
        }
    }

    #[derive(Default)]
    struct MemStore {
        events: std::sync::Mutex<Vec<Event>>,
    }

    #[async_trait]
    impl EventStore for MemStore {
        async fn append(&self, event: Event) -> Result<(), EventStoreError> {
            self.events.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(event);
            Ok(())
        }
        async fn read_run(&self, _run_id: &RunId) -> Result<Vec<Event>, EventStoreError> {
            Ok(Vec::new())
        }
        async fn read_colony(&self, _colony_id: &ColonyId) -> Result<Vec<Event>, EventStoreError> {
            Ok(Vec::new())
        }
        async fn list_runs(&self) -> Result<Vec<RunId>, EventStoreError> {
            Ok(Vec::new())
        }
        async fn head_hash(&self, _run_id: &RunId) -> Result<Option<String>, EventStoreError> {
            Ok(None)
        }
        async fn head_hash_for_colony(&self, _colony_id: &ColonyId) -> Result<Option<String>, EventStoreError> {
            Ok(None)
        }
        async fn read_meta(&self) -> Result<Vec<Event>, EventStoreError> {
            Ok(self.events.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone())
        }
        async fn head_hash_for_meta(&self) -> Result<Option<String>, EventStoreError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn hive_created_event_id_matches_minted_hive_id() {
        let store: Arc<dyn EventStore> = Arc::new(MemStore::default());
        let clock: Arc<dyn Clock> = Arc::new(FixedClock);
        let (chain, event) =
            HiveChain::create(store, clock, Actor::User { id: "alice".to_string() }, "acme".to_string(), None)
                .await
                .expect("create");
        assert_eq!(event.id.as_str(), chain.hive_id().as_str());
    }

    #[tokio::test]
    async fn follow_up_events_embed_hive_id_in_payload() {
        let store: Arc<dyn EventStore> = Arc::new(MemStore::default());
        let clock: Arc<dyn Clock> = Arc::new(FixedClock);
        let (chain, _created) =
            HiveChain::create(Arc::clone(&store), Arc::clone(&clock), Actor::System { subsystem: "test".to_string() }, "acme".to_string(), None)
                .await
                .expect("create");
        let closed = chain.append(EventType::HiveClosed, Actor::System { subsystem: "test".to_string() }, json!({})).await.expect("append");
        assert_eq!(closed.payload["hive_id"], json!(chain.hive_id().as_str()));
    }
}
