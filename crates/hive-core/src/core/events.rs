// hive-core/src/core/events.rs
// ============================================================================
// Module: HiveForge Event Model
// Description: Immutable, hash-chained event records and their JSON shape.
// Purpose: Provide the canonical unit of state change for the whole engine.
// Dependencies: crate::core::{hashing, identifiers, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! An [`Event`] is the only way state changes in HiveForge. Events are
//! appended, never mutated. Every event's `hash` field is the SHA-256 of the
//! RFC 8785 canonical JSON of the event with `hash` removed, and every
//! non-first event in a scope's log points at its predecessor via
//! `prev_hash`. `EventType` collapses what would otherwise be a
//! subclass-per-event-type hierarchy into a single tagged variant with an
//! explicit `Unknown` case, so a binary that does not yet know about a new
//! event type can still load and forward it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de::Error as DeError;
use serde_json::Value;
use thiserror::Error;

use crate::core::hashing::HashAlgorithm;
use crate::core::hashing::HashError;
use crate::core::hashing::hash_bytes;
use crate::core::hashing::hash_canonical_json;
use crate::core::identifiers::Actor;
use crate::core::identifiers::ColonyId;
use crate::core::identifiers::EventId;
use crate::core::identifiers::RequirementId;
use crate::core::identifiers::RunId;
use crate::core::identifiers::TaskId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Event Type
// ============================================================================

/// Known event type discriminators.
///
/// # Invariants
/// - `as_str`/`from_str` round-trip for every non-`Unknown` variant.
/// - `Unknown` preserves the exact raw string so replay never loses data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    /// A Hive was created.
    HiveCreated,
    /// A Hive was closed.
    HiveClosed,
    /// A Colony was created.
    ColonyCreated,
    /// A Colony (re)started; the second occurrence after a suspend is a
    /// resume, not a re-initialization (see `docs/open_questions`).
    ColonyStarted,
    /// A Colony completed.
    ColonyCompleted,
    /// A Colony was suspended by Sentinel or an operator.
    ColonySuspended,
    /// A Run started.
    RunStarted,
    /// A Run completed successfully.
    RunCompleted,
    /// A Run failed.
    RunFailed,
    /// A Run was aborted via emergency-stop.
    RunAborted,
    /// A Run exceeded its timeout budget.
    RunTimedOut,
    /// A Task was created.
    TaskCreated,
    /// A Task was assigned to a worker.
    TaskAssigned,
    /// A Task's progress was updated.
    TaskProgressed,
    /// A Task completed successfully.
    TaskCompleted,
    /// A Task failed.
    TaskFailed,
    /// A Task became blocked.
    TaskBlocked,
    /// A Task was unblocked.
    TaskUnblocked,
    /// A Task was cancelled (force-complete or emergency-stop).
    TaskCancelled,
    /// A worker began executing a Task.
    WorkerStarted,
    /// A Requirement was created.
    RequirementCreated,
    /// A Requirement was approved.
    RequirementApproved,
    /// A Requirement was rejected.
    RequirementRejected,
    /// A Requirement was cancelled.
    RequirementCancelled,
    /// The planner produced a layered task plan.
    PlannerCompleted,
    /// An execution pipeline stage started or finished.
    PipelineStage,
    /// Sentinel raised an anomaly alert.
    SentinelAlertRaised,
    /// Sentinel rolled a target back to a prior projection snapshot.
    SentinelRollback,
    /// Sentinel quarantined a Colony.
    SentinelQuarantine,
    /// A local operation deadline was exceeded.
    OperationTimeout,
    /// An operation failed (possibly retryable).
    OperationFailed,
    /// Heartbeat silence exceeded the configured interval.
    SystemSilenceDetected,
    /// A heartbeat was recorded.
    Heartbeat,
    /// An event type unrecognized by this binary; the raw string is
    /// preserved exactly.
    Unknown(String),
}

impl EventType {
    /// Returns the wire string for this event type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::HiveCreated => "hive.created",
            Self::HiveClosed => "hive.closed",
            Self::ColonyCreated => "colony.created",
            Self::ColonyStarted => "colony.started",
            Self::ColonyCompleted => "colony.completed",
            Self::ColonySuspended => "colony.suspended",
            Self::RunStarted => "run.started",
            Self::RunCompleted => "run.completed",
            Self::RunFailed => "run.failed",
            Self::RunAborted => "run.aborted",
            Self::RunTimedOut => "run.timed_out",
            Self::TaskCreated => "task.created",
            Self::TaskAssigned => "task.assigned",
            Self::TaskProgressed => "task.progressed",
            Self::TaskCompleted => "task.completed",
            Self::TaskFailed => "task.failed",
            Self::TaskBlocked => "task.blocked",
            Self::TaskUnblocked => "task.unblocked",
            Self::TaskCancelled => "task.cancelled",
            Self::WorkerStarted => "worker.started",
            Self::RequirementCreated => "requirement.created",
            Self::RequirementApproved => "requirement.approved",
            Self::RequirementRejected => "requirement.rejected",
            Self::RequirementCancelled => "requirement.cancelled",
            Self::PlannerCompleted => "planner.completed",
            Self::PipelineStage => "pipeline.stage",
            Self::SentinelAlertRaised => "sentinel.alert_raised",
            Self::SentinelRollback => "sentinel.rollback",
            Self::SentinelQuarantine => "sentinel.quarantine",
            Self::OperationTimeout => "operation.timeout",
            Self::OperationFailed => "operation.failed",
            Self::SystemSilenceDetected => "system.silence_detected",
            Self::Heartbeat => "heartbeat",
            Self::Unknown(raw) => raw.as_str(),
        }
    }

    /// Parses a wire string into a known variant, falling back to
    /// [`EventType::Unknown`] for anything unrecognized.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "hive.created" => Self::HiveCreated,
            "hive.closed" => Self::HiveClosed,
            "colony.created" => Self::ColonyCreated,
            "colony.started" => Self::ColonyStarted,
            "colony.completed" => Self::ColonyCompleted,
            "colony.suspended" => Self::ColonySuspended,
            "run.started" => Self::RunStarted,
            "run.completed" => Self::RunCompleted,
            "run.failed" => Self::RunFailed,
            "run.aborted" => Self::RunAborted,
            "run.timed_out" => Self::RunTimedOut,
            "task.created" => Self::TaskCreated,
            "task.assigned" => Self::TaskAssigned,
            "task.progressed" => Self::TaskProgressed,
            "task.completed" => Self::TaskCompleted,
            "task.failed" => Self::TaskFailed,
            "task.blocked" => Self::TaskBlocked,
            "task.unblocked" => Self::TaskUnblocked,
            "task.cancelled" => Self::TaskCancelled,
            "worker.started" => Self::WorkerStarted,
            "requirement.created" => Self::RequirementCreated,
            "requirement.approved" => Self::RequirementApproved,
            "requirement.rejected" => Self::RequirementRejected,
            "requirement.cancelled" => Self::RequirementCancelled,
            "planner.completed" => Self::PlannerCompleted,
            "pipeline.stage" => Self::PipelineStage,
            "sentinel.alert_raised" => Self::SentinelAlertRaised,
            "sentinel.rollback" => Self::SentinelRollback,
            "sentinel.quarantine" => Self::SentinelQuarantine,
            "operation.timeout" => Self::OperationTimeout,
            "operation.failed" => Self::OperationFailed,
            "system.silence_detected" => Self::SystemSilenceDetected,
            "heartbeat" => Self::Heartbeat,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Returns `true` if this is the `Unknown` fallback variant.
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.is_empty() {
            return Err(DeError::custom("event type must not be empty"));
        }
        Ok(Self::parse(&raw))
    }
}

// ============================================================================
// SECTION: Event
// ============================================================================

/// An immutable, hash-chained event record.
///
/// # Invariants
/// - `hash` equals `compute_hash(self)` for every event read from a store.
/// - `prev_hash` equals the previous event's `hash` within the same scope,
///   or is `None` for the first event in a scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Time-sortable unique identifier.
    pub id: EventId,
    /// Event type discriminator.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// UTC timestamp of the event.
    pub timestamp: Timestamp,
    /// Actor that caused the event.
    pub actor: Actor,
    /// Owning Run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    /// Owning Task, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    /// Owning Colony, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colony_id: Option<ColonyId>,
    /// Owning Requirement, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirement_id: Option<RequirementId>,
    /// Opaque payload, shaped per `event_type` but never required to be.
    pub payload: Value,
    /// Causal parent event identifiers.
    #[serde(default)]
    pub parents: Vec<EventId>,
    /// Hash of the immediately preceding event in this scope's log, or
    /// `None` for the first event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_hash: Option<String>,
    /// Content hash of this event (all fields above, hash excluded).
    pub hash: String,
    /// Payload schema version, for forward-compatible payload evolution.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

const fn default_schema_version() -> u32 {
    1
}

/// Errors raised while constructing or validating events.
#[derive(Debug, Error)]
pub enum EventError {
    /// Canonicalization or hashing failed.
    #[error("failed to hash event: {0}")]
    Hash(#[from] HashError),
    /// Deserialization of raw bytes failed.
    #[error("failed to parse event: {0}")]
    Parse(String),
    /// The event's stored hash does not match its recomputed hash.
    #[error("event {event_id} hash mismatch: stored {stored}, computed {computed}")]
    Corruption {
        /// Identifier of the corrupt event.
        event_id: String,
        /// Hash recorded in the log.
        stored: String,
        /// Hash recomputed from the event's fields.
        computed: String,
    },
}

/// Fields needed to construct a new event before its hash is computed.
#[derive(Debug, Clone)]
pub struct NewEvent {
    /// Event type.
    pub event_type: EventType,
    /// UTC timestamp.
    pub timestamp: Timestamp,
    /// Actor responsible for the event.
    pub actor: Actor,
    /// Owning Run, if any.
    pub run_id: Option<RunId>,
    /// Owning Task, if any.
    pub task_id: Option<TaskId>,
    /// Owning Colony, if any.
    pub colony_id: Option<ColonyId>,
    /// Owning Requirement, if any.
    pub requirement_id: Option<RequirementId>,
    /// Opaque payload.
    pub payload: Value,
    /// Causal parent event identifiers.
    pub parents: Vec<EventId>,
    /// Hash of the previous event in the same scope, if any.
    pub prev_hash: Option<String>,
}

impl Event {
    /// Constructs a new event, assigning `id` and computing `hash`.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Hash`] when canonicalization fails.
    pub fn new(id: EventId, fields: NewEvent) -> Result<Self, EventError> {
        let mut event = Self {
            id,
            event_type: fields.event_type,
            timestamp: fields.timestamp,
            actor: fields.actor,
            run_id: fields.run_id,
            task_id: fields.task_id,
            colony_id: fields.colony_id,
            requirement_id: fields.requirement_id,
            payload: fields.payload,
            parents: fields.parents,
            prev_hash: fields.prev_hash,
            hash: String::new(),
            schema_version: default_schema_version(),
        };
        event.hash = compute_hash(&event)?.value;
        Ok(event)
    }

    /// Recomputes this event's hash from its current fields and compares it
    /// against the stored `hash`.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Hash`] when canonicalization fails, or
    /// [`EventError::Corruption`] when the hashes diverge.
    pub fn verify_hash(&self) -> Result<(), EventError> {
        let computed = compute_hash(self)?;
        if computed.value == self.hash {
            Ok(())
        } else {
            Err(EventError::Corruption {
                event_id: self.id.to_string(),
                stored: self.hash.clone(),
                computed: computed.value,
            })
        }
    }

    /// Serializes this event as one canonical JSON line (no trailing
    /// newline).
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Parse`] when serialization fails.
    pub fn to_line(&self) -> Result<String, EventError> {
        serde_json::to_string(self).map_err(|err| EventError::Parse(err.to_string()))
    }

    /// Parses one JSON line into an [`Event`]. Unknown `type` values are
    /// preserved via [`EventType::Unknown`] rather than rejected.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Parse`] when the line is not valid JSON or is
    /// missing required fields.
    pub fn from_line(line: &str) -> Result<Self, EventError> {
        serde_json::from_str(line).map_err(|err| EventError::Parse(err.to_string()))
    }
}

/// Computes the canonical content hash of an event, excluding the `hash`
/// field itself, per RFC 8785.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn compute_hash(event: &Event) -> Result<crate::core::hashing::HashDigest, HashError> {
    let mut value = serde_json::to_value(event).map_err(|err| HashError::Canonicalization(err.to_string()))?;
    if let Value::Object(map) = &mut value {
        map.remove("hash");
    }
    hash_canonical_json(HashAlgorithm::Sha256, &value)
}

/// Hashes raw bytes directly (used for non-JSON artifacts, e.g. runpack
/// blobs attached by tooling plugins outside the core).
#[must_use]
pub fn hash_raw_bytes(bytes: &[u8]) -> crate::core::hashing::HashDigest {
    hash_bytes(HashAlgorithm::Sha256, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(prev_hash: Option<String>) -> Event {
        Event::new(
            EventId::new("evt-1"),
            NewEvent {
                event_type: EventType::RunStarted,
                timestamp: Timestamp::from_unix_millis(1),
                actor: Actor::User { id: "alice".into() },
                run_id: Some(RunId::new("run-1")),
                task_id: None,
                colony_id: None,
                requirement_id: None,
                payload: serde_json::json!({"goal": "hello"}),
                parents: Vec::new(),
                prev_hash,
            },
        )
        .expect("construct event")
    }

    #[test]
    fn hash_is_deterministic() {
        let a = sample_event(None);
        let b = sample_event(None);
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn verify_hash_detects_corruption() {
        let mut event = sample_event(None);
        event.payload = serde_json::json!({"goal": "tampered"});
        assert!(matches!(event.verify_hash(), Err(EventError::Corruption { .. })));
    }

    #[test]
    fn round_trip_preserves_known_type() {
        let event = sample_event(None);
        let line = event.to_line().expect("serialize");
        let parsed = Event::from_line(&line).expect("parse");
        assert_eq!(parsed, event);
    }

    #[test]
    fn unknown_event_type_round_trips_byte_identical() {
        let mut event = sample_event(None);
        event.event_type = EventType::Unknown("future.event".into());
        event.hash = compute_hash(&event).expect("hash").value;
        let line = event.to_line().expect("serialize");
        let parsed = Event::from_line(&line).expect("parse");
        assert_eq!(parsed, event);
        assert!(parsed.event_type.is_unknown());
        parsed.verify_hash().expect("hash still verifies");
    }

    #[test]
    fn parents_order_is_preserved() {
        let mut event = sample_event(None);
        event.parents = vec![EventId::new("evt-a"), EventId::new("evt-b")];
        event.hash = compute_hash(&event).expect("hash").value;
        let line = event.to_line().expect("serialize");
        let parsed = Event::from_line(&line).expect("parse");
        assert_eq!(parsed.parents, event.parents);
    }
}
