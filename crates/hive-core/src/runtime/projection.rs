// hive-core/src/runtime/projection.rs
// ============================================================================
// Module: HiveForge Projections
// Description: Pure, idempotent folds from event streams to entity state.
// Purpose: Derive current Run/Task/Requirement state without mutating the log.
// Dependencies: crate::core, crate::runtime::state_machine
// ============================================================================

//! ## Overview
//! A projection replays an ordered event slice into entity snapshots. Folding
//! is pure and deterministic: the same event slice always yields the same
//! snapshot, and replaying a prefix then the remainder yields the same
//! result as replaying the whole slice at once. Event types a projection
//! does not recognize are preserved as [`UnknownEvent`] records rather than
//! silently dropped, so a binary can load logs written by a newer version.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::ActionClass;
use crate::core::Colony;
use crate::core::ColonyId;
use crate::core::ColonyStatus;
use crate::core::Event;
use crate::core::EventType;
use crate::core::Hive;
use crate::core::HiveId;
use crate::core::HiveStatus;
use crate::core::Requirement;
use crate::core::RequirementId;
use crate::core::RequirementStatus;
use crate::core::Run;
use crate::core::RunId;
use crate::core::RunStatus;
use crate::core::Task;
use crate::core::TaskId;
use crate::core::TaskStatus;
use crate::core::Timestamp;
use crate::runtime::state_machine::IllegalTransition;
use crate::runtime::state_machine::colony_transition;
use crate::runtime::state_machine::hive_transition;
use crate::runtime::state_machine::requirement_transition;
use crate::runtime::state_machine::run_transition;
use crate::runtime::state_machine::task_transition;

/// An event whose type this binary does not recognize, preserved verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownEvent {
    /// Raw event type string.
    pub type_name: String,
    /// Timestamp of the unrecognized event.
    pub timestamp: Timestamp,
}

/// Errors raised while folding events into a projection.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// An event attempted an illegal entity state transition.
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),
    /// An event referenced an entity not yet created by a prior event.
    #[error("event references unknown {0} {1}")]
    UnknownReference(&'static str, String),
    /// An event's payload could not be interpreted for its declared type.
    #[error("malformed payload for event type {0}: {1}")]
    MalformedPayload(String, String),
}

/// Derived state for a single Run: the Run itself plus its Tasks and
/// Requirements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunProjection {
    /// The Run's current snapshot, `None` until a `run.started` event is
    /// folded.
    pub run: Option<Run>,
    /// Tasks keyed by identifier, insertion order preserved via `Task`'s own
    /// fields.
    pub tasks: BTreeMap<TaskId, Task>,
    /// Requirements keyed by identifier.
    pub requirements: BTreeMap<RequirementId, Requirement>,
    /// Events whose type this binary does not recognize.
    pub unknown_events: Vec<UnknownEvent>,
}

#[derive(Debug, Deserialize)]
struct RunStartedPayload {
    goal: String,
    #[serde(default)]
    colony_id: Option<crate::core::ColonyId>,
}

#[derive(Debug, Deserialize)]
struct TaskCreatedPayload {
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parent_task_id: Option<TaskId>,
    #[serde(default)]
    dependencies: Vec<TaskId>,
    #[serde(default = "default_action_class")]
    action_class: ActionClass,
}

const fn default_action_class() -> ActionClass {
    ActionClass::ReadOnly
}

#[derive(Debug, Deserialize)]
struct TaskAssignedPayload {
    assignee: String,
}

#[derive(Debug, Deserialize)]
struct TaskProgressedPayload {
    progress: u8,
}

#[derive(Debug, Deserialize)]
struct RequirementCreatedPayload {
    description: String,
    #[serde(default)]
    options: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RequirementResolvedPayload {
    #[serde(default)]
    selected_option: Option<String>,
    #[serde(default)]
    comment: Option<String>,
}

impl RunProjection {
    /// Folds a single event into this projection.
    ///
    /// # Errors
    ///
    /// Returns a [`ProjectionError`] when the event would cause an illegal
    /// transition, references an unknown Task/Requirement, or carries a
    /// payload that does not match its declared type.
    pub fn apply(&mut self, event: &Event) -> Result<(), ProjectionError> {
        match &event.event_type {
            EventType::RunStarted => self.apply_run_started(event),
            EventType::RunCompleted => self.apply_run_terminal(event, RunStatus::Completed),
            EventType::RunFailed => self.apply_run_terminal(event, RunStatus::Failed),
            EventType::RunAborted => self.apply_run_terminal(event, RunStatus::Aborted),
            EventType::RunTimedOut => self.apply_run_terminal(event, RunStatus::TimedOut),
            EventType::TaskCreated => self.apply_task_created(event),
            EventType::TaskAssigned => self.apply_task_status(event, TaskStatus::Assigned, |task, payload: &Value| {
                task.assignee = serde_json::from_value::<TaskAssignedPayload>(payload.clone())
                    .map(|p| Some(p.assignee))
                    .unwrap_or(task.assignee.clone());
            }),
            EventType::TaskProgressed => self.apply_task_progress(event),
            EventType::TaskCompleted => self.apply_task_status(event, TaskStatus::Completed, |_, _| {}),
            EventType::TaskFailed => self.apply_task_status(event, TaskStatus::Failed, |task, _| {
                task.retry_count += 1;
            }),
            EventType::TaskBlocked => self.apply_task_status(event, TaskStatus::Blocked, |_, _| {}),
            EventType::TaskUnblocked => self.apply_task_status(event, TaskStatus::Pending, |_, _| {}),
            EventType::TaskCancelled => self.apply_task_status(event, TaskStatus::Cancelled, |_, _| {}),
            EventType::RequirementCreated => self.apply_requirement_created(event),
            EventType::RequirementApproved => {
                self.apply_requirement_resolved(event, RequirementStatus::Approved)
            }
            EventType::RequirementRejected => {
                self.apply_requirement_resolved(event, RequirementStatus::Rejected)
            }
            EventType::RequirementCancelled => {
                self.apply_requirement_resolved(event, RequirementStatus::Cancelled)
            }
            EventType::Heartbeat => {
                if let Some(run) = self.run.as_mut() {
                    run.last_heartbeat = event.timestamp;
                    run.event_count += 1;
                }
                Ok(())
            }
            EventType::Unknown(type_name) => {
                self.unknown_events.push(UnknownEvent { type_name: type_name.clone(), timestamp: event.timestamp });
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Folds an entire ordered event slice, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Propagates the first [`ProjectionError`] encountered.
    pub fn project(events: &[Event]) -> Result<Self, ProjectionError> {
        let mut projection = Self::default();
        for event in events {
            projection.apply(event)?;
        }
        Ok(projection)
    }

    fn apply_run_started(&mut self, event: &Event) -> Result<(), ProjectionError> {
        let payload: RunStartedPayload = serde_json::from_value(event.payload.clone())
            .map_err(|err| ProjectionError::MalformedPayload(event.event_type.to_string(), err.to_string()))?;
        let run_id = event.run_id.clone().unwrap_or_else(|| RunId::new(event.id.as_str()));
        self.run = Some(Run {
            run_id,
            colony_id: payload.colony_id.or_else(|| event.colony_id.clone()),
            goal: payload.goal,
            state: RunStatus::Running,
            started_at: event.timestamp,
            completed_at: None,
            last_heartbeat: event.timestamp,
            event_count: 1,
            tasks: Vec::new(),
            requirements: Vec::new(),
        });
        Ok(())
    }

    fn apply_run_terminal(&mut self, event: &Event, to: RunStatus) -> Result<(), ProjectionError> {
        let run = self
            .run
            .as_mut()
            .ok_or_else(|| ProjectionError::UnknownReference("run", event.run_id.as_ref().map_or_else(|| "?".to_string(), ToString::to_string)))?;
        run_transition(run.state, to)?;
        run.state = to;
        run.completed_at = Some(event.timestamp);
        run.event_count += 1;
        Ok(())
    }

    fn apply_task_created(&mut self, event: &Event) -> Result<(), ProjectionError> {
        let payload: TaskCreatedPayload = serde_json::from_value(event.payload.clone())
            .map_err(|err| ProjectionError::MalformedPayload(event.event_type.to_string(), err.to_string()))?;
        let task_id = event.task_id.clone().unwrap_or_else(|| TaskId::new(event.id.as_str()));
        let run_id = event
            .run_id
            .clone()
            .ok_or_else(|| ProjectionError::UnknownReference("run", "missing run_id on task.created".to_string()))?;
        self.tasks.insert(
            task_id.clone(),
            Task {
                task_id,
                run_id,
                parent_task_id: payload.parent_task_id,
                title: payload.title,
                description: payload.description,
                state: TaskStatus::Pending,
                progress: 0,
                assignee: None,
                retry_count: 0,
                dependencies: payload.dependencies,
                action_class: payload.action_class,
            },
        );
        if let Some(run) = self.run.as_mut() {
            run.event_count += 1;
        }
        Ok(())
    }

    fn apply_task_status(
        &mut self,
        event: &Event,
        to: TaskStatus,
        mutate: impl FnOnce(&mut Task, &serde_json::Value),
    ) -> Result<(), ProjectionError> {
        let task_id = event
            .task_id
            .clone()
            .ok_or_else(|| ProjectionError::UnknownReference("task", "missing task_id".to_string()))?;
        let task = self
            .tasks
            .get_mut(&task_id)
            .ok_or_else(|| ProjectionError::UnknownReference("task", task_id.to_string()))?;
        task_transition(task.state, to)?;
        task.state = to;
        mutate(task, &event.payload);
        if let Some(run) = self.run.as_mut() {
            run.event_count += 1;
        }
        Ok(())
    }

    fn apply_task_progress(&mut self, event: &Event) -> Result<(), ProjectionError> {
        let payload: TaskProgressedPayload = serde_json::from_value(event.payload.clone())
            .map_err(|err| ProjectionError::MalformedPayload(event.event_type.to_string(), err.to_string()))?;
        let task_id = event
            .task_id
            .clone()
            .ok_or_else(|| ProjectionError::UnknownReference("task", "missing task_id".to_string()))?;
        let task = self
            .tasks
            .get_mut(&task_id)
            .ok_or_else(|| ProjectionError::UnknownReference("task", task_id.to_string()))?;
        task.progress = payload.progress.min(100);
        if let Some(run) = self.run.as_mut() {
            run.event_count += 1;
        }
        Ok(())
    }

    fn apply_requirement_created(&mut self, event: &Event) -> Result<(), ProjectionError> {
        let payload: RequirementCreatedPayload = serde_json::from_value(event.payload.clone())
            .map_err(|err| ProjectionError::MalformedPayload(event.event_type.to_string(), err.to_string()))?;
        let requirement_id = event.requirement_id.clone().unwrap_or_else(|| RequirementId::new(event.id.as_str()));
        let run_id = event
            .run_id
            .clone()
            .ok_or_else(|| ProjectionError::UnknownReference("run", "missing run_id on requirement.created".to_string()))?;
        self.requirements.insert(
            requirement_id.clone(),
            Requirement {
                requirement_id,
                run_id,
                description: payload.description,
                state: RequirementStatus::Pending,
                options: payload.options,
                selected_option: None,
                comment: None,
            },
        );
        if let Some(run) = self.run.as_mut() {
            run.event_count += 1;
        }
        Ok(())
    }

    fn apply_requirement_resolved(&mut self, event: &Event, to: RequirementStatus) -> Result<(), ProjectionError> {
        let payload: RequirementResolvedPayload = serde_json::from_value(event.payload.clone())
            .map_err(|err| ProjectionError::MalformedPayload(event.event_type.to_string(), err.to_string()))?;
        let requirement_id = event
            .requirement_id
            .clone()
            .ok_or_else(|| ProjectionError::UnknownReference("requirement", "missing requirement_id".to_string()))?;
        let requirement = self
            .requirements
            .get_mut(&requirement_id)
            .ok_or_else(|| ProjectionError::UnknownReference("requirement", requirement_id.to_string()))?;
        requirement_transition(requirement.state, to)?;
        requirement.state = to;
        requirement.selected_option = payload.selected_option;
        requirement.comment = payload.comment;
        if let Some(run) = self.run.as_mut() {
            run.event_count += 1;
        }
        Ok(())
    }
}

/// Derived state for a single Colony: the Colony itself plus the Run
/// identifiers it has started, in the order they were seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColonyProjection {
    /// The Colony's current snapshot, `None` until a `colony.created` event
    /// is folded.
    pub colony: Option<Colony>,
    /// Events whose type this binary does not recognize.
    pub unknown_events: Vec<UnknownEvent>,
}

#[derive(Debug, Deserialize)]
struct ColonyCreatedPayload {
    hive_id: HiveId,
    name: String,
    #[serde(default)]
    goal: Option<String>,
}

impl ColonyProjection {
    /// Folds a single event into this projection.
    ///
    /// # Errors
    ///
    /// Returns a [`ProjectionError`] when the event would cause an illegal
    /// Colony transition or carries a payload that does not match its
    /// declared type.
    pub fn apply(&mut self, event: &Event) -> Result<(), ProjectionError> {
        match &event.event_type {
            EventType::ColonyCreated => self.apply_created(event),
            EventType::ColonyStarted => self.apply_transition(event, ColonyStatus::InProgress),
            EventType::ColonyCompleted => self.apply_transition(event, ColonyStatus::Completed),
            EventType::ColonySuspended => self.apply_transition(event, ColonyStatus::Suspended),
            EventType::Unknown(type_name) => {
                self.unknown_events.push(UnknownEvent { type_name: type_name.clone(), timestamp: event.timestamp });
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Folds an entire ordered event slice, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Propagates the first [`ProjectionError`] encountered.
    pub fn project(events: &[Event]) -> Result<Self, ProjectionError> {
        let mut projection = Self::default();
        for event in events {
            projection.apply(event)?;
        }
        Ok(projection)
    }

    fn apply_created(&mut self, event: &Event) -> Result<(), ProjectionError> {
        let payload: ColonyCreatedPayload = serde_json::from_value(event.payload.clone())
            .map_err(|err| ProjectionError::MalformedPayload(event.event_type.to_string(), err.to_string()))?;
        let colony_id = event.colony_id.clone().unwrap_or_else(|| ColonyId::new(event.id.as_str()));
        self.colony = Some(Colony {
            colony_id,
            hive_id: payload.hive_id,
            name: payload.name,
            goal: payload.goal,
            status: ColonyStatus::Pending,
            suspended: false,
            runs: Vec::new(),
        });
        Ok(())
    }

    fn apply_transition(&mut self, event: &Event, to: ColonyStatus) -> Result<(), ProjectionError> {
        let colony = self
            .colony
            .as_mut()
            .ok_or_else(|| ProjectionError::UnknownReference("colony", event.colony_id.as_ref().map_or_else(|| "?".to_string(), ToString::to_string)))?;
        colony_transition(colony.status, to)?;
        colony.status = to;
        colony.suspended = to == ColonyStatus::Suspended;
        Ok(())
    }
}

/// Derived state for a single Hive: the Hive itself plus the Colonies it
/// has created.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HiveProjection {
    /// The Hive's current snapshot, `None` until a `hive.created` event is
    /// folded.
    pub hive: Option<Hive>,
    /// Events whose type this binary does not recognize.
    pub unknown_events: Vec<UnknownEvent>,
}

#[derive(Debug, Deserialize)]
struct HiveCreatedPayload {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

impl HiveProjection {
    /// Folds a single event into this projection.
    ///
    /// # Errors
    ///
    /// Returns a [`ProjectionError`] when the event would cause an illegal
    /// Hive transition or carries a payload that does not match its
    /// declared type.
    pub fn apply(&mut self, event: &Event) -> Result<(), ProjectionError> {
        match &event.event_type {
            EventType::HiveCreated => self.apply_created(event),
            EventType::HiveClosed => self.apply_transition(event, HiveStatus::Closed),
            EventType::Unknown(type_name) => {
                self.unknown_events.push(UnknownEvent { type_name: type_name.clone(), timestamp: event.timestamp });
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Folds an entire ordered event slice, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Propagates the first [`ProjectionError`] encountered.
    pub fn project(events: &[Event]) -> Result<Self, ProjectionError> {
        let mut projection = Self::default();
        for event in events {
            projection.apply(event)?;
        }
        Ok(projection)
    }

    fn apply_created(&mut self, event: &Event) -> Result<(), ProjectionError> {
        let payload: HiveCreatedPayload = serde_json::from_value(event.payload.clone())
            .map_err(|err| ProjectionError::MalformedPayload(event.event_type.to_string(), err.to_string()))?;
        let hive_id = event.id.as_str();
        self.hive = Some(Hive {
            hive_id: HiveId::new(hive_id),
            name: payload.name,
            description: payload.description,
            status: HiveStatus::Active,
            created_at: event.timestamp,
            colonies: Vec::new(),
        });
        Ok(())
    }

    fn apply_transition(&mut self, event: &Event, to: HiveStatus) -> Result<(), ProjectionError> {
        let hive = self.hive.as_mut().ok_or_else(|| ProjectionError::UnknownReference("hive", "missing hive.created".to_string()))?;
        hive_transition(hive.status, to)?;
        hive.status = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Actor;
    use crate::core::EventId;
    use crate::core::NewEvent;
    use crate::core::RunId;

    fn evt(id: &str, event_type: EventType, run_id: &str, task_id: Option<&str>, payload: serde_json::Value) -> Event {
        Event::new(
            EventId::new(id),
            NewEvent {
                event_type,
                timestamp: Timestamp::from_unix_millis(0),
                actor: Actor::System { subsystem: "test".into() },
                run_id: Some(RunId::new(run_id)),
                task_id: task_id.map(TaskId::new),
                colony_id: None,
                requirement_id: None,
                payload,
                parents: Vec::new(),
                prev_hash: None,
            },
        )
        .expect("construct event")
    }

    #[test]
    fn folds_run_and_task_lifecycle() {
        let events = vec![
            evt("e1", EventType::RunStarted, "run-1", None, serde_json::json!({"goal": "ship it"})),
            evt(
                "e2",
                EventType::TaskCreated,
                "run-1",
                Some("t1"),
                serde_json::json!({"title": "write code", "dependencies": []}),
            ),
            evt("e3", EventType::TaskAssigned, "run-1", Some("t1"), serde_json::json!({"assignee": "bee-1"})),
            evt("e4", EventType::TaskProgressed, "run-1", Some("t1"), serde_json::json!({"progress": 50})),
            evt("e5", EventType::TaskCompleted, "run-1", Some("t1"), serde_json::json!({})),
            evt("e6", EventType::RunCompleted, "run-1", None, serde_json::json!({})),
        ];
        let projection = RunProjection::project(&events).expect("project");
        assert_eq!(projection.run.as_ref().map(|r| r.state), Some(RunStatus::Completed));
        let task = projection.tasks.get(&TaskId::new("t1")).expect("task");
        assert_eq!(task.state, TaskStatus::Completed);
        assert_eq!(task.progress, 50);
        assert_eq!(task.assignee.as_deref(), Some("bee-1"));
    }

    #[test]
    fn rejects_illegal_task_transition() {
        let events = vec![
            evt("e1", EventType::RunStarted, "run-1", None, serde_json::json!({"goal": "g"})),
            evt("e2", EventType::TaskCreated, "run-1", Some("t1"), serde_json::json!({"title": "x"})),
            evt("e3", EventType::TaskCompleted, "run-1", Some("t1"), serde_json::json!({})),
        ];
        assert!(matches!(RunProjection::project(&events), Err(ProjectionError::IllegalTransition(_))));
    }

    #[test]
    fn unknown_event_types_are_preserved_not_dropped() {
        let mut event = evt("e1", EventType::RunStarted, "run-1", None, serde_json::json!({"goal": "g"}));
        let mut unknown = evt("e2", EventType::Unknown("future.thing".into()), "run-1", None, serde_json::json!({"x": 1}));
        unknown.hash = crate::core::compute_hash(&unknown).expect("hash").value;
        event.hash = crate::core::compute_hash(&event).expect("hash").value;
        let projection = RunProjection::project(std::slice::from_ref(&event)).expect("project first");
        let mut projection = projection;
        projection.apply(&unknown).expect("apply unknown");
        assert_eq!(projection.unknown_events.len(), 1);
        assert_eq!(projection.unknown_events[0].type_name, "future.thing");
    }

    fn scoped_evt(id: &str, event_type: EventType, colony_id: Option<&str>, payload: serde_json::Value) -> Event {
        Event::new(
            EventId::new(id),
            NewEvent {
                event_type,
                timestamp: Timestamp::from_unix_millis(0),
                actor: Actor::System { subsystem: "test".into() },
                run_id: None,
                task_id: None,
                colony_id: colony_id.map(crate::core::ColonyId::new),
                requirement_id: None,
                payload,
                parents: Vec::new(),
                prev_hash: None,
            },
        )
        .expect("construct event")
    }

    #[test]
    fn colony_projection_folds_lifecycle() {
        let events = vec![
            scoped_evt(
                "e1",
                EventType::ColonyCreated,
                Some("colony-1"),
                serde_json::json!({"hive_id": "hive-1", "name": "infra", "goal": "patch CVEs"}),
            ),
            scoped_evt("e2", EventType::ColonyStarted, Some("colony-1"), serde_json::json!({})),
            scoped_evt("e3", EventType::ColonySuspended, Some("colony-1"), serde_json::json!({})),
        ];
        let projection = ColonyProjection::project(&events).expect("project");
        let colony = projection.colony.expect("colony");
        assert_eq!(colony.status, ColonyStatus::Suspended);
        assert!(colony.suspended);
    }

    #[test]
    fn hive_projection_folds_lifecycle() {
        let events = vec![
            scoped_evt("e1", EventType::HiveCreated, None, serde_json::json!({"name": "acme"})),
            scoped_evt("e2", EventType::HiveClosed, None, serde_json::json!({})),
        ];
        let projection = HiveProjection::project(&events).expect("project");
        assert_eq!(projection.hive.expect("hive").status, HiveStatus::Closed);
    }
}
