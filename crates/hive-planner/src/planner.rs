// hive-planner/src/planner.rs
// ============================================================================
// Module: Planner
// Description: Goal -> task DAG decomposition via an LLM collaborator, with
//              validation and a safe single-task fallback.
// Purpose: Produce a layered `Plan` and its `planner.completed` event.
// Dependencies: hive_core::{CollaboratorClient, Event}, crate::{graph, spec}
// ============================================================================

//! ## Overview
//! The planner calls out to a [`CollaboratorClient`] once per Run to
//! decompose the goal into a task list, then validates and layers that list
//! locally. Any validation failure — duplicate ids, dangling dependencies,
//! or a cycle — falls back to a single-task plan rather than propagating
//! the error, since a Run must always have something runnable to execute.

use hive_core::Actor;
use hive_core::Clock;
use hive_core::CollaboratorClient;
use hive_core::CollaboratorError;
use hive_core::CollaboratorRequest;
use hive_core::Event;
use hive_core::EventError;
use hive_core::EventId;
use hive_core::EventType;
use hive_core::NewEvent;
use hive_core::RunId;
use hive_core::Timestamp;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

use crate::graph;
use crate::spec::DecompositionResponse;
use crate::spec::TaskSpec;

/// A layered execution plan: `layers[0]` has no dependencies; every task in
/// `layers[n]` depends only on tasks in `layers[0..n]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    /// Execution layers, in order.
    pub layers: Vec<Vec<TaskSpec>>,
}

impl Plan {
    /// Flattens the plan back into its original task list order.
    #[must_use]
    pub fn tasks(&self) -> Vec<&TaskSpec> {
        self.layers.iter().flatten().collect()
    }
}

/// Errors raised while planning a Run.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// The collaborator call itself failed.
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
    /// Building the `planner.completed` event failed.
    #[error(transparent)]
    Event(#[from] EventError),
}

/// Builds the decomposition prompt sent to the LLM collaborator for `goal`.
#[must_use]
pub fn decomposition_request(goal: &str) -> CollaboratorRequest {
    CollaboratorRequest {
        system_prompt: "Decompose the goal into a JSON task list with fields \
            id, title, description, dependencies, action_class."
            .to_string(),
        user_content: goal.to_string(),
        allowed_tools: Vec::new(),
    }
}

/// Decomposes `goal` via `collaborator`, validates the result, and resolves
/// it into execution layers. Falls back to a single-task plan on any
/// decomposition or validation failure rather than returning an error, so
/// a Run is always plannable.
///
/// # Errors
///
/// Returns [`PlannerError::Collaborator`] only if the collaborator call
/// itself fails; malformed or invalid decompositions fall back silently
/// (with a logged warning) rather than erroring.
pub async fn plan_goal(goal: &str, collaborator: &dyn CollaboratorClient) -> Result<Plan, PlannerError> {
    let request = decomposition_request(goal);
    let response = collaborator.complete(request).await?;
    let tasks = match serde_json::from_str::<DecompositionResponse>(&response.content) {
        Ok(decomposition) if !decomposition.tasks.is_empty() => match graph::validate(&decomposition.tasks) {
            Ok(()) => decomposition.tasks,
            Err(err) => {
                warn!(error = %err, "decomposition failed validation, falling back to single-task plan");
                vec![TaskSpec::fallback(goal)]
            }
        },
        Ok(_) => {
            warn!("decomposition returned an empty task list, falling back to single-task plan");
            vec![TaskSpec::fallback(goal)]
        }
        Err(err) => {
            warn!(error = %err.to_string(), "decomposition response was not parseable JSON, falling back to single-task plan");
            vec![TaskSpec::fallback(goal)]
        }
    };
    Ok(Plan { layers: graph::layer(&tasks) })
}

/// Builds the `planner.completed` event carrying the full plan, using
/// `clock` for the timestamp and `prev_hash` as the Run scope's current
/// head hash.
///
/// # Errors
///
/// Returns [`PlannerError::Event`] if the event cannot be hashed.
pub fn completion_event(
    run_id: &RunId,
    plan: &Plan,
    prev_hash: Option<String>,
    clock: &dyn Clock,
) -> Result<Event, PlannerError> {
    let payload = json!({
        "layers": plan.layers,
    });
    let event = Event::new(
        EventId::new(format!("{}-planner-completed", run_id.as_str())),
        NewEvent {
            event_type: EventType::PlannerCompleted,
            timestamp: clock.now(),
            actor: Actor::System { subsystem: "planner".to_string() },
            run_id: Some(run_id.clone()),
            task_id: None,
            colony_id: None,
            requirement_id: None,
            payload,
            parents: Vec::new(),
            prev_hash,
        },
    )?;
    Ok(event)
}
