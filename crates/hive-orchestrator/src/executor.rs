// hive-orchestrator/src/executor.rs
// ============================================================================
// Module: Layered DAG Executor
// Description: Runs a planner::Plan layer by layer, parallel within a
//              layer, sequential across layers.
// Purpose: L9 — drive Tasks through assigned -> worker.started ->
//          (progressed)* -> completed|failed, with retry and cancellation.
// Dependencies: hive_core, hive_planner::Plan, crate::{chain, context, result}
// ============================================================================

//! ## Overview
//! Each layer starts only once every task in it has all its dependencies
//! already reflected in `completed_results`; a plan that violates this
//! (e.g. because layering itself is inconsistent with the dependency
//! graph) is rejected with [`OrchestratorError::DependencyResolution`]
//! before any task in the layer starts. Concurrency within a layer is
//! bounded by `max_concurrent_tasks`; a task's context is limited to the
//! results of the dependencies it declared, never the whole layer.

use std::collections::BTreeMap;
use std::sync::Arc;

use hive_core::Actor;
use hive_core::CollaboratorClient;
use hive_core::CollaboratorError;
use hive_core::CollaboratorRequest;
use hive_core::EventType;
use hive_core::TaskId;
use hive_planner::Plan;
use hive_planner::TaskSpec;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::info;
use tracing::warn;

use crate::chain::ChainError;
use crate::chain::EventFields;
use crate::chain::RunChain;
use crate::context::TaskContext;
use crate::result::ColonyResult;
use crate::result::TaskOutcome;

/// Tunables for a single plan execution.
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    /// Maximum number of Tasks running concurrently within one layer.
    pub max_concurrent_tasks: usize,
    /// Maximum retry attempts for a retryable Task failure.
    pub max_retries: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { max_concurrent_tasks: 4, max_retries: 2 }
    }
}

/// Errors raised while executing a plan.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A layer's tasks reference dependencies not satisfied by any earlier
    /// layer; the plan is internally inconsistent.
    #[error("dependency resolution error: task {task} depends on unresolved {dependency}")]
    DependencyResolution {
        /// The task whose dependency could not be resolved.
        task: String,
        /// The unresolved dependency id.
        dependency: String,
    },
    /// Appending or chaining an event failed.
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Runs `plan` to completion against `worker`, appending every lifecycle
/// event through `chain`.
///
/// # Errors
///
/// Returns [`OrchestratorError::DependencyResolution`] if a layer is not
/// actually runnable given what has completed so far, or
/// [`OrchestratorError::Chain`] if an event cannot be appended.
pub async fn execute_plan(
    chain: Arc<RunChain>,
    worker: Arc<dyn CollaboratorClient>,
    plan: &Plan,
    config: ExecutorConfig,
    mut cancel: watch::Receiver<bool>,
) -> Result<ColonyResult, OrchestratorError> {
    let mut completed_results: BTreeMap<TaskId, Value> = BTreeMap::new();
    let mut result = ColonyResult::default();

    for layer in &plan.layers {
        for task in layer {
            for dep in &task.dependencies {
                if !completed_results.contains_key(&TaskId::new(dep.as_str())) {
                    return Err(OrchestratorError::DependencyResolution {
                        task: task.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        if *cancel.borrow() {
            for task in layer {
                result.task_outcomes.insert(
                    TaskId::new(task.id.as_str()),
                    TaskOutcome::Failed { reason: "aborted".to_string(), retryable: false },
                );
            }
            continue;
        }

        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_tasks.max(1)));
        let mut set: JoinSet<(TaskId, Result<TaskOutcome, ChainError>)> = JoinSet::new();
        for task in layer.clone() {
            let semaphore = semaphore.clone();
            let worker = worker.clone();
            let context = TaskContext::for_dependencies(
                &task.dependencies.iter().map(|d| TaskId::new(d.as_str())).collect::<Vec<_>>(),
                &completed_results,
            );
            let cancel = cancel.clone();
            let chain = Arc::clone(&chain);
            set.spawn(run_task(chain, worker, task, context, config.max_retries, semaphore, cancel));
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((task_id, Ok(outcome))) => {
                    if let TaskOutcome::Completed { result: value } = &outcome {
                        completed_results.insert(task_id.clone(), value.clone());
                    }
                    result.task_outcomes.insert(task_id, outcome);
                }
                Ok((task_id, Err(err))) => return Err(OrchestratorError::Chain(err)).map_err(|e| {
                    warn!(task = %task_id, error = %e, "task chain append failed");
                    e
                }),
                Err(join_err) => {
                    warn!(error = %join_err, "task join failed");
                }
            }
        }
    }

    Ok(result)
}

/// Builds the worker's user-turn content: the task's own title plus the
/// results of the dependencies it declared, and nothing else a sibling
/// task in the same layer produced.
fn worker_prompt(task: &TaskSpec, context: &TaskContext) -> String {
    if context.dependency_results.is_empty() {
        return task.title.clone();
    }
    let dependencies = json!(
        context
            .dependency_results
            .iter()
            .map(|(id, value)| (id.as_str().to_string(), value.clone()))
            .collect::<BTreeMap<_, _>>()
    );
    format!("{}\n\nDependency results:\n{dependencies}", task.title)
}

async fn run_task(
    chain: Arc<RunChain>,
    worker: Arc<dyn CollaboratorClient>,
    task: TaskSpec,
    context: TaskContext,
    max_retries: u32,
    semaphore: Arc<Semaphore>,
    mut cancel: watch::Receiver<bool>,
) -> (TaskId, Result<TaskOutcome, ChainError>) {
    let task_id = TaskId::new(task.id.as_str());
    let outcome = async {
        let _permit = semaphore.acquire().await?;

        chain
            .append(
                EventType::TaskCreated,
                Actor::System { subsystem: "orchestrator".to_string() },
                json!({
                    "title": task.title,
                    "description": task.description,
                    "dependencies": task.dependencies,
                    "action_class": task.action_class,
                }),
                EventFields { task_id: Some(task_id.clone()), ..EventFields::default() },
            )
            .await?;
        chain
            .append(
                EventType::TaskAssigned,
                Actor::System { subsystem: "orchestrator".to_string() },
                json!({ "assignee": worker.model_name() }),
                EventFields { task_id: Some(task_id.clone()), ..EventFields::default() },
            )
            .await?;

        let mut attempt = 0u32;
        loop {
            if *cancel.borrow() {
                chain
                    .append(
                        EventType::TaskFailed,
                        Actor::System { subsystem: "orchestrator".to_string() },
                        json!({ "reason": "aborted", "retryable": false }),
                        EventFields { task_id: Some(task_id.clone()), ..EventFields::default() },
                    )
                    .await?;
                return Ok(TaskOutcome::Failed { reason: "aborted".to_string(), retryable: false });
            }

            chain
                .append(
                    EventType::WorkerStarted,
                    Actor::System { subsystem: "orchestrator".to_string() },
                    json!({ "retry_count": attempt }),
                    EventFields { task_id: Some(task_id.clone()), ..EventFields::default() },
                )
                .await?;

            let request = CollaboratorRequest {
                system_prompt: "Execute the assigned task and report its result.".to_string(),
                user_content: worker_prompt(&task, &context),
                allowed_tools: Vec::new(),
            };

            match worker.complete(request).await {
                Ok(response) => {
                    chain
                        .append(
                            EventType::TaskCompleted,
                            Actor::System { subsystem: "orchestrator".to_string() },
                            json!({ "result": response.content }),
                            EventFields { task_id: Some(task_id.clone()), ..EventFields::default() },
                        )
                        .await?;
                    return Ok(TaskOutcome::Completed { result: json!(response.content) });
                }
                Err(err) => {
                    let retryable = !matches!(err, CollaboratorError::BudgetExhausted(_));
                    if retryable && attempt < max_retries {
                        attempt += 1;
                        info!(task = %task_id, attempt, "retrying task after retryable failure");
                        continue;
                    }
                    chain
                        .append(
                            EventType::TaskFailed,
                            Actor::System { subsystem: "orchestrator".to_string() },
                            json!({ "reason": err.to_string(), "retryable": retryable }),
                            EventFields { task_id: Some(task_id.clone()), ..EventFields::default() },
                        )
                        .await?;
                    return Ok(TaskOutcome::Failed { reason: err.to_string(), retryable });
                }
            }
        }
    }
    .await;
    (task_id, outcome)
}
