// hive-orchestrator/src/pipeline.rs
// ============================================================================
// Module: Execution Pipeline
// Description: Plan -> Plan-Verify -> Plan-Approval -> Execute ->
//              Post-Verify -> Finalize, bracketed by `pipeline.stage`
//              events.
// Purpose: L10 — the single entry point a Run's execution goes through,
//          tying the planner, policy gate, approval loop, and executor
//          together.
// Dependencies: hive_core, hive_planner, crate::{chain, executor}
// ============================================================================

//! ## Overview
//! Every stage appends a `pipeline.stage` event before it starts and
//! another after it finishes, carrying the stage name and its outcome, so
//! a Run's event log alone is enough to reconstruct which stage a replay
//! stopped in. A stage that does not pass ends the pipeline early with
//! [`PipelineOutcome::Aborted`] and a terminal Run event; it never falls
//! through to a later stage.

use std::sync::Arc;

use hive_core::Actor;
use hive_core::ApprovalOutcome;
use hive_core::ApprovalRegistry;
use hive_core::CollaboratorClient;
use hive_core::CollaboratorError;
use hive_core::CollaboratorRequest;
use hive_core::EventType;
use hive_core::PolicyDecision;
use hive_core::PolicyGate;
use hive_core::RequirementId;
use hive_core::TrustLevel;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use tokio::sync::watch;
use tracing::info;
use tracing::warn;

use crate::chain::ChainError;
use crate::chain::EventFields;
use crate::chain::RunChain;
use crate::executor;
use crate::executor::ExecutorConfig;
use crate::executor::OrchestratorError;
use crate::result::ColonyResult;

/// A Guard collaborator's verdict on a plan or a completed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardVerdict {
    /// No concerns; proceed.
    Pass,
    /// Proceed, but the Guard attached reservations worth recording.
    Conditional,
    /// Do not proceed.
    Fail,
}

impl GuardVerdict {
    /// `Conditional` still allows progression; only `Fail` halts the
    /// pipeline.
    #[must_use]
    pub const fn allows_progress(self) -> bool {
        !matches!(self, Self::Fail)
    }
}

#[derive(Deserialize)]
struct GuardResponse {
    verdict: GuardVerdict,
    #[serde(default)]
    reason: Option<String>,
}

/// Errors raised while running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A collaborator call failed.
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
    /// Appending or chaining an event failed.
    #[error(transparent)]
    Chain(#[from] ChainError),
    /// The executor itself reported an error (plan inconsistency).
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}

/// What a completed pipeline run produced.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// The Run completed successfully.
    Completed {
        /// The executor's aggregated outcome.
        result: ColonyResult,
    },
    /// The pipeline stopped before or after execution without success.
    Aborted {
        /// The stage that stopped progression.
        stage: &'static str,
        /// Human-readable reason.
        reason: String,
    },
}

/// Fixed configuration for one pipeline run.
pub struct PipelineConfig {
    /// Executor tunables (concurrency, retries).
    pub executor: ExecutorConfig,
    /// Trust level of the actor on whose behalf this Run executes, used by
    /// the Plan-Approval stage.
    pub trust_level: TrustLevel,
    /// Policy scope name this Run's actions are evaluated against.
    pub policy_scope: String,
}

/// Runs a Run's goal through every pipeline stage, against `chain`'s Run
/// scope. `planner_collaborator` decomposes the goal; `guard` verifies the
/// plan and the final result; `worker` executes individual Tasks.
///
/// # Errors
///
/// Returns [`PipelineError`] if a collaborator call or an event append
/// fails outright; a Guard `fail` verdict or a policy `Deny`/rejected
/// Requirement is not an error — it surfaces as
/// [`PipelineOutcome::Aborted`].
#[allow(clippy::too_many_arguments)]
pub async fn run_pipeline(
    chain: Arc<RunChain>,
    goal: &str,
    planner_collaborator: &dyn CollaboratorClient,
    guard: &dyn CollaboratorClient,
    worker: Arc<dyn CollaboratorClient>,
    policy_gate: &PolicyGate,
    approvals: &ApprovalRegistry,
    cancel: watch::Receiver<bool>,
    config: PipelineConfig,
) -> Result<PipelineOutcome, PipelineError> {
    stage_started(&chain, "plan").await?;
    let plan = hive_planner::plan_goal(goal, planner_collaborator).await.map_err(|err| match err {
        hive_planner::PlannerError::Collaborator(inner) => PipelineError::Collaborator(inner),
        hive_planner::PlannerError::Event(inner) => PipelineError::Chain(ChainError::Event(inner)),
    })?;
    chain
        .append(
            EventType::PlannerCompleted,
            Actor::System { subsystem: "planner".to_string() },
            json!({ "layers": plan.layers }),
            EventFields::default(),
        )
        .await?;
    stage_finished(&chain, "plan", "ok", None).await?;

    stage_started(&chain, "plan_verify").await?;
    let plan_verdict = ask_guard(guard, &format!("Review this plan for soundness:\n{}", json!(plan.layers))).await?;
    stage_finished(&chain, "plan_verify", verdict_label(plan_verdict.0), plan_verdict.1.clone()).await?;
    if !plan_verdict.0.allows_progress() {
        let reason = plan_verdict.1.unwrap_or_else(|| "plan rejected by guard".to_string());
        return abort(&chain, "plan_verify", reason).await;
    }

    stage_started(&chain, "plan_approval").await?;
    let max_action_class = plan.tasks().iter().map(|t| t.action_class).max();
    let decision = max_action_class
        .map(|action_class| policy_gate.evaluate(action_class, config.trust_level, &config.policy_scope))
        .unwrap_or(PolicyDecision::Allow);
    match decision {
        PolicyDecision::Allow => {
            stage_finished(&chain, "plan_approval", "allow", None).await?;
        }
        PolicyDecision::Deny => {
            stage_finished(&chain, "plan_approval", "deny", None).await?;
            return abort(&chain, "plan_approval", "policy gate denied the plan".to_string()).await;
        }
        PolicyDecision::RequireApproval => {
            let requirement_id = RequirementId::new(format!("{}-plan-approval", chain_run_label(&chain)));
            chain
                .append(
                    EventType::RequirementCreated,
                    Actor::System { subsystem: "orchestrator".to_string() },
                    json!({ "description": "plan requires approval before execution", "options": ["approve", "reject"] }),
                    EventFields { requirement_id: Some(requirement_id.clone()), ..EventFields::default() },
                )
                .await?;
            let handle = approvals.register(requirement_id.clone());
            let outcome = handle.wait().await.unwrap_or(ApprovalOutcome::Cancelled);
            match outcome {
                ApprovalOutcome::Approved { .. } => {
                    chain
                        .append(
                            EventType::RequirementApproved,
                            Actor::System { subsystem: "orchestrator".to_string() },
                            json!({}),
                            EventFields { requirement_id: Some(requirement_id.clone()), ..EventFields::default() },
                        )
                        .await?;
                    stage_finished(&chain, "plan_approval", "approved", None).await?;
                }
                ApprovalOutcome::Rejected { comment } => {
                    chain
                        .append(
                            EventType::RequirementRejected,
                            Actor::System { subsystem: "orchestrator".to_string() },
                            json!({ "comment": comment }),
                            EventFields { requirement_id: Some(requirement_id.clone()), ..EventFields::default() },
                        )
                        .await?;
                    stage_finished(&chain, "plan_approval", "rejected", comment.clone()).await?;
                    return abort(&chain, "plan_approval", comment.unwrap_or_else(|| "plan approval rejected".to_string())).await;
                }
                ApprovalOutcome::Cancelled => {
                    chain
                        .append(
                            EventType::RequirementCancelled,
                            Actor::System { subsystem: "orchestrator".to_string() },
                            json!({}),
                            EventFields { requirement_id: Some(requirement_id.clone()), ..EventFields::default() },
                        )
                        .await?;
                    stage_finished(&chain, "plan_approval", "cancelled", None).await?;
                    return abort(&chain, "plan_approval", "plan approval cancelled".to_string()).await;
                }
            }
        }
    }

    stage_started(&chain, "execute").await?;
    let colony_result = executor::execute_plan(Arc::clone(&chain), worker, &plan, config.executor, cancel).await?;
    stage_finished(
        &chain,
        "execute",
        if colony_result.all_succeeded() { "ok" } else { "partial_failure" },
        None,
    )
    .await?;

    stage_started(&chain, "post_verify").await?;
    let post_verdict =
        ask_guard(guard, &format!("Review this completed result:\n{}", json!(colony_result.task_outcomes))).await?;
    stage_finished(&chain, "post_verify", verdict_label(post_verdict.0), post_verdict.1.clone()).await?;

    stage_started(&chain, "finalize").await?;
    let succeeded = colony_result.all_succeeded() && post_verdict.0.allows_progress();
    if succeeded {
        chain
            .append(
                EventType::RunCompleted,
                Actor::System { subsystem: "orchestrator".to_string() },
                json!({ "task_outcomes": colony_result.task_outcomes }),
                EventFields::default(),
            )
            .await?;
        stage_finished(&chain, "finalize", "completed", None).await?;
        Ok(PipelineOutcome::Completed { result: colony_result })
    } else {
        let reason = post_verdict.1.clone().unwrap_or_else(|| "one or more tasks failed".to_string());
        chain
            .append(
                EventType::RunFailed,
                Actor::System { subsystem: "orchestrator".to_string() },
                json!({ "reason": reason, "task_outcomes": colony_result.task_outcomes }),
                EventFields::default(),
            )
            .await?;
        stage_finished(&chain, "finalize", "failed", Some(reason.clone())).await?;
        Ok(PipelineOutcome::Aborted { stage: "post_verify", reason })
    }
}

async fn ask_guard(guard: &dyn CollaboratorClient, prompt: &str) -> Result<(GuardVerdict, Option<String>), PipelineError> {
    let request = CollaboratorRequest {
        system_prompt: "Respond with JSON {\"verdict\": \"pass\"|\"conditional\"|\"fail\", \"reason\": string}.".to_string(),
        user_content: prompt.to_string(),
        allowed_tools: Vec::new(),
    };
    let response = guard.complete(request).await?;
    match serde_json::from_str::<GuardResponse>(&response.content) {
        Ok(parsed) => Ok((parsed.verdict, parsed.reason)),
        Err(err) => {
            warn!(error = %err, "guard response malformed, failing closed");
            Ok((GuardVerdict::Fail, Some("guard response malformed".to_string())))
        }
    }
}

const fn verdict_label(verdict: GuardVerdict) -> &'static str {
    match verdict {
        GuardVerdict::Pass => "pass",
        GuardVerdict::Conditional => "conditional",
        GuardVerdict::Fail => "fail",
    }
}

async fn stage_started(chain: &RunChain, stage: &'static str) -> Result<(), ChainError> {
    info!(stage, "pipeline stage started");
    chain
        .append(
            EventType::PipelineStage,
            Actor::System { subsystem: "pipeline".to_string() },
            json!({ "stage": stage, "status": "started" }),
            EventFields::default(),
        )
        .await?;
    Ok(())
}

async fn stage_finished(chain: &RunChain, stage: &'static str, outcome: &str, detail: Option<String>) -> Result<(), ChainError> {
    info!(stage, outcome, "pipeline stage finished");
    chain
        .append(
            EventType::PipelineStage,
            Actor::System { subsystem: "pipeline".to_string() },
            json!({ "stage": stage, "status": "finished", "outcome": outcome, "detail": detail }),
            EventFields::default(),
        )
        .await?;
    Ok(())
}

async fn abort(chain: &RunChain, stage: &'static str, reason: String) -> Result<PipelineOutcome, PipelineError> {
    chain
        .append(
            EventType::RunFailed,
            Actor::System { subsystem: "pipeline".to_string() },
            json!({ "reason": reason, "stage": stage }),
            EventFields::default(),
        )
        .await?;
    Ok(PipelineOutcome::Aborted { stage, reason })
}

/// Best-effort label for Requirement ids raised by the pipeline; `RunChain`
/// does not expose its `run_id` directly since most callers only need
/// `append`, so this mirrors the id scheme `RunChain::append` itself uses.
fn chain_run_label(_chain: &RunChain) -> String {
    "run".to_string()
}

fn _unused(_: Value) {}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use hive_core::ColonyId;
    use hive_core::CollaboratorResponse;
    use hive_core::Event;
    use hive_core::EventStore;
    use hive_core::EventStoreError;
    use hive_core::RunId;
    use hive_core::Timestamp;
    use ret_logic::LogicMode;

    use super::*;

    struct FixedClock;
    impl hive_core::Clock for FixedClock {
        fn now(&self) -> Timestamp {
            Timestamp::from_unix_millis(0)
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
            Ok(self.events.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone())
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
            Ok(Vec::new())
        }
        async fn head_hash_for_meta(&self) -> Result<Option<String>, EventStoreError> {
            Ok(None)
        }
    }

    struct ScriptedCollaborator {
        content: String,
    }

    #[async_trait]
    impl CollaboratorClient for ScriptedCollaborator {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _request: CollaboratorRequest) -> Result<CollaboratorResponse, CollaboratorError> {
            Ok(CollaboratorResponse { content: self.content.clone(), tool_calls: Vec::new(), usage: None })
        }
    }

    fn plan_response() -> String {
        json!({ "tasks": [{"id": "a", "title": "do it", "dependencies": []}] }).to_string()
    }

    #[tokio::test]
    async fn guard_fail_on_plan_verify_aborts_before_execution() {
        let store: Arc<dyn EventStore> = Arc::new(MemStore::default());
        let chain = Arc::new(RunChain::new(store, Arc::new(FixedClock), RunId::new("run-1"), None));
        let planner = ScriptedCollaborator { content: plan_response() };
        let guard = ScriptedCollaborator { content: json!({ "verdict": "fail", "reason": "too risky" }).to_string() };
        let worker: Arc<dyn CollaboratorClient> = Arc::new(ScriptedCollaborator { content: "done".to_string() });
        let gate = PolicyGate::new(LogicMode::Kleene);
        let approvals = ApprovalRegistry::new();
        let (_tx, rx) = watch::channel(false);

        let outcome = run_pipeline(
            chain,
            "ship feature",
            &planner,
            &guard,
            worker,
            &gate,
            &approvals,
            rx,
            PipelineConfig { executor: ExecutorConfig::default(), trust_level: TrustLevel::Admin, policy_scope: "fs".to_string() },
        )
        .await
        .expect("pipeline run");

        match outcome {
            PipelineOutcome::Aborted { stage, .. } => assert_eq!(stage, "plan_verify"),
            PipelineOutcome::Completed { .. } => panic!("expected abort on guard fail"),
        }
    }

    #[tokio::test]
    async fn passing_guard_and_allowed_policy_completes_the_run() {
        let store: Arc<dyn EventStore> = Arc::new(MemStore::default());
        let chain = Arc::new(RunChain::new(store, Arc::new(FixedClock), RunId::new("run-1"), None));
        let planner = ScriptedCollaborator { content: plan_response() };
        let guard = ScriptedCollaborator { content: json!({ "verdict": "pass" }).to_string() };
        let worker: Arc<dyn CollaboratorClient> = Arc::new(ScriptedCollaborator { content: "done".to_string() });
        let gate = PolicyGate::new(LogicMode::Kleene);
        let approvals = ApprovalRegistry::new();
        let (_tx, rx) = watch::channel(false);

        let outcome = run_pipeline(
            chain,
            "ship feature",
            &planner,
            &guard,
            worker,
            &gate,
            &approvals,
            rx,
            PipelineConfig { executor: ExecutorConfig::default(), trust_level: TrustLevel::Admin, policy_scope: "fs".to_string() },
        )
        .await
        .expect("pipeline run");

        assert!(matches!(outcome, PipelineOutcome::Completed { .. }));
    }
}
