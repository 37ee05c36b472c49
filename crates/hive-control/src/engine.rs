// hive-control/src/engine.rs
// ============================================================================
// Module: Control Engine
// Description: The top-level facade owning the event store, projections,
//              policy gate, approval loop, and Sentinel; implements the
//              Control RPC command surface.
// Purpose: Give every host (CLI, future network server) one place that
//          validates, policy-gates, and appends every command as a chained
//          event, rather than re-deriving that contract per host.
// Dependencies: hive_core, hive_orchestrator, hive_sentinel, ret_logic
// ============================================================================

//! ## Overview
//! `Engine` is the only thing in this crate that mutates state. Every
//! command method follows the same shape: decode/validate arguments, look
//! up (or build) the entity's current projection, evaluate the policy gate,
//! and either append the resulting event(s), suspend on a Requirement, or
//! return a typed error. Idempotency is layered on top via
//! [`crate::idempotency::IdempotencyCache`] rather than threaded through
//! every method, so a command's body only has to describe its one-shot
//! behavior.
//!
//! Chain appenders (`HiveChain`/`ColonyChain`/`RunChain`) mint event ids
//! from an internal sequence counter with no global uniqueness guarantee
//! across independent instances, so `Engine` caches one `RunChain` per
//! active Run for the life of the process and rebuilds a fresh
//! `HiveChain`/`ColonyChain` immediately before every append to the shared
//! meta/Colony scopes, re-reading the scope's true head each time rather
//! than trusting a long-lived cache. See `DESIGN.md` for the dual-writer
//! tension this still leaves with Sentinel's own Colony-scope appender.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use hive_core::ActionClass;
use hive_core::Actor;
use hive_core::ApprovalOutcome;
use hive_core::ApprovalRegistry;
use hive_core::Clock;
use hive_core::ColonyId;
use hive_core::ColonyProjection;
use hive_core::ColonyStatus;
use hive_core::CommandId;
use hive_core::Episode;
use hive_core::EpisodeId;
use hive_core::EpisodeStore;
use hive_core::Event;
use hive_core::EventId;
use hive_core::EventStore;
use hive_core::EventType;
use hive_core::HashAlgorithm;
use hive_core::HiveId;
use hive_core::HiveProjection;
use hive_core::HiveStatus;
use hive_core::LineageDirection;
use hive_core::LineageQuery;
use hive_core::LineageResult;
use hive_core::PolicyDecision;
use hive_core::PolicyGate;
use hive_core::RequirementId;
use hive_core::RequirementStatus;
use hive_core::RunId;
use hive_core::RunProjection;
use hive_core::RunStatus;
use hive_core::TaskId;
use hive_core::TaskStatus;
use hive_core::hash_bytes;
use hive_core::resolve_lineage;
use hive_orchestrator::EventFields;
use hive_orchestrator::RunChain;
use hive_sentinel::SentinelConfig;
use hive_sentinel::SentinelMonitor;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::EngineError;
use crate::idempotency::IdempotencyCache;
use crate::ids::mint_id;
use crate::meta::ColonyChain;
use crate::meta::HiveChain;

// ============================================================================
// SECTION: Result Types
// ============================================================================

/// Result of a command that creates or mutates a Hive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HiveResult {
    /// The Hive's identifier.
    pub hive_id: HiveId,
    /// The Hive's status immediately after the command applied.
    pub status: HiveStatus,
}

/// Result of a command that creates or mutates a Colony.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColonyResultDto {
    /// The Colony's identifier.
    pub colony_id: ColonyId,
    /// The Colony's status immediately after the command applied.
    pub status: ColonyStatus,
}

/// Result of a command that creates or mutates a Run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// The Run's identifier.
    pub run_id: RunId,
    /// The Run's state immediately after the command applied.
    pub state: RunStatus,
}

/// Result of a command that creates or mutates a Task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// The Task's identifier.
    pub task_id: TaskId,
    /// The Task's state immediately after the command applied.
    pub state: TaskStatus,
}

/// Result of a command that creates or mutates a Requirement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementResult {
    /// The Requirement's identifier.
    pub requirement_id: RequirementId,
    /// The Requirement's state immediately after the command applied.
    pub state: RequirementStatus,
}

/// Result of `events.list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsListResult {
    /// Every event appended to the Run's scope, in append order.
    pub events: Vec<Event>,
}

/// Result of `heartbeat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatResult {
    /// The Run's identifier.
    pub run_id: RunId,
    /// Timestamp recorded for this heartbeat, as Unix millis.
    pub recorded_at_millis: i64,
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Owns every long-lived piece of engine state: the event store, the
/// Episode store, the policy gate, the approval registry, Sentinel, and the
/// idempotency cache. Constructed once per process and shared behind an
/// `Arc` by hosts that need concurrent access (a CLI invocation typically
/// owns one outright).
pub struct Engine {
    store: Arc<dyn EventStore>,
    episodes: Arc<dyn EpisodeStore>,
    clock: Arc<dyn Clock>,
    policy: PolicyGate,
    approvals: ApprovalRegistry,
    sentinel: SentinelMonitor,
    idempotency: IdempotencyCache,
    runs: Mutex<HashMap<RunId, Arc<RunChain>>>,
}

impl Engine {
    /// Constructs an engine over the given store, clock, policy gate, and
    /// Sentinel configuration.
    #[must_use]
    pub fn new(
        store: Arc<dyn EventStore>,
        episodes: Arc<dyn EpisodeStore>,
        clock: Arc<dyn Clock>,
        policy: PolicyGate,
        sentinel_config: SentinelConfig,
    ) -> Self {
        let sentinel = SentinelMonitor::new(sentinel_config, Arc::clone(&store), Arc::clone(&clock));
        Self {
            store,
            episodes,
            clock,
            policy,
            approvals: ApprovalRegistry::new(),
            sentinel,
            idempotency: IdempotencyCache::new(),
            runs: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the Sentinel instance observing this engine's event stream,
    /// for hosts that want to feed it KPI reports directly
    /// (`SentinelMonitor::report_kpi`).
    #[must_use]
    pub const fn sentinel(&self) -> &SentinelMonitor {
        &self.sentinel
    }

    /// Returns the approval registry, for hosts exposing a separate
    /// `requirement.resolve` entry point (e.g. a human-facing approval UI)
    /// that resolves requirements without going through [`Self::requirement_resolve`]
    /// directly (both paths call the same registry, so either observes the
    /// other's resolution).
    #[must_use]
    pub const fn approvals(&self) -> &ApprovalRegistry {
        &self.approvals
    }

    // ------------------------------------------------------------------
    // Chain helpers
    // ------------------------------------------------------------------

    /// Returns the cached `RunChain` for `run_id`, constructing and
    /// caching one seeded from the store's current head if this is the
    /// first time this process has touched the Run.
    async fn run_chain(&self, run_id: &RunId) -> Result<Arc<RunChain>, EngineError> {
        let mut guard = self.runs.lock().await;
        if let Some(chain) = guard.get(run_id) {
            return Ok(Arc::clone(chain));
        }
        let head = self.store.head_hash(run_id).await?;
        let chain = Arc::new(RunChain::new(Arc::clone(&self.store), Arc::clone(&self.clock), run_id.clone(), head));
        guard.insert(run_id.clone(), Arc::clone(&chain));
        Ok(chain)
    }

    /// Registers a freshly minted Run's chain in the cache (used by
    /// `run.start`, which already knows there is no prior head).
    async fn register_run_chain(&self, chain: Arc<RunChain>) {
        self.runs.lock().await.insert(chain.run_id().clone(), chain);
    }

    // ------------------------------------------------------------------
    // Projection helpers
    // ------------------------------------------------------------------

    /// Projects a Run's full state (Run, Tasks, Requirements) from its
    /// event log.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownRun`] if the Run has no events;
    /// propagates [`EngineError::Projection`] on a malformed log.
    pub async fn project_run(&self, run_id: &RunId) -> Result<RunProjection, EngineError> {
        let events = self.store.read_run(run_id).await.map_err(|_| EngineError::UnknownRun(run_id.to_string()))?;
        if events.is_empty() {
            return Err(EngineError::UnknownRun(run_id.to_string()));
        }
        Ok(RunProjection::project(&events)?)
    }

    /// Projects a Colony's state from its own scope's event log.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownColony`] if the Colony has no events.
    pub async fn project_colony(&self, colony_id: &ColonyId) -> Result<ColonyProjection, EngineError> {
        let events =
            self.store.read_colony(colony_id).await.map_err(|_| EngineError::UnknownColony(colony_id.to_string()))?;
        let own_scope: Vec<Event> = events.into_iter().filter(|e| e.run_id.is_none()).collect();
        if own_scope.is_empty() {
            return Err(EngineError::UnknownColony(colony_id.to_string()));
        }
        Ok(ColonyProjection::project(&own_scope)?)
    }

    /// Projects a Hive's state, filtering the shared meta-decisions stream
    /// down to the events caused by or attributed to this Hive.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownHive`] if the Hive has no events.
    pub async fn project_hive(&self, hive_id: &HiveId) -> Result<HiveProjection, EngineError> {
        let events = self.store.read_meta().await?;
        let own: Vec<Event> = events
            .into_iter()
            .filter(|e| e.id.as_str() == hive_id.as_str() || e.payload.get("hive_id").and_then(Value::as_str) == Some(hive_id.as_str()))
            .collect();
        if own.is_empty() {
            return Err(EngineError::UnknownHive(hive_id.to_string()));
        }
        Ok(HiveProjection::project(&own)?)
    }

    // ------------------------------------------------------------------
    // Policy gate helpers
    // ------------------------------------------------------------------

    /// Requires `trust_level` to meet or exceed `minimum` for a Hive/Colony
    /// administrative command. These commands (close a Hive, start/complete
    /// a Colony, emergency-stop a Run) are structural lifecycle operations
    /// issued directly by a privileged caller, not Task-risk actions the
    /// [`PolicyGate`] is modeled on; routing them through
    /// `PolicyGate::evaluate` would let the gate's default
    /// `level3_irreversible_requires_approval` setting strand an
    /// emergency-stop behind a Requirement only an emergency-stop could ever
    /// clear. A plain trust-level floor, checked directly, avoids that.
    fn require_trust(&self, trust_level: hive_core::TrustLevel, minimum: hive_core::TrustLevel, scope: &str) -> Result<(), EngineError> {
        if trust_level >= minimum {
            Ok(())
        } else {
            Err(EngineError::Denied { scope: scope.to_string() })
        }
    }

    /// Gates a Run-scope command. On `RequireApproval`, raises a
    /// Requirement against `chain`, registers it with the approval
    /// registry, and awaits its resolution before returning. Mirrors
    /// `hive_orchestrator::pipeline::run_pipeline`'s plan-approval gate,
    /// generalized to any Run-scope action.
    async fn gate_on_run(
        &self,
        chain: &RunChain,
        action_class: ActionClass,
        trust_level: hive_core::TrustLevel,
        scope: &str,
        description: &str,
    ) -> Result<(), EngineError> {
        match self.policy.evaluate(action_class, trust_level, scope) {
            PolicyDecision::Allow => Ok(()),
            PolicyDecision::Deny => Err(EngineError::Denied { scope: scope.to_string() }),
            PolicyDecision::RequireApproval => {
                let requirement_id = RequirementId::new(mint_id("req", self.clock.as_ref()));
                chain
                    .append(
                        EventType::RequirementCreated,
                        Actor::System { subsystem: "policy-gate".to_string() },
                        json!({ "description": description, "options": Vec::<String>::new() }),
                        EventFields { requirement_id: Some(requirement_id.clone()), ..EventFields::default() },
                    )
                    .await?;
                let handle = self.approvals.register(requirement_id.clone());
                let outcome = handle.wait().await.unwrap_or(ApprovalOutcome::Cancelled);
                match outcome {
                    ApprovalOutcome::Approved { selected_option, comment } => {
                        chain
                            .append(
                                EventType::RequirementApproved,
                                Actor::System { subsystem: "policy-gate".to_string() },
                                json!({ "selected_option": selected_option, "comment": comment }),
                                EventFields { requirement_id: Some(requirement_id), ..EventFields::default() },
                            )
                            .await?;
                        Ok(())
                    }
                    ApprovalOutcome::Rejected { comment } => {
                        chain
                            .append(
                                EventType::RequirementRejected,
                                Actor::System { subsystem: "policy-gate".to_string() },
                                json!({ "comment": comment }),
                                EventFields { requirement_id: Some(requirement_id.clone()), ..EventFields::default() },
                            )
                            .await?;
                        Err(EngineError::RequirementRejected(requirement_id.to_string()))
                    }
                    ApprovalOutcome::Cancelled => {
                        chain
                            .append(
                                EventType::RequirementCancelled,
                                Actor::System { subsystem: "policy-gate".to_string() },
                                json!({}),
                                EventFields { requirement_id: Some(requirement_id), ..EventFields::default() },
                            )
                            .await?;
                        Err(EngineError::RequirementCancelled)
                    }
                }
            }
        }
    }

    /// Feeds `event` to Sentinel and logs (rather than propagates) a
    /// failure to append its own enforcement events: Sentinel's reaction is
    /// best-effort and must never fail the command that triggered it.
    async fn notify_sentinel(&self, event: &Event) {
        if let Err(err) = self.sentinel.observe(event).await {
            tracing::warn!(error = %err, event_id = %event.id, "sentinel observation failed");
        }
    }

    // ------------------------------------------------------------------
    // Hive commands
    // ------------------------------------------------------------------

    /// `hive.create(name, description?) -> hive-id`
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the append fails.
    pub async fn hive_create(
        &self,
        command_id: &CommandId,
        actor: Actor,
        name: String,
        description: Option<String>,
    ) -> Result<HiveResult, EngineError> {
        self.idempotency
            .get_or_insert(command_id, async {
                let (_chain, event) =
                    HiveChain::create(Arc::clone(&self.store), Arc::clone(&self.clock), actor, name, description).await?;
                Ok(HiveResult { hive_id: HiveId::new(event.id.as_str()), status: HiveStatus::Active })
            })
            .await
    }

    /// `hive.close(hive-id)`
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownHive`] if no such Hive exists, or
    /// [`EngineError::IllegalTransition`] if the Hive is already closed in
    /// a way the state machine rejects.
    pub async fn hive_close(
        &self,
        command_id: &CommandId,
        actor: Actor,
        hive_id: HiveId,
        trust_level: hive_core::TrustLevel,
    ) -> Result<HiveResult, EngineError> {
        self.idempotency
            .get_or_insert(command_id, async {
                let projection = self.project_hive(&hive_id).await?;
                let hive = projection.hive.ok_or_else(|| EngineError::UnknownHive(hive_id.to_string()))?;
                hive_core::hive_transition(hive.status, HiveStatus::Closed)?;
                self.require_trust(trust_level, hive_core::TrustLevel::Admin, hive_id.as_str())?;
                let head = self.store.head_hash_for_meta().await?;
                let chain = HiveChain::existing(Arc::clone(&self.store), Arc::clone(&self.clock), hive_id.clone(), head);
                chain.append(EventType::HiveClosed, actor, json!({})).await?;
                Ok(HiveResult { hive_id, status: HiveStatus::Closed })
            })
            .await
    }

    // ------------------------------------------------------------------
    // Colony commands
    // ------------------------------------------------------------------

    /// `colony.create(hive-id, name, goal?) -> colony-id`
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownHive`] if `hive_id` has not been
    /// created, or [`EngineError::Denied`] if the Hive is closed.
    pub async fn colony_create(
        &self,
        command_id: &CommandId,
        actor: Actor,
        hive_id: HiveId,
        name: String,
        goal: Option<String>,
    ) -> Result<ColonyResultDto, EngineError> {
        self.idempotency
            .get_or_insert(command_id, async {
                let hive = self.project_hive(&hive_id).await?.hive.ok_or_else(|| EngineError::UnknownHive(hive_id.to_string()))?;
                if hive.status == HiveStatus::Closed {
                    return Err(EngineError::Denied { scope: hive_id.to_string() });
                }
                let (_chain, event) = ColonyChain::create(
                    Arc::clone(&self.store),
                    Arc::clone(&self.clock),
                    actor,
                    &hive_id,
                    name,
                    goal,
                )
                .await?;
                Ok(ColonyResultDto { colony_id: ColonyId::new(event.id.as_str()), status: ColonyStatus::Pending })
            })
            .await
    }

    /// `colony.start(colony-id)`
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownColony`] or [`EngineError::IllegalTransition`].
    pub async fn colony_start(
        &self,
        command_id: &CommandId,
        actor: Actor,
        colony_id: ColonyId,
        trust_level: hive_core::TrustLevel,
    ) -> Result<ColonyResultDto, EngineError> {
        self.colony_transition_command(command_id, actor, colony_id, trust_level, ColonyStatus::InProgress, EventType::ColonyStarted).await
    }

    /// `colony.complete(colony-id)`
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownColony`] or [`EngineError::IllegalTransition`].
    pub async fn colony_complete(
        &self,
        command_id: &CommandId,
        actor: Actor,
        colony_id: ColonyId,
        trust_level: hive_core::TrustLevel,
    ) -> Result<ColonyResultDto, EngineError> {
        self.colony_transition_command(command_id, actor, colony_id, trust_level, ColonyStatus::Completed, EventType::ColonyCompleted).await
    }

    async fn colony_transition_command(
        &self,
        command_id: &CommandId,
        actor: Actor,
        colony_id: ColonyId,
        trust_level: hive_core::TrustLevel,
        to: ColonyStatus,
        event_type: EventType,
    ) -> Result<ColonyResultDto, EngineError> {
        self.idempotency
            .get_or_insert(command_id, async {
                let colony = self.project_colony(&colony_id).await?.colony.ok_or_else(|| EngineError::UnknownColony(colony_id.to_string()))?;
                hive_core::colony_transition(colony.status, to)?;
                self.require_trust(trust_level, hive_core::TrustLevel::Trusted, colony_id.as_str())?;
                let head = self.store.head_hash_for_colony(&colony_id).await?;
                let chain = ColonyChain::existing(Arc::clone(&self.store), Arc::clone(&self.clock), colony_id.clone(), head);
                chain.append(event_type, actor, json!({})).await?;
                Ok(ColonyResultDto { colony_id, status: to })
            })
            .await
    }

    // ------------------------------------------------------------------
    // Run commands
    // ------------------------------------------------------------------

    /// `run.start(goal, colony-id?) -> run-id`
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the Colony is given but unknown, or if
    /// the append fails.
    pub async fn run_start(
        &self,
        command_id: &CommandId,
        actor: Actor,
        goal: String,
        colony_id: Option<ColonyId>,
    ) -> Result<RunResult, EngineError> {
        self.idempotency
            .get_or_insert(command_id, async {
                if let Some(colony_id) = &colony_id {
                    self.project_colony(colony_id).await?;
                }
                let run_id = RunId::new(mint_id("run", self.clock.as_ref()));
                let chain = Arc::new(RunChain::new(Arc::clone(&self.store), Arc::clone(&self.clock), run_id.clone(), None));
                chain
                    .append(
                        EventType::RunStarted,
                        actor,
                        json!({ "goal": goal, "colony_id": colony_id.as_ref().map(ColonyId::as_str) }),
                        EventFields { colony_id: colony_id.clone(), ..EventFields::default() },
                    )
                    .await?;
                self.register_run_chain(Arc::clone(&chain)).await;
                Ok(RunResult { run_id, state: RunStatus::Running })
            })
            .await
    }

    /// `run.complete(run-id, force?)`
    ///
    /// Without `force`, refuses to complete a Run with non-terminal Tasks
    /// or Requirements outstanding. With `force`, cancels every
    /// non-terminal Task and Requirement first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RunNotQuiescent`] if `force` is `false` and
    /// open work remains.
    pub async fn run_complete(
        &self,
        command_id: &CommandId,
        actor: Actor,
        run_id: RunId,
        force: bool,
        trust_level: hive_core::TrustLevel,
    ) -> Result<RunResult, EngineError> {
        self.idempotency
            .get_or_insert(command_id, async {
                let projection = self.project_run(&run_id).await?;
                let run = projection.run.as_ref().ok_or_else(|| EngineError::UnknownRun(run_id.to_string()))?;
                hive_core::run_transition(run.state, RunStatus::Completed)?;
                let open_tasks: Vec<TaskId> =
                    projection.tasks.values().filter(|t| !t.state.is_terminal()).map(|t| t.task_id.clone()).collect();
                let open_reqs: Vec<RequirementId> = projection
                    .requirements
                    .values()
                    .filter(|r| !r.state.is_terminal())
                    .map(|r| r.requirement_id.clone())
                    .collect();
                if !force && (!open_tasks.is_empty() || !open_reqs.is_empty()) {
                    return Err(EngineError::RunNotQuiescent(run_id.to_string()));
                }
                self.require_trust(trust_level, hive_core::TrustLevel::Trusted, run_id.as_str())?;
                let chain = self.run_chain(&run_id).await?;
                for task_id in open_tasks {
                    let event = chain
                        .append(
                            EventType::TaskCancelled,
                            Actor::System { subsystem: "run-complete".to_string() },
                            json!({ "reason": "run completed with force" }),
                            EventFields { task_id: Some(task_id), colony_id: run.colony_id.clone(), ..EventFields::default() },
                        )
                        .await?;
                    self.notify_sentinel(&event).await;
                }
                for requirement_id in open_reqs {
                    self.approvals.cancel_all();
                    chain
                        .append(
                            EventType::RequirementCancelled,
                            Actor::System { subsystem: "run-complete".to_string() },
                            json!({}),
                            EventFields { requirement_id: Some(requirement_id), colony_id: run.colony_id.clone(), ..EventFields::default() },
                        )
                        .await?;
                }
                let event = chain
                    .append(
                        EventType::RunCompleted,
                        actor,
                        json!({}),
                        EventFields { colony_id: run.colony_id.clone(), ..EventFields::default() },
                    )
                    .await?;
                self.notify_sentinel(&event).await;
                self.record_episode(&run_id, RunStatus::Completed).await?;
                Ok(RunResult { run_id, state: RunStatus::Completed })
            })
            .await
    }

    /// `run.emergency-stop(run-id, reason, scope?)`
    ///
    /// Aborts the Run outright: every non-terminal Task and Requirement is
    /// cancelled. `scope` is recorded on the event for audit purposes but
    /// does not currently narrow the blast radius below the whole Run (see
    /// `DESIGN.md`).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownRun`] or [`EngineError::IllegalTransition`].
    pub async fn run_emergency_stop(
        &self,
        command_id: &CommandId,
        actor: Actor,
        run_id: RunId,
        reason: String,
        scope: Option<String>,
        trust_level: hive_core::TrustLevel,
    ) -> Result<RunResult, EngineError> {
        self.idempotency
            .get_or_insert(command_id, async {
                let projection = self.project_run(&run_id).await?;
                let run = projection.run.as_ref().ok_or_else(|| EngineError::UnknownRun(run_id.to_string()))?;
                hive_core::run_transition(run.state, RunStatus::Aborted)?;
                self.require_trust(trust_level, hive_core::TrustLevel::Admin, run_id.as_str())?;
                let chain = self.run_chain(&run_id).await?;
                self.approvals.cancel_all();
                for task in projection.tasks.values().filter(|t| !t.state.is_terminal()) {
                    let event = chain
                        .append(
                            EventType::TaskCancelled,
                            Actor::System { subsystem: "emergency-stop".to_string() },
                            json!({ "reason": reason.clone() }),
                            EventFields {
                                task_id: Some(task.task_id.clone()),
                                colony_id: run.colony_id.clone(),
                                ..EventFields::default()
                            },
                        )
                        .await?;
                    self.notify_sentinel(&event).await;
                }
                for requirement in projection.requirements.values().filter(|r| !r.state.is_terminal()) {
                    chain
                        .append(
                            EventType::RequirementCancelled,
                            Actor::System { subsystem: "emergency-stop".to_string() },
                            json!({}),
                            EventFields {
                                requirement_id: Some(requirement.requirement_id.clone()),
                                colony_id: run.colony_id.clone(),
                                ..EventFields::default()
                            },
                        )
                        .await?;
                }
                let event = chain
                    .append(
                        EventType::RunAborted,
                        actor,
                        json!({ "reason": reason, "scope": scope }),
                        EventFields { colony_id: run.colony_id.clone(), ..EventFields::default() },
                    )
                    .await?;
                self.notify_sentinel(&event).await;
                self.record_episode(&run_id, RunStatus::Aborted).await?;
                Ok(RunResult { run_id, state: RunStatus::Aborted })
            })
            .await
    }

    /// Computes and appends the Episode summarizing a just-terminated Run.
    /// Episode persistence is best-effort relative to the Run's own
    /// termination: a failure here is logged, not propagated, since the
    /// Run's event log (not the Episode log) is authoritative.
    async fn record_episode(&self, run_id: &RunId, outcome: RunStatus) -> Result<(), EngineError> {
        let Ok(projection) = self.project_run(run_id).await else { return Ok(()) };
        let Some(run) = projection.run else { return Ok(()) };
        let Some(colony_id) = run.colony_id.clone() else { return Ok(()) };
        let duration_ms = run.started_at.millis_until(run.completed_at.unwrap_or(run.started_at));
        let fingerprint = hash_bytes(HashAlgorithm::Sha256, run.goal.as_bytes()).value;
        let episode = Episode {
            episode_id: EpisodeId::new(mint_id("episode", self.clock.as_ref())),
            run_id: run_id.clone(),
            colony_id: Some(colony_id),
            goal_fingerprint: fingerprint,
            outcome,
            kpi_scores: std::collections::BTreeMap::new(),
            intervention_count: 0,
            duration_ms,
            created_at: self.clock.now(),
        };
        if let Err(err) = self.episodes.append_episode(episode).await {
            tracing::warn!(error = %err, run_id = %run_id, "failed to record episode");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Task commands
    // ------------------------------------------------------------------

    /// `task.create(run-id, title, description?) -> task-id`
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownRun`], or suspends on approval per the
    /// policy gate evaluated against the new Task's own risk class.
    pub async fn task_create(
        &self,
        command_id: &CommandId,
        actor: Actor,
        run_id: RunId,
        title: String,
        description: Option<String>,
        action_class: ActionClass,
        trust_level: hive_core::TrustLevel,
    ) -> Result<TaskResult, EngineError> {
        self.idempotency
            .get_or_insert(command_id, async {
                let projection = self.project_run(&run_id).await?;
                let run = projection.run.as_ref().ok_or_else(|| EngineError::UnknownRun(run_id.to_string()))?;
                let chain = self.run_chain(&run_id).await?;
                self.gate_on_run(&chain, action_class, trust_level, run_id.as_str(), &format!("create task: {title}")).await?;
                let task_id = TaskId::new(mint_id("task", self.clock.as_ref()));
                chain
                    .append(
                        EventType::TaskCreated,
                        actor,
                        json!({ "title": title, "description": description, "action_class": action_class }),
                        EventFields { task_id: Some(task_id.clone()), colony_id: run.colony_id.clone(), ..EventFields::default() },
                    )
                    .await?;
                Ok(TaskResult { task_id, state: TaskStatus::Pending })
            })
            .await
    }

    /// `task.assign(run-id, task-id, assignee)`
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownTask`] or [`EngineError::IllegalTransition`].
    pub async fn task_assign(
        &self,
        command_id: &CommandId,
        actor: Actor,
        run_id: RunId,
        task_id: TaskId,
        assignee: String,
    ) -> Result<TaskResult, EngineError> {
        self.task_event(command_id, actor, run_id, task_id, TaskStatus::Assigned, EventType::TaskAssigned, json!({ "assignee": assignee }))
            .await
    }

    /// `task.progress(run-id, task-id, progress, message?)`
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownTask`].
    pub async fn task_progress(
        &self,
        command_id: &CommandId,
        actor: Actor,
        run_id: RunId,
        task_id: TaskId,
        progress: u8,
        message: Option<String>,
    ) -> Result<TaskResult, EngineError> {
        self.idempotency
            .get_or_insert(command_id, async {
                let projection = self.project_run(&run_id).await?;
                let task = projection.tasks.get(&task_id).ok_or_else(|| EngineError::UnknownTask(task_id.to_string()))?;
                let state = task.state;
                let colony_id = projection.run.as_ref().and_then(|r| r.colony_id.clone());
                let chain = self.run_chain(&run_id).await?;
                chain
                    .append(
                        EventType::TaskProgressed,
                        actor,
                        json!({ "progress": progress.min(100), "message": message }),
                        EventFields { task_id: Some(task_id.clone()), colony_id, ..EventFields::default() },
                    )
                    .await?;
                Ok(TaskResult { task_id, state })
            })
            .await
    }

    /// `task.complete(run-id, task-id, result?)`
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownTask`] or [`EngineError::IllegalTransition`].
    pub async fn task_complete(
        &self,
        command_id: &CommandId,
        actor: Actor,
        run_id: RunId,
        task_id: TaskId,
        result: Option<Value>,
    ) -> Result<TaskResult, EngineError> {
        self.task_event(
            command_id,
            actor,
            run_id,
            task_id,
            TaskStatus::Completed,
            EventType::TaskCompleted,
            json!({ "result": result }),
        )
        .await
    }

    /// `task.fail(run-id, task-id, error, retryable?)`
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownTask`] or [`EngineError::IllegalTransition`].
    pub async fn task_fail(
        &self,
        command_id: &CommandId,
        actor: Actor,
        run_id: RunId,
        task_id: TaskId,
        error: String,
        retryable: bool,
    ) -> Result<TaskResult, EngineError> {
        self.task_event(
            command_id,
            actor,
            run_id,
            task_id,
            TaskStatus::Failed,
            EventType::TaskFailed,
            json!({ "error": error, "retryable": retryable }),
        )
        .await
    }

    async fn task_event(
        &self,
        command_id: &CommandId,
        actor: Actor,
        run_id: RunId,
        task_id: TaskId,
        to: TaskStatus,
        event_type: EventType,
        payload: Value,
    ) -> Result<TaskResult, EngineError> {
        self.idempotency
            .get_or_insert(command_id, async {
                let projection = self.project_run(&run_id).await?;
                let task = projection.tasks.get(&task_id).ok_or_else(|| EngineError::UnknownTask(task_id.to_string()))?;
                hive_core::task_transition(task.state, to)?;
                let colony_id = projection.run.as_ref().and_then(|r| r.colony_id.clone());
                let chain = self.run_chain(&run_id).await?;
                let event = chain
                    .append(event_type, actor, payload, EventFields { task_id: Some(task_id.clone()), colony_id, ..EventFields::default() })
                    .await?;
                self.notify_sentinel(&event).await;
                Ok(TaskResult { task_id, state: to })
            })
            .await
    }

    // ------------------------------------------------------------------
    // Requirement commands
    // ------------------------------------------------------------------

    /// `requirement.create(run-id, description, options?) -> req-id`
    ///
    /// Raises a Requirement directly, bypassing the policy gate: this is
    /// the manual "ask a human" entry point, distinct from the automatic
    /// Requirements the gate itself raises inside [`Self::gate_on_run`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownRun`].
    pub async fn requirement_create(
        &self,
        command_id: &CommandId,
        actor: Actor,
        run_id: RunId,
        description: String,
        options: Vec<String>,
    ) -> Result<RequirementResult, EngineError> {
        self.idempotency
            .get_or_insert(command_id, async {
                let projection = self.project_run(&run_id).await?;
                let colony_id = projection.run.as_ref().and_then(|r| r.colony_id.clone());
                let chain = self.run_chain(&run_id).await?;
                let requirement_id = RequirementId::new(mint_id("req", self.clock.as_ref()));
                chain
                    .append(
                        EventType::RequirementCreated,
                        actor,
                        json!({ "description": description, "options": options }),
                        EventFields { requirement_id: Some(requirement_id.clone()), colony_id, ..EventFields::default() },
                    )
                    .await?;
                self.approvals.register(requirement_id.clone());
                Ok(RequirementResult { requirement_id, state: RequirementStatus::Pending })
            })
            .await
    }

    /// `requirement.resolve(run-id, req-id, approved, selected-option?, comment?)`
    ///
    /// Resolves a pending Requirement, waking anything blocked on
    /// [`ApprovalHandle::wait`](hive_core::ApprovalHandle::wait) for it
    /// (including an in-flight [`Self::gate_on_run`] call) and appending
    /// the resolution event.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownRequirement`] or
    /// [`EngineError::IllegalTransition`] if already resolved.
    pub async fn requirement_resolve(
        &self,
        command_id: &CommandId,
        actor: Actor,
        run_id: RunId,
        requirement_id: RequirementId,
        approved: bool,
        selected_option: Option<String>,
        comment: Option<String>,
    ) -> Result<RequirementResult, EngineError> {
        self.idempotency
            .get_or_insert(command_id, async {
                let projection = self.project_run(&run_id).await?;
                let requirement = projection
                    .requirements
                    .get(&requirement_id)
                    .ok_or_else(|| EngineError::UnknownRequirement(requirement_id.to_string()))?;
                let to = if approved { RequirementStatus::Approved } else { RequirementStatus::Rejected };
                hive_core::requirement_transition(requirement.state, to)?;
                let colony_id = projection.run.as_ref().and_then(|r| r.colony_id.clone());
                let chain = self.run_chain(&run_id).await?;
                let event_type = if approved { EventType::RequirementApproved } else { EventType::RequirementRejected };
                chain
                    .append(
                        event_type,
                        actor,
                        json!({ "selected_option": selected_option.clone(), "comment": comment.clone() }),
                        EventFields { requirement_id: Some(requirement_id.clone()), colony_id, ..EventFields::default() },
                    )
                    .await?;
                let outcome = if approved {
                    ApprovalOutcome::Approved { selected_option, comment }
                } else {
                    ApprovalOutcome::Rejected { comment }
                };
                // A requirement with no corresponding registered handle (one
                // resolved purely through this manual path, never gated
                // through `gate_on_run`) has nothing waiting on it; ignore.
                let _ = self.approvals.resolve(&requirement_id, outcome);
                Ok(RequirementResult { requirement_id, state: to })
            })
            .await
    }

    // ------------------------------------------------------------------
    // Read-only queries
    // ------------------------------------------------------------------

    /// `events.list(run-id)`
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownRun`].
    pub async fn events_list(&self, run_id: &RunId) -> Result<EventsListResult, EngineError> {
        let events = self.store.read_run(run_id).await.map_err(|_| EngineError::UnknownRun(run_id.to_string()))?;
        if events.is_empty() {
            return Err(EngineError::UnknownRun(run_id.to_string()));
        }
        Ok(EventsListResult { events })
    }

    /// `events.lineage(run-id, event-id, direction, max-depth)`
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownRun`].
    pub async fn events_lineage(
        &self,
        run_id: &RunId,
        event_id: EventId,
        direction: LineageDirection,
        max_depth: Option<u32>,
    ) -> Result<LineageResult, EngineError> {
        let events = self.store.read_run(run_id).await.map_err(|_| EngineError::UnknownRun(run_id.to_string()))?;
        Ok(resolve_lineage(&events, &LineageQuery { root: event_id, direction, max_depth }))
    }

    // ------------------------------------------------------------------
    // Heartbeat
    // ------------------------------------------------------------------

    /// `heartbeat(run-id, message?)`
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownRun`].
    pub async fn heartbeat(&self, actor: Actor, run_id: RunId, message: Option<String>) -> Result<HeartbeatResult, EngineError> {
        let projection = self.project_run(&run_id).await?;
        let colony_id = projection.run.as_ref().and_then(|r| r.colony_id.clone());
        let chain = self.run_chain(&run_id).await?;
        let now = self.clock.now();
        chain
            .append(EventType::Heartbeat, actor, json!({ "message": message }), EventFields { colony_id, ..EventFields::default() })
            .await?;
        info!(run_id = %run_id, "heartbeat recorded");
        Ok(HeartbeatResult { run_id, recorded_at_millis: now.as_unix_millis() })
    }
}
