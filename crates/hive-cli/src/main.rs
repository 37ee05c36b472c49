// hive-cli/src/main.rs
// ============================================================================
// Module: HiveForge CLI Binary
// Description: Command-line front end over the Control RPC surface
//              (`hive_control::Engine`), plus a `demo` command that drives
//              the full execution pipeline end-to-end with scripted
//              collaborators.
// Purpose: Give an operator (or an integration test) a way to exercise
//          every Control RPC command against a local vault without
//          standing up a network server.
// Dependencies: clap, hive_core, hive_control, hive_store, hive_config,
//               hive_orchestrator, hive_planner, hive_collab, hive_sentinel,
//               tokio
// ============================================================================

//! ## Overview
//! Every subcommand maps 1:1 to one `Engine` method from spec.md §6, with
//! one exception: `demo`, which does not go through `Engine` at all. It
//! builds a standalone [`hive_orchestrator::RunChain`] and drives
//! [`hive_orchestrator::run_pipeline`] directly with a
//! [`hive_collab::ScriptedCollaborator`] planner/worker and a
//! [`hive_collab::HeuristicGuard`], so a single invocation exercises
//! Plan -> Plan-Verify -> Plan-Approval -> Execute -> Post-Verify ->
//! Finalize without external network calls.
//!
//! Every command reads its vault fresh, runs one command, and exits; there
//! is no long-lived server process here; a future network host would keep
//! one `Engine` alive across requests instead.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use clap::Subcommand;
use hive_cli::security::keys_match;
use hive_cli::t;
use hive_collab::HeuristicGuard;
use hive_collab::ScriptedCollaborator;
use hive_config::EngineConfig;
use hive_core::Actor;
use hive_core::ActionClass;
use hive_core::ApprovalRegistry;
use hive_core::CollaboratorClient;
use hive_core::CollaboratorResponse;
use hive_core::CommandId;
use hive_core::ColonyId;
use hive_core::EventId;
use hive_core::HiveId;
use hive_core::LineageDirection;
use hive_core::PolicyGate;
use hive_core::RequirementId;
use hive_core::RunId;
use hive_core::TaskId;
use hive_core::TrustLevel;
use hive_control::Engine;
use hive_control::SystemClock;
use hive_control::mint_id;
use hive_orchestrator::PipelineConfig;
use hive_orchestrator::PipelineOutcome;
use hive_orchestrator::RunChain;
use hive_store::VaultConfig;
use hive_store::VaultStore;
use ret_logic::LogicMode;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use tokio::sync::watch;

// ============================================================================
// SECTION: CLI surface
// ============================================================================

/// HiveForge: a multi-agent orchestration engine with an event-sourced,
/// hash-chained audit log.
#[derive(Parser)]
#[command(name = "hive", version, about)]
struct Cli {
    /// Root directory for the event vault.
    #[arg(long, global = true, env = "HIVE_VAULT_PATH", default_value = "./hive-vault")]
    vault_path: PathBuf,

    /// Optional `hive.toml` to load governance/policy/sentinel tunables
    /// from (falls back to built-in defaults when absent).
    #[arg(long, global = true, env = "HIVE_CONFIG")]
    config: Option<PathBuf>,

    /// Acting identity for this invocation, as `user:<id>`, `agent:<id>`,
    /// or `system:<subsystem>`.
    #[arg(long, global = true, default_value = "user:cli-operator")]
    actor: String,

    /// Trust level asserted for this invocation.
    #[arg(long, global = true, value_parser = parse_trust_level, default_value = "trusted")]
    trust_level: TrustLevel,

    /// Idempotency key for this command; a fresh one is minted if absent.
    #[arg(long, global = true)]
    command_id: Option<String>,

    /// Control-surface auth key, checked against `auth.api_key_env` when
    /// the loaded config has `auth.enabled = true`.
    #[arg(long, global = true, env = "HIVE_AUTH_KEY")]
    auth_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Hive lifecycle commands.
    Hive {
        #[command(subcommand)]
        command: HiveCommand,
    },
    /// Colony lifecycle commands.
    Colony {
        #[command(subcommand)]
        command: ColonyCommand,
    },
    /// Run lifecycle commands.
    Run {
        #[command(subcommand)]
        command: RunCommand,
    },
    /// Task lifecycle commands.
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },
    /// Requirement (human-approval) commands.
    Requirement {
        #[command(subcommand)]
        command: RequirementCommand,
    },
    /// Event-log read commands.
    Events {
        #[command(subcommand)]
        command: EventsCommand,
    },
    /// Records a liveness heartbeat for a Run.
    Heartbeat {
        /// Run to record the heartbeat against.
        run_id: String,
        /// Optional free-text status message.
        #[arg(long)]
        message: Option<String>,
    },
    /// Drives the full Plan -> Verify -> Approve -> Execute -> Verify ->
    /// Finalize pipeline end-to-end against a freshly started Run, using
    /// scripted collaborators (no network calls).
    Demo {
        /// Goal text handed to the (scripted) planner.
        #[arg(default_value = "demonstrate the HiveForge execution pipeline")]
        goal: String,
    },
}

#[derive(Subcommand)]
enum HiveCommand {
    /// Creates a new Hive.
    Create {
        /// Display name.
        name: String,
        /// Optional free-text description.
        #[arg(long)]
        description: Option<String>,
    },
    /// Closes an existing Hive.
    Close {
        /// Hive to close.
        hive_id: String,
    },
}

#[derive(Subcommand)]
enum ColonyCommand {
    /// Creates a new Colony under a Hive.
    Create {
        /// Owning Hive.
        hive_id: String,
        /// Display name.
        name: String,
        /// Optional goal description.
        #[arg(long)]
        goal: Option<String>,
    },
    /// Transitions a Colony to `in_progress`.
    Start {
        /// Colony to start.
        colony_id: String,
    },
    /// Transitions a Colony to `completed`.
    Complete {
        /// Colony to complete.
        colony_id: String,
    },
}

#[derive(Subcommand)]
enum RunCommand {
    /// Starts a new Run.
    Start {
        /// Goal text for this Run.
        goal: String,
        /// Optional owning Colony.
        #[arg(long)]
        colony_id: Option<String>,
    },
    /// Completes a Run.
    Complete {
        /// Run to complete.
        run_id: String,
        /// Cancel any non-terminal Tasks/Requirements first instead of
        /// refusing to complete.
        #[arg(long)]
        force: bool,
    },
    /// Aborts a Run outright, cancelling every open Task and Requirement.
    EmergencyStop {
        /// Run to stop.
        run_id: String,
        /// Reason recorded on the abort event.
        reason: String,
        /// Optional scope narrowing hint, recorded for audit purposes.
        #[arg(long)]
        scope: Option<String>,
    },
}

#[derive(Subcommand)]
enum TaskCommand {
    /// Creates a new Task within a Run.
    Create {
        /// Owning Run.
        run_id: String,
        /// Task title.
        title: String,
        /// Optional free-text description.
        #[arg(long)]
        description: Option<String>,
        /// Risk classification, used by the policy gate.
        #[arg(long, value_parser = parse_action_class, default_value = "read_only")]
        action_class: ActionClass,
    },
    /// Assigns a Task to a worker.
    Assign {
        /// Owning Run.
        run_id: String,
        /// Task to assign.
        task_id: String,
        /// Assignee identifier.
        assignee: String,
    },
    /// Records incremental progress on a Task.
    Progress {
        /// Owning Run.
        run_id: String,
        /// Task to update.
        task_id: String,
        /// Progress percentage (clamped to 100).
        progress: u8,
        /// Optional status message.
        #[arg(long)]
        message: Option<String>,
    },
    /// Marks a Task completed.
    Complete {
        /// Owning Run.
        run_id: String,
        /// Task to complete.
        task_id: String,
        /// Optional JSON result payload.
        #[arg(long)]
        result: Option<String>,
    },
    /// Marks a Task failed.
    Fail {
        /// Owning Run.
        run_id: String,
        /// Task to fail.
        task_id: String,
        /// Error description.
        error: String,
        /// Whether this failure is retryable.
        #[arg(long)]
        retryable: bool,
    },
}

#[derive(Subcommand)]
enum RequirementCommand {
    /// Raises a Requirement for human approval.
    Create {
        /// Owning Run.
        run_id: String,
        /// Description of what is being asked.
        description: String,
        /// Optional list of selectable options.
        #[arg(long)]
        option: Vec<String>,
    },
    /// Resolves a pending Requirement.
    Resolve {
        /// Owning Run.
        run_id: String,
        /// Requirement to resolve.
        requirement_id: String,
        /// Approve (vs. reject) the Requirement.
        #[arg(long)]
        approve: bool,
        /// Selected option, if any were offered.
        #[arg(long)]
        selected_option: Option<String>,
        /// Optional resolver comment.
        #[arg(long)]
        comment: Option<String>,
    },
}

#[derive(Subcommand)]
enum EventsCommand {
    /// Lists every event recorded for a Run.
    List {
        /// Run to list.
        run_id: String,
    },
    /// Walks causal lineage from one event.
    Lineage {
        /// Run the event belongs to.
        run_id: String,
        /// Event to start from.
        event_id: String,
        /// Traversal direction.
        #[arg(long, value_parser = parse_lineage_direction, default_value = "both")]
        direction: LineageDirection,
        /// Maximum traversal depth.
        #[arg(long)]
        max_depth: Option<u32>,
    },
}

// ============================================================================
// SECTION: Value parsers
// ============================================================================

fn parse_trust_level(raw: &str) -> Result<TrustLevel, String> {
    match raw {
        "untrusted" => Ok(TrustLevel::Untrusted),
        "basic" => Ok(TrustLevel::Basic),
        "trusted" => Ok(TrustLevel::Trusted),
        "admin" => Ok(TrustLevel::Admin),
        other => Err(format!("unknown trust level: {other} (expected untrusted|basic|trusted|admin)")),
    }
}

fn parse_action_class(raw: &str) -> Result<ActionClass, String> {
    match raw {
        "read_only" => Ok(ActionClass::ReadOnly),
        "reversible" => Ok(ActionClass::Reversible),
        "irreversible" => Ok(ActionClass::Irreversible),
        other => Err(format!("unknown action class: {other} (expected read_only|reversible|irreversible)")),
    }
}

fn parse_lineage_direction(raw: &str) -> Result<LineageDirection, String> {
    match raw {
        "ancestors" => Ok(LineageDirection::Ancestors),
        "descendants" => Ok(LineageDirection::Descendants),
        "both" => Ok(LineageDirection::Both),
        other => Err(format!("unknown lineage direction: {other} (expected ancestors|descendants|both)")),
    }
}

fn parse_actor(raw: &str) -> Result<Actor, CliError> {
    let (kind, id) = raw.split_once(':').ok_or_else(|| CliError::InvalidActor(raw.to_string()))?;
    match kind {
        "user" => Ok(Actor::User { id: id.to_string() }),
        "agent" => Ok(Actor::Agent { id: id.to_string() }),
        "system" => Ok(Actor::System { subsystem: id.to_string() }),
        _ => Err(CliError::InvalidActor(raw.to_string())),
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Top-level CLI failure modes.
#[derive(Debug, Error)]
enum CliError {
    /// `--actor` was not of the form `kind:id`.
    #[error("invalid --actor value: {0} (expected user:<id>, agent:<id>, or system:<subsystem>)")]
    InvalidActor(String),
    /// Loading `hive.toml` failed.
    #[error("failed to load config: {0}")]
    Config(#[from] hive_config::ConfigError),
    /// Opening the vault failed.
    #[error("failed to open vault: {0}")]
    Vault(#[from] hive_store::VaultError),
    /// The supplied `--auth-key` did not match the configured key.
    #[error("the supplied auth key does not match the configured key")]
    AuthMismatch,
    /// A Control RPC command failed.
    #[error(transparent)]
    Engine(#[from] hive_control::EngineError),
    /// The pipeline itself failed.
    #[error(transparent)]
    Pipeline(#[from] hive_orchestrator::PipelineError),
    /// Appending directly to a Run's hash chain failed (the `demo` command
    /// drives `RunChain` without going through `Engine`).
    #[error(transparent)]
    Chain(#[from] hive_orchestrator::ChainError),
    /// Writing output failed.
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Writes `value` as pretty JSON to stdout, terminated by a newline.
///
/// Routed through [`std::io::Write`] directly (never the `println!` family)
/// since this workspace denies `clippy::print_stdout`.
fn emit(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(rendered.as_bytes())?;
    stdout.write_all(b"\n")?;
    Ok(())
}

/// Writes a translated message line to stderr.
fn emit_error(message: &str) {
    let mut stderr = std::io::stderr().lock();
    let _ = stderr.write_all(message.as_bytes());
    let _ = stderr.write_all(b"\n");
}

// ============================================================================
// SECTION: Entry point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            emit_error(&t!("engine.command_failed", error = err));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let actor = parse_actor(&cli.actor)?;
    let trust_level = cli.trust_level;

    let config = match &cli.config {
        Some(path) => EngineConfig::load(Some(path))?,
        None => default_config(&cli.vault_path),
    };

    if let Some(expected) = config.effective_auth_key() {
        let supplied = cli.auth_key.clone().unwrap_or_default();
        if !keys_match(&supplied, &expected) {
            return Err(CliError::AuthMismatch);
        }
    }

    let vault_path = if cli.config.is_some() { config.effective_vault_path() } else { cli.vault_path.clone() };
    let vault = Arc::new(VaultStore::open(VaultConfig::new(vault_path))?);
    let command_id = CommandId::new(cli.command_id.clone().unwrap_or_else(|| mint_id("cmd", &SystemClock)));

    match cli.command {
        Command::Demo { goal } => run_demo(Arc::clone(&vault), &config, &goal, actor, trust_level).await,
        command => {
            let engine = Engine::new(
                vault.clone(),
                vault,
                Arc::new(SystemClock),
                PolicyGate::new(LogicMode::Kleene)
                    .with_level3_irreversible_requires_approval(config.policy.level3_irreversible_requires_approval),
                config.to_sentinel_config(),
            );
            run_command(&engine, &command_id, actor, trust_level, command).await
        }
    }
}

fn default_config(vault_path: &std::path::Path) -> EngineConfig {
    EngineConfig {
        vault_path: vault_path.to_path_buf(),
        governance: hive_config::GovernanceConfig::default(),
        llm: hive_config::LlmConfig::default(),
        auth: hive_config::AuthConfig::default(),
        policy: hive_config::PolicyConfig::default(),
        sentinel: hive_config::SentinelConfigDoc::default(),
        source_modified_at: None,
    }
}

#[allow(clippy::too_many_lines)]
async fn run_command(
    engine: &Engine,
    command_id: &CommandId,
    actor: Actor,
    trust_level: TrustLevel,
    command: Command,
) -> Result<(), CliError> {
    match command {
        Command::Hive { command } => match command {
            HiveCommand::Create { name, description } => {
                let result = engine.hive_create(command_id, actor, name, description).await?;
                emit(&json!(result))
            }
            HiveCommand::Close { hive_id } => {
                let result = engine.hive_close(command_id, actor, HiveId::new(hive_id), trust_level).await?;
                emit(&json!(result))
            }
        },
        Command::Colony { command } => match command {
            ColonyCommand::Create { hive_id, name, goal } => {
                let result = engine.colony_create(command_id, actor, HiveId::new(hive_id), name, goal).await?;
                emit(&json!(result))
            }
            ColonyCommand::Start { colony_id } => {
                let result = engine.colony_start(command_id, actor, ColonyId::new(colony_id), trust_level).await?;
                emit(&json!(result))
            }
            ColonyCommand::Complete { colony_id } => {
                let result = engine.colony_complete(command_id, actor, ColonyId::new(colony_id), trust_level).await?;
                emit(&json!(result))
            }
        },
        Command::Run { command } => match command {
            RunCommand::Start { goal, colony_id } => {
                let result = engine.run_start(command_id, actor, goal, colony_id.map(ColonyId::new)).await?;
                emit(&json!(result))
            }
            RunCommand::Complete { run_id, force } => {
                let result = engine.run_complete(command_id, actor, RunId::new(run_id), force, trust_level).await?;
                emit(&json!(result))
            }
            RunCommand::EmergencyStop { run_id, reason, scope } => {
                let result = engine.run_emergency_stop(command_id, actor, RunId::new(run_id), reason, scope, trust_level).await?;
                emit(&json!(result))
            }
        },
        Command::Task { command } => match command {
            TaskCommand::Create { run_id, title, description, action_class } => {
                let result = engine
                    .task_create(command_id, actor, RunId::new(run_id), title, description, action_class, trust_level)
                    .await?;
                emit(&json!(result))
            }
            TaskCommand::Assign { run_id, task_id, assignee } => {
                let result = engine.task_assign(command_id, actor, RunId::new(run_id), TaskId::new(task_id), assignee).await?;
                emit(&json!(result))
            }
            TaskCommand::Progress { run_id, task_id, progress, message } => {
                let result =
                    engine.task_progress(command_id, actor, RunId::new(run_id), TaskId::new(task_id), progress, message).await?;
                emit(&json!(result))
            }
            TaskCommand::Complete { run_id, task_id, result: raw_result } => {
                let parsed = raw_result.as_deref().map(serde_json::from_str).transpose().unwrap_or(None);
                let result = engine.task_complete(command_id, actor, RunId::new(run_id), TaskId::new(task_id), parsed).await?;
                emit(&json!(result))
            }
            TaskCommand::Fail { run_id, task_id, error, retryable } => {
                let result = engine.task_fail(command_id, actor, RunId::new(run_id), TaskId::new(task_id), error, retryable).await?;
                emit(&json!(result))
            }
        },
        Command::Requirement { command } => match command {
            RequirementCommand::Create { run_id, description, option } => {
                let result = engine.requirement_create(command_id, actor, RunId::new(run_id), description, option).await?;
                emit(&json!(result))
            }
            RequirementCommand::Resolve { run_id, requirement_id, approve, selected_option, comment } => {
                let result = engine
                    .requirement_resolve(
                        command_id,
                        actor,
                        RunId::new(run_id),
                        RequirementId::new(requirement_id),
                        approve,
                        selected_option,
                        comment,
                    )
                    .await?;
                emit(&json!(result))
            }
        },
        Command::Events { command } => match command {
            EventsCommand::List { run_id } => {
                let result = engine.events_list(&RunId::new(run_id)).await?;
                emit(&json!(result))
            }
            EventsCommand::Lineage { run_id, event_id, direction, max_depth } => {
                let result = engine.events_lineage(&RunId::new(run_id), EventId::new(event_id), direction, max_depth).await?;
                emit(&json!(result))
            }
        },
        Command::Heartbeat { run_id, message } => {
            let result = engine.heartbeat(actor, RunId::new(run_id), message).await?;
            emit(&json!(result))
        }
        Command::Demo { .. } => unreachable!("Demo is dispatched before run_command is called"),
    }
}

/// Runs the full pipeline against a freshly started Run, using scripted
/// collaborators. Does not go through `Engine`: the demo wants direct
/// access to `run_pipeline`'s result, which `Engine` does not expose.
async fn run_demo(
    store: Arc<VaultStore>,
    config: &EngineConfig,
    goal: &str,
    actor: Actor,
    trust_level: TrustLevel,
) -> Result<(), CliError> {
    let clock = Arc::new(SystemClock);
    let run_id = RunId::new(mint_id("run", clock.as_ref()));
    let chain = Arc::new(RunChain::new(store.clone(), Arc::clone(&clock), run_id.clone(), None));

    let planner = ScriptedCollaborator::new(
        "demo-planner",
        CollaboratorResponse {
            content: serde_json::to_string(&json!({
                "tasks": [
                    { "id": "t1", "title": goal, "dependencies": [], "action_class": "read_only" },
                ]
            }))
            .unwrap_or_default(),
            tool_calls: Vec::new(),
            usage: None,
        },
    );
    let guard = HeuristicGuard::new("demo-guard");
    let worker: Arc<dyn CollaboratorClient> = Arc::new(ScriptedCollaborator::new(
        "demo-worker",
        CollaboratorResponse {
            content: serde_json::to_string(&json!({ "status": "ok" })).unwrap_or_default(),
            tool_calls: Vec::new(),
            usage: None,
        },
    ));

    let policy = PolicyGate::new(LogicMode::Kleene)
        .with_level3_irreversible_requires_approval(config.policy.level3_irreversible_requires_approval);
    let approvals = ApprovalRegistry::new();
    let (_cancel_tx, cancel_rx) = watch::channel(false);

    let pipeline_config = PipelineConfig {
        executor: config.governance.to_executor_config(),
        trust_level,
        policy_scope: run_id.to_string(),
    };

    chain
        .append(
            hive_core::EventType::RunStarted,
            actor.clone(),
            json!({ "goal": goal, "colony_id": Value::Null }),
            hive_orchestrator::EventFields::default(),
        )
        .await?;

    let outcome = hive_orchestrator::run_pipeline(
        Arc::clone(&chain),
        goal,
        &planner,
        &guard,
        worker,
        &policy,
        &approvals,
        cancel_rx,
        pipeline_config,
    )
    .await?;

    match &outcome {
        PipelineOutcome::Completed { result } => {
            chain
                .append(hive_core::EventType::RunCompleted, actor, json!({}), hive_orchestrator::EventFields::default())
                .await?;
            emit(&json!({ "run_id": run_id, "outcome": "completed", "tasks": result.task_outcomes }))
        }
        PipelineOutcome::Aborted { stage, reason } => {
            chain
                .append(
                    hive_core::EventType::RunAborted,
                    actor,
                    json!({ "reason": reason.clone(), "stage": stage }),
                    hive_orchestrator::EventFields::default(),
                )
                .await?;
            emit(&json!({ "run_id": run_id, "outcome": "aborted", "stage": stage, "reason": reason }))
        }
    }
}
