// hive-config/src/config.rs
// ============================================================================
// Module: Hive Configuration
// Description: Configuration loading and validation for a HiveForge engine.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: hive_core, hive_sentinel, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path
//! limits. Missing or invalid configuration fails closed: a deployment
//! that cannot validate its config refuses to start rather than run with
//! partially-understood settings.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;

use hive_core::ActionClass;
use hive_sentinel::SentinelConfig;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "hive.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "HIVE_CONFIG";
/// Environment variable used to override the vault path.
pub(crate) const VAULT_PATH_ENV_VAR: &str = "HIVE_VAULT_PATH";
/// Environment variable used to override the control-surface auth key.
pub(crate) const AUTH_KEY_ENV_VAR: &str = "HIVE_AUTH_KEY";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum total path length accepted for `vault_path`.
pub(crate) const MAX_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Top-Level Configuration
// ============================================================================

/// Canonical configuration document for a HiveForge engine, parsed from
/// `hive.toml`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Filesystem root for per-scope event logs.
    pub vault_path: PathBuf,
    /// Governance tunables: retry/concurrency/timeout policy.
    #[serde(default)]
    pub governance: GovernanceConfig,
    /// Default LLM collaborator settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Control-surface authentication, relevant only when the control RPC
    /// is exposed on a network.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Policy-gate tunables.
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Sentinel anomaly-detection thresholds.
    #[serde(default)]
    pub sentinel: SentinelConfigDoc,
    /// Modification time of the loaded file, if loaded from disk.
    #[serde(skip)]
    pub source_modified_at: Option<SystemTime>,
}

impl EngineConfig {
    /// Loads configuration from disk using the default resolution rules:
    /// an explicit `path`, else the `HIVE_CONFIG` environment variable,
    /// else `./hive.toml`. `vault_path`/`auth.api_key_env`'s named
    /// environment variables are consulted by [`Self::effective_vault_path`]
    /// and [`Self::effective_auth_key`] rather than at load time, keeping
    /// secrets out of the parsed document itself.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.source_modified_at = fs::metadata(&resolved).and_then(|meta| meta.modified()).ok();
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let text = self.vault_path.to_string_lossy();
        if text.is_empty() || text.len() > MAX_PATH_LENGTH {
            return Err(ConfigError::Invalid("vault_path must be non-empty and within limits".to_string()));
        }
        self.governance.validate()?;
        self.llm.validate()?;
        self.auth.validate()?;
        self.policy.validate()?;
        self.sentinel.validate()?;
        Ok(())
    }

    /// Returns the effective vault path, honoring [`VAULT_PATH_ENV_VAR`]
    /// as an override over the file-configured value.
    #[must_use]
    pub fn effective_vault_path(&self) -> PathBuf {
        env::var(VAULT_PATH_ENV_VAR).map(PathBuf::from).unwrap_or_else(|_| self.vault_path.clone())
    }

    /// Returns the control-surface auth key, read from the environment
    /// variable named by [`AuthConfig::api_key_env`] (or [`AUTH_KEY_ENV_VAR`]
    /// if unset), or `None` if auth is disabled or the variable is unset.
    #[must_use]
    pub fn effective_auth_key(&self) -> Option<String> {
        if !self.auth.enabled {
            return None;
        }
        let var_name = self.auth.api_key_env.as_deref().unwrap_or(AUTH_KEY_ENV_VAR);
        env::var(var_name).ok()
    }

    /// Converts [`Self::sentinel`] into a runtime [`SentinelConfig`].
    #[must_use]
    pub fn to_sentinel_config(&self) -> SentinelConfig {
        self.sentinel.clone().into_runtime()
    }
}

// ============================================================================
// SECTION: Governance
// ============================================================================

/// Governance tunables controlling orchestrator and approval-loop
/// behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Maximum retry attempts for a retryable Task failure.
    pub max_retries: u32,
    /// Maximum Tasks running concurrently within one layer.
    pub max_concurrent_tasks: usize,
    /// Per-Task execution deadline, in milliseconds.
    pub task_timeout_ms: u64,
    /// Maximum silence before a Run's heartbeat is considered stale, in
    /// milliseconds; silence beyond this triggers `system.silence_detected`.
    pub heartbeat_interval_ms: u64,
    /// Maximum time an outstanding Requirement may wait for resolution
    /// before the approval is considered timed out, in milliseconds.
    pub approval_timeout_ms: u64,
    /// Maximum number of suspend/resume oscillations tolerated for one
    /// Colony before Sentinel treats further oscillation as a loop.
    pub max_oscillations: u32,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            max_concurrent_tasks: 4,
            task_timeout_ms: 5 * 60 * 1000,
            heartbeat_interval_ms: 60 * 1000,
            approval_timeout_ms: 15 * 60 * 1000,
            max_oscillations: 3,
        }
    }
}

impl GovernanceConfig {
    /// Validates governance tunables.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_tasks == 0 {
            return Err(ConfigError::Invalid("governance.max_concurrent_tasks must be >= 1".to_string()));
        }
        if self.task_timeout_ms == 0 {
            return Err(ConfigError::Invalid("governance.task_timeout_ms must be >= 1".to_string()));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::Invalid("governance.heartbeat_interval_ms must be >= 1".to_string()));
        }
        if self.approval_timeout_ms == 0 {
            return Err(ConfigError::Invalid("governance.approval_timeout_ms must be >= 1".to_string()));
        }
        Ok(())
    }

    /// Converts this document into the orchestrator's
    /// [`hive_orchestrator::ExecutorConfig`] shape.
    #[must_use]
    pub const fn to_executor_config(&self) -> hive_orchestrator::ExecutorConfig {
        hive_orchestrator::ExecutorConfig {
            max_concurrent_tasks: self.max_concurrent_tasks,
            max_retries: self.max_retries,
        }
    }
}

// ============================================================================
// SECTION: LLM
// ============================================================================

/// Default LLM collaborator settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider identifier (e.g. `"openai"`, `"anthropic"`).
    pub provider: String,
    /// Model identifier sent to the provider.
    pub model: String,
    /// Maximum tokens requested per completion.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Override base URL for the provider's API, if not the provider's
    /// default.
    pub api_base: Option<String>,
    /// Ordered fallback models tried if the primary model's budget is
    /// exhausted or the call fails.
    pub fallback_models: Option<Vec<String>>,
    /// Number of transport-level retries before surfacing a failure.
    pub num_retries: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 2048,
            temperature: 0.2,
            api_base: None,
            fallback_models: None,
            num_retries: Some(2),
        }
    }
}

impl LlmConfig {
    /// Validates LLM settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.trim().is_empty() {
            return Err(ConfigError::Invalid("llm.provider must be non-empty".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("llm.model must be non-empty".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid("llm.max_tokens must be >= 1".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid("llm.temperature must be within [0.0, 2.0]".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Auth
// ============================================================================

/// Control-surface authentication settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Whether the control RPC requires an API key. Only meaningful if
    /// the control surface is exposed beyond local process boundaries.
    pub enabled: bool,
    /// Environment variable holding the expected API key; defaults to
    /// [`AUTH_KEY_ENV_VAR`] when unset.
    pub api_key_env: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { enabled: false, api_key_env: None }
    }
}

impl AuthConfig {
    /// Validates auth settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(name) = &self.api_key_env
            && name.trim().is_empty()
        {
            return Err(ConfigError::Invalid("auth.api_key_env must be non-empty when set".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Policy-gate tunables.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Whether irreversible actions require approval even at `Admin`
    /// trust. Defaults to `true` (fail closed).
    pub level3_irreversible_requires_approval: bool,
    /// Per-tool overrides of the default action-class/approval behavior,
    /// keyed by tool name.
    pub tool_overrides: BTreeMap<String, ToolOverride>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self { level3_irreversible_requires_approval: true, tool_overrides: BTreeMap::new() }
    }
}

impl PolicyConfig {
    /// Validates policy settings.
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, _) in &self.tool_overrides {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid("policy.tool_overrides keys must be non-empty".to_string()));
            }
        }
        Ok(())
    }
}

/// An override of the default policy-gate behavior for one named tool.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolOverride {
    /// The action class this tool is treated as, overriding whatever
    /// classification the caller would otherwise assign.
    pub action_class: ActionClass,
    /// When `true`, every invocation of this tool requires approval
    /// regardless of actor trust level.
    #[serde(default)]
    pub always_require_approval: bool,
}

// ============================================================================
// SECTION: Sentinel
// ============================================================================

/// TOML-facing document mirroring [`hive_sentinel::SentinelConfig`]; kept
/// separate so the runtime type can stay free of `serde`/TOML concerns.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SentinelConfigDoc {
    /// See [`hive_sentinel::SentinelConfig::loop_threshold`].
    pub loop_threshold: u32,
    /// See [`hive_sentinel::SentinelConfig::loop_window_ms`].
    pub loop_window_ms: i64,
    /// See [`hive_sentinel::SentinelConfig::runaway_events_per_minute`].
    pub runaway_events_per_minute: u32,
    /// See [`hive_sentinel::SentinelConfig::cost_budget_tokens`].
    pub cost_budget_tokens: u64,
    /// See [`hive_sentinel::SentinelConfig::cost_budget_dollars`].
    pub cost_budget_dollars: Option<f64>,
    /// Minimum acceptable score per named KPI.
    pub kpi_thresholds: BTreeMap<String, f64>,
}

impl Default for SentinelConfigDoc {
    fn default() -> Self {
        let runtime = SentinelConfig::default();
        Self {
            loop_threshold: runtime.loop_threshold,
            loop_window_ms: runtime.loop_window_ms,
            runaway_events_per_minute: runtime.runaway_events_per_minute,
            cost_budget_tokens: runtime.cost_budget_tokens,
            cost_budget_dollars: runtime.cost_budget_dollars,
            kpi_thresholds: runtime.kpi_thresholds,
        }
    }
}

impl SentinelConfigDoc {
    /// Validates Sentinel thresholds.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.loop_threshold == 0 {
            return Err(ConfigError::Invalid("sentinel.loop_threshold must be >= 1".to_string()));
        }
        if self.loop_window_ms <= 0 {
            return Err(ConfigError::Invalid("sentinel.loop_window_ms must be positive".to_string()));
        }
        if self.runaway_events_per_minute == 0 {
            return Err(ConfigError::Invalid(
                "sentinel.runaway_events_per_minute must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Converts this document into a runtime [`SentinelConfig`]. The
    /// document carries no `flagged_tool_actions` field (TOML has no
    /// natural tuple-key representation); the runtime default's flagged
    /// set is preserved unconditionally.
    #[must_use]
    fn into_runtime(self) -> SentinelConfig {
        let defaults = SentinelConfig::default();
        SentinelConfig {
            loop_threshold: self.loop_threshold,
            loop_window_ms: self.loop_window_ms,
            runaway_events_per_minute: self.runaway_events_per_minute,
            cost_budget_tokens: self.cost_budget_tokens,
            cost_budget_dollars: self.cost_budget_dollars,
            flagged_tool_actions: defaults.flagged_tool_actions,
            kpi_thresholds: self.kpi_thresholds,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from an explicit argument, the
/// [`CONFIG_ENV_VAR`] environment variable, or the default filename.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"vault_path = "./vault"
"#
    }

    #[test]
    fn minimal_config_parses_and_validates() {
        let mut config: EngineConfig = toml::from_str(minimal_toml()).expect("parse");
        config.source_modified_at = None;
        assert!(config.validate().is_ok());
        assert_eq!(config.governance.max_concurrent_tasks, 4);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert!(config.policy.level3_irreversible_requires_approval);
    }

    #[test]
    fn zero_max_concurrent_tasks_is_rejected() {
        let mut config: EngineConfig = toml::from_str(minimal_toml()).expect("parse");
        config.governance.max_concurrent_tasks = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn temperature_out_of_range_is_rejected() {
        let mut config: EngineConfig = toml::from_str(minimal_toml()).expect("parse");
        config.llm.temperature = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_and_validates_a_file_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hive.toml");
        fs::write(&path, minimal_toml()).expect("write");
        let config = EngineConfig::load(Some(&path)).expect("load");
        assert_eq!(config.vault_path, PathBuf::from("./vault"));
        assert!(config.source_modified_at.is_some());
    }

    #[test]
    fn load_rejects_oversized_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hive.toml");
        let oversized = format!("vault_path = \"{}\"", "a".repeat(MAX_CONFIG_FILE_SIZE + 1));
        fs::write(&path, oversized).expect("write");
        assert!(EngineConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn sentinel_doc_round_trips_into_a_runtime_config() {
        let doc = SentinelConfigDoc::default();
        let runtime = doc.into_runtime();
        assert_eq!(runtime.loop_threshold, SentinelConfig::default().loop_threshold);
    }

    #[test]
    fn effective_auth_key_is_none_when_disabled() {
        let mut config: EngineConfig = toml::from_str(minimal_toml()).expect("parse");
        config.auth.enabled = false;
        assert!(config.effective_auth_key().is_none());
    }

    #[test]
    fn tool_override_round_trips_through_toml() {
        let doc = r#"vault_path = "./vault"

[policy.tool_overrides.shell_exec]
action_class = "irreversible"
always_require_approval = true
"#;
        let config: EngineConfig = toml::from_str(doc).expect("parse");
        let entry = config.policy.tool_overrides.get("shell_exec").expect("entry present");
        assert_eq!(entry.action_class, ActionClass::Irreversible);
        assert!(entry.always_require_approval);
    }
}
