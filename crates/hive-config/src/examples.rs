// hive-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payload.
// Purpose: Deterministic example for docs and tooling.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example `hive.toml`, kept in sync with [`crate::schema`] and
//! used both in generated docs and as a starting point for new
//! deployments.

/// Returns a canonical example `hive.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"vault_path = "/var/lib/hiveforge/vault"

[governance]
max_retries = 2
max_concurrent_tasks = 4
task_timeout_ms = 300000
heartbeat_interval_ms = 60000
approval_timeout_ms = 900000
max_oscillations = 3

[llm]
provider = "openai"
model = "gpt-4o-mini"
max_tokens = 2048
temperature = 0.2
fallback_models = ["gpt-4o"]
num_retries = 2

[auth]
enabled = false

[policy]
level3_irreversible_requires_approval = true

[policy.tool_overrides.shell_exec]
action_class = "irreversible"
always_require_approval = true

[sentinel]
loop_threshold = 5
loop_window_ms = 600000
runaway_events_per_minute = 500
cost_budget_tokens = 1000000

[sentinel.kpi_thresholds]
incident_rate = 0.5
"#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    #[test]
    fn example_parses_and_validates() {
        let config: EngineConfig = toml::from_str(&config_toml_example()).expect("parse example");
        assert!(config.validate().is_ok());
    }
}
