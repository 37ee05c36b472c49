// hive-config/src/schema.rs
// ============================================================================
// Module: Config Schema
// Description: JSON schema builder for hive.toml.
// Purpose: Provide a canonical validation schema for config artifacts.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Hand-built JSON Schema for the [`crate::config::EngineConfig`]
//! document, used by `docs.rs` to render field tables and available to
//! external tooling that wants to validate `hive.toml` before deploying
//! it.

use serde_json::Value;
use serde_json::json;

/// Returns the JSON schema for `hive.toml`.
#[must_use]
pub fn config_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "hiveforge://contract/schemas/config.schema.json",
        "title": "HiveForge Engine Configuration",
        "description": "Configuration for a HiveForge engine and its control surface.",
        "type": "object",
        "required": ["vault_path"],
        "properties": {
            "vault_path": {
                "type": "string",
                "description": "Filesystem root for per-scope event logs.",
            },
            "governance": governance_schema(),
            "llm": llm_schema(),
            "auth": auth_schema(),
            "policy": policy_schema(),
            "sentinel": sentinel_schema(),
        },
    })
}

/// Schema fragment for the `governance` table.
fn governance_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "max_retries": {"type": "integer", "minimum": 0},
            "max_concurrent_tasks": {"type": "integer", "minimum": 1},
            "task_timeout_ms": {"type": "integer", "minimum": 1},
            "heartbeat_interval_ms": {"type": "integer", "minimum": 1},
            "approval_timeout_ms": {"type": "integer", "minimum": 1},
            "max_oscillations": {"type": "integer", "minimum": 0},
        },
    })
}

/// Schema fragment for the `llm` table.
fn llm_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "provider": {"type": "string"},
            "model": {"type": "string"},
            "max_tokens": {"type": "integer", "minimum": 1},
            "temperature": {"type": "number", "minimum": 0.0, "maximum": 2.0},
            "api_base": {"type": ["string", "null"]},
            "fallback_models": {"type": ["array", "null"], "items": {"type": "string"}},
            "num_retries": {"type": ["integer", "null"], "minimum": 0},
        },
    })
}

/// Schema fragment for the `auth` table.
fn auth_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "enabled": {"type": "boolean"},
            "api_key_env": {"type": ["string", "null"]},
        },
    })
}

/// Schema fragment for the `policy` table.
fn policy_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "level3_irreversible_requires_approval": {"type": "boolean"},
            "tool_overrides": {
                "type": "object",
                "additionalProperties": {
                    "type": "object",
                    "required": ["action_class"],
                    "properties": {
                        "action_class": {
                            "type": "string",
                            "enum": ["read_only", "reversible", "irreversible"],
                        },
                        "always_require_approval": {"type": "boolean"},
                    },
                },
            },
        },
    })
}

/// Schema fragment for the `sentinel` table.
fn sentinel_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "loop_threshold": {"type": "integer", "minimum": 1},
            "loop_window_ms": {"type": "integer", "minimum": 1},
            "runaway_events_per_minute": {"type": "integer", "minimum": 1},
            "cost_budget_tokens": {"type": "integer", "minimum": 0},
            "cost_budget_dollars": {"type": ["number", "null"]},
            "kpi_thresholds": {"type": "object", "additionalProperties": {"type": "number"}},
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_declares_vault_path_as_required() {
        let schema = config_schema();
        let required = schema["required"].as_array().expect("required array");
        assert!(required.iter().any(|v| v == "vault_path"));
    }

    #[test]
    fn schema_covers_every_top_level_section() {
        let schema = config_schema();
        let properties = schema["properties"].as_object().expect("properties object");
        for key in ["vault_path", "governance", "llm", "auth", "policy", "sentinel"] {
            assert!(properties.contains_key(key), "missing schema section: {key}");
        }
    }
}
