// hive-config/tests/config_documents.rs
// ============================================================================
// Module: Config Document Integration Tests
// Description: End-to-end parsing and validation of whole `hive.toml`
//              documents, as opposed to `config.rs`'s unit tests which
//              exercise one field at a time.
// Purpose: Catch drift between the canonical example, the schema, and the
//          validation rules when they are all exercised together.
// ============================================================================

use std::fs;

use hive_config::EngineConfig;
use hive_config::config_toml_example;

fn write_doc(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("hive.toml");
    fs::write(&path, body).expect("write fixture");
    path
}

#[test]
fn canonical_example_loads_from_disk_and_validates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_doc(&dir, &config_toml_example());
    let config = EngineConfig::load(Some(&path)).expect("load canonical example");
    assert_eq!(config.llm.provider, "openai");
    assert_eq!(config.governance.max_retries, 2);
    assert!(!config.auth.enabled);
    assert!(config.policy.tool_overrides.contains_key("shell_exec"));
}

#[test]
fn full_document_with_every_section_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let doc = r#"vault_path = "/tmp/hiveforge-vault"

[governance]
max_retries = 5
max_concurrent_tasks = 8
task_timeout_ms = 120000
heartbeat_interval_ms = 30000
approval_timeout_ms = 600000
max_oscillations = 2

[llm]
provider = "anthropic"
model = "claude-test"
max_tokens = 4096
temperature = 0.5
api_base = "https://example.invalid/v1"
fallback_models = ["claude-fallback"]
num_retries = 3

[auth]
enabled = true
api_key_env = "HIVE_TEST_AUTH_KEY"

[policy]
level3_irreversible_requires_approval = false

[policy.tool_overrides.browser_navigate]
action_class = "reversible"
always_require_approval = false

[policy.tool_overrides.shell_exec]
action_class = "irreversible"
always_require_approval = true

[sentinel]
loop_threshold = 3
loop_window_ms = 120000
runaway_events_per_minute = 200
cost_budget_tokens = 500000
cost_budget_dollars = 10.0

[sentinel.kpi_thresholds]
incident_rate = 0.25
"#;
    let path = write_doc(&dir, doc);
    let config = EngineConfig::load(Some(&path)).expect("load full document");

    assert_eq!(config.governance.max_retries, 5);
    assert_eq!(config.llm.provider, "anthropic");
    assert!(config.auth.enabled);
    assert_eq!(config.auth.api_key_env.as_deref(), Some("HIVE_TEST_AUTH_KEY"));
    assert!(!config.policy.level3_irreversible_requires_approval);

    let browser = config.policy.tool_overrides.get("browser_navigate").expect("browser override present");
    assert!(!browser.always_require_approval);

    let shell = config.policy.tool_overrides.get("shell_exec").expect("shell override present");
    assert!(shell.always_require_approval);

    let sentinel = config.to_sentinel_config();
    assert_eq!(sentinel.loop_threshold, 3);
    assert_eq!(sentinel.kpi_thresholds.get("incident_rate").copied(), Some(0.25));
}

#[test]
fn negative_cost_budget_dollars_is_accepted_as_unvalidated_field() {
    // `validate()` only checks loop_threshold/loop_window_ms/runaway rate;
    // cost_budget_dollars has no documented lower bound in spec.md §6, so a
    // zero budget (effectively "no dollar ceiling tracked") must still load.
    let dir = tempfile::tempdir().expect("tempdir");
    let doc = "vault_path = \"./vault\"\n\n[sentinel]\ncost_budget_dollars = 0.0\n";
    let path = write_doc(&dir, doc);
    let config = EngineConfig::load(Some(&path)).expect("load");
    assert_eq!(config.sentinel.cost_budget_dollars, Some(0.0));
}

#[test]
fn zero_loop_threshold_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let doc = "vault_path = \"./vault\"\n\n[sentinel]\nloop_threshold = 0\n";
    let path = write_doc(&dir, doc);
    let err = EngineConfig::load(Some(&path)).expect_err("zero loop_threshold must fail validation");
    assert!(err.to_string().contains("loop_threshold"));
}

#[test]
fn empty_tool_override_name_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let doc = r#"vault_path = "./vault"

[policy.tool_overrides.""]
action_class = "reversible"
"#;
    let path = write_doc(&dir, doc);
    // TOML itself tolerates an empty quoted key; validation must still
    // reject it rather than let a nameless policy override through.
    let err = EngineConfig::load(Some(&path)).expect_err("empty tool name must fail validation");
    assert!(err.to_string().contains("tool_overrides"));
}

#[test]
fn missing_required_vault_path_fails_to_parse() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_doc(&dir, "[governance]\nmax_retries = 1\n");
    assert!(EngineConfig::load(Some(&path)).is_err());
}

#[test]
fn nonexistent_config_path_is_an_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("does-not-exist.toml");
    assert!(EngineConfig::load(Some(&missing)).is_err());
}
