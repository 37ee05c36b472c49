// hive-cli/tests/control_commands.rs
// ============================================================================
// Module: CLI Integration Tests
// Description: Exercises the `hive` binary's Control RPC subcommands end
//              to end against a temporary vault.
// Purpose: Catch wiring mistakes between clap's argument parsing and the
//          underlying `hive_control::Engine` calls that unit tests inside
//          the library crates cannot see.
// ============================================================================

use assert_cmd::Command;
use predicates::str::contains;

fn hive(vault: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("hive").expect("hive binary builds");
    cmd.arg("--vault-path").arg(vault);
    cmd
}

fn json_field(output: &[u8], field: &str) -> String {
    let value: serde_json::Value = serde_json::from_slice(output).expect("command prints JSON");
    value[field].as_str().expect("field is a string").to_string()
}

#[test]
fn hive_lifecycle_creates_and_closes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let created = hive(dir.path()).args(["hive", "create", "acme"]).assert().success();
    let hive_id = json_field(&created.get_output().stdout, "hive_id");

    hive(dir.path())
        .args(["--trust-level", "admin", "hive", "close", &hive_id])
        .assert()
        .success()
        .stdout(contains("closed"));
}

#[test]
fn colony_and_run_lifecycle_completes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let hive_out = hive(dir.path()).args(["hive", "create", "acme"]).assert().success();
    let hive_id = json_field(&hive_out.get_output().stdout, "hive_id");

    let colony_out = hive(dir.path())
        .args(["--trust-level", "admin", "colony", "create", &hive_id, "ops"])
        .assert()
        .success();
    let colony_id = json_field(&colony_out.get_output().stdout, "colony_id");

    hive(dir.path()).args(["--trust-level", "trusted", "colony", "start", &colony_id]).assert().success();

    let run_out = hive(dir.path())
        .args(["run", "start", "clean up the warehouse", "--colony-id", &colony_id])
        .assert()
        .success();
    let run_id = json_field(&run_out.get_output().stdout, "run_id");

    hive(dir.path())
        .args(["--trust-level", "trusted", "run", "complete", &run_id])
        .assert()
        .success()
        .stdout(contains("completed"));
}

#[test]
fn task_lifecycle_read_only_requires_no_approval() {
    let dir = tempfile::tempdir().expect("tempdir");
    let run_out = hive(dir.path()).args(["run", "start", "inspect the logs"]).assert().success();
    let run_id = json_field(&run_out.get_output().stdout, "run_id");

    let task_out = hive(dir.path())
        .args(["task", "create", &run_id, "read the access log"])
        .assert()
        .success();
    let task_id = json_field(&task_out.get_output().stdout, "task_id");

    hive(dir.path())
        .args(["task", "assign", &run_id, &task_id, "agent-7"])
        .assert()
        .success()
        .stdout(contains("assigned"));
    hive(dir.path()).args(["task", "progress", &run_id, &task_id, "50"]).assert().success();
    hive(dir.path()).args(["task", "complete", &run_id, &task_id]).assert().success().stdout(contains("completed"));
}

#[test]
fn requirement_create_and_resolve_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let run_out = hive(dir.path()).args(["run", "start", "ship the release"]).assert().success();
    let run_id = json_field(&run_out.get_output().stdout, "run_id");

    let req_out = hive(dir.path())
        .args(["requirement", "create", &run_id, "confirm the release window"])
        .assert()
        .success();
    let requirement_id = json_field(&req_out.get_output().stdout, "requirement_id");

    hive(dir.path())
        .args(["requirement", "resolve", &run_id, &requirement_id, "--approve"])
        .assert()
        .success()
        .stdout(contains("approved"));
}

#[test]
fn events_list_reflects_appended_events() {
    let dir = tempfile::tempdir().expect("tempdir");
    let run_out = hive(dir.path()).args(["run", "start", "audit the vault"]).assert().success();
    let run_id = json_field(&run_out.get_output().stdout, "run_id");

    hive(dir.path())
        .args(["events", "list", &run_id])
        .assert()
        .success()
        .stdout(contains("run.started"));
}

#[test]
fn unknown_run_is_a_clean_failure_not_a_panic() {
    let dir = tempfile::tempdir().expect("tempdir");
    hive(dir.path()).args(["events", "list", "run-does-not-exist"]).assert().failure();
}

#[test]
fn malformed_actor_flag_is_rejected_before_touching_the_vault() {
    let dir = tempfile::tempdir().expect("tempdir");
    hive(dir.path()).args(["--actor", "not-a-valid-actor", "run", "start", "goal"]).assert().failure();
}

#[test]
fn demo_command_drives_the_full_pipeline() {
    let dir = tempfile::tempdir().expect("tempdir");
    hive(dir.path())
        .args(["demo", "demonstrate the pipeline end to end"])
        .assert()
        .success()
        .stdout(contains("run_id"));
}
