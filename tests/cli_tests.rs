// End-to-end tests for the project-workflow binary

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::PathBuf;
use tempfile::TempDir;

use project_workflow::config::WorkflowConfig;

/// Config file in `home` storing snapshots under `home/projects`
fn write_config(home: &TempDir) -> PathBuf {
    let mut config = WorkflowConfig::default();
    config.storage.state_dir = home.path().join("projects");
    config.observability.log_level = "warn".to_string();
    config.observability.json_logs = false;

    let path = home.path().join("project-workflow.toml");
    config.save_to_file(&path).unwrap();
    path
}

fn cli(home: &TempDir) -> Command {
    let config = write_config(home);
    let mut cmd = Command::cargo_bin("project-workflow").unwrap();
    cmd.current_dir(home.path()).arg("--config").arg(config);
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn test_stages_lists_main_and_side_stages() {
    let home = TempDir::new().unwrap();
    cli(&home)
        .arg("stages")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"party_wall\""))
        .stdout(predicate::str::contains("Contractor Selection"))
        .stdout(predicate::str::contains("\"on_hold\""));
}

#[test]
fn test_unknown_stage_offers_common_actions_only() {
    let home = TempDir::new().unwrap();
    let output = cli(&home)
        .args(["actions", "--stage", "demolition", "--role", "contractor"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let listing = stdout_json(&output);
    let actions: Vec<&str> = listing["actions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, vec!["send_message", "upload_document"]);
}

#[test]
fn test_create_invite_and_transition() {
    let home = TempDir::new().unwrap();

    let output = cli(&home)
        .args([
            "create",
            "--owner",
            "homeowner-1",
            "--type",
            "loft_conversion",
            "--address",
            "12 Acacia Avenue",
            "--city",
            "Leeds",
            "--postcode",
            "ls6 2ab",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let created = stdout_json(&output);
    assert_eq!(created["request"]["property"]["postcode"], "LS6 2AB");
    assert_eq!(created["state"]["title"], "Loft Conversion at 12 Acacia Avenue");
    assert!(created["request"]["budget_range"].is_null());
    let project_id = created["state"]["project_id"].as_str().unwrap().to_string();

    // No assessor yet
    cli(&home)
        .args(["transition", &project_id, "--to", "planning_assessment"])
        .args(["--user", "homeowner-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("assessor_required"));

    cli(&home)
        .args(["invite", &project_id, "--user", "architect-1", "--role", "architect"])
        .args(["--actor", "homeowner-1"])
        .assert()
        .success();

    let output = cli(&home)
        .args(["transition", &project_id, "--to", "planning_assessment"])
        .args(["--user", "homeowner-1"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let report = stdout_json(&output);
    assert_eq!(report["saved"], true);
    assert_eq!(report["outcome"]["transition"], "advance");

    let output = cli(&home).args(["show", &project_id]).output().unwrap();
    let shown = stdout_json(&output);
    assert_eq!(shown["state"]["current_stage"], "planning_assessment");
    assert_eq!(shown["stage_label"], "Planning Assessment");
    assert_eq!(shown["state"]["version"], 3);

    cli(&home)
        .args(["transition", &project_id, "--to", "completion"])
        .args(["--user", "homeowner-1", "--force"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no transition"));
}

#[test]
fn test_invalid_postcode_fails_create() {
    let home = TempDir::new().unwrap();
    cli(&home)
        .args(["create", "--owner", "homeowner-1", "--type", "extension"])
        .args(["--address", "1 High Street", "--city", "York", "--postcode", "90210"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a valid UK postcode"));
}
