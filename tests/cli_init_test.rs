//! Integration tests for initialization, catalog import and actors via CLI.

mod common;

use common::{CATALOG, TestEnv};
use predicates::prelude::*;

// === Init ===

#[test]
fn test_init_creates_data_dir() {
    let env = TestEnv::new();

    let value = env.json(&["init"]);
    assert_eq!(value["created"], true);
    assert_eq!(value["tasks"], 0);
    assert!(env.data_path().join("progress").is_dir());
    assert!(env.data_path().join("formatted").is_dir());
    assert!(env.data_path().join("tasks.json").is_file());
}

#[test]
fn test_init_twice_keeps_catalog() {
    let env = TestEnv::init();

    let value = env.json(&["init"]);
    assert_eq!(value["created"], false);
    assert_eq!(value["tasks"], 13);
}

#[test]
fn test_init_human_output() {
    let env = TestEnv::new();

    env.ql()
        .args(["-H", "init"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Initialized"));
}

#[test]
fn test_init_with_explicit_data_dir_flag() {
    let env = TestEnv::new();
    let elsewhere = env.work_dir.path().join("elsewhere");

    env.ql()
        .arg("--data-dir")
        .arg(&elsewhere)
        .arg("init")
        .assert()
        .success();
    assert!(elsewhere.join("progress").is_dir());
    assert!(!env.data_path().join("progress").exists());
}

#[test]
fn test_command_before_init_fails() {
    let env = TestEnv::new();

    env.ql()
        .args(["tasks", "list"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains(r#"{"error":"Not initialized"#));
}

#[test]
fn test_version_includes_build_metadata() {
    let env = TestEnv::new();

    env.ql()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("built"));
}

// === Tasks ===

#[test]
fn test_tasks_list() {
    let env = TestEnv::init();

    let value = env.json(&["tasks", "list"]);
    let tasks = value["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 13);

    let shooting = tasks.iter().find(|t| t["id"] == "shooting_cans").unwrap();
    assert_eq!(shooting["min_level"], 2);
    assert_eq!(shooting["requires"], serde_json::json!(["debut"]));

    let path_b = tasks.iter().find(|t| t["id"] == "path_b").unwrap();
    assert_eq!(path_b["alternatives"], serde_json::json!(["path_a"]));
}

#[test]
fn test_tasks_import_api_envelope() {
    let env = TestEnv::init();
    let file = env.write_file(
        "api.json",
        r#"{"data": {"tasks": [
            {"id": "one", "minPlayerLevel": "3"},
            {"id": "two", "taskRequirements": [{"task": {"id": "one"}, "status": ["complete"]}]},
            {"name": "no id, skipped"}
        ]}}"#,
    );

    let output = env.ql().args(["tasks", "import"]).arg(&file).assert().success();
    let value: serde_json::Value = serde_json::from_slice(&output.get_output().stdout).unwrap();
    assert_eq!(value["tasks"], 2);
    assert_eq!(value["cycles"], 0);
    assert_eq!(value["dangling"], 0);

    let list = env.json(&["tasks", "list"]);
    assert_eq!(list["tasks"].as_array().unwrap().len(), 2);
}

#[test]
fn test_tasks_import_refreshes_actors() {
    let env = TestEnv::init();
    env.actor("me", &["--level", "5", "--faction", "USEC"]);
    let file = env.write_file("small.json", r#"[{"id": "only"}]"#);

    let output = env.ql().args(["tasks", "import"]).arg(&file).assert().success();
    let value: serde_json::Value = serde_json::from_slice(&output.get_output().stdout).unwrap();
    assert_eq!(value["refreshed"], 1);

    let progress = env.json(&["progress", "--actor", "me"]);
    assert!(progress["progress"]["tasksProgress"]["only"].is_object());
    assert!(progress["progress"]["tasksProgress"].get("debut").is_none());
}

#[test]
fn test_tasks_import_invalid_json() {
    let env = TestEnv::init();
    let file = env.write_file("broken.json", "{not json");

    env.ql()
        .args(["tasks", "import"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_init_imports_catalog() {
    let env = TestEnv::new();
    let file = env.write_file("catalog.json", CATALOG);

    let output = env.ql().args(["init", "--tasks"]).arg(&file).assert().success();
    let value: serde_json::Value = serde_json::from_slice(&output.get_output().stdout).unwrap();
    assert_eq!(value["tasks"], 13);
}

// === Actors and Teams ===

#[test]
fn test_actor_set_creates_then_updates() {
    let env = TestEnv::init();

    let value = env.json(&["actor", "set", "--actor", "me", "--level", "4", "--faction", "usec"]);
    assert_eq!(value["created"], true);
    assert_eq!(value["snapshot"]["level"], 4);
    assert_eq!(value["snapshot"]["factionName"], "USEC");

    let value = env.json(&[
        "actor", "set", "--actor", "me", "--name", "Scav", "--standing", "prapor=0.25",
    ]);
    assert_eq!(value["created"], false);
    assert_eq!(value["snapshot"]["level"], 4);
    assert_eq!(value["snapshot"]["displayName"], "Scav");
    assert_eq!(value["snapshot"]["traderStandings"]["prapor"], 0.25);
}

#[test]
fn test_actor_set_rejects_bad_values() {
    let env = TestEnv::init();

    env.ql()
        .args(["actor", "set", "--actor", "me", "--faction", "scav"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid input"));

    env.ql()
        .args(["actor", "set", "--actor", "me", "--loyalty", "prapor"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("TRADER=VALUE"));
}

#[test]
fn test_actor_show_and_list() {
    let env = TestEnv::init();
    env.actor("zed", &["--level", "2"]);
    env.actor("amy", &["--level", "3"]);

    let value = env.json(&["actor", "list"]);
    assert_eq!(value["actors"], serde_json::json!(["amy", "zed"]));

    let value = env.json(&["actor", "show", "--actor", "amy"]);
    assert_eq!(value["snapshot"]["level"], 3);
    assert!(value.get("created").is_none());

    env.ql()
        .args(["actor", "show", "--actor", "nobody"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not found"));
}

#[test]
fn test_team_set_and_show() {
    let env = TestEnv::init();
    env.actor("me", &["--level", "1"]);
    env.actor("pal", &["--level", "1"]);

    let value = env.json(&["team", "set", "--actor", "me", "pal"]);
    assert_eq!(value["members"], serde_json::json!(["me", "pal"]));

    let value = env.json(&["team", "show", "--actor", "me"]);
    assert_eq!(value["members"], serde_json::json!(["me", "pal"]));
}
