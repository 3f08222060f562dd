//! Integration tests for the progress write path via CLI.
//!
//! These tests verify that `ql update` keeps the formatted view consistent:
//! - completing a task closes its alternatives
//! - closed alternatives and their dependents are flagged invalid
//! - uncompleting reopens what the completion closed

mod common;

use common::TestEnv;
use predicates::prelude::*;
use serde_json::Value;

fn ids(value: &Value) -> Vec<String> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

/// Initialized env with a level 10 USEC actor `me` who completed `debut`.
fn started() -> TestEnv {
    let env = TestEnv::init();
    env.actor("me", &["--level", "10", "--faction", "USEC"]);
    env.ql()
        .args(["update", "debut", "--actor", "me", "--status", "complete"])
        .assert()
        .success();
    env
}

#[test]
fn test_update_complete_records_task() {
    let env = started();

    let value = env.json(&["progress", "--actor", "me"]);
    let debut = &value["progress"]["tasksProgress"]["debut"];
    assert_eq!(debut["complete"], true);
    assert_eq!(debut["failed"], false);
    assert_eq!(debut["invalid"], false);
    assert!(debut["timestamp"].is_string());
}

#[test]
fn test_update_complete_closes_alternative() {
    let env = started();

    let value = env.json(&["update", "path_a", "--actor", "me", "--status", "complete"]);
    assert_eq!(value["actor"], "me");
    assert_eq!(value["task"], "path_a");
    assert_eq!(value["update"], "complete");
    assert_eq!(ids(&value["closed_alternatives"]), vec!["path_b"]);

    let invalid = ids(&value["invalid_tasks"]);
    assert!(invalid.contains(&"path_b".to_string()));
    assert!(invalid.contains(&"after_b".to_string()));
    assert!(!invalid.contains(&"path_a".to_string()));
    assert!(value["invalidation"]["propagated"].as_u64().unwrap() >= 1);
}

#[test]
fn test_progress_shows_invalid_tasks() {
    let env = started();
    env.ql()
        .args(["update", "path_a", "--actor", "me", "--status", "complete"])
        .assert()
        .success();

    let value = env.json(&["progress", "--actor", "me"]);
    assert_eq!(value["refreshed"], false);
    let tasks = &value["progress"]["tasksProgress"];
    assert_eq!(tasks["path_a"]["complete"], true);
    assert_eq!(tasks["path_b"]["failed"], true);
    assert_eq!(tasks["path_b"]["complete"], false);
    assert_eq!(tasks["path_b"]["invalid"], true);
    assert_eq!(tasks["after_b"]["invalid"], true);
    // USEC actors never see BEAR tasks as valid
    assert_eq!(tasks["bear_only"]["invalid"], true);
    assert_eq!(tasks["usec_only"]["invalid"], false);
}

#[test]
fn test_progress_reflects_snapshot_changed_outside_updates() {
    let env = started();
    let snapshot_path = env.data_path().join("progress").join("me.json");
    let formatted_path = env.data_path().join("formatted").join("me.json");
    let stored_before = std::fs::read_to_string(&formatted_path).unwrap();

    let mut snapshot: Value = serde_json::from_str(&std::fs::read_to_string(&snapshot_path).unwrap()).unwrap();
    snapshot["taskCompletions"]["path_a"] = serde_json::json!({"complete": true});
    std::fs::write(&snapshot_path, snapshot.to_string()).unwrap();

    let value = env.json(&["progress", "--actor", "me"]);
    assert_eq!(value["refreshed"], false);
    let tasks = &value["progress"]["tasksProgress"];
    assert_eq!(tasks["path_a"]["complete"], true);
    assert_eq!(tasks["path_b"]["invalid"], true);
    assert_eq!(tasks["after_b"]["invalid"], true);
    // A plain read leaves the stored view alone
    assert_eq!(std::fs::read_to_string(&formatted_path).unwrap(), stored_before);

    env.json(&["progress", "--actor", "me", "--refresh"]);
    let stored: Value = serde_json::from_str(&std::fs::read_to_string(&formatted_path).unwrap()).unwrap();
    assert_eq!(stored["tasksProgress"]["path_b"]["invalid"], true);
}

#[test]
fn test_progress_refresh_rebuilds() {
    let env = started();

    let value = env.json(&["progress", "--actor", "me", "--refresh"]);
    assert_eq!(value["refreshed"], true);
    assert_eq!(value["progress"]["userId"], "me");
    assert_eq!(value["progress"]["level"], 10);
}

#[test]
fn test_update_uncomplete_reopens_alternative() {
    let env = started();
    env.ql()
        .args(["update", "path_a", "--actor", "me", "--status", "complete"])
        .assert()
        .success();

    let value = env.json(&["update", "path_a", "--actor", "me", "--status", "uncomplete"]);
    assert_eq!(ids(&value["reopened_alternatives"]), vec!["path_b"]);
    let invalid = ids(&value["invalid_tasks"]);
    assert!(!invalid.contains(&"path_b".to_string()));
    assert!(!invalid.contains(&"after_b".to_string()));

    let available = env.available("me");
    assert!(available.contains(&"path_a".to_string()));
    assert!(available.contains(&"path_b".to_string()));
}

#[test]
fn test_update_completed_alternative_unlocks_dependent() {
    let env = started();
    env.ql()
        .args(["update", "path_b", "--actor", "me", "--status", "done"])
        .assert()
        .success();

    assert!(env.available("me").contains(&"after_b".to_string()));
    let value = env.json(&["progress", "--actor", "me"]);
    assert_eq!(value["progress"]["tasksProgress"]["after_b"]["invalid"], false);
    assert_eq!(value["progress"]["tasksProgress"]["path_a"]["invalid"], true);
}

#[test]
fn test_update_failed() {
    let env = started();

    let value = env.json(&["update", "veteran", "--actor", "me", "--status", "failed"]);
    assert_eq!(value["update"], "failed");

    let value = env.json(&["progress", "--actor", "me"]);
    let veteran = &value["progress"]["tasksProgress"]["veteran"];
    assert_eq!(veteran["failed"], true);
    assert_eq!(veteran["complete"], true);
}

#[test]
fn test_update_human_output() {
    let env = started();

    env.ql()
        .args(["-H", "update", "path_a", "--actor", "me", "--status", "complete"])
        .assert()
        .success()
        .stdout(predicate::str::contains("me: path_a -> complete"))
        .stdout(predicate::str::contains("closed: path_b"));
}

// === Errors ===

#[test]
fn test_update_bad_status() {
    let env = started();

    env.ql()
        .args(["update", "path_a", "--actor", "me", "--status", "maybe"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid input"));
}

#[test]
fn test_update_unknown_task() {
    let env = started();

    env.ql()
        .args(["update", "no_such_task", "--actor", "me", "--status", "complete"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not found"));
}

#[test]
fn test_update_unknown_actor() {
    let env = TestEnv::init();

    env.ql()
        .args(["update", "debut", "--actor", "ghost", "--status", "complete"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not found"));
}

#[test]
fn test_progress_unknown_actor_human_error() {
    let env = TestEnv::init();

    env.ql()
        .args(["-H", "progress", "--actor", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("Error: Not found"));
}
