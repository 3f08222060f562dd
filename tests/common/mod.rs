//! Common test utilities for questline integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't touch the
//! user's `~/.local/share/questline/` or `~/.config/questline/`.

#![allow(dead_code)]

use assert_cmd::Command;
use serde_json::Value;
pub use tempfile::TempDir;

/// A small catalog covering every kind of gate.
pub const CATALOG: &str = r#"[
  {"id": "debut", "name": "Debut"},
  {"id": "shooting_cans", "minPlayerLevel": 2,
   "taskRequirements": [{"task": {"id": "debut"}, "status": ["complete"]}]},
  {"id": "follow_up", "taskRequirements": [{"task": {"id": "debut"}, "status": ["active"]}]},
  {"id": "veteran", "minPlayerLevel": 10},
  {"id": "usec_only", "factionName": "USEC"},
  {"id": "bear_only", "factionName": "BEAR"},
  {"id": "collector", "eodOnly": true},
  {"id": "prapor_friend", "traderLevelRequirements": [{"trader": {"id": "prapor"}, "level": 2}]},
  {"id": "path_a", "alternatives": ["path_b"],
   "taskRequirements": [{"task": {"id": "debut"}, "status": ["complete"]}]},
  {"id": "path_b", "alternatives": [{"id": "path_a"}],
   "taskRequirements": [{"task": {"id": "debut"}, "status": ["complete"]}]},
  {"id": "after_b", "taskRequirements": [{"task": {"id": "path_b"}, "status": ["complete"]}]},
  {"id": "loop_x", "taskRequirements": [{"task": {"id": "loop_y"}, "status": ["active"]}]},
  {"id": "loop_y", "taskRequirements": [{"task": {"id": "loop_x"}, "status": ["accepted"]}]}
]"#;

/// A test environment with isolated data and config directories.
///
/// The `ql()` method returns a `Command` that sets `QL_DATA_DIR` and
/// `QL_CONFIG_DIR` per-invocation, making tests parallel-safe.
pub struct TestEnv {
    pub work_dir: TempDir,
    pub data_dir: TempDir,
    pub config_dir: TempDir,
}

impl TestEnv {
    /// Create a new test environment with isolated directories.
    pub fn new() -> Self {
        Self {
            work_dir: TempDir::new().unwrap(),
            data_dir: TempDir::new().unwrap(),
            config_dir: TempDir::new().unwrap(),
        }
    }

    /// Create a new test environment initialized with [`CATALOG`].
    pub fn init() -> Self {
        Self::init_with(CATALOG)
    }

    /// Create a new test environment initialized with the given catalog.
    pub fn init_with(catalog: &str) -> Self {
        let env = Self::new();
        let path = env.write_file("catalog.json", catalog);
        env.ql()
            .args(["init", "--tasks"])
            .arg(&path)
            .assert()
            .success();
        env
    }

    /// Get a Command for the ql binary with isolated directories.
    pub fn ql(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_ql"));
        cmd.current_dir(self.work_dir.path());
        cmd.env("QL_DATA_DIR", self.data_dir.path());
        cmd.env("QL_CONFIG_DIR", self.config_dir.path());
        cmd.env_remove("QL_LOG");
        cmd
    }

    /// Run `ql` with `args`, assert success and parse stdout as JSON.
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self.ql().args(args).assert().success().get_output().stdout.clone();
        serde_json::from_slice(&output).unwrap()
    }

    /// Create (or change) an actor.
    pub fn actor(&self, id: &str, extra: &[&str]) {
        self.ql()
            .args(["actor", "set", "--actor", id])
            .args(extra)
            .assert()
            .success();
    }

    /// Task ids available to `actor`, in catalog order (sorted).
    pub fn available(&self, actor: &str) -> Vec<String> {
        let value = self.json(&["available", "--actor", actor]);
        value["actors"][0]["available"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect()
    }

    /// Write a file into the working directory and return its path.
    pub fn write_file(&self, name: &str, content: &str) -> std::path::PathBuf {
        let path = self.work_dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn data_path(&self) -> &std::path::Path {
        self.data_dir.path()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
