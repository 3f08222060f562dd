//! Questline - a quest dependency graph engine.
//!
//! This library provides the core functionality for the `ql` CLI tool:
//! task availability evaluation, the alternative-task invalidation cascade,
//! and the progress storage they run against.

pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod logging;
pub mod models;
pub mod progress;
pub mod storage;

/// Version string with build metadata, shown by `ql --version`.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("QL_GIT_COMMIT"),
    ", built ",
    env!("QL_BUILD_TIMESTAMP"),
    ")"
);

/// Test fixtures shared by unit tests.
#[cfg(test)]
pub(crate) mod test_utils {
    use crate::models::graph::TaskGraph;
    use crate::models::{ActorProgressSnapshot, Faction, Task, TaskRequirement};

    /// A task gated on one predecessor with the given statuses.
    pub fn requiring(id: &str, target: &str, statuses: &[&str]) -> Task {
        let mut task = Task::new(id);
        task.task_requirements = vec![TaskRequirement::new(target, statuses)];
        task
    }

    /// Two mutually exclusive tasks plus one task that needs the second completed.
    pub fn exclusive_pair() -> TaskGraph {
        let mut a = Task::new("a");
        a.alternatives = vec!["b".to_string()];
        let mut b = Task::new("b");
        b.alternatives = vec!["a".to_string()];
        TaskGraph::new(vec![a, b, requiring("after_b", "b", &["complete"])])
    }

    pub fn usec(level: u32) -> ActorProgressSnapshot {
        ActorProgressSnapshot::new(level, Faction::Usec)
    }
}

/// Library-level error type for questline operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Not initialized: run `ql init` first")]
    NotInitialized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid ID: {0}")]
    InvalidId(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for questline operations.
pub type Result<T> = std::result::Result<T, Error>;
