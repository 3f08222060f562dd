//! Storage layer for questline data.
//!
//! A data directory holds everything one deployment needs:
//!
//! ```text
//! <data-dir>/
//!   tasks.json              task catalog (array, or {"tasks": [...]})
//!   teams.json              actor id -> teammate ids
//!   config.kdl              session configuration
//!   progress/<actor>.json   actor snapshots
//!   formatted/<actor>.json  formatted views with invalid flags
//! ```
//!
//! Every write goes through a temp file in the same directory and a rename,
//! so readers never observe a half-written file.

pub mod backend;

pub use backend::{MemoryStore, ProgressStore};

use crate::models::graph::TaskGraph;
use crate::models::{ActorProgressSnapshot, Task};
use crate::progress::FormattedProgress;
use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const TASKS_FILE: &str = "tasks.json";
const TEAMS_FILE: &str = "teams.json";
const CONFIG_FILE: &str = "config.kdl";
const PROGRESS_DIR: &str = "progress";
const FORMATTED_DIR: &str = "formatted";

/// File-backed store rooted at a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open an initialized data directory.
    pub fn open(root: &Path) -> Result<Self> {
        if !Self::exists(root) {
            return Err(Error::NotInitialized);
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Create the directory layout. Existing data is left untouched.
    pub fn init(root: &Path) -> Result<Self> {
        fs::create_dir_all(root.join(PROGRESS_DIR))?;
        fs::create_dir_all(root.join(FORMATTED_DIR))?;
        let store = Self {
            root: root.to_path_buf(),
        };
        if !store.tasks_path().exists() {
            write_json_atomic(&store.tasks_path(), &Vec::<Task>::new())?;
        }
        tracing::debug!(root = %root.display(), "data directory initialized");
        Ok(store)
    }

    pub fn exists(root: &Path) -> bool {
        root.join(PROGRESS_DIR).is_dir()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tasks_path(&self) -> PathBuf {
        self.root.join(TASKS_FILE)
    }

    pub fn teams_path(&self) -> PathBuf {
        self.root.join(TEAMS_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        session_config_path(&self.root)
    }

    fn progress_path(&self, actor_id: &str) -> Result<PathBuf> {
        validate_actor_id(actor_id)?;
        Ok(self.root.join(PROGRESS_DIR).join(format!("{}.json", actor_id)))
    }

    fn formatted_path(&self, actor_id: &str) -> Result<PathBuf> {
        validate_actor_id(actor_id)?;
        Ok(self.root.join(FORMATTED_DIR).join(format!("{}.json", actor_id)))
    }

    /// Load the task catalog. A missing file is an empty catalog.
    pub fn load_tasks(&self) -> Result<Vec<Task>> {
        let path = self.tasks_path();
        if !path.exists() {
            tracing::warn!(path = %path.display(), "no task catalog, using an empty one");
            return Ok(Vec::new());
        }
        parse_tasks(&fs::read_to_string(&path)?)
    }

    pub fn load_graph(&self) -> Result<TaskGraph> {
        Ok(TaskGraph::new(self.load_tasks()?))
    }

    /// Replace the task catalog.
    pub fn save_tasks(&self, tasks: &[Task]) -> Result<()> {
        write_json_atomic(&self.tasks_path(), &tasks)
    }

    fn load_teams(&self) -> Result<BTreeMap<String, Vec<String>>> {
        Ok(read_json(&self.teams_path())?.unwrap_or_default())
    }
}

impl ProgressStore for FileStore {
    fn load_snapshot(&self, actor_id: &str) -> Result<Option<ActorProgressSnapshot>> {
        read_json(&self.progress_path(actor_id)?)
    }

    fn save_snapshot(&mut self, actor_id: &str, snapshot: &ActorProgressSnapshot) -> Result<()> {
        write_json_atomic(&self.progress_path(actor_id)?, snapshot)
    }

    fn load_formatted(&self, actor_id: &str) -> Result<Option<FormattedProgress>> {
        read_json(&self.formatted_path(actor_id)?)
    }

    fn save_formatted(&mut self, actor_id: &str, progress: &FormattedProgress) -> Result<()> {
        write_json_atomic(&self.formatted_path(actor_id)?, progress)
    }

    fn teammates(&self, actor_id: &str) -> Result<Vec<String>> {
        validate_actor_id(actor_id)?;
        Ok(self.load_teams()?.remove(actor_id).unwrap_or_default())
    }

    fn set_teammates(&mut self, actor_id: &str, members: &[String]) -> Result<()> {
        validate_actor_id(actor_id)?;
        for member in members {
            validate_actor_id(member)?;
        }
        let mut teams = self.load_teams()?;
        if members.is_empty() {
            teams.remove(actor_id);
        } else {
            teams.insert(actor_id.to_string(), members.to_vec());
        }
        write_json_atomic(&self.teams_path(), &teams)
    }

    fn actor_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(self.root.join(PROGRESS_DIR))? {
            let path = entry?.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}

/// Actor ids become file names, so only `[A-Za-z0-9_.-]` is accepted.
pub fn validate_actor_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id.len() <= 128
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidId(format!(
            "actor id '{}' must be 1-128 characters of [A-Za-z0-9_.-] and not start with '.'",
            id
        )))
    }
}

/// Default data directory: `~/.local/share/questline` (platform equivalent).
pub fn default_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| Error::Other("Could not determine data directory".to_string()))?;
    Ok(data_dir.join("questline"))
}

/// Path of the session config file inside a data directory.
pub fn session_config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE)
}

/// Parse a task catalog.
///
/// Accepts a bare array, `{"tasks": [...]}` or `{"data": {"tasks": [...]}}`.
/// Entries that are not task objects, or have no id, are skipped with a warning.
pub fn parse_tasks(json: &str) -> Result<Vec<Task>> {
    let root: Value = serde_json::from_str(json)?;
    let entries = match root {
        Value::Array(entries) => entries,
        Value::Object(mut map) => {
            let inner = match map.remove("data") {
                Some(Value::Object(mut data)) => data.remove("tasks"),
                _ => map.remove("tasks"),
            };
            match inner {
                Some(Value::Array(entries)) => entries,
                _ => {
                    return Err(Error::InvalidInput(
                        "task catalog object has no \"tasks\" array".to_string(),
                    ));
                }
            }
        }
        _ => {
            return Err(Error::InvalidInput(
                "task catalog must be an array or an object".to_string(),
            ));
        }
    };

    let mut tasks = Vec::with_capacity(entries.len());
    for (position, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<Task>(entry) {
            Ok(task) if !task.id.is_empty() => tasks.push(task),
            Ok(_) => tracing::warn!(position, "skipping task without an id"),
            Err(e) => tracing::warn!(position, error = %e, "skipping malformed task"),
        }
    }
    Ok(tasks)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::Other(format!("no parent directory for {}", path.display())))?;
    fs::create_dir_all(dir)?;

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut file, value)?;
    file.write_all(b"\n")?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
