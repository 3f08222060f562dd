//! Actor progress: the read-side provider and the formatted view clients get.
//!
//! - [`ProgressSource`] - read-only access to materialized snapshots
//! - [`FormattedProgress`] - per-actor progress object, enriched with `invalid` flags
//! - [`update`] - the write path (task completion/failure and actor changes)

pub mod update;

pub use update::{
    ActorUpdate, ActorUpdateOutcome, AppliedUpdate, Refreshed, TaskUpdate, UpdateOutcome,
    apply_actor_update, apply_task_update, build_formatted, commit_actor_update,
    commit_task_update, refresh_formatted,
};

use crate::models::graph::TaskGraph;
use crate::models::{ActorProgressSnapshot, Faction, Task};
use crate::storage::ProgressStore;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Read-only access to actor snapshots for one evaluation pass.
pub trait ProgressSource {
    /// Snapshot for `actor_id`, or `None` when the actor is unknown.
    fn snapshot(&self, actor_id: &str) -> Option<&ActorProgressSnapshot>;
}

impl ProgressSource for BTreeMap<String, ActorProgressSnapshot> {
    fn snapshot(&self, actor_id: &str) -> Option<&ActorProgressSnapshot> {
        self.get(actor_id)
    }
}

impl ProgressSource for HashMap<String, ActorProgressSnapshot> {
    fn snapshot(&self, actor_id: &str) -> Option<&ActorProgressSnapshot> {
        self.get(actor_id)
    }
}

/// Snapshots held in memory, one per actor.
#[derive(Debug, Clone, Default)]
pub struct MemoryProgress {
    actors: BTreeMap<String, ActorProgressSnapshot>,
}

impl MemoryProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, actor_id: impl Into<String>, snapshot: ActorProgressSnapshot) {
        self.actors.insert(actor_id.into(), snapshot);
    }

    pub fn actor_ids(&self) -> impl Iterator<Item = &str> {
        self.actors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}

impl ProgressSource for MemoryProgress {
    fn snapshot(&self, actor_id: &str) -> Option<&ActorProgressSnapshot> {
        self.actors.get(actor_id)
    }
}

impl<K: Into<String>> FromIterator<(K, ActorProgressSnapshot)> for MemoryProgress {
    fn from_iter<I: IntoIterator<Item = (K, ActorProgressSnapshot)>>(iter: I) -> Self {
        Self {
            actors: iter.into_iter().map(|(id, s)| (id.into(), s)).collect(),
        }
    }
}

/// Load the snapshots of `actor_ids` into memory for one evaluation pass.
///
/// Unknown actors are skipped; the evaluator reports them unavailable.
pub fn load_progress<St, S>(store: &St, actor_ids: &[S]) -> Result<MemoryProgress>
where
    St: ProgressStore + ?Sized,
    S: AsRef<str>,
{
    let mut progress = MemoryProgress::new();
    for id in actor_ids {
        let id = id.as_ref();
        match store.load_snapshot(id)? {
            Some(snapshot) => progress.insert(id, snapshot),
            None => tracing::debug!(actor = id, "no snapshot stored"),
        }
    }
    Ok(progress)
}

/// The actor followed by its teammates, without duplicates.
pub fn team_members<St: ProgressStore + ?Sized>(store: &St, actor_id: &str) -> Result<Vec<String>> {
    if store.load_snapshot(actor_id)?.is_none() {
        return Err(Error::NotFound(format!("actor {}", actor_id)));
    }
    let mut members = vec![actor_id.to_string()];
    for mate in store.teammates(actor_id)? {
        if !members.contains(&mate) {
            members.push(mate);
        }
    }
    Ok(members)
}

/// Progress of one task in the formatted view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskProgressEntry {
    pub complete: bool,
    pub failed: bool,
    /// Moot because an exclusive alternative was chosen (or inherited from a predecessor)
    pub invalid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Progress of one objective in the formatted view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectiveProgressEntry {
    pub complete: bool,
    pub invalid: bool,
}

/// Per-actor progress object handed to API consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedProgress {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub level: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faction_name: Option<Faction>,
    pub game_edition_id: u32,
    pub tasks_progress: BTreeMap<String, TaskProgressEntry>,
    pub objectives_progress: BTreeMap<String, ObjectiveProgressEntry>,
}

impl FormattedProgress {
    pub fn is_complete(&self, task_id: &str) -> bool {
        self.tasks_progress.get(task_id).is_some_and(|e| e.complete)
    }

    /// Completed for real rather than closed by failure.
    pub fn is_chosen(&self, task_id: &str) -> bool {
        self.tasks_progress
            .get(task_id)
            .is_some_and(|e| e.complete && !e.failed)
    }

    pub fn is_invalid(&self, task_id: &str) -> bool {
        self.tasks_progress.get(task_id).is_some_and(|e| e.invalid)
    }

    pub fn invalid_tasks(&self) -> impl Iterator<Item = &str> {
        self.tasks_progress
            .iter()
            .filter(|(_, e)| e.invalid)
            .map(|(id, _)| id.as_str())
    }

    pub(crate) fn clear_invalid(&mut self) {
        for entry in self.tasks_progress.values_mut() {
            entry.invalid = false;
        }
        for entry in self.objectives_progress.values_mut() {
            entry.invalid = false;
        }
    }

    pub(crate) fn mark_invalid(&mut self, task: &Task) {
        self.tasks_progress.entry(task.id.clone()).or_default().invalid = true;
        for objective in &task.objectives {
            self.objectives_progress
                .entry(objective.id.clone())
                .or_default()
                .invalid = true;
        }
    }
}

/// Build the formatted view of one actor's snapshot.
///
/// Every task and objective in the graph gets an entry; records for ids the
/// graph does not know are carried over as-is. No `invalid` flags are set
/// here, see [`crate::engine::invalidate_tasks`].
pub fn format_progress(
    actor_id: &str,
    snapshot: &ActorProgressSnapshot,
    graph: &TaskGraph,
) -> FormattedProgress {
    let mut tasks_progress: BTreeMap<String, TaskProgressEntry> = snapshot
        .task_completions
        .iter()
        .map(|(id, record)| {
            let entry = TaskProgressEntry {
                complete: record.complete,
                failed: record.failed,
                invalid: false,
                timestamp: record.timestamp,
            };
            (id.clone(), entry)
        })
        .collect();

    let mut objectives_progress: BTreeMap<String, ObjectiveProgressEntry> = snapshot
        .objective_completions
        .iter()
        .map(|(id, complete)| {
            let entry = ObjectiveProgressEntry {
                complete: *complete,
                invalid: false,
            };
            (id.clone(), entry)
        })
        .collect();

    for (_, task) in graph.iter() {
        tasks_progress.entry(task.id.clone()).or_default();
        for objective in &task.objectives {
            objectives_progress.entry(objective.id.clone()).or_default();
        }
    }

    FormattedProgress {
        user_id: actor_id.to_string(),
        display_name: snapshot.display_name.clone(),
        level: snapshot.level,
        faction_name: snapshot.faction_name.clone(),
        game_edition_id: snapshot.game_edition_id,
        tasks_progress,
        objectives_progress,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActorCompletionRecord, Objective};

    #[test]
    fn test_format_progress_covers_graph_and_extra_records() {
        let mut task = Task::new("a");
        task.objectives = vec![Objective {
            id: "a-obj".to_string(),
            ..Default::default()
        }];
        let graph = TaskGraph::new(vec![task, Task::new("b")]);

        let mut snapshot = ActorProgressSnapshot::new(7, Faction::Bear);
        snapshot.display_name = Some("Sniper".to_string());
        snapshot.task_completions.insert(
            "a".to_string(),
            ActorCompletionRecord {
                complete: true,
                failed: false,
                timestamp: None,
            },
        );
        snapshot
            .task_completions
            .insert("retired".to_string(), ActorCompletionRecord::default());
        snapshot.objective_completions.insert("a-obj".to_string(), true);

        let formatted = format_progress("me", &snapshot, &graph);
        assert_eq!(formatted.user_id, "me");
        assert_eq!(formatted.level, 7);
        assert_eq!(formatted.faction_name, Some(Faction::Bear));
        assert_eq!(formatted.tasks_progress.len(), 3);
        assert!(formatted.is_complete("a"));
        assert!(formatted.is_chosen("a"));
        assert!(!formatted.is_complete("b"));
        assert!(formatted.objectives_progress["a-obj"].complete);
        assert_eq!(formatted.invalid_tasks().count(), 0);
    }

    #[test]
    fn test_formatted_progress_json_shape() {
        let graph = TaskGraph::new(vec![Task::new("a")]);
        let snapshot = ActorProgressSnapshot::new(1, Faction::Usec);
        let formatted = format_progress("me", &snapshot, &graph);
        let json = serde_json::to_value(&formatted).unwrap();

        assert_eq!(json["userId"], "me");
        assert_eq!(json["factionName"], "USEC");
        assert_eq!(json["tasksProgress"]["a"]["invalid"], false);
    }

    #[test]
    fn test_team_members_and_load_progress() {
        let mut store = crate::storage::MemoryStore::new();
        store.save_snapshot("me", &ActorProgressSnapshot::default()).unwrap();
        store.save_snapshot("pal", &ActorProgressSnapshot::default()).unwrap();
        store
            .set_teammates("me", &["pal".to_string(), "me".to_string(), "gone".to_string()])
            .unwrap();

        let members = team_members(&store, "me").unwrap();
        assert_eq!(members, vec!["me", "pal", "gone"]);

        let progress = load_progress(&store, &members).unwrap();
        assert_eq!(progress.len(), 2);
        assert!(progress.snapshot("gone").is_none());

        assert!(matches!(team_members(&store, "nobody"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_memory_progress_source() {
        let progress: MemoryProgress =
            [("x", ActorProgressSnapshot::default())].into_iter().collect();
        assert!(progress.snapshot("x").is_some());
        assert!(progress.snapshot("y").is_none());
        assert_eq!(progress.actor_ids().collect::<Vec<_>>(), vec!["x"]);
    }
}
