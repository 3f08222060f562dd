//! The write path for actor progress.
//!
//! Every mutation persists the snapshot first and then re-derives the
//! formatted view, including the invalidation cascade. The second step is
//! best-effort: a failure there is logged and reported as `refreshed: None`
//! but never undoes the primary write.

use super::{FormattedProgress, format_progress};
use crate::engine::{InvalidationSummary, invalidate_tasks};
use crate::models::graph::TaskGraph;
use crate::models::{ActorCompletionRecord, ActorProgressSnapshot, Faction};
use crate::storage::ProgressStore;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A change to one task's completion state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskUpdate {
    Complete,
    Failed,
    Uncomplete,
}

impl TaskUpdate {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "complete" | "completed" | "done" => Ok(Self::Complete),
            "failed" | "fail" => Ok(Self::Failed),
            "uncomplete" | "uncompleted" | "reset" | "open" => Ok(Self::Uncomplete),
            other => Err(Error::InvalidInput(format!(
                "unknown task status '{}' (expected complete, failed or uncomplete)",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Uncomplete => "uncomplete",
        }
    }
}

impl std::fmt::Display for TaskUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What [`apply_task_update`] changed in the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedUpdate {
    pub task: String,
    pub update: TaskUpdate,
    /// Alternatives closed as failed by this completion
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub closed_alternatives: Vec<String>,
    /// Alternatives reopened because this task was uncompleted
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reopened_alternatives: Vec<String>,
}

/// Formatted view rebuilt after a write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Refreshed {
    pub progress: FormattedProgress,
    pub summary: InvalidationSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateOutcome {
    pub applied: AppliedUpdate,
    pub refreshed: Option<Refreshed>,
}

/// Apply a task status change to a snapshot in place.
///
/// Completing a task closes its untouched alternatives (failed, not
/// complete). Uncompleting reopens alternatives closed that way and clears
/// the task's objectives. Alternatives completed or failed on their own are
/// left alone.
pub fn apply_task_update(
    snapshot: &mut ActorProgressSnapshot,
    graph: &TaskGraph,
    task_id: &str,
    update: TaskUpdate,
    now: DateTime<Utc>,
) -> Result<AppliedUpdate> {
    let task = graph
        .get(task_id)
        .ok_or_else(|| Error::NotFound(format!("task {}", task_id)))?;

    let mut applied = AppliedUpdate {
        task: task.id.clone(),
        update,
        closed_alternatives: Vec::new(),
        reopened_alternatives: Vec::new(),
    };

    match update {
        TaskUpdate::Complete => {
            snapshot
                .task_completions
                .insert(task.id.clone(), ActorCompletionRecord::completed(now));
            for objective in &task.objectives {
                snapshot.objective_completions.insert(objective.id.clone(), true);
            }
            for alt in &task.alternatives {
                if snapshot.record(alt).is_some_and(|r| r.complete || r.failed) {
                    continue;
                }
                snapshot
                    .task_completions
                    .insert(alt.clone(), ActorCompletionRecord::closed(now));
                applied.closed_alternatives.push(alt.clone());
            }
        }
        TaskUpdate::Failed => {
            snapshot
                .task_completions
                .insert(task.id.clone(), ActorCompletionRecord::failed(now));
        }
        TaskUpdate::Uncomplete => {
            snapshot.task_completions.remove(&task.id);
            for objective in &task.objectives {
                snapshot.objective_completions.remove(&objective.id);
            }
            for alt in &task.alternatives {
                if snapshot.record(alt).is_some_and(|r| r.is_closed()) {
                    snapshot.task_completions.remove(alt);
                    applied.reopened_alternatives.push(alt.clone());
                }
            }
        }
    }

    Ok(applied)
}

/// Rebuild and store the formatted view for one actor.
pub fn refresh_formatted<St: ProgressStore + ?Sized>(
    store: &mut St,
    graph: &TaskGraph,
    actor_id: &str,
) -> Result<Refreshed> {
    let snapshot = store
        .load_snapshot(actor_id)?
        .ok_or_else(|| Error::NotFound(format!("actor {}", actor_id)))?;

    let refreshed = build_formatted(&snapshot, graph, actor_id);
    store.save_formatted(actor_id, &refreshed.progress)?;
    Ok(refreshed)
}

/// Formatted view of `snapshot` with the invalidation cascade applied.
pub fn build_formatted(snapshot: &ActorProgressSnapshot, graph: &TaskGraph, actor_id: &str) -> Refreshed {
    let mut progress = format_progress(actor_id, snapshot, graph);
    let summary = invalidate_tasks(&mut progress, graph, snapshot.faction_name.as_ref(), actor_id);
    Refreshed { progress, summary }
}

fn refresh_best_effort<St: ProgressStore + ?Sized>(
    store: &mut St,
    graph: &TaskGraph,
    actor_id: &str,
) -> Option<Refreshed> {
    match refresh_formatted(store, graph, actor_id) {
        Ok(refreshed) => Some(refreshed),
        Err(e) => {
            tracing::warn!(actor = actor_id, error = %e, "failed to refresh formatted progress");
            None
        }
    }
}

/// Persist a task status change, then refresh the actor's formatted view.
pub fn commit_task_update<St: ProgressStore + ?Sized>(
    store: &mut St,
    graph: &TaskGraph,
    actor_id: &str,
    task_id: &str,
    update: TaskUpdate,
) -> Result<UpdateOutcome> {
    let mut snapshot = store
        .load_snapshot(actor_id)?
        .ok_or_else(|| Error::NotFound(format!("actor {}", actor_id)))?;

    let applied = apply_task_update(&mut snapshot, graph, task_id, update, Utc::now())?;
    store.save_snapshot(actor_id, &snapshot)?;
    tracing::info!(
        actor = actor_id,
        task = task_id,
        update = %update,
        closed = applied.closed_alternatives.len(),
        reopened = applied.reopened_alternatives.len(),
        "task update saved"
    );

    let refreshed = refresh_best_effort(store, graph, actor_id);
    Ok(UpdateOutcome { applied, refreshed })
}

/// Changes to an actor's own attributes. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActorUpdate {
    pub display_name: Option<String>,
    pub level: Option<u32>,
    pub faction: Option<Faction>,
    pub game_edition_id: Option<u32>,
    pub loyalty: Vec<(String, f64)>,
    pub standings: Vec<(String, f64)>,
}

impl ActorUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

pub fn apply_actor_update(snapshot: &mut ActorProgressSnapshot, update: &ActorUpdate) {
    if let Some(name) = &update.display_name {
        snapshot.display_name = Some(name.clone());
    }
    if let Some(level) = update.level {
        snapshot.level = level;
    }
    if let Some(faction) = &update.faction {
        snapshot.faction_name = Some(faction.clone());
    }
    if let Some(edition) = update.game_edition_id {
        snapshot.game_edition_id = edition;
    }
    for (trader, level) in &update.loyalty {
        snapshot.trader_loyalty_levels.insert(trader.clone(), *level);
    }
    for (trader, standing) in &update.standings {
        snapshot.trader_standings.insert(trader.clone(), *standing);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActorUpdateOutcome {
    pub created: bool,
    pub snapshot: ActorProgressSnapshot,
    pub refreshed: Option<Refreshed>,
}

/// Persist actor attribute changes, creating the actor when it is new.
pub fn commit_actor_update<St: ProgressStore + ?Sized>(
    store: &mut St,
    graph: &TaskGraph,
    actor_id: &str,
    update: &ActorUpdate,
) -> Result<ActorUpdateOutcome> {
    let existing = store.load_snapshot(actor_id)?;
    let created = existing.is_none();
    let mut snapshot = existing.unwrap_or_default();
    if !created && update.is_empty() {
        tracing::debug!(actor = actor_id, "actor unchanged");
        return Ok(ActorUpdateOutcome {
            created,
            snapshot,
            refreshed: None,
        });
    }

    apply_actor_update(&mut snapshot, update);
    store.save_snapshot(actor_id, &snapshot)?;
    tracing::info!(actor = actor_id, created, "actor saved");

    let refreshed = refresh_best_effort(store, graph, actor_id);
    Ok(ActorUpdateOutcome {
        created,
        snapshot,
        refreshed,
    })
}
