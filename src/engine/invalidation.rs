//! Invalidation cascade for mutually exclusive tasks.
//!
//! A task is invalid for an actor when it can never be completed any more:
//! an alternative was chosen, its faction excludes the actor, or it needs the
//! completion of a task that is itself invalid. The cascade is recomputed from
//! scratch on every run, so it is idempotent.

use super::predicates::faction_allowed;
use crate::models::Faction;
use crate::models::graph::{TaskGraph, TaskIdx};
use crate::progress::FormattedProgress;
use serde::Serialize;
use std::collections::VecDeque;

/// What one cascade run marked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InvalidationSummary {
    /// Tasks with a chosen alternative
    pub alternative_seeds: usize,
    /// Tasks restricted to another faction
    pub faction_seeds: usize,
    /// Tasks invalid because a required predecessor is
    pub propagated: usize,
}

impl InvalidationSummary {
    pub fn total(&self) -> usize {
        self.alternative_seeds + self.faction_seeds + self.propagated
    }
}

/// Mark moot tasks and their objectives `invalid` in `progress`.
///
/// Existing `invalid` flags are reset first. Completed tasks are flagged like
/// any other; they are never un-completed.
pub fn invalidate_tasks(
    progress: &mut FormattedProgress,
    graph: &TaskGraph,
    faction: Option<&Faction>,
    actor_id: &str,
) -> InvalidationSummary {
    progress.clear_invalid();

    let mut summary = InvalidationSummary::default();
    let mut invalid = vec![false; graph.len()];
    let mut queue: VecDeque<TaskIdx> = VecDeque::new();

    for (idx, task) in graph.iter() {
        if task.alternatives.iter().any(|alt| progress.is_chosen(alt)) {
            summary.alternative_seeds += 1;
        } else if faction.is_some_and(|f| !faction_allowed(&task.faction_name, Some(f))) {
            summary.faction_seeds += 1;
        } else {
            continue;
        }
        invalid[idx.index()] = true;
        queue.push_back(idx);
    }

    while let Some(idx) = queue.pop_front() {
        // Edges onto a predecessor that is already complete stay satisfied.
        if progress.is_complete(&graph.task(idx).id) {
            continue;
        }
        for dependent in graph.dependents(idx) {
            let slot = &mut invalid[dependent.task.index()];
            if *slot || !dependent.statuses.requires_completion_only() {
                continue;
            }
            *slot = true;
            summary.propagated += 1;
            queue.push_back(dependent.task);
        }
    }

    for (idx, task) in graph.iter().filter(|(idx, _)| invalid[idx.index()]) {
        progress.mark_invalid(task);
        tracing::trace!(actor = actor_id, task = %task.id, idx = idx.0, "task invalidated");
    }

    tracing::debug!(
        actor = actor_id,
        alternatives = summary.alternative_seeds,
        faction = summary.faction_seeds,
        propagated = summary.propagated,
        "invalidation cascade finished"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActorCompletionRecord, ActorProgressSnapshot, Task, TaskRequirement};
    use crate::progress::format_progress;
    use crate::test_utils::requiring;
    use chrono::Utc;

    fn with_alternatives(id: &str, alternatives: &[&str]) -> Task {
        let mut task = Task::new(id);
        task.alternatives = alternatives.iter().map(|s| s.to_string()).collect();
        task
    }

    fn snapshot_with(records: &[(&str, ActorCompletionRecord)]) -> ActorProgressSnapshot {
        let mut snapshot = ActorProgressSnapshot::new(10, Faction::Usec);
        for (id, record) in records {
            snapshot.task_completions.insert(id.to_string(), record.clone());
        }
        snapshot
    }

    fn run(graph: &TaskGraph, snapshot: &ActorProgressSnapshot) -> (FormattedProgress, InvalidationSummary) {
        let mut progress = format_progress("me", snapshot, graph);
        let summary = invalidate_tasks(&mut progress, graph, snapshot.faction_name.as_ref(), "me");
        (progress, summary)
    }

    #[test]
    fn test_chosen_alternative_invalidates_task() {
        let graph = TaskGraph::new(vec![with_alternatives("task1", &["task2"]), Task::new("task2")]);
        let snapshot = snapshot_with(&[("task2", ActorCompletionRecord::completed(Utc::now()))]);

        let (progress, summary) = run(&graph, &snapshot);
        assert!(progress.tasks_progress["task1"].invalid);
        assert!(!progress.tasks_progress["task2"].invalid);
        assert_eq!(summary.alternative_seeds, 1);
    }

    #[test]
    fn test_completed_task_is_flagged_not_uncompleted() {
        let graph = TaskGraph::new(vec![
            with_alternatives("task1", &["task2"]),
            with_alternatives("task2", &["task1"]),
        ]);
        let snapshot = snapshot_with(&[
            ("task1", ActorCompletionRecord::completed(Utc::now())),
            ("task2", ActorCompletionRecord::completed(Utc::now())),
        ]);

        let (progress, _) = run(&graph, &snapshot);
        for id in ["task1", "task2"] {
            assert!(progress.tasks_progress[id].invalid);
            assert!(progress.tasks_progress[id].complete);
        }
    }

    #[test]
    fn test_failed_alternative_is_not_a_choice() {
        let graph = TaskGraph::new(vec![with_alternatives("task1", &["task2"]), Task::new("task2")]);
        let snapshot = snapshot_with(&[("task2", ActorCompletionRecord::failed(Utc::now()))]);

        let (progress, summary) = run(&graph, &snapshot);
        assert!(!progress.tasks_progress["task1"].invalid);
        assert_eq!(summary.total(), 0);
    }

    #[test]
    fn test_propagates_through_completion_edges_only() {
        let graph = TaskGraph::new(vec![
            with_alternatives("a", &["b"]),
            Task::new("b"),
            requiring("needs_a", "a", &["complete"]),
            requiring("needs_a_any", "a", &[]),
            requiring("active_a", "a", &["active"]),
            requiring("deep", "needs_a", &["complete"]),
        ]);
        let snapshot = snapshot_with(&[("b", ActorCompletionRecord::completed(Utc::now()))]);

        let (progress, summary) = run(&graph, &snapshot);
        for id in ["a", "needs_a", "needs_a_any", "deep"] {
            assert!(progress.tasks_progress[id].invalid, "{} should be invalid", id);
        }
        assert!(!progress.tasks_progress["active_a"].invalid);
        assert!(!progress.tasks_progress["b"].invalid);
        assert_eq!(summary.propagated, 3);
    }

    #[test]
    fn test_completed_invalid_predecessor_does_not_propagate() {
        let graph = TaskGraph::new(vec![
            with_alternatives("a", &["b"]),
            Task::new("b"),
            requiring("after_a", "a", &["complete"]),
        ]);
        let snapshot = snapshot_with(&[
            ("a", ActorCompletionRecord::completed(Utc::now())),
            ("b", ActorCompletionRecord::completed(Utc::now())),
        ]);

        let (progress, _) = run(&graph, &snapshot);
        assert!(progress.tasks_progress["a"].invalid);
        assert!(!progress.tasks_progress["after_a"].invalid);
    }

    #[test]
    fn test_closed_alternative_propagates_to_its_dependents() {
        let graph = crate::test_utils::exclusive_pair();
        let mut snapshot = crate::test_utils::usec(10);
        snapshot
            .task_completions
            .insert("a".to_string(), ActorCompletionRecord::completed(Utc::now()));
        snapshot
            .task_completions
            .insert("b".to_string(), ActorCompletionRecord::closed(Utc::now()));

        let (progress, summary) = run(&graph, &snapshot);
        assert!(!progress.tasks_progress["a"].invalid);
        assert!(progress.tasks_progress["b"].invalid);
        assert!(progress.tasks_progress["after_b"].invalid);
        assert_eq!(summary.alternative_seeds, 1);
        assert_eq!(summary.propagated, 1);
    }

    #[test]
    fn test_faction_seeds() {
        let mut bear = Task::new("bear_only");
        bear.faction_name = Faction::Bear;
        let graph = TaskGraph::new(vec![bear, requiring("after", "bear_only", &[])]);
        let snapshot = snapshot_with(&[]);

        let (progress, summary) = run(&graph, &snapshot);
        assert!(progress.tasks_progress["bear_only"].invalid);
        assert!(progress.tasks_progress["after"].invalid);
        assert_eq!(summary.faction_seeds, 1);

        let mut progress = format_progress("me", &snapshot, &graph);
        let summary = invalidate_tasks(&mut progress, &graph, None, "me");
        assert_eq!(summary.total(), 0);
    }

    #[test]
    fn test_cycle_terminates() {
        let graph = TaskGraph::new(vec![
            with_alternatives("root", &["alt"]),
            Task::new("alt"),
            requiring("x", "root", &[]),
            {
                let mut y = requiring("y", "x", &[]);
                y.task_requirements.push(TaskRequirement::new("z", &[]));
                y
            },
            requiring("z", "y", &[]),
        ]);
        let snapshot = snapshot_with(&[("alt", ActorCompletionRecord::completed(Utc::now()))]);

        let (progress, summary) = run(&graph, &snapshot);
        for id in ["root", "x", "y", "z"] {
            assert!(progress.tasks_progress[id].invalid);
        }
        assert_eq!(summary.propagated, 3);
    }

    #[test]
    fn test_idempotent_and_resets_stale_flags() {
        let graph = TaskGraph::new(vec![with_alternatives("task1", &["task2"]), Task::new("task2")]);
        let snapshot = snapshot_with(&[("task2", ActorCompletionRecord::completed(Utc::now()))]);

        let mut progress = format_progress("me", &snapshot, &graph);
        progress.tasks_progress.get_mut("task2").unwrap().invalid = true;
        let first = invalidate_tasks(&mut progress, &graph, None, "me");
        let snapshot_after_first = progress.clone();
        let second = invalidate_tasks(&mut progress, &graph, None, "me");

        assert_eq!(first, second);
        assert_eq!(progress, snapshot_after_first);
        assert!(!progress.tasks_progress["task2"].invalid);
    }

    #[test]
    fn test_objectives_of_invalid_tasks_are_flagged() {
        let mut task1 = with_alternatives("task1", &["task2"]);
        task1.objectives = vec![crate::models::Objective {
            id: "obj1".to_string(),
            ..Default::default()
        }];
        let graph = TaskGraph::new(vec![task1, Task::new("task2")]);
        let snapshot = snapshot_with(&[("task2", ActorCompletionRecord::completed(Utc::now()))]);

        let (progress, _) = run(&graph, &snapshot);
        assert!(progress.objectives_progress["obj1"].invalid);
    }
}
