//! Graph structures for quest dependency analysis.
//!
//! `TaskGraph` is an arena over the static task reference data: every task id
//! maps to a small integer `TaskIdx`, requirement edges are resolved to indices
//! once, and a reverse "dependents" index is kept for the invalidation cascade.
//! The graph may contain cycles; nothing here recurses, so malformed data can
//! never blow the stack.

use super::{StatusSet, Task};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Dense index of a task inside a [`TaskGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskIdx(pub u32);

impl TaskIdx {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A requirement edge with its target resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequirement {
    /// Predecessor id as written in the data
    pub target_id: String,
    /// Predecessor index, `None` when the id is not in the graph
    pub target: Option<TaskIdx>,
    /// Accepted statuses after alias resolution
    pub statuses: StatusSet,
}

/// Reverse edge: `task` requires the indexed predecessor with `statuses`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependent {
    pub task: TaskIdx,
    pub statuses: StatusSet,
}

/// Immutable, indexed task reference data.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    tasks: Vec<Task>,
    index: HashMap<String, TaskIdx>,
    requirements: Vec<Vec<ResolvedRequirement>>,
    dependents: Vec<Vec<Dependent>>,
}

impl TaskGraph {
    /// Build the arena. When an id is defined twice the last definition wins.
    pub fn new(tasks: impl IntoIterator<Item = Task>) -> Self {
        let mut deduped: Vec<Task> = Vec::new();
        let mut index: HashMap<String, TaskIdx> = HashMap::new();

        for task in tasks {
            if let Some(existing) = index.get(&task.id) {
                tracing::warn!(task = %task.id, "duplicate task definition, keeping the last one");
                deduped[existing.index()] = task;
                continue;
            }
            let idx = TaskIdx(deduped.len() as u32);
            index.insert(task.id.clone(), idx);
            deduped.push(task);
        }

        let requirements: Vec<Vec<ResolvedRequirement>> = deduped
            .iter()
            .map(|task| {
                task.task_requirements
                    .iter()
                    .map(|req| ResolvedRequirement {
                        target_id: req.task.clone(),
                        target: index.get(&req.task).copied(),
                        statuses: req.statuses(),
                    })
                    .collect()
            })
            .collect();

        let mut dependents: Vec<Vec<Dependent>> = vec![Vec::new(); deduped.len()];
        for (i, reqs) in requirements.iter().enumerate() {
            for req in reqs {
                if let Some(target) = req.target {
                    dependents[target.index()].push(Dependent {
                        task: TaskIdx(i as u32),
                        statuses: req.statuses,
                    });
                }
            }
        }

        tracing::debug!(tasks = deduped.len(), "task graph built");

        Self {
            tasks: deduped,
            index,
            requirements,
            dependents,
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<TaskIdx> {
        self.index.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.index_of(id).map(|idx| self.task(idx))
    }

    /// Task at `idx`. Indices only come from this graph, so this never misses.
    pub fn task(&self, idx: TaskIdx) -> &Task {
        &self.tasks[idx.index()]
    }

    pub fn requirements(&self, idx: TaskIdx) -> &[ResolvedRequirement] {
        &self.requirements[idx.index()]
    }

    pub fn dependents(&self, idx: TaskIdx) -> &[Dependent] {
        &self.dependents[idx.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaskIdx, &Task)> {
        self.tasks
            .iter()
            .enumerate()
            .map(|(i, task)| (TaskIdx(i as u32), task))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|t| t.id.as_str())
    }

    /// Find requirement cycles.
    ///
    /// Returns every strongly connected component with more than one task,
    /// plus tasks that require themselves. Uses an iterative Tarjan so deep
    /// chains cannot overflow the stack.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        const UNVISITED: usize = usize::MAX;

        let n = self.tasks.len();
        let mut order = vec![UNVISITED; n];
        let mut lowlink = vec![0usize; n];
        let mut on_stack = vec![false; n];
        let mut stack: Vec<usize> = Vec::new();
        let mut next_order = 0usize;
        let mut cycles = Vec::new();

        for root in 0..n {
            if order[root] != UNVISITED {
                continue;
            }
            // (node, next edge to look at)
            let mut work: Vec<(usize, usize)> = vec![(root, 0)];
            order[root] = next_order;
            lowlink[root] = next_order;
            next_order += 1;
            stack.push(root);
            on_stack[root] = true;

            while let Some(frame) = work.last_mut() {
                let node = frame.0;
                let reqs = &self.requirements[node];
                if frame.1 < reqs.len() {
                    let target = reqs[frame.1].target;
                    frame.1 += 1;
                    let Some(target) = target.map(TaskIdx::index) else {
                        continue;
                    };
                    if order[target] == UNVISITED {
                        order[target] = next_order;
                        lowlink[target] = next_order;
                        next_order += 1;
                        stack.push(target);
                        on_stack[target] = true;
                        work.push((target, 0));
                    } else if on_stack[target] {
                        lowlink[node] = lowlink[node].min(order[target]);
                    }
                    continue;
                }

                work.pop();
                if let Some(&(parent, _)) = work.last() {
                    lowlink[parent] = lowlink[parent].min(lowlink[node]);
                }
                if lowlink[node] != order[node] {
                    continue;
                }

                let mut component = Vec::new();
                while let Some(member) = stack.pop() {
                    on_stack[member] = false;
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                let self_loop = component.len() == 1
                    && self.requirements[node]
                        .iter()
                        .any(|r| r.target.map(TaskIdx::index) == Some(node));
                if component.len() > 1 || self_loop {
                    let mut ids: Vec<String> = component
                        .into_iter()
                        .map(|i| self.tasks[i].id.clone())
                        .collect();
                    ids.sort();
                    cycles.push(ids);
                }
            }
        }

        cycles.sort();
        cycles
    }

    /// Inspect the graph for data problems.
    ///
    /// Problems are reported, never fixed: evaluation degrades gracefully on
    /// every one of them.
    pub fn check(&self) -> GraphReport {
        let mut report = GraphReport {
            tasks: self.tasks.len(),
            cycles: self.find_cycles(),
            ..Default::default()
        };

        for (idx, task) in self.iter() {
            for req in self.requirements(idx) {
                if req.target.is_none() {
                    report.dangling.push(DanglingReference {
                        task: task.id.clone(),
                        field: "taskRequirements",
                        target: req.target_id.clone(),
                    });
                }
            }
            for (field, targets) in [
                ("failedRequirements", &task.failed_requirements),
                ("alternatives", &task.alternatives),
            ] {
                for target in targets.iter().filter(|t| !self.contains(t)) {
                    report.dangling.push(DanglingReference {
                        task: task.id.clone(),
                        field,
                        target: target.clone(),
                    });
                }
            }

            for alt in &task.alternatives {
                let Some(other) = self.get(alt) else { continue };
                if !other.alternatives.iter().any(|a| a == &task.id) {
                    let pair = (task.id.clone(), alt.clone());
                    report.asymmetric_alternatives.insert(pair);
                }
            }
        }

        report
    }
}

/// A reference from a task to an id missing from the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingReference {
    pub task: String,
    pub field: &'static str,
    pub target: String,
}

/// Result of [`TaskGraph::check`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphReport {
    pub tasks: usize,
    pub cycles: Vec<Vec<String>>,
    pub dangling: Vec<DanglingReference>,
    /// `(task, alternative)` pairs where the alternative does not list the task back
    pub asymmetric_alternatives: BTreeSet<(String, String)>,
}

impl GraphReport {
    pub fn is_clean(&self) -> bool {
        self.cycles.is_empty() && self.dangling.is_empty() && self.asymmetric_alternatives.is_empty()
    }
}
