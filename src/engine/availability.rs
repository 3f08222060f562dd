//! Availability evaluation: is a task currently offered to an actor?
//!
//! Evaluation is a depth-first walk over requirement edges. Each `(task, actor)`
//! pair on the current path sits in an explicit in-progress map; reaching a
//! pair that is already in progress means the data has a cycle, and that edge
//! answers "not available". Results are memoized per pair, except results that
//! leaned on a pair still in progress higher up the path: those are only
//! settled once that ancestor finishes.

use super::predicates::{
    edition_allowed, faction_allowed, objective_satisfied, trader_level_satisfied,
};
use super::EngineRules;
use crate::models::graph::{ResolvedRequirement, TaskGraph, TaskIdx};
use crate::models::{ActorProgressSnapshot, RequirementStatus};
use crate::progress::ProgressSource;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Dense index of an actor inside a [`MemoCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActorIdx(u32);

/// Memoized availability answers, keyed by `(task, actor)`.
///
/// The cache knows nothing about snapshot versions. Whoever owns it must call
/// [`MemoCache::clear`] (or start over with a new one) once any snapshot it
/// has answers for changes.
#[derive(Debug, Clone, Default)]
pub struct MemoCache {
    actors: HashMap<String, ActorIdx>,
    results: HashMap<(TaskIdx, ActorIdx), bool>,
}

impl MemoCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every memoized answer.
    pub fn clear(&mut self) {
        self.actors.clear();
        self.results.clear();
    }

    /// Number of memoized `(task, actor)` answers.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    fn intern(&mut self, actor_id: &str) -> ActorIdx {
        if let Some(idx) = self.actors.get(actor_id) {
            return *idx;
        }
        let idx = ActorIdx(self.actors.len() as u32);
        self.actors.insert(actor_id.to_string(), idx);
        idx
    }
}

/// Counters describing the work an evaluator has done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EvalStats {
    /// Uncached evaluations of a `(task, actor)` pair
    pub evaluations: u64,
    /// Answers served from the memo cache
    pub cache_hits: u64,
    /// Edges that closed a cycle and were answered "not available"
    pub cycle_hits: u64,
}

/// One reason a task is not offered to an actor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "gate", rename_all = "snake_case")]
pub enum Blocker {
    UnknownTask,
    UnknownActor,
    Edition { edition: u32 },
    FailedRequirement { task: String },
    AlreadyComplete,
    Level { required: u32, actual: u32 },
    TraderLevel { trader: String, required: f64, actual: f64 },
    Objective { objective: String },
    Requirement { task: String, statuses: Vec<&'static str> },
    Faction { required: String },
}

impl std::fmt::Display for Blocker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Blocker::UnknownTask => write!(f, "task is not in the catalog"),
            Blocker::UnknownActor => write!(f, "actor has no progress"),
            Blocker::Edition { edition } => write!(f, "edition {} cannot take this task", edition),
            Blocker::FailedRequirement { task } => write!(f, "{} was failed", task),
            Blocker::AlreadyComplete => write!(f, "already complete"),
            Blocker::Level { required, actual } => {
                write!(f, "level {} < required {}", actual, required)
            }
            Blocker::TraderLevel {
                trader,
                required,
                actual,
            } => write!(f, "{} loyalty {} < required {}", trader, actual, required),
            Blocker::Objective { objective } => write!(f, "objective {} not met", objective),
            Blocker::Requirement { task, statuses } if statuses.is_empty() => {
                write!(f, "needs {} complete", task)
            }
            Blocker::Requirement { task, statuses } => {
                write!(f, "needs {} {}", task, statuses.join("/"))
            }
            Blocker::Faction { required } => write!(f, "{} only", required),
        }
    }
}

/// Answer for one pair plus the shallowest in-progress depth it relied on.
#[derive(Debug, Clone, Copy)]
struct Verdict {
    available: bool,
    depends_on: usize,
}

impl Verdict {
    const SETTLED: usize = usize::MAX;

    fn settled(available: bool) -> Self {
        Self {
            available,
            depends_on: Self::SETTLED,
        }
    }
}

/// Evaluates task availability for actors against one snapshot version.
///
/// One evaluator may answer for many `(task, actor)` pairs within a single
/// request. It must not outlive the snapshot version it read from.
pub struct AvailabilityEvaluator<'a, S: ProgressSource + ?Sized> {
    graph: &'a TaskGraph,
    source: &'a S,
    rules: &'a EngineRules,
    cache: MemoCache,
    in_progress: HashMap<(TaskIdx, ActorIdx), usize>,
    stats: EvalStats,
}

impl<'a, S: ProgressSource + ?Sized> AvailabilityEvaluator<'a, S> {
    pub fn new(graph: &'a TaskGraph, source: &'a S, rules: &'a EngineRules) -> Self {
        Self::with_cache(graph, source, rules, MemoCache::new())
    }

    /// Resume with a cache retained from an earlier evaluator.
    ///
    /// Only valid when no snapshot has changed since that cache was filled.
    pub fn with_cache(
        graph: &'a TaskGraph,
        source: &'a S,
        rules: &'a EngineRules,
        cache: MemoCache,
    ) -> Self {
        Self {
            graph,
            source,
            rules,
            cache,
            in_progress: HashMap::new(),
            stats: EvalStats::default(),
        }
    }

    pub fn into_cache(self) -> MemoCache {
        self.cache
    }

    pub fn cache(&self) -> &MemoCache {
        &self.cache
    }

    /// Forget every memoized answer, e.g. after the snapshot changed.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn stats(&self) -> EvalStats {
        self.stats
    }

    /// Is `task_id` currently offered to `actor_id`?
    ///
    /// Unknown tasks and actors without a snapshot are simply unavailable.
    pub fn evaluate(&mut self, task_id: &str, actor_id: &str) -> bool {
        let Some(task) = self.graph.index_of(task_id) else {
            tracing::trace!(task = task_id, "availability of unknown task requested");
            return false;
        };
        let source = self.source;
        let Some(snapshot) = source.snapshot(actor_id) else {
            tracing::trace!(actor = actor_id, "no snapshot for actor");
            return false;
        };
        let actor = self.cache.intern(actor_id);
        self.visit(task, actor, snapshot).available
    }

    /// Evaluate every listed task for every listed actor.
    pub fn evaluate_batch<T, A>(
        &mut self,
        task_ids: &[T],
        actor_ids: &[A],
    ) -> BTreeMap<String, BTreeMap<String, bool>>
    where
        T: AsRef<str>,
        A: AsRef<str>,
    {
        let mut out = BTreeMap::new();
        for task_id in task_ids {
            let per_actor: BTreeMap<String, bool> = actor_ids
                .iter()
                .map(|actor| {
                    let actor = actor.as_ref();
                    (actor.to_string(), self.evaluate(task_id.as_ref(), actor))
                })
                .collect();
            out.insert(task_id.as_ref().to_string(), per_actor);
        }
        tracing::debug!(
            tasks = task_ids.len(),
            actors = actor_ids.len(),
            evaluations = self.stats.evaluations,
            cache_hits = self.stats.cache_hits,
            "availability batch evaluated"
        );
        out
    }

    /// Evaluate the whole graph for the listed actors.
    pub fn evaluate_all<A: AsRef<str>>(
        &mut self,
        actor_ids: &[A],
    ) -> BTreeMap<String, BTreeMap<String, bool>> {
        let graph = self.graph;
        let task_ids: Vec<&str> = graph.ids().collect();
        self.evaluate_batch(&task_ids, actor_ids)
    }

    /// Every gate `task_id` fails for `actor_id`; empty exactly when it is available.
    ///
    /// Unlike [`evaluate`](Self::evaluate) this does not stop at the first
    /// failing gate.
    pub fn explain(&mut self, task_id: &str, actor_id: &str) -> Vec<Blocker> {
        let Some(idx) = self.graph.index_of(task_id) else {
            return vec![Blocker::UnknownTask];
        };
        let source = self.source;
        let Some(snapshot) = source.snapshot(actor_id) else {
            return vec![Blocker::UnknownActor];
        };
        let actor = self.cache.intern(actor_id);
        let graph = self.graph;
        let task = graph.task(idx);
        let mut blockers = Vec::new();

        if !edition_allowed(task.eod_only, snapshot.game_edition_id, &self.rules.premium_editions) {
            blockers.push(Blocker::Edition {
                edition: snapshot.game_edition_id,
            });
        }
        for failed in task.failed_requirements.iter().filter(|id| snapshot.is_failed(id)) {
            blockers.push(Blocker::FailedRequirement {
                task: failed.clone(),
            });
        }
        if snapshot.is_complete(&task.id) {
            blockers.push(Blocker::AlreadyComplete);
        }
        if snapshot.level < task.min_player_level {
            blockers.push(Blocker::Level {
                required: task.min_player_level,
                actual: snapshot.level,
            });
        }
        for req in task.trader_gates() {
            let Some(trader) = req.trader_id.as_deref() else {
                continue;
            };
            let actual = snapshot.loyalty(trader);
            if !trader_level_satisfied(actual, req.level) {
                blockers.push(Blocker::TraderLevel {
                    trader: trader.to_string(),
                    required: req.level,
                    actual,
                });
            }
        }
        for objective in task.objectives.iter().filter(|o| o.is_gating()) {
            if !objective_satisfied(objective, snapshot) {
                blockers.push(Blocker::Objective {
                    objective: objective.id.clone(),
                });
            }
        }

        // Same path state as `visit`, so cycles back to this task fail the same way.
        let key = (idx, actor);
        let nested = !self.in_progress.contains_key(&key);
        if nested {
            self.in_progress.insert(key, self.in_progress.len());
        }
        for req in graph.requirements(idx) {
            if !self.requirement(req, actor, snapshot).available {
                blockers.push(Blocker::Requirement {
                    task: req.target_id.clone(),
                    statuses: req.statuses.iter().map(|s| s.as_str()).collect(),
                });
            }
        }
        if nested {
            self.in_progress.remove(&key);
        }

        if !faction_allowed(&task.faction_name, snapshot.faction_name.as_ref()) {
            blockers.push(Blocker::Faction {
                required: task.faction_name.to_string(),
            });
        }
        blockers
    }

    fn visit(&mut self, task: TaskIdx, actor: ActorIdx, snapshot: &'a ActorProgressSnapshot) -> Verdict {
        let key = (task, actor);
        if let Some(&available) = self.cache.results.get(&key) {
            self.stats.cache_hits += 1;
            return Verdict::settled(available);
        }
        if let Some(&depth) = self.in_progress.get(&key) {
            self.stats.cycle_hits += 1;
            tracing::trace!(task = %self.graph.task(task).id, "requirement cycle reached");
            return Verdict {
                available: false,
                depends_on: depth,
            };
        }

        let depth = self.in_progress.len();
        self.in_progress.insert(key, depth);
        self.stats.evaluations += 1;
        let verdict = self.check(task, actor, snapshot);
        self.in_progress.remove(&key);

        if verdict.depends_on >= depth {
            self.cache.results.insert(key, verdict.available);
            Verdict::settled(verdict.available)
        } else {
            verdict
        }
    }

    /// All gates, in order, short-circuiting on the first failure.
    fn check(&mut self, idx: TaskIdx, actor: ActorIdx, snapshot: &'a ActorProgressSnapshot) -> Verdict {
        let graph = self.graph;
        let task = graph.task(idx);

        if !edition_allowed(task.eod_only, snapshot.game_edition_id, &self.rules.premium_editions) {
            return Verdict::settled(false);
        }
        if task.failed_requirements.iter().any(|id| snapshot.is_failed(id)) {
            return Verdict::settled(false);
        }
        if snapshot.is_complete(&task.id) {
            return Verdict::settled(false);
        }
        if snapshot.level < task.min_player_level {
            return Verdict::settled(false);
        }

        let traders_ok = task.trader_gates().all(|req| match req.trader_id.as_deref() {
            Some(trader) => trader_level_satisfied(snapshot.loyalty(trader), req.level),
            None => true,
        });
        if !traders_ok {
            return Verdict::settled(false);
        }

        let objectives_ok = task
            .objectives
            .iter()
            .filter(|o| o.is_gating())
            .all(|o| objective_satisfied(o, snapshot));
        if !objectives_ok {
            return Verdict::settled(false);
        }

        let mut depends_on = Verdict::SETTLED;
        for req in graph.requirements(idx) {
            let edge = self.requirement(req, actor, snapshot);
            depends_on = depends_on.min(edge.depends_on);
            if !edge.available {
                return Verdict {
                    available: false,
                    depends_on,
                };
            }
        }

        Verdict {
            available: faction_allowed(&task.faction_name, snapshot.faction_name.as_ref()),
            depends_on,
        }
    }

    fn requirement(
        &mut self,
        req: &ResolvedRequirement,
        actor: ActorIdx,
        snapshot: &'a ActorProgressSnapshot,
    ) -> Verdict {
        // A complete predecessor satisfies every edge, whatever statuses it
        // lists. With no statuses listed, completion is the only way through.
        if snapshot.is_complete(&req.target_id) {
            return Verdict::settled(true);
        }
        if req.statuses.contains(RequirementStatus::Failed) && snapshot.is_failed(&req.target_id) {
            return Verdict::settled(true);
        }
        if req.statuses.contains(RequirementStatus::Active) {
            return match req.target {
                Some(target) => self.visit(target, actor, snapshot),
                None => Verdict::settled(false),
            };
        }
        Verdict::settled(false)
    }
}
