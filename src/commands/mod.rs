//! Command implementations for the `ql` CLI.
//!
//! Each command opens the data directory, does its work through the library
//! and returns a result type implementing [`Output`].

use crate::config::ResolvedConfig;
use crate::engine::{AvailabilityEvaluator, Blocker, EngineRules, EvalStats, InvalidationSummary};
use crate::models::graph::GraphReport;
use crate::models::{ActorProgressSnapshot, Faction};
use crate::progress::{
    self, ActorUpdate, AppliedUpdate, FormattedProgress, TaskUpdate, load_progress, team_members,
};
use crate::storage::{FileStore, ProgressStore, parse_tasks, validate_actor_id};
use crate::{Error, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|e| format!(r#"{{"error": "serialization failed: {}"}}"#, e))
}

fn open_store(data_dir: &Path) -> Result<FileStore> {
    FileStore::open(data_dir)
}

fn require_snapshot(store: &FileStore, actor_id: &str) -> Result<ActorProgressSnapshot> {
    validate_actor_id(actor_id)?;
    store
        .load_snapshot(actor_id)?
        .ok_or_else(|| Error::NotFound(format!("actor {}", actor_id)))
}

// === init / tasks ===

#[derive(Serialize)]
pub struct InitResult {
    pub data_dir: String,
    pub created: bool,
    pub tasks: usize,
}

impl Output for InitResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let verb = if self.created { "Initialized" } else { "Already initialized" };
        format!("{} {} ({} tasks)", verb, self.data_dir, self.tasks)
    }
}

/// Create the data directory and optionally import a catalog.
pub fn init(data_dir: &Path, tasks_file: Option<&Path>) -> Result<InitResult> {
    let created = !FileStore::exists(data_dir);
    let mut store = FileStore::init(data_dir)?;
    if let Some(file) = tasks_file {
        import_catalog(&mut store, file)?;
    }
    Ok(InitResult {
        data_dir: store.location(),
        created,
        tasks: store.load_tasks()?.len(),
    })
}

#[derive(Serialize)]
pub struct ImportResult {
    pub tasks: usize,
    pub cycles: usize,
    pub dangling: usize,
    /// Actors whose formatted view was rebuilt against the new catalog
    pub refreshed: usize,
}

impl Output for ImportResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut out = format!("Imported {} tasks", self.tasks);
        if self.cycles > 0 || self.dangling > 0 {
            let _ = write!(
                out,
                " ({} cycles, {} dangling references; see `ql graph check`)",
                self.cycles, self.dangling
            );
        }
        let _ = write!(out, "\nRefreshed {} actors", self.refreshed);
        out
    }
}

fn import_catalog(store: &mut FileStore, file: &Path) -> Result<ImportResult> {
    let tasks = parse_tasks(&std::fs::read_to_string(file)?)?;
    store.save_tasks(&tasks)?;

    let graph = store.load_graph()?;
    let report = graph.check();
    if !report.is_clean() {
        tracing::warn!(
            cycles = report.cycles.len(),
            dangling = report.dangling.len(),
            "imported catalog has structural problems"
        );
    }

    let mut refreshed = 0;
    for actor in store.actor_ids()? {
        match progress::refresh_formatted(store, &graph, &actor) {
            Ok(_) => refreshed += 1,
            Err(e) => tracing::warn!(actor = %actor, error = %e, "failed to refresh formatted progress"),
        }
    }
    tracing::info!(tasks = graph.len(), refreshed, "task catalog imported");

    Ok(ImportResult {
        tasks: graph.len(),
        cycles: report.cycles.len(),
        dangling: report.dangling.len(),
        refreshed,
    })
}

/// Replace the catalog and refresh every actor's formatted view.
pub fn tasks_import(data_dir: &Path, file: &Path) -> Result<ImportResult> {
    let mut store = open_store(data_dir)?;
    import_catalog(&mut store, file)
}

#[derive(Serialize)]
pub struct TaskSummary {
    pub id: String,
    pub name: String,
    pub faction: String,
    pub min_level: u32,
    pub eod_only: bool,
    pub requires: Vec<String>,
    pub alternatives: Vec<String>,
}

#[derive(Serialize)]
pub struct TaskList {
    pub tasks: Vec<TaskSummary>,
}

impl Output for TaskList {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.tasks.is_empty() {
            return "No tasks.".to_string();
        }
        let mut out = format!("{} tasks:", self.tasks.len());
        for task in &self.tasks {
            let _ = write!(out, "\n  {}  {} [{} L{}]", task.id, task.name, task.faction, task.min_level);
            if !task.requires.is_empty() {
                let _ = write!(out, " requires {}", task.requires.join(", "));
            }
            if !task.alternatives.is_empty() {
                let _ = write!(out, " excludes {}", task.alternatives.join(", "));
            }
        }
        out
    }
}

pub fn tasks_list(data_dir: &Path) -> Result<TaskList> {
    let store = open_store(data_dir)?;
    let graph = store.load_graph()?;
    let tasks = graph
        .iter()
        .map(|(_, task)| TaskSummary {
            id: task.id.clone(),
            name: task.display_name().to_string(),
            faction: task.faction_name.to_string(),
            min_level: task.min_player_level,
            eod_only: task.eod_only,
            requires: task.task_requirements.iter().map(|r| r.task.clone()).collect(),
            alternatives: task.alternatives.clone(),
        })
        .collect();
    Ok(TaskList { tasks })
}

// === availability ===

#[derive(Serialize)]
pub struct ActorAvailability {
    pub actor: String,
    pub available: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unavailable: Option<Vec<String>>,
}

#[derive(Serialize)]
pub struct AvailableResult {
    pub actors: Vec<ActorAvailability>,
    pub stats: EvalStats,
}

impl Output for AvailableResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut out = String::new();
        for entry in &self.actors {
            let _ = writeln!(out, "{}: {} available", entry.actor, entry.available.len());
            for id in &entry.available {
                let _ = writeln!(out, "  + {}", id);
            }
            for id in entry.unavailable.iter().flatten() {
                let _ = writeln!(out, "  - {}", id);
            }
        }
        out.trim_end().to_string()
    }
}

/// Evaluate availability for an actor, or for the actor's whole team.
pub fn available(
    data_dir: &Path,
    rules: &EngineRules,
    actor: &str,
    team: bool,
    tasks: &[String],
    all: bool,
) -> Result<AvailableResult> {
    let store = open_store(data_dir)?;
    require_snapshot(&store, actor)?;
    let graph = store.load_graph()?;

    let actors = if team {
        team_members(&store, actor)?
    } else {
        vec![actor.to_string()]
    };
    let snapshots = load_progress(&store, &actors)?;

    let mut evaluator = AvailabilityEvaluator::new(&graph, &snapshots, rules);
    let matrix = if tasks.is_empty() {
        evaluator.evaluate_all(&actors)
    } else {
        evaluator.evaluate_batch(tasks, &actors)
    };

    let actors = actors
        .into_iter()
        .map(|actor| {
            let (available, unavailable): (Vec<String>, Vec<String>) = matrix
                .iter()
                .map(|(task, per_actor)| (task.clone(), per_actor.get(&actor).copied().unwrap_or(false)))
                .fold((Vec::new(), Vec::new()), |(mut yes, mut no), (task, ok)| {
                    if ok {
                        yes.push(task);
                    } else {
                        no.push(task);
                    }
                    (yes, no)
                });
            ActorAvailability {
                actor,
                available,
                unavailable: all.then_some(unavailable),
            }
        })
        .collect();

    Ok(AvailableResult {
        actors,
        stats: evaluator.stats(),
    })
}

#[derive(Serialize)]
pub struct CheckResult {
    pub task: String,
    pub actor: String,
    pub known: bool,
    pub available: bool,
    pub blockers: Vec<Blocker>,
}

impl Output for CheckResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.available {
            return format!("{} is available to {}", self.task, self.actor);
        }
        let mut out = format!("{} is not available to {}", self.task, self.actor);
        for blocker in &self.blockers {
            let _ = write!(out, "\n  - {}", blocker);
        }
        out
    }
}

/// Availability of one task with the reasons it is blocked.
pub fn check(data_dir: &Path, rules: &EngineRules, task: &str, actor: &str) -> Result<CheckResult> {
    validate_actor_id(actor)?;
    let store = open_store(data_dir)?;
    let graph = store.load_graph()?;
    let snapshots = load_progress(&store, &[actor])?;

    let mut evaluator = AvailabilityEvaluator::new(&graph, &snapshots, rules);
    let available = evaluator.evaluate(task, actor);
    let blockers = evaluator.explain(task, actor);

    Ok(CheckResult {
        task: task.to_string(),
        actor: actor.to_string(),
        known: graph.contains(task),
        available,
        blockers,
    })
}

// === progress ===

#[derive(Serialize)]
pub struct ProgressResult {
    /// Whether the stored view was rewritten
    pub refreshed: bool,
    pub progress: FormattedProgress,
}

impl Output for ProgressResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let p = &self.progress;
        let name = p.display_name.as_deref().unwrap_or(&p.user_id);
        let faction = p.faction_name.as_ref().map(|f| f.to_string()).unwrap_or_else(|| "?".to_string());
        let complete = p.tasks_progress.values().filter(|e| e.complete && !e.failed).count();
        let failed = p.tasks_progress.values().filter(|e| e.failed).count();
        let invalid: Vec<&str> = p.invalid_tasks().collect();

        let mut out = format!(
            "{} (level {}, {}, edition {})\n  complete: {}\n  failed: {}\n  invalid: {}",
            name,
            p.level,
            faction,
            p.game_edition_id,
            complete,
            failed,
            invalid.len()
        );
        for id in invalid {
            let _ = write!(out, "\n    {}", id);
        }
        out
    }
}

/// Formatted view rebuilt from the current snapshot; `refresh` also stores it.
pub fn progress_show(data_dir: &Path, actor: &str, refresh: bool) -> Result<ProgressResult> {
    let mut store = open_store(data_dir)?;
    let snapshot = require_snapshot(&store, actor)?;
    let graph = store.load_graph()?;

    let built = progress::build_formatted(&snapshot, &graph, actor);
    if refresh {
        store.save_formatted(actor, &built.progress)?;
    }
    Ok(ProgressResult {
        refreshed: refresh,
        progress: built.progress,
    })
}

#[derive(Serialize)]
pub struct UpdateResult {
    pub actor: String,
    #[serde(flatten)]
    pub applied: AppliedUpdate,
    /// None when the formatted view could not be refreshed
    pub invalidation: Option<InvalidationSummary>,
    pub invalid_tasks: Vec<String>,
}

impl Output for UpdateResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut out = format!("{}: {} -> {}", self.actor, self.applied.task, self.applied.update);
        if !self.applied.closed_alternatives.is_empty() {
            let _ = write!(out, "\n  closed: {}", self.applied.closed_alternatives.join(", "));
        }
        if !self.applied.reopened_alternatives.is_empty() {
            let _ = write!(out, "\n  reopened: {}", self.applied.reopened_alternatives.join(", "));
        }
        match &self.invalidation {
            Some(summary) => {
                let _ = write!(out, "\n  invalid tasks: {}", summary.total());
            }
            None => out.push_str("\n  warning: formatted progress was not refreshed"),
        }
        out
    }
}

pub fn update(data_dir: &Path, task: &str, actor: &str, status: &str) -> Result<UpdateResult> {
    let update = TaskUpdate::parse(status)?;
    validate_actor_id(actor)?;
    let mut store = open_store(data_dir)?;
    let graph = store.load_graph()?;

    let outcome = progress::commit_task_update(&mut store, &graph, actor, task, update)?;
    let (invalidation, invalid_tasks) = match outcome.refreshed {
        Some(refreshed) => (
            Some(refreshed.summary),
            refreshed.progress.invalid_tasks().map(str::to_string).collect(),
        ),
        None => (None, Vec::new()),
    };

    Ok(UpdateResult {
        actor: actor.to_string(),
        applied: outcome.applied,
        invalidation,
        invalid_tasks,
    })
}

// === actors / teams ===

#[derive(Serialize)]
pub struct ActorResult {
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<bool>,
    pub snapshot: ActorProgressSnapshot,
}

impl Output for ActorResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let s = &self.snapshot;
        let verb = match self.created {
            Some(true) => "Created",
            Some(false) => "Updated",
            None => "Actor",
        };
        let faction = s.faction_name.as_ref().map(|f| f.to_string()).unwrap_or_else(|| "?".to_string());
        let mut out = format!(
            "{} {}: level {}, {}, edition {}, {} tasks recorded",
            verb,
            self.actor,
            s.level,
            faction,
            s.game_edition_id,
            s.task_completions.len()
        );
        for (trader, level) in &s.trader_loyalty_levels {
            let _ = write!(out, "\n  {} loyalty {}", trader, level);
        }
        for (trader, standing) in &s.trader_standings {
            let _ = write!(out, "\n  {} standing {}", trader, standing);
        }
        out
    }
}

/// Parse a `TRADER=NUMBER` pair.
fn parse_trader_value(raw: &str) -> Result<(String, f64)> {
    let (trader, value) = raw
        .split_once('=')
        .ok_or_else(|| Error::InvalidInput(format!("expected TRADER=VALUE, got '{}'", raw)))?;
    let trader = trader.trim();
    if trader.is_empty() {
        return Err(Error::InvalidInput(format!("missing trader in '{}'", raw)));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidInput(format!("'{}' is not a number", value.trim())))?;
    Ok((trader.to_string(), value))
}

/// Faction names from the command line are matched case-insensitively.
fn parse_faction_arg(raw: &str) -> Result<Faction> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "USEC" => Ok(Faction::Usec),
        "BEAR" => Ok(Faction::Bear),
        _ => Err(Error::InvalidInput(format!(
            "unknown faction '{}' (expected USEC or BEAR)",
            raw
        ))),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn actor_set(
    data_dir: &Path,
    actor: &str,
    name: Option<String>,
    level: Option<u32>,
    faction: Option<&str>,
    edition: Option<u32>,
    loyalty: &[String],
    standing: &[String],
) -> Result<ActorResult> {
    validate_actor_id(actor)?;
    let update = ActorUpdate {
        display_name: name,
        level,
        faction: faction.map(parse_faction_arg).transpose()?,
        game_edition_id: edition,
        loyalty: loyalty.iter().map(|s| parse_trader_value(s)).collect::<Result<_>>()?,
        standings: standing.iter().map(|s| parse_trader_value(s)).collect::<Result<_>>()?,
    };

    let mut store = open_store(data_dir)?;
    let graph = store.load_graph()?;
    let outcome = progress::commit_actor_update(&mut store, &graph, actor, &update)?;
    Ok(ActorResult {
        actor: actor.to_string(),
        created: Some(outcome.created),
        snapshot: outcome.snapshot,
    })
}

pub fn actor_show(data_dir: &Path, actor: &str) -> Result<ActorResult> {
    let store = open_store(data_dir)?;
    Ok(ActorResult {
        actor: actor.to_string(),
        created: None,
        snapshot: require_snapshot(&store, actor)?,
    })
}

#[derive(Serialize)]
pub struct ActorList {
    pub actors: Vec<String>,
}

impl Output for ActorList {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.actors.is_empty() {
            "No actors.".to_string()
        } else {
            self.actors.join("\n")
        }
    }
}

pub fn actor_list(data_dir: &Path) -> Result<ActorList> {
    let store = open_store(data_dir)?;
    Ok(ActorList {
        actors: store.actor_ids()?,
    })
}

#[derive(Serialize)]
pub struct TeamResult {
    pub actor: String,
    pub members: Vec<String>,
}

impl Output for TeamResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("{}: {}", self.actor, self.members.join(", "))
    }
}

pub fn team_set(data_dir: &Path, actor: &str, members: &[String]) -> Result<TeamResult> {
    let mut store = open_store(data_dir)?;
    require_snapshot(&store, actor)?;
    let mates: Vec<String> = members.iter().filter(|m| *m != actor).cloned().collect();
    store.set_teammates(actor, &mates)?;
    Ok(TeamResult {
        actor: actor.to_string(),
        members: team_members(&store, actor)?,
    })
}

pub fn team_show(data_dir: &Path, actor: &str) -> Result<TeamResult> {
    let store = open_store(data_dir)?;
    validate_actor_id(actor)?;
    Ok(TeamResult {
        actor: actor.to_string(),
        members: team_members(&store, actor)?,
    })
}

// === graph / config ===

#[derive(Serialize)]
pub struct GraphCheckResult {
    pub clean: bool,
    #[serde(flatten)]
    pub report: GraphReport,
}

impl Output for GraphCheckResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let r = &self.report;
        if self.clean {
            return format!("{} tasks, no problems found", r.tasks);
        }
        let mut out = format!("{} tasks", r.tasks);
        for cycle in &r.cycles {
            let _ = write!(out, "\n  cycle: {}", cycle.join(" -> "));
        }
        for d in &r.dangling {
            let _ = write!(out, "\n  dangling: {}.{} -> {}", d.task, d.field, d.target);
        }
        for (a, b) in &r.asymmetric_alternatives {
            let _ = write!(out, "\n  one-sided alternative: {} excludes {}", a, b);
        }
        out
    }
}

pub fn graph_check(data_dir: &Path) -> Result<GraphCheckResult> {
    let store = open_store(data_dir)?;
    let report = store.load_graph()?.check();
    Ok(GraphCheckResult {
        clean: report.is_clean(),
        report,
    })
}

#[derive(Serialize)]
pub struct ConfigShowResult {
    #[serde(flatten)]
    pub config: ResolvedConfig,
    pub version: &'static str,
}

impl Output for ConfigShowResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let c = &self.config;
        let editions: Vec<String> = c.premium_editions.value.iter().map(u32::to_string).collect();
        let system = c
            .system_config
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string());
        format!(
            "data-dir = {} ({})\npremium-editions = {} ({})\noutput-format = {} ({})\nlog-level = {} ({})\nsystem config: {}\nversion: {}",
            c.data_dir.value.display(),
            c.data_dir.source,
            editions.join(" "),
            c.premium_editions.source,
            c.output_format.value,
            c.output_format.source,
            c.log_level.value,
            c.log_level.source,
            system,
            self.version
        )
    }
}

pub fn config_show(config: &ResolvedConfig) -> ConfigShowResult {
    ConfigShowResult {
        config: config.clone(),
        version: crate::LONG_VERSION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_catalog(dir: &Path, json: &str) -> std::path::PathBuf {
        let path = dir.join("catalog.json");
        std::fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn test_parse_trader_value() {
        assert_eq!(parse_trader_value("prapor=3").unwrap(), ("prapor".to_string(), 3.0));
        assert_eq!(parse_trader_value(" fence = -0.5 ").unwrap(), ("fence".to_string(), -0.5));
        assert!(parse_trader_value("prapor").is_err());
        assert!(parse_trader_value("=2").is_err());
        assert!(parse_trader_value("prapor=lots").is_err());
    }

    #[test]
    fn test_parse_faction_arg() {
        assert_eq!(parse_faction_arg("usec").unwrap(), Faction::Usec);
        assert_eq!(parse_faction_arg(" Bear").unwrap(), Faction::Bear);
        assert!(matches!(parse_faction_arg("scav"), Err(Error::InvalidInput(_))));
        assert!(matches!(parse_faction_arg("Any"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_commands_require_init() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(tasks_list(temp.path()), Err(Error::NotInitialized)));
    }

    #[test]
    fn test_end_to_end_through_commands() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("data");
        let catalog = write_catalog(
            temp.path(),
            r#"[
                {"id": "a", "alternatives": ["b"]},
                {"id": "b", "alternatives": ["a"]},
                {"id": "after_b", "taskRequirements": [{"task": {"id": "b"}, "status": ["complete"]}]}
            ]"#,
        );

        let result = init(&data, Some(&catalog)).unwrap();
        assert!(result.created);
        assert_eq!(result.tasks, 3);

        actor_set(&data, "me", None, Some(10), Some("usec"), None, &[], &[]).unwrap();
        let rules = EngineRules::default();
        let before = available(&data, &rules, "me", false, &[], false).unwrap();
        assert_eq!(before.actors[0].available, vec!["a", "b"]);

        let updated = update(&data, "a", "me", "complete").unwrap();
        assert_eq!(updated.applied.closed_alternatives, vec!["b"]);
        assert!(updated.invalid_tasks.contains(&"after_b".to_string()));

        // A closed alternative is still offered; only the cascade marks it moot.
        let after = available(&data, &rules, "me", false, &[], true).unwrap();
        assert_eq!(after.actors[0].available, vec!["b"]);
        assert_eq!(after.actors[0].unavailable.as_ref().unwrap(), &vec!["a", "after_b"]);

        let shown = progress_show(&data, "me", false).unwrap();
        assert!(!shown.refreshed);
        assert!(shown.progress.is_invalid("b"));
    }
}
