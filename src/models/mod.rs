//! Data models for the quest graph.
//!
//! This module defines the core data structures:
//! - `Task` - Quest definitions with level, faction, trader and edition gates
//! - `Objective` - Sub-requirements attached to a task
//! - `TaskRequirement` - Predecessor edges with their accepted statuses
//! - `ActorCompletionRecord` - Per-actor completion/failure of one task
//! - `ActorProgressSnapshot` - Everything the engine reads about one actor
//!
//! Task definitions are static reference data. Snapshots are plain values the
//! engine reads but never mutates; the write path in [`crate::progress`] is the
//! only place that changes them.

pub mod graph;
pub mod lenient;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Faction a task is restricted to, or the faction an actor plays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Faction {
    /// Task is offered to every faction
    #[default]
    Any,
    Usec,
    Bear,
    /// Unrecognized faction name, kept verbatim
    Other(String),
}

impl Faction {
    /// Parse a faction name. Recognized names are matched exactly.
    pub fn parse(s: &str) -> Self {
        match s {
            "" | "Any" => Faction::Any,
            "USEC" => Faction::Usec,
            "BEAR" => Faction::Bear,
            other => Faction::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Faction::Any => "Any",
            Faction::Usec => "USEC",
            Faction::Bear => "BEAR",
            Faction::Other(name) => name,
        }
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for Faction {
    fn from(s: String) -> Self {
        Faction::parse(&s)
    }
}

impl From<Faction> for String {
    fn from(faction: Faction) -> Self {
        faction.as_str().to_string()
    }
}

impl Serialize for Faction {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Faction {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = lenient::text(deserializer)?;
        Ok(raw.map(Faction::from).unwrap_or_default())
    }
}

/// Status a predecessor task may be in to satisfy a requirement edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementStatus {
    Complete,
    /// Currently offered/unlocked (`active`, `accept`, `accepted`)
    Active,
    Failed,
}

/// Every spelling of a requirement status found in upstream data.
const STATUS_ALIASES: &[(&str, RequirementStatus)] = &[
    ("complete", RequirementStatus::Complete),
    ("completed", RequirementStatus::Complete),
    ("active", RequirementStatus::Active),
    ("accept", RequirementStatus::Active),
    ("accepted", RequirementStatus::Active),
    ("failed", RequirementStatus::Failed),
    ("fail", RequirementStatus::Failed),
];

impl RequirementStatus {
    /// Resolve a status string, case-insensitive. Unknown statuses yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let needle = s.trim().to_ascii_lowercase();
        STATUS_ALIASES
            .iter()
            .find(|(alias, _)| *alias == needle)
            .map(|(_, status)| *status)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementStatus::Complete => "complete",
            RequirementStatus::Active => "active",
            RequirementStatus::Failed => "failed",
        }
    }
}

/// Set of statuses accepted by one requirement edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StatusSet {
    bits: u8,
}

impl StatusSet {
    fn bit(status: RequirementStatus) -> u8 {
        match status {
            RequirementStatus::Complete => 0b001,
            RequirementStatus::Active => 0b010,
            RequirementStatus::Failed => 0b100,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, status: RequirementStatus) {
        self.bits |= Self::bit(status);
    }

    pub fn contains(&self, status: RequirementStatus) -> bool {
        self.bits & Self::bit(status) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// True when only completion of the predecessor can satisfy the edge.
    pub fn requires_completion_only(&self) -> bool {
        !self.contains(RequirementStatus::Active) && !self.contains(RequirementStatus::Failed)
    }

    /// Build a set from raw status strings, ignoring unknown spellings.
    pub fn from_strings<S: AsRef<str>>(raw: &[S]) -> Self {
        let mut set = Self::empty();
        for status in raw.iter().filter_map(|s| RequirementStatus::parse(s.as_ref())) {
            set.insert(status);
        }
        set
    }

    pub fn iter(&self) -> impl Iterator<Item = RequirementStatus> + '_ {
        [
            RequirementStatus::Complete,
            RequirementStatus::Active,
            RequirementStatus::Failed,
        ]
        .into_iter()
        .filter(|s| self.contains(*s))
    }
}

/// Comparison applied by trader standing objectives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareMethod {
    #[serde(rename = ">")]
    Gt,
    #[default]
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "=")]
    Eq,
}

const COMPARE_ALIASES: &[(&str, CompareMethod)] = &[
    (">", CompareMethod::Gt),
    ("gt", CompareMethod::Gt),
    ("greater", CompareMethod::Gt),
    ("greaterthan", CompareMethod::Gt),
    (">=", CompareMethod::Ge),
    ("=>", CompareMethod::Ge),
    ("gte", CompareMethod::Ge),
    ("ge", CompareMethod::Ge),
    ("atleast", CompareMethod::Ge),
    ("<", CompareMethod::Lt),
    ("lt", CompareMethod::Lt),
    ("less", CompareMethod::Lt),
    ("lessthan", CompareMethod::Lt),
    ("<=", CompareMethod::Le),
    ("=<", CompareMethod::Le),
    ("lte", CompareMethod::Le),
    ("le", CompareMethod::Le),
    ("atmost", CompareMethod::Le),
    ("=", CompareMethod::Eq),
    ("==", CompareMethod::Eq),
    ("eq", CompareMethod::Eq),
    ("equal", CompareMethod::Eq),
    ("equals", CompareMethod::Eq),
];

impl CompareMethod {
    /// Resolve a comparator spelling, case-insensitive, ignoring spaces and
    /// underscores. Unrecognized methods fall back to `>=`.
    pub fn parse(s: &str) -> Self {
        let needle: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        COMPARE_ALIASES
            .iter()
            .find(|(alias, _)| *alias == needle)
            .map(|(_, method)| *method)
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompareMethod::Gt => ">",
            CompareMethod::Ge => ">=",
            CompareMethod::Lt => "<",
            CompareMethod::Le => "<=",
            CompareMethod::Eq => "=",
        }
    }
}

impl fmt::Display for CompareMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Behavior of an objective. Only trader objectives gate availability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectiveKind {
    TraderLevel,
    TraderStanding,
    /// Informational objective type (kill, find item, visit, ...)
    Other(String),
}

impl From<String> for ObjectiveKind {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "traderlevel" => ObjectiveKind::TraderLevel,
            "traderstanding" => ObjectiveKind::TraderStanding,
            _ => ObjectiveKind::Other(s),
        }
    }
}

impl From<ObjectiveKind> for String {
    fn from(kind: ObjectiveKind) -> Self {
        match kind {
            ObjectiveKind::TraderLevel => "traderLevel".to_string(),
            ObjectiveKind::TraderStanding => "traderStanding".to_string(),
            ObjectiveKind::Other(s) => s,
        }
    }
}

impl Serialize for ObjectiveKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from(self.clone()))
    }
}

impl<'de> Deserialize<'de> for ObjectiveKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = lenient::text(deserializer)?;
        Ok(ObjectiveKind::from(raw.unwrap_or_default()))
    }
}

impl Default for ObjectiveKind {
    fn default() -> Self {
        ObjectiveKind::Other(String::new())
    }
}

/// Trader loyalty gate on a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraderRequirement {
    /// Trader id; absent ids make the requirement trivially satisfied
    #[serde(
        default,
        alias = "trader",
        deserialize_with = "lenient::entity_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub trader_id: Option<String>,

    /// Required loyalty level, clamped to [0,10] when compared
    #[serde(
        default,
        alias = "requiredLevel",
        alias = "value",
        deserialize_with = "lenient::number"
    )]
    pub level: f64,
}

/// Sub-requirement of a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Objective {
    #[serde(default, deserialize_with = "lenient::entity_id_or_empty")]
    pub id: String,

    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Optional objectives never block availability
    #[serde(default, deserialize_with = "lenient::flag")]
    pub optional: bool,

    #[serde(rename = "type", default)]
    pub kind: ObjectiveKind,

    #[serde(
        default,
        alias = "trader",
        deserialize_with = "lenient::entity_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub trader_id: Option<String>,

    /// Loyalty level for `traderLevel` objectives
    #[serde(default, deserialize_with = "lenient::number")]
    pub level: f64,

    /// Standing threshold for `traderStanding` objectives
    #[serde(default, deserialize_with = "lenient::number")]
    pub value: f64,

    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub compare_method: Option<String>,
}

impl Objective {
    /// True when this objective can block availability.
    pub fn is_gating(&self) -> bool {
        !self.optional
            && matches!(
                self.kind,
                ObjectiveKind::TraderLevel | ObjectiveKind::TraderStanding
            )
    }

    pub fn compare_method(&self) -> CompareMethod {
        self.compare_method
            .as_deref()
            .map(CompareMethod::parse)
            .unwrap_or_default()
    }
}

/// Predecessor edge of a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequirement {
    /// Id of the predecessor task
    #[serde(
        default,
        alias = "targetTaskId",
        alias = "taskId",
        deserialize_with = "lenient::entity_id_or_empty"
    )]
    pub task: String,

    /// Raw accepted statuses as found in the data
    #[serde(default, alias = "statuses", deserialize_with = "lenient::strings")]
    pub status: Vec<String>,
}

impl TaskRequirement {
    pub fn new(task: impl Into<String>, statuses: &[&str]) -> Self {
        Self {
            task: task.into(),
            status: statuses.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Accepted statuses after alias resolution.
    pub fn statuses(&self) -> StatusSet {
        StatusSet::from_strings(&self.status)
    }
}

/// A quest-like unit of content with prerequisites and gates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier
    pub id: String,

    /// Display name
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub faction_name: Faction,

    /// Minimum actor level; 0 means no gate
    #[serde(default, alias = "minLevel", deserialize_with = "lenient::whole")]
    pub min_player_level: u32,

    /// Restricted to premium game editions
    #[serde(default, deserialize_with = "lenient::flag")]
    pub eod_only: bool,

    #[serde(default, deserialize_with = "lenient::lossy_list")]
    pub trader_level_requirements: Vec<TraderRequirement>,

    /// Legacy spelling of trader gates, still honored
    #[serde(default, deserialize_with = "lenient::lossy_list")]
    pub trader_requirements: Vec<TraderRequirement>,

    #[serde(default, deserialize_with = "lenient::lossy_list")]
    pub objectives: Vec<Objective>,

    #[serde(default, deserialize_with = "lenient::lossy_list")]
    pub task_requirements: Vec<TaskRequirement>,

    /// Tasks that must not be failed
    #[serde(default, deserialize_with = "lenient::entity_ids")]
    pub failed_requirements: Vec<String>,

    /// Mutually exclusive tasks
    #[serde(default, deserialize_with = "lenient::entity_ids")]
    pub alternatives: Vec<String>,
}

impl Task {
    /// Create a task with no gates.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// All trader loyalty gates, current and legacy.
    pub fn trader_gates(&self) -> impl Iterator<Item = &TraderRequirement> {
        self.trader_level_requirements
            .iter()
            .chain(self.trader_requirements.iter())
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Completion/failure of one task for one actor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorCompletionRecord {
    #[serde(default, deserialize_with = "lenient::flag")]
    pub complete: bool,

    /// A record may be complete and failed at once (failed-but-closed)
    #[serde(default, deserialize_with = "lenient::flag")]
    pub failed: bool,

    #[serde(default, deserialize_with = "lenient::timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ActorCompletionRecord {
    pub fn completed(at: DateTime<Utc>) -> Self {
        Self {
            complete: true,
            failed: false,
            timestamp: Some(at),
        }
    }

    /// Closed without success.
    pub fn failed(at: DateTime<Utc>) -> Self {
        Self {
            complete: true,
            failed: true,
            timestamp: Some(at),
        }
    }

    /// Closed because an exclusive alternative was completed.
    pub fn closed(at: DateTime<Utc>) -> Self {
        Self {
            complete: false,
            failed: true,
            timestamp: Some(at),
        }
    }

    /// Completed for real, as opposed to closed by failure.
    pub fn is_chosen(&self) -> bool {
        self.complete && !self.failed
    }

    pub fn is_closed(&self) -> bool {
        self.failed && !self.complete
    }
}

/// Per-actor view of everything the engine needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorProgressSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, deserialize_with = "lenient::whole")]
    pub level: u32,

    /// Faction the actor plays; `None` until chosen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faction_name: Option<Faction>,

    #[serde(default, alias = "gameEdition", deserialize_with = "lenient::whole")]
    pub game_edition_id: u32,

    /// Loyalty level per trader, 0..10
    #[serde(default, deserialize_with = "lenient::number_map")]
    pub trader_loyalty_levels: BTreeMap<String, f64>,

    /// Standing per trader
    #[serde(default, deserialize_with = "lenient::number_map")]
    pub trader_standings: BTreeMap<String, f64>,

    #[serde(default)]
    pub task_completions: BTreeMap<String, ActorCompletionRecord>,

    #[serde(default)]
    pub objective_completions: BTreeMap<String, bool>,
}

impl ActorProgressSnapshot {
    pub fn new(level: u32, faction: Faction) -> Self {
        Self {
            level,
            faction_name: Some(faction),
            ..Default::default()
        }
    }

    pub fn record(&self, task_id: &str) -> Option<&ActorCompletionRecord> {
        self.task_completions.get(task_id)
    }

    pub fn is_complete(&self, task_id: &str) -> bool {
        self.record(task_id).is_some_and(|r| r.complete)
    }

    pub fn is_failed(&self, task_id: &str) -> bool {
        self.record(task_id).is_some_and(|r| r.failed)
    }

    pub fn loyalty(&self, trader_id: &str) -> f64 {
        self.trader_loyalty_levels
            .get(trader_id)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn standing(&self, trader_id: &str) -> f64 {
        self.trader_standings.get(trader_id).copied().unwrap_or(0.0)
    }

    pub fn objective_complete(&self, objective_id: &str) -> bool {
        self.objective_completions
            .get(objective_id)
            .copied()
            .unwrap_or(false)
    }
}
