//! Comparators shared by the availability checks.

use crate::models::{ActorProgressSnapshot, CompareMethod, Faction, Objective, ObjectiveKind};
use std::collections::BTreeSet;

/// Highest trader loyalty level.
pub const MAX_TRADER_LEVEL: f64 = 10.0;

/// Tolerance for `=` standing comparisons.
const STANDING_EPSILON: f64 = 1e-6;

/// Clamp a loyalty level into `[0, 10]`. Non-finite values become 0.
pub fn clamp_trader_level(level: f64) -> f64 {
    if level.is_finite() {
        level.clamp(0.0, MAX_TRADER_LEVEL)
    } else {
        0.0
    }
}

/// True when the actor's loyalty meets the required level, both clamped.
pub fn trader_level_satisfied(actor_level: f64, required: f64) -> bool {
    clamp_trader_level(actor_level) >= clamp_trader_level(required)
}

/// Compare an actor's standing with a threshold using `method`.
pub fn compare_standing(actual: f64, method: CompareMethod, required: f64) -> bool {
    match method {
        CompareMethod::Gt => actual > required,
        CompareMethod::Ge => actual >= required,
        CompareMethod::Lt => actual < required,
        CompareMethod::Le => actual <= required,
        CompareMethod::Eq => (actual - required).abs() < STANDING_EPSILON,
    }
}

/// Compare using a raw method spelling; unknown spellings mean `>=`.
pub fn standing_comparator(actual: f64, method: &str, required: f64) -> bool {
    compare_standing(actual, CompareMethod::parse(method), required)
}

/// Edition ids that unlock `eodOnly` tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditionSet {
    editions: BTreeSet<u32>,
}

impl EditionSet {
    pub fn new(editions: impl IntoIterator<Item = u32>) -> Self {
        Self {
            editions: editions.into_iter().collect(),
        }
    }

    pub fn contains(&self, edition: u32) -> bool {
        self.editions.contains(&edition)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.editions.iter().copied()
    }
}

impl Default for EditionSet {
    fn default() -> Self {
        Self::new(DEFAULT_PREMIUM_EDITIONS.iter().copied())
    }
}

/// Edge of Darkness and Unheard.
pub const DEFAULT_PREMIUM_EDITIONS: &[u32] = &[4, 5];

/// Edition gate: only premium editions see `eodOnly` tasks.
pub fn edition_allowed(eod_only: bool, edition: u32, premium: &EditionSet) -> bool {
    !eod_only || premium.contains(edition)
}

/// Faction gate: `Any` tasks pass for everyone, others need an exact match.
pub fn faction_allowed(task_faction: &Faction, actor_faction: Option<&Faction>) -> bool {
    match task_faction {
        Faction::Any => true,
        required => actor_faction == Some(required),
    }
}

/// Check a gating objective against the actor's trader data.
///
/// Objectives without a trader id, and informational objective types, pass.
pub fn objective_satisfied(objective: &Objective, snapshot: &ActorProgressSnapshot) -> bool {
    let Some(trader) = objective.trader_id.as_deref() else {
        return true;
    };
    match objective.kind {
        ObjectiveKind::TraderLevel => trader_level_satisfied(snapshot.loyalty(trader), objective.level),
        ObjectiveKind::TraderStanding => compare_standing(
            snapshot.standing(trader),
            objective.compare_method(),
            objective.value,
        ),
        ObjectiveKind::Other(_) => true,
    }
}
