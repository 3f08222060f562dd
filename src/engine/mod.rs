//! The quest graph engine.
//!
//! Two entry points, both synchronous and free of I/O:
//! - [`AvailabilityEvaluator::evaluate`] - is a task offered to an actor right now
//! - [`invalidate_tasks`] - which tasks are moot because an exclusive alternative was chosen
//!
//! Both read one consistent snapshot version. Callers that serve a request
//! should evaluate and invalidate against the same version.

pub mod availability;
pub mod invalidation;
pub mod predicates;

pub use availability::{AvailabilityEvaluator, Blocker, EvalStats, MemoCache};
pub use invalidation::{InvalidationSummary, invalidate_tasks};
pub use predicates::{EditionSet, standing_comparator};

/// Process-wide evaluation settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineRules {
    /// Editions that unlock `eodOnly` tasks
    pub premium_editions: EditionSet,
}

impl EngineRules {
    pub fn new(premium_editions: EditionSet) -> Self {
        Self { premium_editions }
    }
}
