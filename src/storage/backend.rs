//! Progress store trait and the in-memory implementation.
//!
//! - `FileStore` - JSON files under a data directory (default)
//! - `MemoryStore` - process-local maps, for tests and embedding

use crate::models::ActorProgressSnapshot;
use crate::progress::FormattedProgress;
use crate::{Error, Result};
use std::collections::BTreeMap;

/// Persistence for actor snapshots, formatted views and team membership.
pub trait ProgressStore {
    /// Load an actor's snapshot, `None` when the actor has none.
    fn load_snapshot(&self, actor_id: &str) -> Result<Option<ActorProgressSnapshot>>;

    /// Replace an actor's snapshot.
    fn save_snapshot(&mut self, actor_id: &str, snapshot: &ActorProgressSnapshot) -> Result<()>;

    /// Load the last formatted view written for an actor.
    fn load_formatted(&self, actor_id: &str) -> Result<Option<FormattedProgress>>;

    /// Replace an actor's formatted view.
    fn save_formatted(&mut self, actor_id: &str, progress: &FormattedProgress) -> Result<()>;

    /// Teammates of an actor, not including the actor itself.
    fn teammates(&self, actor_id: &str) -> Result<Vec<String>>;

    /// Replace an actor's teammates.
    fn set_teammates(&mut self, actor_id: &str, members: &[String]) -> Result<()>;

    /// Ids of every actor with a stored snapshot, sorted.
    fn actor_ids(&self) -> Result<Vec<String>>;

    /// Storage location description (for display purposes).
    fn location(&self) -> String;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshots: BTreeMap<String, ActorProgressSnapshot>,
    formatted: BTreeMap<String, FormattedProgress>,
    teams: BTreeMap<String, Vec<String>>,
    reject_formatted: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `save_formatted` fail, to exercise the best-effort refresh.
    pub fn reject_formatted_writes(&mut self, reject: bool) {
        self.reject_formatted = reject;
    }
}

impl ProgressStore for MemoryStore {
    fn load_snapshot(&self, actor_id: &str) -> Result<Option<ActorProgressSnapshot>> {
        Ok(self.snapshots.get(actor_id).cloned())
    }

    fn save_snapshot(&mut self, actor_id: &str, snapshot: &ActorProgressSnapshot) -> Result<()> {
        self.snapshots.insert(actor_id.to_string(), snapshot.clone());
        Ok(())
    }

    fn load_formatted(&self, actor_id: &str) -> Result<Option<FormattedProgress>> {
        Ok(self.formatted.get(actor_id).cloned())
    }

    fn save_formatted(&mut self, actor_id: &str, progress: &FormattedProgress) -> Result<()> {
        if self.reject_formatted {
            return Err(Error::Other("formatted progress writes are disabled".to_string()));
        }
        self.formatted.insert(actor_id.to_string(), progress.clone());
        Ok(())
    }

    fn teammates(&self, actor_id: &str) -> Result<Vec<String>> {
        Ok(self.teams.get(actor_id).cloned().unwrap_or_default())
    }

    fn set_teammates(&mut self, actor_id: &str, members: &[String]) -> Result<()> {
        self.teams.insert(actor_id.to_string(), members.to_vec());
        Ok(())
    }

    fn actor_ids(&self) -> Result<Vec<String>> {
        Ok(self.snapshots.keys().cloned().collect())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let mut store = MemoryStore::new();
        assert!(store.load_snapshot("me").unwrap().is_none());

        let snapshot = ActorProgressSnapshot {
            level: 3,
            ..Default::default()
        };
        store.save_snapshot("me", &snapshot).unwrap();
        assert_eq!(store.load_snapshot("me").unwrap(), Some(snapshot));
        assert_eq!(store.actor_ids().unwrap(), vec!["me"]);
        assert!(store.teammates("me").unwrap().is_empty());
    }

    #[test]
    fn test_memory_store_rejects_formatted_when_asked() {
        let mut store = MemoryStore::new();
        store.reject_formatted_writes(true);
        let result = store.save_formatted("me", &FormattedProgress::default());
        assert!(matches!(result, Err(Error::Other(_))));
    }
}
