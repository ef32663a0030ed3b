use std::collections::HashMap;

use crate::models::{PinnedProject, TodoStatus};

/// In-memory projection of the pinned-projects query, keyed by project id.
///
/// Reads never miss: unknown ids yield the default (unpinned) status. Every
/// write bumps [`TodoCache::generation`] so derived views can tell when to
/// recompute.
#[derive(Debug, Clone, Default)]
pub struct TodoCache {
    entries: HashMap<i64, TodoStatus>,
    generation: u64,
}

impl TodoCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache from a pinned-projects snapshot
    pub fn from_snapshot(pinned: impl IntoIterator<Item = PinnedProject>) -> Self {
        let mut cache = Self::new();
        cache.replace_all(pinned);
        cache
    }

    pub fn get(&self, project_id: i64) -> TodoStatus {
        self.entries.get(&project_id).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, project_id: i64, status: TodoStatus) {
        self.entries.insert(project_id, status);
        self.generation += 1;
    }

    /// Replace the whole mapping with an authoritative snapshot.
    ///
    /// Ids missing from the snapshot read as unpinned afterwards, and any
    /// optimistic value written before this call is gone.
    pub fn replace_all(&mut self, pinned: impl IntoIterator<Item = PinnedProject>) {
        self.entries = pinned
            .into_iter()
            .map(|row| (row.project_id, row.status))
            .collect();
        self.generation += 1;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
