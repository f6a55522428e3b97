//! Quick access: a flat, user-ordered list of pinned locations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::query::QueryPath;

/// One pinned location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickAccessEntry {
    pub id: u64,
    pub name: String,
    pub target: QueryPath,
}

/// Read access to the quick-access list.
pub trait QuickAccessSource: Send + Sync {
    fn entries(&self) -> Vec<QuickAccessEntry>;
}

/// In-memory quick-access list.
#[derive(Debug, Default)]
pub struct QuickAccessList {
    entries: RwLock<Vec<QuickAccessEntry>>,
    next_id: AtomicU64,
}

impl QuickAccessList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins `target`, using its last path component as the name.
    pub fn pin(&self, target: QueryPath) -> QuickAccessEntry {
        let entry = QuickAccessEntry {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            name: target.name(),
            target,
        };
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry.clone());
        entry
    }

    /// Removes the entry `id`. Returns `false` if it was not pinned.
    pub fn unpin(&self, id: u64) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }
}

impl QuickAccessSource for QuickAccessList {
    fn entries(&self) -> Vec<QuickAccessEntry> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_and_unpin() {
        let list = QuickAccessList::new();
        let a = list.pin(QueryPath::file("/books/a"));
        list.pin(QueryPath::file("/books/b"));
        assert_eq!(a.name, "a");
        assert_eq!(list.entries().len(), 2);

        assert!(list.unpin(a.id));
        assert!(!list.unpin(a.id));
        assert_eq!(list.entries()[0].name, "b");
    }
}
