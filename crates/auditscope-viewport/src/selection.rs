//! Operator selection for bulk operations.

use std::collections::BTreeSet;

use crate::buffer::PageSnapshot;

/// Set of selected entry ids.
///
/// The set is independent of the displayed page: entries stay selected
/// when the page changes or live entries push them off page 1.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionTracker {
    ids: BTreeSet<String>,
}

impl SelectionTracker {
    /// Creates an empty selection.
    pub const fn new() -> Self {
        Self {
            ids: BTreeSet::new(),
        }
    }

    /// Flips the selection of `id`. Returns true if it is now selected.
    pub fn toggle(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        }
    }

    /// Selects every entry currently on the page. Returns how many were
    /// newly selected.
    pub fn select_all(&mut self, snapshot: &PageSnapshot) -> usize {
        snapshot
            .ids()
            .filter(|id| self.ids.insert((*id).to_string()))
            .count()
    }

    /// Empties the selection.
    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Returns true if `id` is selected.
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Returns the number of selected ids.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns the selected ids in sorted order.
    pub fn ids(&self) -> &BTreeSet<String> {
        &self.ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditscope_core::EntryStatus;
    use auditscope_test::entries;

    fn snapshot(count: usize) -> PageSnapshot {
        PageSnapshot {
            entries: entries("e", count, EntryStatus::Success),
            total: count as u64,
            page_count: 1,
            sequence: 1,
        }
    }

    #[test]
    fn test_toggle() {
        let mut selection = SelectionTracker::new();
        assert!(selection.toggle("a"));
        assert!(selection.contains("a"));
        assert!(!selection.toggle("a"));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_select_all_then_clear() {
        let mut selection = SelectionTracker::new();
        assert_eq!(selection.select_all(&snapshot(4)), 4);
        assert_eq!(selection.len(), 4);

        selection.clear();
        assert!(selection.is_empty());
    }

    #[test]
    fn test_select_all_keeps_other_pages() {
        let mut selection = SelectionTracker::new();
        selection.toggle("from-page-3");
        selection.toggle("e-1");

        assert_eq!(selection.select_all(&snapshot(3)), 2);
        assert_eq!(selection.len(), 4);
        assert!(selection.contains("from-page-3"));
    }
}
