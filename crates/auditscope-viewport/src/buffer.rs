//! Reconciliation of the fetched page with the live tail.
//!
//! The buffer owns the displayed [`PageSnapshot`] and has exactly two ways
//! to change it: an accepted fetch replaces it wholesale, and a live entry
//! patches it in place. Both are applied by the single viewport owner, so
//! no locking is involved.

use std::collections::HashSet;

use auditscope_client::QueryPage;
use auditscope_core::{AuditLogEntry, FilterPredicate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The displayed page and its pagination totals.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageSnapshot {
    /// Entries on the displayed page, newest first.
    pub entries: Vec<AuditLogEntry>,
    /// Total matching entries across all pages.
    pub total: u64,
    /// Number of pages at the session page size.
    pub page_count: u64,
    /// Sequence of the fetch that produced the snapshot; 0 before the first.
    pub sequence: u64,
}

impl PageSnapshot {
    /// Returns true if an entry with `id` is on the page.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    /// Returns the ids on the page, in display order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.id.as_str())
    }
}

/// What a live entry did to the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LivePatch {
    /// Shown at the top of page 1 and counted.
    Prepended,
    /// Counted only; the displayed page is not page 1.
    Counted,
    /// Already reflected in the snapshot.
    Duplicate,
    /// Does not match the active filter.
    FilteredOut,
    /// Held during a fetch of a later page; the fetched totals stand.
    Superseded,
}

impl LivePatch {
    /// Returns true if the snapshot changed.
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Prepended | Self::Counted)
    }
}

/// Owner of the [`PageSnapshot`].
#[derive(Debug, Clone)]
pub struct ReconciliationBuffer {
    snapshot: PageSnapshot,
    page: u32,
    page_size: u32,
    applied_live: HashSet<String>,
    held: Vec<AuditLogEntry>,
}

impl ReconciliationBuffer {
    /// Creates an empty buffer for the given page size.
    pub fn new(page_size: u32) -> Self {
        Self {
            snapshot: PageSnapshot::default(),
            page: 1,
            page_size: page_size.max(1),
            applied_live: HashSet::new(),
            held: Vec::new(),
        }
    }

    /// Returns the current snapshot.
    pub const fn snapshot(&self) -> &PageSnapshot {
        &self.snapshot
    }

    /// Returns the page the snapshot shows.
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// Returns the number of live entries waiting for the next snapshot.
    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    /// Replaces the snapshot with an accepted fetch result, then replays
    /// any held live entries onto it.
    ///
    /// Held entries are only replayed onto page 1, where a copy already
    /// counted by the server shows up by id. On later pages they are
    /// reported as [`LivePatch::Superseded`] and the fetched totals are kept.
    ///
    /// Returns the outcome of each replayed entry.
    pub fn accept_fetch(
        &mut self,
        sequence: u64,
        page: u32,
        result: QueryPage,
        predicate: &FilterPredicate,
        now: DateTime<Utc>,
    ) -> Vec<(String, LivePatch)> {
        self.snapshot = PageSnapshot {
            entries: result.entries,
            total: result.total,
            page_count: result.page_count,
            sequence,
        };
        self.page = page;
        self.applied_live.clear();

        let held = std::mem::take(&mut self.held);
        held.into_iter()
            .map(|entry| {
                let id = entry.id.clone();
                let outcome = if self.page == 1 {
                    self.apply_live(entry, predicate, now)
                } else {
                    LivePatch::Superseded
                };
                (id, outcome)
            })
            .collect()
    }

    /// Keeps a live entry until the in-flight fetch settles.
    ///
    /// Returns [`LivePatch::FilteredOut`] without holding it if it does not
    /// match, `None` otherwise.
    pub fn hold(
        &mut self,
        entry: AuditLogEntry,
        predicate: &FilterPredicate,
        now: DateTime<Utc>,
    ) -> Option<LivePatch> {
        if !predicate.matches(&entry, now) {
            return Some(LivePatch::FilteredOut);
        }
        if self.held.iter().any(|held| held.id == entry.id) {
            return Some(LivePatch::Duplicate);
        }
        self.held.push(entry);
        None
    }

    /// Drops held live entries. Returns how many were dropped.
    pub fn discard_held(&mut self) -> usize {
        let count = self.held.len();
        self.held.clear();
        count
    }

    /// Applies one live entry to the snapshot.
    pub fn apply_live(
        &mut self,
        entry: AuditLogEntry,
        predicate: &FilterPredicate,
        now: DateTime<Utc>,
    ) -> LivePatch {
        if !predicate.matches(&entry, now) {
            return LivePatch::FilteredOut;
        }
        if self.applied_live.contains(&entry.id) || self.snapshot.contains(&entry.id) {
            return LivePatch::Duplicate;
        }

        self.applied_live.insert(entry.id.clone());
        self.snapshot.total += 1;
        self.snapshot.page_count = self.snapshot.total.div_ceil(u64::from(self.page_size));

        if self.page == 1 {
            self.snapshot.entries.insert(0, entry);
            self.snapshot.entries.truncate(self.page_size as usize);
            LivePatch::Prepended
        } else {
            LivePatch::Counted
        }
    }
}
