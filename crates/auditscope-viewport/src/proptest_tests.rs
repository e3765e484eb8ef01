//! Property-based tests for the reconciliation buffer and selection.
//!
//! These tests use proptest to check that arbitrary sequences of live
//! entries keep the snapshot consistent with its pagination totals.

use auditscope_core::{
    AuditLogEntry, DateRangeResolver, EntryStatus, FilterPredicate, FilterState, StatusFilter,
};
use auditscope_test::{entries, fixture_now, page, EntryBuilder};
use proptest::prelude::*;

use crate::{LivePatch, ReconciliationBuffer, SelectionTracker};

fn failed_only() -> FilterPredicate {
    let state = FilterState::default().with_status(StatusFilter::Only(EntryStatus::Failed));
    FilterPredicate::new(&state, DateRangeResolver::utc())
}

/// Strategy for generating a loaded buffer: (page size, page, fetched count, total).
fn loaded_strategy() -> impl Strategy<Value = (u32, u32, usize, u64)> {
    (1_u32..=25, 1_u32..=4).prop_flat_map(|(page_size, page)| {
        (0..=page_size as usize).prop_flat_map(move |count| {
            let min_total = u64::from(page - 1) * u64::from(page_size) + count as u64;
            (
                Just(page_size),
                Just(page),
                Just(count),
                min_total..=min_total + 100,
            )
        })
    })
}

/// Strategy for generating live entries: ids drawn from a small pool so
/// duplicates are common.
fn live_strategy() -> impl Strategy<Value = AuditLogEntry> {
    (0_u8..20, prop::bool::ANY).prop_map(|(id, failed)| {
        let status = if failed {
            EntryStatus::Failed
        } else {
            EntryStatus::Success
        };
        EntryBuilder::new(format!("live-{id}"))
            .status(status)
            .at(fixture_now())
            .build()
    })
}

fn loaded(page_size: u32, page_number: u32, count: usize, total: u64) -> ReconciliationBuffer {
    let mut buffer = ReconciliationBuffer::new(page_size);
    buffer.accept_fetch(
        1,
        page_number,
        page(
            entries("f", count, EntryStatus::Failed),
            total,
            total.div_ceil(u64::from(page_size)),
        ),
        &failed_only(),
        fixture_now(),
    );
    buffer
}

proptest! {
    #[test]
    fn live_patches_keep_totals_consistent(
        (page_size, page_number, count, total) in loaded_strategy(),
        live in prop::collection::vec(live_strategy(), 0..40),
    ) {
        let mut buffer = loaded(page_size, page_number, count, total);
        let predicate = failed_only();
        let mut applied = 0_u64;

        for entry in live {
            if buffer.apply_live(entry, &predicate, fixture_now()).is_applied() {
                applied += 1;
            }
            let snapshot = buffer.snapshot();
            prop_assert_eq!(snapshot.page_count, snapshot.total.div_ceil(u64::from(page_size)));
            prop_assert!(snapshot.entries.len() <= page_size as usize);
        }

        prop_assert_eq!(buffer.snapshot().total, total + applied);
    }

    #[test]
    fn non_matching_entries_never_change_snapshot(
        (page_size, page_number, count, total) in loaded_strategy(),
        ids in prop::collection::vec(0_u32..1000, 1..20),
    ) {
        let mut buffer = loaded(page_size, page_number, count, total);
        let before = buffer.snapshot().clone();

        for id in ids {
            let entry = EntryBuilder::new(format!("ok-{id}"))
                .status(EntryStatus::Success)
                .at(fixture_now())
                .build();
            prop_assert_eq!(
                buffer.apply_live(entry, &failed_only(), fixture_now()),
                LivePatch::FilteredOut
            );
        }

        prop_assert_eq!(buffer.snapshot(), &before);
    }

    #[test]
    fn repeated_entry_counted_once(
        (page_size, page_number, count, total) in loaded_strategy(),
        repeats in 2_usize..6,
    ) {
        let mut buffer = loaded(page_size, page_number, count, total);
        let entry = EntryBuilder::new("repeat")
            .status(EntryStatus::Failed)
            .at(fixture_now())
            .build();

        for _ in 0..repeats {
            buffer.apply_live(entry.clone(), &failed_only(), fixture_now());
        }

        prop_assert_eq!(buffer.snapshot().total, total + 1);
    }

    #[test]
    fn select_all_then_clear_is_empty(
        count in 0_usize..30,
        extra in prop::collection::btree_set("[a-z]{1,8}", 0..10),
    ) {
        let buffer = loaded(30, 1, count, count as u64);
        let mut selection = SelectionTracker::new();
        for id in extra {
            selection.toggle(id);
        }

        selection.select_all(buffer.snapshot());
        prop_assert!(selection.len() >= count);

        selection.clear();
        prop_assert!(selection.is_empty());
    }
}
