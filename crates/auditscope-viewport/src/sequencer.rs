//! Query sequencing.
//!
//! Every historical fetch is tagged with a monotonically increasing
//! sequence number. Fetches are never cancelled; when one settles, its
//! result is accepted only if no newer fetch has been issued since. This is
//! what keeps a slow response for an old filter from overwriting the page
//! for the current one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use auditscope_client::{ClientError, QueryEndpoint, QueryPage, QueryRequest};
use auditscope_core::{Clock, DateRangeResolver, FilterState};
use tokio::sync::mpsc;

use crate::journal::{JournalEntry, ViewportJournal};

/// Handle to an issued fetch.
#[derive(Debug, Clone)]
pub struct FetchHandle {
    sequence: u64,
    last_issued: Arc<AtomicU64>,
}

impl FetchHandle {
    /// Returns the sequence tag.
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns true once a newer fetch has been issued.
    pub fn is_superseded(&self) -> bool {
        self.last_issued.load(Ordering::SeqCst) != self.sequence
    }
}

/// A settled fetch, as delivered to the owner.
#[derive(Debug)]
pub struct FetchSettlement {
    /// Sequence tag of the fetch.
    pub sequence: u64,
    /// What the endpoint returned.
    pub result: Result<QueryPage, ClientError>,
}

/// Classification of a settled fetch.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The latest fetch succeeded.
    Accepted {
        /// Sequence tag.
        sequence: u64,
        /// The page to show.
        page: QueryPage,
    },
    /// The latest fetch failed.
    Failed {
        /// Sequence tag.
        sequence: u64,
        /// Endpoint error.
        error: ClientError,
    },
    /// A superseded fetch settled; its result is ignored.
    StaleDropped {
        /// Sequence tag of the superseded fetch.
        sequence: u64,
        /// Latest issued sequence.
        latest: u64,
        /// Whether the ignored result was an error.
        was_error: bool,
    },
}

impl FetchOutcome {
    /// Returns the sequence tag of the settled fetch.
    pub const fn sequence(&self) -> u64 {
        match self {
            Self::Accepted { sequence, .. }
            | Self::Failed { sequence, .. }
            | Self::StaleDropped { sequence, .. } => *sequence,
        }
    }
}

/// Issues fetches and classifies their settlements.
///
/// Settlements are delivered as `M` values on the owner's channel so they
/// are serialized with every other input the owner handles.
#[derive(Debug)]
pub struct QuerySequencer<M = FetchSettlement> {
    endpoint: Arc<dyn QueryEndpoint>,
    resolver: DateRangeResolver,
    clock: Arc<dyn Clock>,
    journal: ViewportJournal,
    last_issued: Arc<AtomicU64>,
    settlements: mpsc::WeakUnboundedSender<M>,
}

impl<M> QuerySequencer<M>
where
    M: From<FetchSettlement> + Send + 'static,
{
    /// Creates a sequencer delivering settlements to `settlements`.
    ///
    /// Only a weak reference to the channel is kept; settlements are
    /// dropped once the owner's receiver has no strong senders left.
    pub fn new(
        endpoint: Arc<dyn QueryEndpoint>,
        resolver: DateRangeResolver,
        clock: Arc<dyn Clock>,
        journal: ViewportJournal,
        settlements: &mpsc::UnboundedSender<M>,
    ) -> Self {
        Self {
            endpoint,
            resolver,
            clock,
            journal,
            last_issued: Arc::new(AtomicU64::new(0)),
            settlements: settlements.downgrade(),
        }
    }

    /// Returns the most recently issued sequence; 0 before the first.
    pub fn last_issued(&self) -> u64 {
        self.last_issued.load(Ordering::SeqCst)
    }

    /// Starts a fetch for `state` and returns its handle.
    ///
    /// The date interval is resolved first, so an invalid range neither
    /// consumes a sequence number nor reaches the endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the date selector cannot be resolved.
    pub fn issue(&self, state: &FilterState) -> auditscope_core::Result<FetchHandle> {
        let interval = state.resolve_interval(&self.resolver, self.clock.now())?;
        let request = QueryRequest::from_filter(state, interval);
        let sequence = self.last_issued.fetch_add(1, Ordering::SeqCst) + 1;

        tracing::debug!(
            sequence,
            page = request.page,
            start = ?request.start_date,
            end = ?request.end_date,
            "Issuing audit log fetch"
        );
        self.journal.record(&JournalEntry::FetchIssued {
            sequence,
            page: request.page,
        });

        let endpoint = Arc::clone(&self.endpoint);
        let settlements = self.settlements.clone();
        tokio::spawn(async move {
            let result = endpoint.query(request).await;
            if let Some(settlements) = settlements.upgrade() {
                let _ = settlements.send(FetchSettlement { sequence, result }.into());
            }
        });

        Ok(FetchHandle {
            sequence,
            last_issued: Arc::clone(&self.last_issued),
        })
    }
}

impl<M> QuerySequencer<M> {
    /// Classifies a settlement against the latest issued sequence.
    pub fn settle(&self, settlement: FetchSettlement) -> FetchOutcome {
        let latest = self.last_issued.load(Ordering::SeqCst);
        let FetchSettlement { sequence, result } = settlement;

        let outcome = if sequence != latest {
            FetchOutcome::StaleDropped {
                sequence,
                latest,
                was_error: result.is_err(),
            }
        } else {
            match result {
                Ok(page) => FetchOutcome::Accepted { sequence, page },
                Err(error) => FetchOutcome::Failed { sequence, error },
            }
        };

        match &outcome {
            FetchOutcome::Accepted { sequence, page } => {
                tracing::info!(
                    sequence = *sequence,
                    entries = page.entries.len(),
                    total = page.total,
                    "Audit log fetch accepted"
                );
                self.journal.record(&JournalEntry::FetchAccepted {
                    sequence: *sequence,
                    entries: page.entries.len(),
                    total: page.total,
                });
            }
            FetchOutcome::Failed { sequence, error } => {
                tracing::warn!(sequence = *sequence, error = %error, "Audit log fetch failed");
                self.journal.record(&JournalEntry::FetchFailed {
                    sequence: *sequence,
                    error: error.to_string(),
                });
            }
            FetchOutcome::StaleDropped {
                sequence,
                latest,
                was_error,
            } => {
                tracing::debug!(
                    sequence = *sequence,
                    latest = *latest,
                    was_error = *was_error,
                    "Dropping stale audit log fetch"
                );
                self.journal.record(&JournalEntry::StaleDropped {
                    sequence: *sequence,
                    latest: *latest,
                    was_error: *was_error,
                });
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::InMemoryBackend;
    use auditscope_core::{CustomRange, DatePreset, EntryStatus, FixedClock};
    use auditscope_test::{entries, fixture_now, page, server_error, GatedQueryEndpoint};
    use chrono::NaiveDate;

    struct Harness {
        endpoint: Arc<GatedQueryEndpoint>,
        sequencer: QuerySequencer,
        settlements: mpsc::UnboundedReceiver<FetchSettlement>,
        journal: Arc<InMemoryBackend>,
        _sender: mpsc::UnboundedSender<FetchSettlement>,
    }

    fn harness() -> Harness {
        let endpoint = Arc::new(GatedQueryEndpoint::new());
        let journal = Arc::new(InMemoryBackend::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let sequencer = QuerySequencer::new(
            endpoint.clone(),
            DateRangeResolver::utc(),
            Arc::new(FixedClock::new(fixture_now())),
            ViewportJournal::builder().with_backend(journal.clone()).build(),
            &tx,
        );
        Harness {
            endpoint,
            sequencer,
            settlements: rx,
            journal,
            _sender: tx,
        }
    }

    #[tokio::test]
    async fn test_latest_fetch_wins_when_it_settles_first() {
        let mut h = harness();
        let a = h.sequencer.issue(&FilterState::default()).unwrap();
        let b = h.sequencer.issue(&FilterState::default().with_page(2)).unwrap();
        h.endpoint.wait_for_calls(2).await;

        assert!(a.is_superseded());
        assert!(!b.is_superseded());

        // Calls are spawned tasks, so match them to handles by page.
        let index_of = |page: u32| {
            (0..2)
                .find(|i| h.endpoint.request(*i).map(|r| r.page) == Some(page))
                .unwrap()
        };
        let (a_index, b_index) = (index_of(1), index_of(2));

        h.endpoint
            .respond(b_index, Ok(page(entries("b", 2, EntryStatus::Success), 2, 1)));
        let first = h.sequencer.settle(h.settlements.recv().await.unwrap());
        assert!(matches!(first, FetchOutcome::Accepted { sequence, .. } if sequence == b.sequence()));

        h.endpoint
            .respond(a_index, Ok(page(entries("a", 1, EntryStatus::Success), 1, 1)));
        let second = h.sequencer.settle(h.settlements.recv().await.unwrap());
        assert!(matches!(
            second,
            FetchOutcome::StaleDropped { sequence, latest, was_error: false }
                if sequence == a.sequence() && latest == b.sequence()
        ));
    }

    #[tokio::test]
    async fn test_stale_error_is_dropped_like_stale_success() {
        let mut h = harness();
        let first = h.sequencer.issue(&FilterState::default()).unwrap();
        h.endpoint.wait_for_calls(1).await;
        let _second = h.sequencer.issue(&FilterState::default()).unwrap();
        h.endpoint.wait_for_calls(2).await;

        h.endpoint.respond(0, Err(server_error()));
        let outcome = h.sequencer.settle(h.settlements.recv().await.unwrap());

        assert!(matches!(
            outcome,
            FetchOutcome::StaleDropped { was_error: true, .. }
        ));
        assert_eq!(outcome.sequence(), first.sequence());
        assert_eq!(
            h.journal
                .matching(|e| matches!(e, JournalEntry::StaleDropped { was_error: true, .. }))
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_current_failure_is_reported() {
        let mut h = harness();
        h.sequencer.issue(&FilterState::default()).unwrap();
        h.endpoint.wait_for_calls(1).await;

        h.endpoint.respond(0, Err(server_error()));
        let outcome = h.sequencer.settle(h.settlements.recv().await.unwrap());

        assert!(matches!(outcome, FetchOutcome::Failed { sequence: 1, .. }));
    }

    #[tokio::test]
    async fn test_invalid_range_never_issues() {
        let h = harness();
        let inverted = FilterState {
            date: DatePreset::Custom,
            custom_range: Some(CustomRange {
                start: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
                end: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            }),
            ..FilterState::default()
        };

        let result = h.sequencer.issue(&inverted);

        assert!(matches!(
            result,
            Err(auditscope_core::Error::InvalidRange { .. })
        ));
        assert_eq!(h.sequencer.last_issued(), 0);
        tokio::task::yield_now().await;
        assert_eq!(h.endpoint.call_count(), 0);
        assert!(h.journal.entries().is_empty());
    }

    #[tokio::test]
    async fn test_request_carries_resolved_interval() {
        let h = harness();
        h.sequencer.issue(&FilterState::default()).unwrap();
        h.endpoint.wait_for_calls(1).await;

        let request = h.endpoint.request(0).unwrap();
        assert_eq!(request.end_date, Some(fixture_now()));
        assert_eq!(
            request.start_date,
            Some(fixture_now() - chrono::TimeDelta::days(7))
        );
    }
}
