//! Live event ingestion.
//!
//! The ingestor owns at most one subscription to the live feed. While
//! subscribed, a background task reads [`LiveMessage`]s, normalizes entries
//! into [`AuditLogEntry`] values, and forwards them to the owner's channel
//! in receipt order. It never filters or deduplicates; that is the
//! reconciliation buffer's job.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use auditscope_client::{EventTransport, LiveMessage, LiveSubscription};
use auditscope_core::AuditLogEntry;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::journal::{JournalEntry, ViewportJournal};

/// A normalized live entry tagged with the subscription that produced it.
#[derive(Debug, Clone)]
pub struct LiveEvent {
    /// Subscription generation.
    pub generation: u64,
    /// The entry.
    pub entry: AuditLogEntry,
}

/// Handle to an active subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    generation: u64,
    token: CancellationToken,
}

impl SubscriptionHandle {
    /// Returns the subscription generation.
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns true once the subscription was closed.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug, Default)]
struct IngestorStats {
    received: AtomicU64,
    rejected: AtomicU64,
    unavailable: AtomicBool,
}

#[derive(Debug)]
struct ActiveSubscription {
    handle: SubscriptionHandle,
    task: JoinHandle<()>,
}

/// Owner of the live feed subscription.
#[derive(Debug)]
pub struct LiveEventIngestor<M = LiveEvent> {
    transport: Arc<dyn EventTransport>,
    sink: mpsc::WeakUnboundedSender<M>,
    journal: ViewportJournal,
    active: Option<ActiveSubscription>,
    generation: u64,
    stats: Arc<IngestorStats>,
}

impl<M> LiveEventIngestor<M>
where
    M: From<LiveEvent> + Send + 'static,
{
    /// Creates an unsubscribed ingestor forwarding entries to `sink`.
    pub fn new(
        transport: Arc<dyn EventTransport>,
        journal: ViewportJournal,
        sink: &mpsc::UnboundedSender<M>,
    ) -> Self {
        Self {
            transport,
            sink: sink.downgrade(),
            journal,
            active: None,
            generation: 0,
            stats: Arc::new(IngestorStats::default()),
        }
    }

    /// Opens the feed. Does nothing if already subscribed.
    ///
    /// Opening happens in the background; if the transport cannot be
    /// opened the subscription stays in place and simply delivers nothing.
    pub fn subscribe(&mut self, subscription: LiveSubscription) -> SubscriptionHandle {
        if let Some(active) = &self.active {
            return active.handle.clone();
        }

        self.generation += 1;
        let handle = SubscriptionHandle {
            generation: self.generation,
            token: CancellationToken::new(),
        };
        self.stats.unavailable.store(false, Ordering::SeqCst);

        info!(
            generation = handle.generation,
            action = ?subscription.action,
            status = ?subscription.status,
            "Subscribing to live audit feed"
        );
        self.journal
            .record(&JournalEntry::LiveSubscription { subscribed: true });

        let task = tokio::spawn(run_subscription(
            Arc::clone(&self.transport),
            subscription,
            handle.clone(),
            self.sink.clone(),
            self.journal.clone(),
            Arc::clone(&self.stats),
        ));

        self.active = Some(ActiveSubscription {
            handle: handle.clone(),
            task,
        });
        handle
    }
}

impl<M> LiveEventIngestor<M> {
    /// Closes the feed. Returns false if not subscribed.
    pub fn unsubscribe(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };

        active.handle.token.cancel();
        info!(
            generation = active.handle.generation,
            "Unsubscribed from live audit feed"
        );
        self.journal
            .record(&JournalEntry::LiveSubscription { subscribed: false });
        true
    }

    /// Returns true while subscribed.
    pub const fn is_subscribed(&self) -> bool {
        self.active.is_some()
    }

    /// Returns true if `generation` belongs to the active subscription.
    pub fn is_current(&self, generation: u64) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.handle.generation == generation)
    }

    /// Returns the number of entries forwarded so far.
    pub fn events_received(&self) -> u64 {
        self.stats.received.load(Ordering::SeqCst)
    }

    /// Returns the number of live entries that failed normalization.
    pub fn events_rejected(&self) -> u64 {
        self.stats.rejected.load(Ordering::SeqCst)
    }

    /// Returns true if the last open attempt failed.
    pub fn is_unavailable(&self) -> bool {
        self.stats.unavailable.load(Ordering::SeqCst)
    }
}

impl<M> Drop for LiveEventIngestor<M> {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.handle.token.cancel();
            active.task.abort();
        }
    }
}

async fn run_subscription<M>(
    transport: Arc<dyn EventTransport>,
    subscription: LiveSubscription,
    handle: SubscriptionHandle,
    sink: mpsc::WeakUnboundedSender<M>,
    journal: ViewportJournal,
    stats: Arc<IngestorStats>,
) where
    M: From<LiveEvent> + Send + 'static,
{
    let token = handle.token;
    let generation = handle.generation;

    let opened = tokio::select! {
        biased;
        () = token.cancelled() => return,
        opened = transport.open(subscription) => opened,
    };

    let mut stream = match opened {
        Ok(stream) => stream,
        Err(e) => {
            warn!(generation, error = %e, "Live audit feed unavailable, live updates paused");
            stats.unavailable.store(true, Ordering::SeqCst);
            journal.record(&JournalEntry::LiveUnavailable {
                error: e.to_string(),
            });
            return;
        }
    };

    loop {
        let message = tokio::select! {
            biased;
            () = token.cancelled() => break,
            message = stream.next() => message,
        };

        let raw = match message {
            Some(LiveMessage::Entry { entry }) => entry,
            Some(LiveMessage::Heartbeat) => continue,
            Some(LiveMessage::Unknown) => {
                debug!(generation, "Ignoring unknown live message");
                continue;
            }
            None => {
                debug!(generation, "Live audit feed closed");
                break;
            }
        };

        let entry = match AuditLogEntry::try_from(raw) {
            Ok(entry) => entry,
            Err(e) => {
                stats.rejected.fetch_add(1, Ordering::SeqCst);
                warn!(generation, error = %e, "Rejected live audit entry");
                journal.record(&JournalEntry::LiveRejected {
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let Some(sink) = sink.upgrade() else {
            debug!(generation, "Viewport gone, closing live audit feed");
            break;
        };
        debug!(generation, entry_id = %entry.id, "Live audit entry received");
        if sink.send(LiveEvent { generation, entry }.into()).is_err() {
            break;
        }
        stats.received.fetch_add(1, Ordering::SeqCst);
    }
}
