//! Viewport journal.
//!
//! Every reconciliation decision (fetch issued, accepted, failed or dropped
//! as stale, and every live patch outcome) is recorded as a typed
//! [`JournalEntry`] and fanned out to the configured [`JournalBackend`]s.
//! Tests use [`InMemoryBackend`] to assert on decisions that leave no other
//! visible trace, such as a stale response being discarded.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::buffer::LivePatch;

/// Severity of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalSeverity {
    /// Per-event detail.
    Debug,
    /// Normal state transitions.
    #[default]
    Info,
    /// Rejected input or degraded operation.
    Warning,
    /// Failed operation surfaced to the operator.
    Error,
}

/// A recorded reconciliation decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JournalEntry {
    /// A historical fetch was issued.
    FetchIssued {
        /// Sequence tag.
        sequence: u64,
        /// Requested page.
        page: u32,
    },
    /// The current fetch succeeded and replaced the snapshot.
    FetchAccepted {
        /// Sequence tag.
        sequence: u64,
        /// Entries on the page.
        entries: usize,
        /// Total matching entries.
        total: u64,
    },
    /// The current fetch failed; the snapshot was kept.
    FetchFailed {
        /// Sequence tag.
        sequence: u64,
        /// Error message.
        error: String,
    },
    /// A superseded fetch settled and was discarded.
    StaleDropped {
        /// Sequence tag of the discarded fetch.
        sequence: u64,
        /// Latest issued sequence at the time.
        latest: u64,
        /// Whether the discarded result was an error.
        was_error: bool,
    },
    /// A live entry was applied to or rejected by the snapshot.
    LivePatched {
        /// Entry id.
        entry_id: String,
        /// What happened to it.
        outcome: LivePatch,
    },
    /// A live entry arrived during a fetch and was held for replay.
    LiveHeld {
        /// Entry id.
        entry_id: String,
    },
    /// Held live entries were thrown away because the fetch failed.
    LiveHeldDiscarded {
        /// Number of entries discarded.
        count: usize,
    },
    /// A live message could not be normalized.
    LiveRejected {
        /// Why it was rejected.
        reason: String,
    },
    /// The live feed was opened or closed.
    LiveSubscription {
        /// Whether the viewport is now subscribed.
        subscribed: bool,
    },
    /// The live feed could not be opened.
    LiveUnavailable {
        /// Error message.
        error: String,
    },
    /// An export completed.
    ExportCompleted {
        /// Suggested filename.
        filename: String,
        /// Payload size in bytes.
        bytes: usize,
    },
    /// An export failed.
    ExportFailed {
        /// Error message.
        error: String,
    },
}

impl JournalEntry {
    /// Returns the severity of the entry.
    pub const fn severity(&self) -> JournalSeverity {
        match self {
            Self::LivePatched { .. } | Self::LiveHeld { .. } | Self::StaleDropped { .. } => {
                JournalSeverity::Debug
            }
            Self::FetchIssued { .. }
            | Self::FetchAccepted { .. }
            | Self::LiveSubscription { .. }
            | Self::ExportCompleted { .. } => JournalSeverity::Info,
            Self::LiveRejected { .. }
            | Self::LiveUnavailable { .. }
            | Self::LiveHeldDiscarded { .. } => JournalSeverity::Warning,
            Self::FetchFailed { .. } | Self::ExportFailed { .. } => JournalSeverity::Error,
        }
    }

    /// Returns the snake_case event name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::FetchIssued { .. } => "fetch_issued",
            Self::FetchAccepted { .. } => "fetch_accepted",
            Self::FetchFailed { .. } => "fetch_failed",
            Self::StaleDropped { .. } => "stale_dropped",
            Self::LivePatched { .. } => "live_patched",
            Self::LiveHeld { .. } => "live_held",
            Self::LiveHeldDiscarded { .. } => "live_held_discarded",
            Self::LiveRejected { .. } => "live_rejected",
            Self::LiveSubscription { .. } => "live_subscription",
            Self::LiveUnavailable { .. } => "live_unavailable",
            Self::ExportCompleted { .. } => "export_completed",
            Self::ExportFailed { .. } => "export_failed",
        }
    }
}

/// Errors that can occur while journaling.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    /// Serialization error
    #[error("Failed to serialize journal entry: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Destination for journal entries.
pub trait JournalBackend: Send + Sync + Debug {
    /// Records an entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be recorded.
    fn record(&self, entry: &JournalEntry) -> Result<(), JournalError>;

    /// Returns the backend name for identification.
    fn name(&self) -> &'static str;
}

/// Fans journal entries out to backends.
#[derive(Debug, Clone)]
pub struct ViewportJournal {
    backends: Vec<Arc<dyn JournalBackend>>,
    enabled: bool,
    min_severity: JournalSeverity,
}

impl Default for ViewportJournal {
    fn default() -> Self {
        Self::builder()
            .with_backend(Arc::new(TracingBackend::new()))
            .build()
    }
}

impl ViewportJournal {
    /// Creates a builder for configuring the journal.
    #[must_use]
    pub fn builder() -> ViewportJournalBuilder {
        ViewportJournalBuilder::new()
    }

    /// Creates a journal that records nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self::builder().enabled(false).build()
    }

    /// Records `entry` on every backend.
    ///
    /// Backend errors are traced and otherwise ignored.
    pub fn record(&self, entry: &JournalEntry) {
        if !self.enabled || entry.severity() < self.min_severity {
            return;
        }

        for backend in &self.backends {
            if let Err(e) = backend.record(entry) {
                error!(
                    backend = backend.name(),
                    error = %e,
                    "Failed to record journal entry"
                );
            }
        }
    }

    /// Returns the number of configured backends.
    #[must_use]
    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }
}

/// Builder for [`ViewportJournal`].
#[derive(Debug)]
pub struct ViewportJournalBuilder {
    backends: Vec<Arc<dyn JournalBackend>>,
    enabled: bool,
    min_severity: JournalSeverity,
}

impl Default for ViewportJournalBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewportJournalBuilder {
    /// Creates a new builder with no backends.
    #[must_use]
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
            enabled: true,
            min_severity: JournalSeverity::Debug,
        }
    }

    /// Adds a backend.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn JournalBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    /// Enables or disables the journal.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the minimum severity recorded.
    #[must_use]
    pub const fn min_severity(mut self, severity: JournalSeverity) -> Self {
        self.min_severity = severity;
        self
    }

    /// Builds the journal.
    #[must_use]
    pub fn build(self) -> ViewportJournal {
        ViewportJournal {
            backends: self.backends,
            enabled: self.enabled,
            min_severity: self.min_severity,
        }
    }
}

/// Backend that emits entries through `tracing`.
#[derive(Debug, Default)]
pub struct TracingBackend;

impl TracingBackend {
    /// Creates a new tracing backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl JournalBackend for TracingBackend {
    fn record(&self, entry: &JournalEntry) -> Result<(), JournalError> {
        let json = serde_json::to_string(entry)?;
        let event = entry.name();

        match entry.severity() {
            JournalSeverity::Debug => debug!(event, journal = %json, "Viewport journal"),
            JournalSeverity::Info => info!(event, journal = %json, "Viewport journal"),
            JournalSeverity::Warning | JournalSeverity::Error => {
                warn!(event, journal = %json, "Viewport journal");
            }
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "tracing"
    }
}

/// In-memory backend for tests.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    entries: Mutex<Vec<JournalEntry>>,
}

impl InMemoryBackend {
    /// Creates a new in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded entries.
    #[must_use]
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().clone()
    }

    /// Returns the recorded entries matching `predicate`.
    pub fn matching(&self, predicate: impl Fn(&JournalEntry) -> bool) -> Vec<JournalEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|entry| predicate(entry))
            .cloned()
            .collect()
    }

    /// Clears all recorded entries.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl JournalBackend for InMemoryBackend {
    fn record(&self, entry: &JournalEntry) -> Result<(), JournalError> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stale(sequence: u64) -> JournalEntry {
        JournalEntry::StaleDropped {
            sequence,
            latest: sequence + 1,
            was_error: false,
        }
    }

    #[test]
    fn test_journal_with_in_memory_backend() {
        let backend = Arc::new(InMemoryBackend::new());
        let journal = ViewportJournal::builder()
            .with_backend(backend.clone())
            .build();

        journal.record(&stale(1));
        journal.record(&JournalEntry::FetchIssued {
            sequence: 2,
            page: 1,
        });

        assert_eq!(backend.entries().len(), 2);
        assert_eq!(
            backend
                .matching(|e| matches!(e, JournalEntry::StaleDropped { .. }))
                .len(),
            1
        );
    }

    #[test]
    fn test_journal_disabled() {
        let backend = Arc::new(InMemoryBackend::new());
        let journal = ViewportJournal::builder()
            .with_backend(backend.clone())
            .enabled(false)
            .build();

        journal.record(&stale(1));
        assert!(backend.entries().is_empty());
    }

    #[test]
    fn test_journal_severity_filtering() {
        let backend = Arc::new(InMemoryBackend::new());
        let journal = ViewportJournal::builder()
            .with_backend(backend.clone())
            .min_severity(JournalSeverity::Warning)
            .build();

        journal.record(&stale(1));
        journal.record(&JournalEntry::FetchFailed {
            sequence: 2,
            error: "boom".to_string(),
        });

        let entries = backend.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name(), "fetch_failed");
    }

    #[test]
    fn test_multiple_backends() {
        let backend1 = Arc::new(InMemoryBackend::new());
        let backend2 = Arc::new(InMemoryBackend::new());

        let journal = ViewportJournal::builder()
            .with_backend(backend1.clone())
            .with_backend(backend2.clone())
            .build();

        journal.record(&stale(3));

        assert_eq!(journal.backend_count(), 2);
        assert_eq!(backend1.entries().len(), 1);
        assert_eq!(backend2.entries().len(), 1);
    }

    #[derive(Debug)]
    struct BrokenBackend;

    impl JournalBackend for BrokenBackend {
        fn record(&self, _entry: &JournalEntry) -> Result<(), JournalError> {
            let err = serde_json::from_str::<u8>("not a number").unwrap_err();
            Err(err.into())
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    #[test]
    fn test_failing_backend_does_not_block_others() {
        let backend = Arc::new(InMemoryBackend::new());
        let journal = ViewportJournal::builder()
            .with_backend(Arc::new(BrokenBackend))
            .with_backend(backend.clone())
            .build();

        journal.record(&stale(4));

        assert_eq!(backend.entries(), vec![stale(4)]);
    }

    #[test]
    fn test_entry_serialization() {
        let json = serde_json::to_string(&JournalEntry::LivePatched {
            entry_id: "e-1".to_string(),
            outcome: LivePatch::Prepended,
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"event":"live_patched","entry_id":"e-1","outcome":"prepended"}"#
        );
    }

    #[test]
    fn test_tracing_backend() {
        let backend = TracingBackend::new();
        assert!(backend.record(&stale(1)).is_ok());
        assert_eq!(backend.name(), "tracing");
    }
}
