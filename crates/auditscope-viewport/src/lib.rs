//! # auditscope Viewport
//!
//! Reconciles a paginated audit-log snapshot with a live tail of new
//! entries.
//!
//! A [`Viewport`] is a single-writer task. It owns:
//!
//! - the [`FilterModel`](auditscope_core::FilterModel) for the active query
//! - a [`QuerySequencer`] so only the latest fetch ever lands
//! - a [`ReconciliationBuffer`] holding the displayed [`PageSnapshot`]
//! - a [`SelectionTracker`] for bulk export
//! - a [`LiveEventIngestor`] for the optional live feed
//!
//! Every outcome worth auditing (accepted, failed and stale fetches, live
//! patches) is written to a [`ViewportJournal`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use auditscope_client::{ClientConfig, HttpAuditClient, SseEventTransport};
//! use auditscope_viewport::{Viewport, ViewportConfig, ViewportServices, ViewportStatus};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new("https://audit.example.com/api");
//! let client = Arc::new(HttpAuditClient::new(config.clone())?);
//! let events = Arc::new(SseEventTransport::new(config)?);
//!
//! let viewport = Viewport::spawn(
//!     ViewportConfig::default(),
//!     ViewportServices::new(client.clone(), client, events),
//! )?;
//!
//! let state = viewport
//!     .wait_for(|state| state.status != ViewportStatus::Loading)
//!     .await?;
//! println!("{} entries", state.snapshot.total);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod buffer;
pub mod config;
pub mod error;
pub mod export;
pub mod ingestor;
pub mod journal;
pub mod selection;
pub mod sequencer;
pub mod state;
pub mod viewport;

#[cfg(test)]
mod proptest_tests;

pub use buffer::{LivePatch, PageSnapshot, ReconciliationBuffer};
pub use config::{ViewportConfig, ViewportConfigBuilder};
pub use error::{Result, ViewportError};
pub use export::{suggested_filename, ExportCoordinator, ExportFile, ExportOptions, ExportTarget};
pub use ingestor::{LiveEvent, LiveEventIngestor, SubscriptionHandle};
pub use journal::{
    InMemoryBackend, JournalBackend, JournalEntry, JournalError, JournalSeverity, TracingBackend,
    ViewportJournal, ViewportJournalBuilder,
};
pub use selection::SelectionTracker;
pub use sequencer::{FetchHandle, FetchOutcome, FetchSettlement, QuerySequencer};
pub use state::{ViewportState, ViewportStatus};
pub use viewport::{Message, Viewport, ViewportServices};
