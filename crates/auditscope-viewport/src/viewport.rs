//! The viewport actor.
//!
//! A [`Viewport`] is a cheap handle to a task that owns the filter, the
//! sequencer, the reconciliation buffer, the selection and the live feed.
//! Operator commands, fetch settlements and live entries all arrive as
//! [`Message`]s on one inbox, so every mutation happens on that task in
//! arrival order. Readers observe the result through a `watch` channel.

use std::sync::Arc;

use auditscope_client::{
    EventTransport, ExportEndpoint, ExportFormat, LiveSubscription, QueryEndpoint,
};
use auditscope_core::{
    Clock, DateRangeResolver, FilterChange, FilterModel, FilterPatch, SystemClock,
};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};

use crate::buffer::ReconciliationBuffer;
use crate::config::ViewportConfig;
use crate::error::{Result, ViewportError};
use crate::export::{ExportCoordinator, ExportFile, ExportOptions, ExportTarget};
use crate::ingestor::{LiveEvent, LiveEventIngestor};
use crate::journal::{JournalEntry, ViewportJournal};
use crate::selection::SelectionTracker;
use crate::sequencer::{FetchOutcome, FetchSettlement, QuerySequencer};
use crate::state::{ViewportState, ViewportStatus};

/// External collaborators of a viewport.
#[derive(Debug, Clone)]
pub struct ViewportServices {
    /// Paginated history.
    pub query: Arc<dyn QueryEndpoint>,
    /// Export rendering.
    pub export: Arc<dyn ExportEndpoint>,
    /// Live feed.
    pub events: Arc<dyn EventTransport>,
    /// Source of "now".
    pub clock: Arc<dyn Clock>,
    /// Reconciliation journal.
    pub journal: ViewportJournal,
}

impl ViewportServices {
    /// Creates services with the system clock and a tracing journal.
    pub fn new(
        query: Arc<dyn QueryEndpoint>,
        export: Arc<dyn ExportEndpoint>,
        events: Arc<dyn EventTransport>,
    ) -> Self {
        Self {
            query,
            export,
            events,
            clock: Arc::new(SystemClock),
            journal: ViewportJournal::default(),
        }
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the journal.
    #[must_use]
    pub fn with_journal(mut self, journal: ViewportJournal) -> Self {
        self.journal = journal;
        self
    }
}

/// Inputs of the viewport task.
#[derive(Debug)]
pub enum Message {
    /// Apply a filter patch.
    ChangeFilter {
        /// The patch.
        patch: FilterPatch,
        /// Reply channel.
        reply: oneshot::Sender<Result<FilterChange>>,
    },
    /// Enable or disable live updates.
    SetLiveUpdates {
        /// Desired state; `None` flips the current one.
        enabled: Option<bool>,
        /// Reply channel, receives the new state.
        reply: oneshot::Sender<bool>,
    },
    /// Flip the selection of one entry.
    ToggleSelect {
        /// Entry id.
        id: String,
        /// Reply channel, receives whether the entry is now selected.
        reply: oneshot::Sender<bool>,
    },
    /// Select every entry on the displayed page.
    SelectAll {
        /// Reply channel, receives the number of newly selected entries.
        reply: oneshot::Sender<usize>,
    },
    /// Empty the selection.
    ClearSelection {
        /// Reply channel.
        reply: oneshot::Sender<()>,
    },
    /// Start an export.
    Export {
        /// What to export.
        target: ExportTarget,
        /// Output format.
        format: ExportFormat,
        /// Export options.
        options: ExportOptions,
        /// Reply channel.
        reply: oneshot::Sender<Result<ExportFile>>,
    },
    /// Re-issue the current query after a failure.
    Retry {
        /// Reply channel, receives whether a fetch was issued.
        reply: oneshot::Sender<Result<bool>>,
    },
    /// Re-issue the current query unconditionally.
    Refresh {
        /// Reply channel, receives the new sequence.
        reply: oneshot::Sender<Result<u64>>,
    },
    /// Stop the task.
    Shutdown {
        /// Reply channel.
        reply: oneshot::Sender<()>,
    },
    /// A fetch settled.
    FetchSettled(FetchSettlement),
    /// A live entry arrived.
    LiveEntry(LiveEvent),
}

impl From<FetchSettlement> for Message {
    fn from(settlement: FetchSettlement) -> Self {
        Self::FetchSettled(settlement)
    }
}

impl From<LiveEvent> for Message {
    fn from(event: LiveEvent) -> Self {
        Self::LiveEntry(event)
    }
}

/// Handle to a running viewport.
///
/// The task stops when [`Viewport::shutdown`] is called or every handle
/// has been dropped.
#[derive(Debug, Clone)]
pub struct Viewport {
    inbox: mpsc::UnboundedSender<Message>,
    state: watch::Receiver<ViewportState>,
}

impl Viewport {
    /// Starts a viewport task and issues the first fetch.
    ///
    /// Must be called from within a tokio runtime. Live updates start
    /// disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn spawn(config: ViewportConfig, services: ViewportServices) -> Result<Self> {
        config.validate()?;

        let resolver = config.resolver();
        let filter = FilterModel::new(config.initial_filter)?;
        let (inbox, messages) = mpsc::unbounded_channel();

        let sequencer = QuerySequencer::new(
            services.query,
            resolver,
            Arc::clone(&services.clock),
            services.journal.clone(),
            &inbox,
        );
        let ingestor = LiveEventIngestor::new(services.events, services.journal.clone(), &inbox);
        let exporter = ExportCoordinator::new(
            services.export,
            resolver,
            Arc::clone(&services.clock),
            services.journal.clone(),
        );

        let initial = ViewportState {
            filter: filter.state().clone(),
            ..ViewportState::default()
        };
        let (state_tx, state) = watch::channel(initial);

        let mut actor = ViewportActor {
            filter,
            resolver,
            clock: services.clock,
            journal: services.journal,
            sequencer,
            ingestor,
            buffer: ReconciliationBuffer::new(config.page_size),
            selection: SelectionTracker::new(),
            exporter,
            status: ViewportStatus::Idle,
            in_flight: None,
            last_error: None,
            live_enabled: false,
            state_tx,
        };
        actor.issue_fetch()?;

        info!(page_size = config.page_size, "Viewport started");
        tokio::spawn(actor.run(messages));

        Ok(Self { inbox, state })
    }

    /// Returns the current state.
    pub fn state(&self) -> ViewportState {
        self.state.borrow().clone()
    }

    /// Returns a receiver that observes every published state.
    pub fn subscribe_state(&self) -> watch::Receiver<ViewportState> {
        self.state.clone()
    }

    /// Waits until the published state satisfies `predicate`.
    ///
    /// # Errors
    ///
    /// Returns [`ViewportError::Closed`] if the task stops first.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&ViewportState) -> bool,
    ) -> Result<ViewportState> {
        let mut state = self.state.clone();
        let matched = state
            .wait_for(predicate)
            .await
            .map_err(|_| ViewportError::Closed)?;
        Ok(matched.clone())
    }

    /// Applies a filter patch.
    ///
    /// A change to anything but the page resets the page and clears the
    /// selection. Any change issues a fetch.
    ///
    /// # Errors
    ///
    /// Returns [`ViewportError::Filter`] if the patched state is invalid;
    /// the filter is left unchanged.
    pub async fn change_filter(&self, patch: FilterPatch) -> Result<FilterChange> {
        self.request(|reply| Message::ChangeFilter { patch, reply })
            .await?
    }

    /// Moves to `page` without changing the query.
    ///
    /// # Errors
    ///
    /// Returns [`ViewportError::Filter`] for page 0.
    pub async fn change_page(&self, page: u32) -> Result<FilterChange> {
        self.change_filter(FilterPatch::to_page(page)).await
    }

    /// Enables or disables live updates. Returns the new state.
    ///
    /// # Errors
    ///
    /// Returns [`ViewportError::Closed`] if the task has stopped.
    pub async fn set_live_updates(&self, enabled: bool) -> Result<bool> {
        self.request(|reply| Message::SetLiveUpdates {
            enabled: Some(enabled),
            reply,
        })
        .await
    }

    /// Flips live updates. Returns the new state.
    ///
    /// # Errors
    ///
    /// Returns [`ViewportError::Closed`] if the task has stopped.
    pub async fn toggle_live_updates(&self) -> Result<bool> {
        self.request(|reply| Message::SetLiveUpdates {
            enabled: None,
            reply,
        })
        .await
    }

    /// Flips the selection of `id`. Returns true if it is now selected.
    ///
    /// # Errors
    ///
    /// Returns [`ViewportError::Closed`] if the task has stopped.
    pub async fn toggle_select(&self, id: impl Into<String>) -> Result<bool> {
        let id = id.into();
        self.request(|reply| Message::ToggleSelect { id, reply })
            .await
    }

    /// Selects every entry on the displayed page.
    ///
    /// # Errors
    ///
    /// Returns [`ViewportError::Closed`] if the task has stopped.
    pub async fn select_all(&self) -> Result<usize> {
        self.request(|reply| Message::SelectAll { reply }).await
    }

    /// Empties the selection.
    ///
    /// # Errors
    ///
    /// Returns [`ViewportError::Closed`] if the task has stopped.
    pub async fn clear_selection(&self) -> Result<()> {
        self.request(|reply| Message::ClearSelection { reply })
            .await
    }

    /// Exports the selection or the current filter.
    ///
    /// The export runs off the viewport task; other commands are not
    /// delayed by it.
    ///
    /// # Errors
    ///
    /// Returns [`ViewportError::NothingSelected`] for an empty selection,
    /// [`ViewportError::Filter`] for an unresolvable filter, or
    /// [`ViewportError::ExportFailed`] if the endpoint fails.
    pub async fn export(
        &self,
        target: ExportTarget,
        format: ExportFormat,
        options: ExportOptions,
    ) -> Result<ExportFile> {
        self.request(|reply| Message::Export {
            target,
            format,
            options,
            reply,
        })
        .await?
    }

    /// Re-issues the current query if the last fetch failed.
    ///
    /// Returns false without fetching in any other status.
    ///
    /// # Errors
    ///
    /// Returns [`ViewportError::Closed`] if the task has stopped.
    pub async fn retry(&self) -> Result<bool> {
        self.request(|reply| Message::Retry { reply }).await?
    }

    /// Re-issues the current query. Returns the new sequence.
    ///
    /// # Errors
    ///
    /// Returns [`ViewportError::Closed`] if the task has stopped.
    pub async fn refresh(&self) -> Result<u64> {
        self.request(|reply| Message::Refresh { reply }).await?
    }

    /// Closes the live feed and stops the task.
    ///
    /// # Errors
    ///
    /// Returns [`ViewportError::Closed`] if the task had already stopped.
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| Message::Shutdown { reply }).await
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Message) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.inbox
            .send(build(reply))
            .map_err(|_| ViewportError::Closed)?;
        response.await.map_err(|_| ViewportError::Closed)
    }
}

struct ViewportActor {
    filter: FilterModel,
    resolver: DateRangeResolver,
    clock: Arc<dyn Clock>,
    journal: ViewportJournal,
    sequencer: QuerySequencer<Message>,
    ingestor: LiveEventIngestor<Message>,
    buffer: ReconciliationBuffer,
    selection: SelectionTracker,
    exporter: ExportCoordinator,
    status: ViewportStatus,
    in_flight: Option<u64>,
    last_error: Option<String>,
    live_enabled: bool,
    state_tx: watch::Sender<ViewportState>,
}

impl ViewportActor {
    async fn run(mut self, mut messages: mpsc::UnboundedReceiver<Message>) {
        while let Some(message) = messages.recv().await {
            if !self.handle(message) {
                break;
            }
        }

        self.ingestor.unsubscribe();
        info!("Viewport stopped");
    }

    /// Handles one message. Returns false to stop.
    fn handle(&mut self, message: Message) -> bool {
        match message {
            Message::ChangeFilter { patch, reply } => {
                let _ = reply.send(self.change_filter(patch));
            }
            Message::SetLiveUpdates { enabled, reply } => {
                let enabled = enabled.unwrap_or(!self.live_enabled);
                self.set_live_updates(enabled);
                let _ = reply.send(self.live_enabled);
            }
            Message::ToggleSelect { id, reply } => {
                let selected = self.selection.toggle(id);
                self.publish();
                let _ = reply.send(selected);
            }
            Message::SelectAll { reply } => {
                let added = self.selection.select_all(self.buffer.snapshot());
                self.publish();
                let _ = reply.send(added);
            }
            Message::ClearSelection { reply } => {
                self.selection.clear();
                self.publish();
                let _ = reply.send(());
            }
            Message::Export {
                target,
                format,
                options,
                reply,
            } => self.export(target, format, options, reply),
            Message::Retry { reply } => {
                let result = if self.status == ViewportStatus::Error {
                    self.issue_fetch().map(|_| true)
                } else {
                    Ok(false)
                };
                let _ = reply.send(result);
            }
            Message::Refresh { reply } => {
                let _ = reply.send(self.issue_fetch());
            }
            Message::Shutdown { reply } => {
                let _ = reply.send(());
                return false;
            }
            Message::FetchSettled(settlement) => self.on_settled(settlement),
            Message::LiveEntry(event) => self.on_live(event),
        }
        true
    }

    fn change_filter(&mut self, patch: FilterPatch) -> Result<FilterChange> {
        let change = self.filter.apply(patch)?;

        match change {
            FilterChange::Unchanged => return Ok(change),
            FilterChange::PageOnly => {}
            FilterChange::Query => {
                self.selection.clear();
                if self.live_enabled {
                    self.ingestor.unsubscribe();
                    self.ingestor
                        .subscribe(LiveSubscription::from_filter(self.filter.state()));
                }
            }
        }

        self.issue_fetch()?;
        Ok(change)
    }

    fn set_live_updates(&mut self, enabled: bool) {
        if enabled == self.live_enabled {
            return;
        }

        if enabled {
            self.ingestor
                .subscribe(LiveSubscription::from_filter(self.filter.state()));
        } else {
            self.ingestor.unsubscribe();
            self.discard_held();
        }
        self.live_enabled = enabled;
        info!(enabled, "Live updates toggled");
        self.publish();
    }

    fn export(
        &self,
        target: ExportTarget,
        format: ExportFormat,
        options: ExportOptions,
        reply: oneshot::Sender<Result<ExportFile>>,
    ) {
        let exporter = self.exporter.clone();
        let ids = self.selection.ids().clone();
        let state = self.filter.state().clone();

        tokio::spawn(async move {
            let result = match target {
                ExportTarget::Selected => exporter.export_selected(&ids, format, options).await,
                ExportTarget::Filter => exporter.export_by_filter(&state, format, options).await,
            };
            let _ = reply.send(result);
        });
    }

    fn issue_fetch(&mut self) -> Result<u64> {
        let handle = self.sequencer.issue(self.filter.state())?;
        let sequence = handle.sequence();

        if self.status != ViewportStatus::Loading {
            info!(from = %self.status, sequence, "Viewport loading");
        }
        self.status = ViewportStatus::Loading;
        self.in_flight = Some(sequence);
        self.publish();
        Ok(sequence)
    }

    fn on_settled(&mut self, settlement: FetchSettlement) {
        match self.sequencer.settle(settlement) {
            FetchOutcome::Accepted { sequence, page } => {
                let predicate = self.filter.predicate(self.resolver);
                let replayed = self.buffer.accept_fetch(
                    sequence,
                    self.filter.state().page,
                    page,
                    &predicate,
                    self.clock.now(),
                );
                for (entry_id, outcome) in replayed {
                    self.journal
                        .record(&JournalEntry::LivePatched { entry_id, outcome });
                }

                self.status = ViewportStatus::Ready;
                self.in_flight = None;
                self.last_error = None;
                info!(sequence, total = self.buffer.snapshot().total, "Viewport ready");
                self.publish();
            }
            FetchOutcome::Failed { sequence, error } => {
                let error = ViewportError::QueryFailed {
                    sequence,
                    source: error,
                };
                self.discard_held();
                self.status = ViewportStatus::Error;
                self.in_flight = None;
                self.last_error = Some(error.to_string());
                info!(sequence, "Viewport in error state");
                self.publish();
            }
            FetchOutcome::StaleDropped { .. } => {}
        }
    }

    fn on_live(&mut self, event: LiveEvent) {
        if !self.ingestor.is_current(event.generation) {
            debug!(generation = event.generation, "Dropping entry from closed subscription");
            return;
        }

        let entry_id = event.entry.id.clone();
        let predicate = self.filter.predicate(self.resolver);
        let now = self.clock.now();

        match self.status {
            ViewportStatus::Ready => {
                let outcome = self.buffer.apply_live(event.entry, &predicate, now);
                debug!(%entry_id, ?outcome, "Live entry reconciled");
                self.journal
                    .record(&JournalEntry::LivePatched { entry_id, outcome });
                if outcome.is_applied() {
                    self.publish();
                }
            }
            ViewportStatus::Loading => match self.buffer.hold(event.entry, &predicate, now) {
                None => {
                    debug!(%entry_id, "Live entry held until fetch settles");
                    self.journal.record(&JournalEntry::LiveHeld { entry_id });
                }
                Some(outcome) => {
                    self.journal
                        .record(&JournalEntry::LivePatched { entry_id, outcome });
                }
            },
            ViewportStatus::Idle | ViewportStatus::Error => {
                debug!(%entry_id, status = %self.status, "Dropping live entry");
            }
        }
    }

    fn discard_held(&mut self) {
        let count = self.buffer.discard_held();
        if count > 0 {
            self.journal
                .record(&JournalEntry::LiveHeldDiscarded { count });
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(ViewportState {
            status: self.status,
            filter: self.filter.state().clone(),
            snapshot: self.buffer.snapshot().clone(),
            selection: self.selection.ids().clone(),
            live_enabled: self.live_enabled,
            last_error: self.last_error.clone(),
            in_flight: self.in_flight,
        });
    }
}
