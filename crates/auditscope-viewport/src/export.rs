//! Export of audit entries through the export endpoint.
//!
//! Exports are independent of the displayed snapshot: they either name the
//! selected ids or describe a filter, and the endpoint does the rendering.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use auditscope_client::{ExportEndpoint, ExportFilter, ExportFormat, ExportRequest};
use auditscope_core::{Clock, DateRangeResolver, FilterState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, ViewportError};
use crate::journal::{JournalEntry, ViewportJournal};

/// Export options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Include the free-form metadata of each entry.
    pub include_metadata: bool,
}

impl ExportOptions {
    /// Options with metadata included.
    pub const fn with_metadata() -> Self {
        Self {
            include_metadata: true,
        }
    }
}

/// What an export covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportTarget {
    /// The current selection.
    Selected,
    /// Everything matching the current filter.
    Filter,
}

impl fmt::Display for ExportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Selected => f.write_str("selected"),
            Self::Filter => f.write_str("filter"),
        }
    }
}

/// A completed export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    /// Opaque payload.
    pub bytes: Vec<u8>,
    /// Suggested filename, dated in the session offset.
    pub filename: String,
    /// MIME type of the payload.
    pub content_type: String,
    /// Filename proposed by the server, if any.
    pub server_filename: Option<String>,
}

/// Builds the suggested filename for an export made at `now`.
///
/// ```
/// use auditscope_client::ExportFormat;
/// use auditscope_core::DateRangeResolver;
/// use auditscope_viewport::{suggested_filename, ExportTarget};
/// use chrono::{TimeZone, Utc};
///
/// let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
/// let name = suggested_filename(ExportTarget::Selected, ExportFormat::Csv, &DateRangeResolver::utc(), now);
/// assert_eq!(name, "audit-logs-selected-2024-03-15.csv");
/// ```
pub fn suggested_filename(
    target: ExportTarget,
    format: ExportFormat,
    resolver: &DateRangeResolver,
    now: DateTime<Utc>,
) -> String {
    let date = resolver.local_date(now).format("%Y-%m-%d");
    match target {
        ExportTarget::Selected => format!("audit-logs-selected-{date}.{}", format.extension()),
        ExportTarget::Filter => format!("audit-logs-{date}.{}", format.extension()),
    }
}

/// Runs exports against the export endpoint.
#[derive(Debug, Clone)]
pub struct ExportCoordinator {
    endpoint: Arc<dyn ExportEndpoint>,
    resolver: DateRangeResolver,
    clock: Arc<dyn Clock>,
    journal: ViewportJournal,
}

impl ExportCoordinator {
    /// Creates a coordinator.
    pub fn new(
        endpoint: Arc<dyn ExportEndpoint>,
        resolver: DateRangeResolver,
        clock: Arc<dyn Clock>,
        journal: ViewportJournal,
    ) -> Self {
        Self {
            endpoint,
            resolver,
            clock,
            journal,
        }
    }

    /// Exports the entries with the given ids.
    ///
    /// # Errors
    ///
    /// Returns [`ViewportError::NothingSelected`] without contacting the
    /// endpoint if `ids` is empty, or [`ViewportError::ExportFailed`] if the
    /// endpoint fails.
    pub async fn export_selected(
        &self,
        ids: &BTreeSet<String>,
        format: ExportFormat,
        options: ExportOptions,
    ) -> Result<ExportFile> {
        if ids.is_empty() {
            return Err(ViewportError::NothingSelected);
        }

        let request = ExportRequest {
            ids: Some(ids.iter().cloned().collect()),
            filter: None,
            format,
            include_metadata: options.include_metadata,
        };
        self.run(ExportTarget::Selected, request).await
    }

    /// Exports everything matching `state`, ignoring its page.
    ///
    /// # Errors
    ///
    /// Returns [`ViewportError::Filter`] if the date selector cannot be
    /// resolved, or [`ViewportError::ExportFailed`] if the endpoint fails.
    pub async fn export_by_filter(
        &self,
        state: &FilterState,
        format: ExportFormat,
        options: ExportOptions,
    ) -> Result<ExportFile> {
        let interval = state.resolve_interval(&self.resolver, self.clock.now())?;
        let request = ExportRequest {
            ids: None,
            filter: Some(ExportFilter::from_filter(state, interval)),
            format,
            include_metadata: options.include_metadata,
        };
        self.run(ExportTarget::Filter, request).await
    }

    async fn run(&self, target: ExportTarget, request: ExportRequest) -> Result<ExportFile> {
        let format = request.format;
        let filename = suggested_filename(target, format, &self.resolver, self.clock.now());

        info!(%target, %format, include_metadata = request.include_metadata, "Starting export");

        match self.endpoint.export(request).await {
            Ok(payload) => {
                info!(%filename, bytes = payload.bytes.len(), "Export completed");
                self.journal.record(&JournalEntry::ExportCompleted {
                    filename: filename.clone(),
                    bytes: payload.bytes.len(),
                });
                Ok(ExportFile {
                    bytes: payload.bytes,
                    filename,
                    content_type: payload
                        .content_type
                        .unwrap_or_else(|| format.content_type().to_string()),
                    server_filename: payload.filename,
                })
            }
            Err(e) => {
                warn!(%target, %format, error = %e, "Export failed");
                self.journal.record(&JournalEntry::ExportFailed {
                    error: e.to_string(),
                });
                Err(ViewportError::ExportFailed { source: e })
            }
        }
    }
}
