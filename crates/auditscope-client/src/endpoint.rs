//! Endpoint contracts and the request/response shapes they exchange.
//!
//! The viewport only talks to these traits. [`crate::HttpAuditClient`] and
//! [`crate::SseEventTransport`] are the production implementations; tests
//! substitute fakes whose completion order they control.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use auditscope_core::{
    ActionFilter, AuditAction, AuditLogEntry, EntryStatus, FilterState, RawAuditLog,
    ResolvedInterval, StatusFilter,
};
use chrono::{DateTime, SecondsFormat, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// A single historical page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    /// 1-based page number.
    pub page: u32,
    /// Entries per page.
    pub page_size: u32,
    /// Only entries with this action.
    pub action: Option<AuditAction>,
    /// Only entries with this status.
    pub status: Option<EntryStatus>,
    /// Free-text search.
    pub search: Option<String>,
    /// Inclusive lower bound; `None` is unbounded.
    pub start_date: Option<DateTime<Utc>>,
    /// Exclusive upper bound; `None` is unbounded.
    pub end_date: Option<DateTime<Utc>>,
}

impl QueryRequest {
    /// Translates a filter state and its resolved interval into a request.
    pub fn from_filter(state: &FilterState, interval: ResolvedInterval) -> Self {
        Self {
            page: state.page,
            page_size: state.page_size,
            action: state.action.action().cloned(),
            status: state.status.status(),
            search: state.search_term().map(ToString::to_string),
            start_date: interval.start,
            end_date: interval.end,
        }
    }

    /// Returns the query-string pairs for the HTTP binding.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("limit", self.page_size.to_string()),
        ];
        if let Some(action) = &self.action {
            pairs.push(("action", action.to_string()));
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.to_string()));
        }
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        if let Some(start) = self.start_date {
            pairs.push(("startDate", format_instant(start)));
        }
        if let Some(end) = self.end_date {
            pairs.push(("endDate", format_instant(end)));
        }
        pairs
    }
}

/// One page of historical results.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryPage {
    /// Entries on this page, newest first.
    pub entries: Vec<AuditLogEntry>,
    /// Number of entries matching the query across all pages.
    pub total: u64,
    /// Number of pages at the requested page size.
    pub page_count: u64,
}

/// Query response as delivered on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQueryPage {
    /// Raw entries.
    #[serde(default)]
    pub entries: Vec<RawAuditLog>,
    /// Total matching entries.
    #[serde(default)]
    pub total: u64,
    /// Page count.
    #[serde(default)]
    pub page_count: u64,
}

impl TryFrom<RawQueryPage> for QueryPage {
    type Error = ClientError;

    fn try_from(raw: RawQueryPage) -> Result<Self> {
        let entries = raw
            .entries
            .into_iter()
            .map(AuditLogEntry::try_from)
            .collect::<auditscope_core::Result<Vec<_>>>()?;

        Ok(Self {
            entries,
            total: raw.total,
            page_count: raw.page_count,
        })
    }
}

/// Export file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Comma-separated values.
    Csv,
    /// JSON document.
    Json,
    /// XML document.
    Xml,
    /// PDF report.
    Pdf,
}

impl ExportFormat {
    /// Every supported format.
    pub const ALL: [Self; 4] = [Self::Csv, Self::Json, Self::Xml, Self::Pdf];

    /// File extension without the dot.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Pdf => "pdf",
        }
    }

    /// MIME type of the exported payload.
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Csv => "text/csv",
            Self::Json => "application/json",
            Self::Xml => "application/xml",
            Self::Pdf => "application/pdf",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.extension().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ClientError::InvalidConfig {
                reason: format!("unknown export format '{s}'"),
            })
    }
}

/// Filter portion of an export request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFilter {
    /// Action filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<AuditAction>,
    /// Status filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EntryStatus>,
    /// Free-text search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Inclusive lower bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    /// Exclusive upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

impl ExportFilter {
    /// Translates a filter state and its resolved interval.
    pub fn from_filter(state: &FilterState, interval: ResolvedInterval) -> Self {
        Self {
            action: state.action.action().cloned(),
            status: state.status.status(),
            search: state.search_term().map(ToString::to_string),
            start_date: interval.start,
            end_date: interval.end,
        }
    }
}

/// Export request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    /// Explicit entry ids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    /// Filter describing the entries to export.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<ExportFilter>,
    /// Output format.
    pub format: ExportFormat,
    /// Whether entry metadata is included.
    pub include_metadata: bool,
}

/// Raw export result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPayload {
    /// File content.
    pub bytes: Vec<u8>,
    /// Filename proposed by the server, if any.
    pub filename: Option<String>,
    /// Content type reported by the server, if any.
    pub content_type: Option<String>,
}

/// Server-side narrowing hints for the live feed.
///
/// The viewport re-checks every delivered entry, so a transport may ignore
/// these.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LiveSubscription {
    /// Action filter.
    pub action: Option<AuditAction>,
    /// Status filter.
    pub status: Option<EntryStatus>,
}

impl LiveSubscription {
    /// Derives the hints from a filter state.
    pub fn from_filter(state: &FilterState) -> Self {
        let action = match &state.action {
            ActionFilter::All => None,
            ActionFilter::Only(action) => Some(action.clone()),
        };
        let status = match state.status {
            StatusFilter::All => None,
            StatusFilter::Only(status) => Some(status),
        };
        Self { action, status }
    }

    /// Returns the query-string pairs for the HTTP binding.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(action) = &self.action {
            pairs.push(("action", action.to_string()));
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.to_string()));
        }
        pairs
    }
}

/// A message on the live feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LiveMessage {
    /// A newly recorded entry.
    Entry {
        /// The entry in wire form.
        entry: RawAuditLog,
    },
    /// Keep-alive.
    Heartbeat,
    /// Any message type this client does not know.
    #[serde(other)]
    Unknown,
}

/// Stream of live messages. Reconnection happens behind it.
pub type EventStream = BoxStream<'static, LiveMessage>;

/// Historical page source.
#[async_trait]
pub trait QueryEndpoint: Send + Sync + fmt::Debug {
    /// Fetches one page.
    async fn query(&self, request: QueryRequest) -> Result<QueryPage>;
}

/// Export producer.
#[async_trait]
pub trait ExportEndpoint: Send + Sync + fmt::Debug {
    /// Produces an export payload.
    async fn export(&self, request: ExportRequest) -> Result<ExportPayload>;
}

/// Live event feed.
#[async_trait]
pub trait EventTransport: Send + Sync + fmt::Debug {
    /// Opens the feed. Dropping the returned stream closes it.
    async fn open(&self, subscription: LiveSubscription) -> Result<EventStream>;
}

fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}
