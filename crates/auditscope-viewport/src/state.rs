//! Published viewport state.

use std::collections::BTreeSet;
use std::fmt;

use auditscope_core::FilterState;
use serde::{Deserialize, Serialize};

use crate::buffer::PageSnapshot;

/// Lifecycle of the displayed data.
///
/// `Idle` only exists before the first fetch is issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewportStatus {
    /// Nothing fetched yet.
    #[default]
    Idle,
    /// A fetch is in flight.
    Loading,
    /// The snapshot reflects the latest accepted fetch.
    Ready,
    /// The latest fetch failed; the previous snapshot is kept.
    Error,
}

impl ViewportStatus {
    /// Returns the lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ViewportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a reader needs to render the viewport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewportState {
    /// Lifecycle status.
    pub status: ViewportStatus,
    /// Active filter.
    pub filter: FilterState,
    /// Displayed page.
    pub snapshot: PageSnapshot,
    /// Selected entry ids.
    pub selection: BTreeSet<String>,
    /// Whether live updates are enabled.
    pub live_enabled: bool,
    /// Message of the last accepted fetch failure, cleared on success.
    pub last_error: Option<String>,
    /// Sequence of the fetch being waited on, if any.
    pub in_flight: Option<u64>,
}

impl ViewportState {
    /// Returns true if `id` is selected.
    pub fn is_selected(&self, id: &str) -> bool {
        self.selection.contains(id)
    }

    /// Returns true while a fetch is in flight.
    pub const fn is_loading(&self) -> bool {
        matches!(self.status, ViewportStatus::Loading)
    }
}
