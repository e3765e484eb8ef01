//! Error types for the viewport crate.

use auditscope_client::ClientError;
use thiserror::Error;

/// Result type alias for viewport operations.
pub type Result<T> = std::result::Result<T, ViewportError>;

/// Errors surfaced by viewport commands.
///
/// A superseded fetch is never an error: it is reported as
/// [`crate::FetchOutcome::StaleDropped`] and journaled.
#[derive(Error, Debug)]
pub enum ViewportError {
    /// The requested filter change is invalid; nothing was issued.
    #[error("invalid filter: {0}")]
    Filter(#[from] auditscope_core::Error),

    /// The viewport configuration is inconsistent.
    #[error("invalid viewport configuration: {reason}")]
    InvalidConfig {
        /// What is wrong.
        reason: String,
    },

    /// The current fetch failed; the previous snapshot is still shown.
    #[error("query {sequence} failed: {source}")]
    QueryFailed {
        /// Sequence tag of the failed fetch.
        sequence: u64,
        /// Underlying error.
        #[source]
        source: ClientError,
    },

    /// The export endpoint failed.
    #[error("export failed: {source}")]
    ExportFailed {
        /// Underlying error.
        #[source]
        source: ClientError,
    },

    /// An export of the selection was requested with nothing selected.
    #[error("nothing is selected")]
    NothingSelected,

    /// The viewport task has stopped.
    #[error("viewport is closed")]
    Closed,
}
