//! Error types for auditscope core operations.
//!
//! This module defines the error types used throughout the `auditscope-core` crate.

use chrono::NaiveDate;
use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in auditscope core operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Custom date range has its start after its end.
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidRange {
        /// First day of the range.
        start: NaiveDate,
        /// Last day of the range.
        end: NaiveDate,
    },

    /// A date falls outside the representable calendar.
    #[error("Date {date} is outside the supported range")]
    DateOutOfRange {
        /// The offending date.
        date: NaiveDate,
    },

    /// The custom preset was selected without a date range.
    #[error("Custom date selector requires a date range")]
    MissingCustomRange,

    /// Page numbers start at 1.
    #[error("Invalid page {page}: pages start at 1")]
    InvalidPage {
        /// The rejected page number.
        page: u32,
    },

    /// Page size must be positive.
    #[error("Invalid page size {size}: must be greater than zero")]
    InvalidPageSize {
        /// The rejected page size.
        size: u32,
    },

    /// A date preset name did not match any known preset.
    #[error("Unknown date preset '{name}'")]
    UnknownPreset {
        /// The unrecognized name.
        name: String,
    },

    /// A status filter name did not match.
    #[error("Unknown status '{name}': expected all, success or failed")]
    UnknownStatus {
        /// The unrecognized name.
        name: String,
    },

    /// A wire entry could not be normalized.
    #[error("Invalid audit log entry: {reason}")]
    InvalidEntry {
        /// Reason the entry was rejected.
        reason: String,
    },
}

impl Error {
    /// Creates an [`Error::InvalidEntry`] with the given reason.
    pub fn invalid_entry(reason: impl Into<String>) -> Self {
        Self::InvalidEntry {
            reason: reason.into(),
        }
    }
}
