//! # auditscope Test
//!
//! Test support for the auditscope workspace.
//!
//! This crate provides:
//!
//! - Entry fixtures built with a fluent [`EntryBuilder`]
//! - [`GatedQueryEndpoint`], which parks every query until the test answers
//!   it, so out-of-order completions can be reproduced deterministically
//! - [`StaticQueryEndpoint`] and [`RecordingExportEndpoint`] for simple cases
//! - [`InMemoryEventTransport`], a broadcast-backed live feed
//!
//! ## Example
//!
//! ```rust
//! use auditscope_core::EntryStatus;
//! use auditscope_test::{entries, page, StaticQueryEndpoint};
//!
//! let endpoint = StaticQueryEndpoint::new(page(entries("e", 5, EntryStatus::Failed), 5, 1));
//! assert!(endpoint.requests().is_empty());
//! ```

pub mod endpoints;
pub mod fixtures;

pub use endpoints::{
    server_error, GatedQueryEndpoint, InMemoryEventTransport, RecordingExportEndpoint,
    StaticQueryEndpoint,
};
pub use fixtures::{entries, fixture_now, page, EntryBuilder};
