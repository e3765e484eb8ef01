//! # auditscope Core
//!
//! Core types for the auditscope audit-log viewport.
//!
//! This crate provides the pure, I/O-free building blocks used throughout
//! the workspace:
//!
//! - [`AuditLogEntry`] - Normalized audit log record and its wire form
//! - [`DateRangeResolver`] - Maps date presets to concrete intervals
//! - [`FilterModel`] - Single source of truth for the active query
//! - [`FilterPredicate`] - Decides whether a live entry belongs to the view
//! - [`Clock`] - Injectable time source
//!
//! ## Example
//!
//! ```rust
//! use auditscope_core::{
//!     DatePreset, DateRangeResolver, EntryStatus, FilterChange, FilterModel, FilterPatch,
//!     FilterState, StatusFilter,
//! };
//!
//! let mut model = FilterModel::new(FilterState::default()).unwrap();
//!
//! // Changing the status is a new query: the page resets to 1.
//! let change = model
//!     .apply(FilterPatch::new().status(StatusFilter::Only(EntryStatus::Failed)))
//!     .unwrap();
//! assert_eq!(change, FilterChange::Query);
//!
//! let interval = model
//!     .state()
//!     .resolve_interval(&DateRangeResolver::utc(), chrono::Utc::now())
//!     .unwrap();
//! assert!(interval.start.is_some());
//! assert_eq!(model.state().date, DatePreset::Last7Days);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod date_range;
pub mod entry;
pub mod error;
pub mod filter;


// Re-export main types at crate root
pub use clock::{Clock, FixedClock, SystemClock};
pub use date_range::{CustomRange, DatePreset, DateRangeResolver, ResolvedInterval};
pub use entry::{derive_initials, Actor, AuditAction, AuditLogEntry, EntryStatus, RawActor, RawAuditLog};
pub use error::{Error, Result};
pub use filter::{
    ActionFilter, FilterChange, FilterModel, FilterPatch, FilterPredicate, FilterState,
    StatusFilter, DEFAULT_PAGE_SIZE,
};
