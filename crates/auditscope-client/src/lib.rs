//! # auditscope Client
//!
//! Endpoint contracts and network adapters for the auditscope viewport.
//!
//! The viewport depends only on three traits:
//!
//! - [`QueryEndpoint`] - historical, paginated audit log queries
//! - [`ExportEndpoint`] - server-side export generation
//! - [`EventTransport`] - the live event feed
//!
//! This crate also ships the production implementations:
//! [`HttpAuditClient`] (query and export over `reqwest`) and
//! [`SseEventTransport`] (server-sent events with reconnection and backoff).
//! Both only translate between wire shapes and
//! [`auditscope_core::AuditLogEntry`]; they carry no reconciliation logic.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use auditscope_client::{ClientAuth, ClientConfig, HttpAuditClient, QueryEndpoint, QueryRequest};
//! use auditscope_core::{FilterState, ResolvedInterval};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new("https://audit.example.com/api")
//!         .with_auth(ClientAuth::bearer("token"));
//!     let client = HttpAuditClient::new(config)?;
//!
//!     let request = QueryRequest::from_filter(&FilterState::default(), ResolvedInterval::unbounded());
//!     let page = client.query(request).await?;
//!     println!("{} entries", page.total);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod config;
mod endpoint;
mod error;
mod http;
mod sse;

pub use config::{ClientAuth, ClientConfig, StreamConfig};
pub use endpoint::{
    EventStream, EventTransport, ExportEndpoint, ExportFilter, ExportFormat, ExportPayload,
    ExportRequest, LiveMessage, LiveSubscription, QueryEndpoint, QueryPage, QueryRequest,
    RawQueryPage,
};
pub use error::{ClientError, Result};
pub use http::{HttpAuditClient, REQUEST_ID_HEADER};
pub use sse::SseEventTransport;
