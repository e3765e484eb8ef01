//! Fake endpoints whose behavior and completion order the test controls.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use auditscope_client::{
    ClientError, EventStream, EventTransport, ExportEndpoint, ExportPayload, ExportRequest,
    LiveMessage, LiveSubscription, QueryEndpoint, QueryPage, QueryRequest, Result,
};
use auditscope_core::{AuditLogEntry, RawAuditLog};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot, Notify};

/// Returns the error fakes use for a failing endpoint.
pub fn server_error() -> ClientError {
    ClientError::Http {
        status: 500,
        message: "internal error".to_string(),
    }
}

#[derive(Debug)]
struct GatedCall {
    request: QueryRequest,
    reply: Option<oneshot::Sender<Result<QueryPage>>>,
}

/// Query endpoint that parks every call until the test answers it.
///
/// Calls are numbered from 0 in arrival order and may be answered in any
/// order, which is how stale-response interleavings are reproduced.
#[derive(Debug, Default)]
pub struct GatedQueryEndpoint {
    calls: Mutex<Vec<GatedCall>>,
    arrived: Notify,
}

impl GatedQueryEndpoint {
    /// Creates an endpoint with no calls.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns the request of call `index`.
    pub fn request(&self, index: usize) -> Option<QueryRequest> {
        self.calls.lock().get(index).map(|call| call.request.clone())
    }

    /// Waits until at least `count` calls have arrived.
    pub async fn wait_for_calls(&self, count: usize) {
        loop {
            let arrived = self.arrived.notified();
            if self.call_count() >= count {
                return;
            }
            arrived.await;
        }
    }

    /// Answers call `index`. Returns false if it was already answered or
    /// does not exist.
    pub fn respond(&self, index: usize, result: Result<QueryPage>) -> bool {
        let reply = self
            .calls
            .lock()
            .get_mut(index)
            .and_then(|call| call.reply.take());

        reply.is_some_and(|reply| reply.send(result).is_ok())
    }
}

#[async_trait]
impl QueryEndpoint for GatedQueryEndpoint {
    async fn query(&self, request: QueryRequest) -> Result<QueryPage> {
        let (tx, rx) = oneshot::channel();
        self.calls.lock().push(GatedCall {
            request,
            reply: Some(tx),
        });
        self.arrived.notify_waiters();

        rx.await
            .unwrap_or_else(|_| Err(ClientError::stream("gated call abandoned")))
    }
}

/// Query endpoint that answers every call immediately with the same page.
#[derive(Debug)]
pub struct StaticQueryEndpoint {
    page: Mutex<QueryPage>,
    fail: AtomicBool,
    calls: Mutex<Vec<QueryRequest>>,
}

impl StaticQueryEndpoint {
    /// Creates an endpoint answering with `page`.
    #[must_use]
    pub fn new(page: QueryPage) -> Self {
        Self {
            page: Mutex::new(page),
            fail: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Replaces the page returned by later calls.
    pub fn set_page(&self, page: QueryPage) {
        *self.page.lock() = page;
    }

    /// Makes later calls fail (or succeed again).
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Returns every request received.
    pub fn requests(&self) -> Vec<QueryRequest> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl QueryEndpoint for StaticQueryEndpoint {
    async fn query(&self, request: QueryRequest) -> Result<QueryPage> {
        self.calls.lock().push(request);
        if self.fail.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        Ok(self.page.lock().clone())
    }
}

/// Export endpoint that records requests and returns a canned payload.
#[derive(Debug, Default)]
pub struct RecordingExportEndpoint {
    requests: Mutex<Vec<ExportRequest>>,
    fail: AtomicBool,
    filename: Mutex<Option<String>>,
}

impl RecordingExportEndpoint {
    /// Creates an endpoint that succeeds without proposing a filename.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes later calls fail (or succeed again).
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Makes later payloads carry a server-proposed filename.
    pub fn set_filename(&self, filename: impl Into<String>) {
        *self.filename.lock() = Some(filename.into());
    }

    /// Returns every request received.
    pub fn requests(&self) -> Vec<ExportRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ExportEndpoint for RecordingExportEndpoint {
    async fn export(&self, request: ExportRequest) -> Result<ExportPayload> {
        let format = request.format;
        let count = request.ids.as_ref().map_or(0, Vec::len);
        self.requests.lock().push(request);

        if self.fail.load(Ordering::SeqCst) {
            return Err(server_error());
        }

        Ok(ExportPayload {
            bytes: format!("export:{format}:{count}").into_bytes(),
            filename: self.filename.lock().clone(),
            content_type: Some(format.content_type().to_string()),
        })
    }
}

/// Live feed backed by a broadcast channel.
#[derive(Debug)]
pub struct InMemoryEventTransport {
    sender: broadcast::Sender<LiveMessage>,
    opened: AtomicUsize,
    fail_open: AtomicBool,
    subscriptions: Mutex<Vec<LiveSubscription>>,
    subscribed: Notify,
}

impl Default for InMemoryEventTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventTransport {
    /// Creates a transport with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self {
            sender,
            opened: AtomicUsize::new(0),
            fail_open: AtomicBool::new(false),
            subscriptions: Mutex::new(Vec::new()),
            subscribed: Notify::new(),
        }
    }

    /// Makes later `open` calls fail (or succeed again).
    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Returns how many times the feed was opened successfully.
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Returns the subscription hints of every successful `open`.
    pub fn subscriptions(&self) -> Vec<LiveSubscription> {
        self.subscriptions.lock().clone()
    }

    /// Returns the number of open streams.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Waits until at least `count` streams are open.
    pub async fn wait_for_subscribers(&self, count: usize) {
        loop {
            let subscribed = self.subscribed.notified();
            if self.subscriber_count() >= count {
                return;
            }
            subscribed.await;
        }
    }

    /// Publishes a message to every open stream. Returns the number of
    /// streams that received it.
    pub fn publish(&self, message: LiveMessage) -> usize {
        self.sender.send(message).unwrap_or(0)
    }

    /// Publishes `entry` as a live entry message.
    pub fn publish_entry(&self, entry: &AuditLogEntry) -> usize {
        self.publish(LiveMessage::Entry {
            entry: RawAuditLog::from(entry),
        })
    }
}

#[async_trait]
impl EventTransport for InMemoryEventTransport {
    async fn open(&self, subscription: LiveSubscription) -> Result<EventStream> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(ClientError::stream("feed unavailable"));
        }

        let receiver = self.sender.subscribe();
        self.subscriptions.lock().push(subscription);
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.subscribed.notify_waiters();

        let stream = futures::stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(message) => return Some((message, receiver)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "In-memory feed subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{entries, page, EntryBuilder};
    use auditscope_core::EntryStatus;
    use std::sync::Arc;

    fn request() -> QueryRequest {
        QueryRequest {
            page: 1,
            page_size: 10,
            action: None,
            status: None,
            search: None,
            start_date: None,
            end_date: None,
        }
    }

    #[tokio::test]
    async fn test_gated_endpoint_answers_out_of_order() {
        let endpoint = Arc::new(GatedQueryEndpoint::new());

        let first = tokio::spawn({
            let endpoint = Arc::clone(&endpoint);
            async move { endpoint.query(request()).await }
        });
        endpoint.wait_for_calls(1).await;

        let second = tokio::spawn({
            let endpoint = Arc::clone(&endpoint);
            async move { endpoint.query(request()).await }
        });
        endpoint.wait_for_calls(2).await;

        assert!(endpoint.respond(1, Ok(page(entries("b", 1, EntryStatus::Success), 1, 1))));
        assert!(endpoint.respond(0, Err(server_error())));
        assert!(!endpoint.respond(0, Err(server_error())));

        assert_eq!(second.await.unwrap().unwrap().entries[0].id, "b-1");
        assert!(first.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_in_memory_transport_delivers_entries() {
        let transport = InMemoryEventTransport::new();
        let mut stream = transport.open(LiveSubscription::default()).await.unwrap();
        assert_eq!(transport.subscriber_count(), 1);

        let entry = EntryBuilder::new("live-1").build();
        assert_eq!(transport.publish_entry(&entry), 1);

        let message = stream.next().await;
        assert!(matches!(message, Some(LiveMessage::Entry { entry }) if entry.id == "live-1"));

        drop(stream);
        assert_eq!(transport.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_in_memory_transport_can_fail_open() {
        let transport = InMemoryEventTransport::new();
        transport.set_fail_open(true);
        assert!(transport.open(LiveSubscription::default()).await.is_err());
        assert_eq!(transport.open_count(), 0);
    }
}
