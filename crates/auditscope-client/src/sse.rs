//! Server-sent events transport for the live audit feed.
//!
//! Each [`EventTransport::open`] call spawns a background task that keeps
//! an SSE connection alive, reconnecting with backoff, and forwards decoded
//! [`LiveMessage`]s into the returned stream. Dropping the stream stops the
//! task.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use eventsource_stream::{Event, Eventsource};
use futures::{Stream, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{ClientConfig, StreamConfig};
use crate::endpoint::{EventStream, EventTransport, LiveMessage, LiveSubscription};
use crate::error::{ClientError, Result};
use crate::http::REQUEST_ID_HEADER;

const CHANNEL_CAPACITY: usize = 256;

/// Connection counters shared by every stream a transport opens.
#[derive(Debug, Default)]
struct StreamStats {
    connected: AtomicBool,
    reconnect_attempts: AtomicU64,
    events_received: AtomicU64,
}

/// SSE implementation of [`EventTransport`].
#[derive(Debug, Clone)]
pub struct SseEventTransport {
    config: ClientConfig,
    stream_url: String,
    http: reqwest::Client,
    stats: Arc<StreamStats>,
}

impl SseEventTransport {
    /// Creates a transport for the service at `config.url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let base = config.base_url()?;
        let stream_url = format!("{}/audit-logs/stream", base.as_str().trim_end_matches('/'));

        // No overall timeout: the response body never ends on a healthy feed.
        let http = reqwest::Client::builder()
            .connect_timeout(config.stream.connect_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ClientError::InvalidConfig {
                reason: e.to_string(),
            })?;

        Ok(Self {
            config,
            stream_url,
            http,
            stats: Arc::new(StreamStats::default()),
        })
    }

    /// Returns the feed URL.
    #[must_use]
    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }

    /// Returns true while a connection is established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.stats.connected.load(Ordering::SeqCst)
    }

    /// Returns the number of reconnection attempts made so far.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u64 {
        self.stats.reconnect_attempts.load(Ordering::SeqCst)
    }

    /// Returns the number of SSE events received so far.
    #[must_use]
    pub fn events_received(&self) -> u64 {
        self.stats.events_received.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventTransport for SseEventTransport {
    async fn open(&self, subscription: LiveSubscription) -> Result<EventStream> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let connection = Connection {
            http: self.http.clone(),
            config: self.config.clone(),
            url: self.stream_url.clone(),
            subscription,
            stats: Arc::clone(&self.stats),
        };

        let task = tokio::spawn(run_sse_loop(connection, tx));
        Ok(SseStream { rx, task }.boxed())
    }
}

/// Receiving side of one subscription; aborts its task on drop.
struct SseStream {
    rx: mpsc::Receiver<LiveMessage>,
    task: JoinHandle<()>,
}

impl Stream for SseStream {
    type Item = LiveMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for SseStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct Connection {
    http: reqwest::Client,
    config: ClientConfig,
    url: String,
    subscription: LiveSubscription,
    stats: Arc<StreamStats>,
}

/// Why a connection attempt ended.
enum Disconnect {
    /// The server closed the stream.
    Ended,
    /// The subscriber went away.
    Closed,
}

/// Runs the SSE connection loop with reconnection logic.
async fn run_sse_loop(connection: Connection, tx: mpsc::Sender<LiveMessage>) {
    let stream_config: &StreamConfig = &connection.config.stream;
    let mut consecutive_failures: u32 = 0;

    loop {
        info!(url = %connection.url, "Connecting to audit event stream");

        match connect_and_forward(&connection, &tx).await {
            Ok(Disconnect::Closed) => {
                debug!("Audit event stream subscriber dropped");
                break;
            }
            Ok(Disconnect::Ended) => {
                debug!("Audit event stream ended normally");
                consecutive_failures = 0;
            }
            Err(e) => {
                error!(error = %e, "Audit event stream error");
                consecutive_failures = consecutive_failures.saturating_add(1);
            }
        }

        connection.stats.connected.store(false, Ordering::SeqCst);

        if stream_config.attempts_exhausted(consecutive_failures) {
            error!(
                attempts = consecutive_failures,
                "Max reconnection attempts reached, stopping audit event stream"
            );
            break;
        }

        let delay = stream_config.backoff_delay(consecutive_failures);
        connection
            .stats
            .reconnect_attempts
            .fetch_add(1, Ordering::SeqCst);
        warn!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempts = consecutive_failures,
            "Reconnecting to audit event stream"
        );

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = tx.closed() => {
                debug!("Audit event stream subscriber dropped during reconnect wait");
                break;
            }
        }
    }

    connection.stats.connected.store(false, Ordering::SeqCst);
}

/// Connects once and forwards events until the stream ends.
async fn connect_and_forward(
    connection: &Connection,
    tx: &mpsc::Sender<LiveMessage>,
) -> Result<Disconnect> {
    let request = connection
        .http
        .get(&connection.url)
        .query(&connection.subscription.query_pairs())
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache")
        .header(REQUEST_ID_HEADER, Uuid::now_v7().to_string());

    let response = connection.config.auth.apply(request).send().await?;

    if !response.status().is_success() {
        return Err(ClientError::Http {
            status: response.status().as_u16(),
            message: response.text().await.unwrap_or_default(),
        });
    }

    connection.stats.connected.store(true, Ordering::SeqCst);
    info!("Audit event stream connected");

    let mut events = response.bytes_stream().eventsource();

    while let Some(event) = events.next().await {
        let event = event.map_err(|e| ClientError::stream(e.to_string()))?;
        connection
            .stats
            .events_received
            .fetch_add(1, Ordering::SeqCst);

        let Some(message) = decode_event(&event) else {
            continue;
        };

        if tx.send(message).await.is_err() {
            return Ok(Disconnect::Closed);
        }
    }

    Ok(Disconnect::Ended)
}

/// Decodes one SSE event; comments, empty and malformed payloads yield `None`.
fn decode_event(event: &Event) -> Option<LiveMessage> {
    if event.data.trim().is_empty() {
        return None;
    }

    match serde_json::from_str::<LiveMessage>(&event.data) {
        Ok(message) => Some(message),
        Err(e) => {
            warn!(event = %event.event, error = %e, "Failed to parse audit event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sse_event(data: &str) -> Event {
        Event {
            event: "message".to_string(),
            data: data.to_string(),
            id: String::new(),
            retry: None,
        }
    }

    #[test]
    fn test_transport_initial_state() {
        let transport = SseEventTransport::new(ClientConfig::new("http://localhost:9000")).unwrap();
        assert!(!transport.is_connected());
        assert_eq!(transport.reconnect_attempts(), 0);
        assert_eq!(transport.events_received(), 0);
        assert_eq!(
            transport.stream_url(),
            "http://localhost:9000/audit-logs/stream"
        );
    }

    #[test]
    fn test_decode_event_skips_empty_and_malformed() {
        assert!(decode_event(&sse_event("")).is_none());
        assert!(decode_event(&sse_event("not json")).is_none());
        assert_eq!(
            decode_event(&sse_event(r#"{"type":"heartbeat"}"#)),
            Some(LiveMessage::Heartbeat)
        );
    }

    #[test]
    fn test_decode_entry_event() {
        let message = decode_event(&sse_event(
            r#"{"type":"entry","entry":{"id":"e-9","timestamp":"2024-03-01T10:00:00Z","action":"LOGIN","status":"failed"}}"#,
        ));
        assert!(matches!(message, Some(LiveMessage::Entry { entry }) if entry.id == "e-9"));
    }
}
