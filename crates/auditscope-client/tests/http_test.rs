//! Integration tests for the HTTP and SSE adapters against a mock server.

use std::time::Duration;

use auditscope_client::{
    ClientAuth, ClientConfig, ClientError, EventTransport, ExportEndpoint, ExportFilter,
    ExportFormat, ExportRequest, HttpAuditClient, LiveMessage, LiveSubscription, QueryEndpoint,
    QueryRequest, SseEventTransport, StreamConfig,
};
use auditscope_core::{EntryStatus, FilterState, ResolvedInterval, StatusFilter};
use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn raw_entry(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "timestamp": "2024-03-01T10:00:00Z",
        "actor": {
            "userId": "u-1",
            "userName": "Ada Lovelace",
            "userEmail": "ada@example.com"
        },
        "action": "LOGIN",
        "ipAddress": "",
        "description": "Signed in",
        "status": "FAILED"
    })
}

#[tokio::test]
async fn test_query_sends_filters_and_decodes_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/audit-logs"))
        .and(query_param("page", "1"))
        .and(query_param("limit", "10"))
        .and(query_param("status", "Failed"))
        .and(header("authorization", "Bearer secret"))
        .and(header_exists("x-request-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": [raw_entry("e-1"), raw_entry("e-2")],
            "total": 12,
            "pageCount": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpAuditClient::new(
        ClientConfig::new(server.uri()).with_auth(ClientAuth::bearer("secret")),
    )
    .unwrap();

    let state = FilterState::default().with_status(StatusFilter::Only(EntryStatus::Failed));
    let page = client
        .query(QueryRequest::from_filter(&state, ResolvedInterval::unbounded()))
        .await
        .unwrap();

    assert_eq!(page.total, 12);
    assert_eq!(page.page_count, 2);
    assert_eq!(page.entries.len(), 2);

    let first = &page.entries[0];
    assert_eq!(first.id, "e-1");
    assert_eq!(first.status, EntryStatus::Failed);
    assert_eq!(first.actor.initials, "AL");
    assert_eq!(first.ip_address, None);
}

#[tokio::test]
async fn test_query_maps_error_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/audit-logs"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let client = HttpAuditClient::new(ClientConfig::new(server.uri())).unwrap();
    let err = client
        .query(QueryRequest::from_filter(
            &FilterState::default(),
            ResolvedInterval::unbounded(),
        ))
        .await
        .unwrap_err();

    match err {
        ClientError::Http { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "maintenance");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_query_rejects_malformed_entries() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/audit-logs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": [{"id": "e-1", "timestamp": "2024-03-01T10:00:00Z", "status": "pending"}],
            "total": 1,
            "pageCount": 1
        })))
        .mount(&server)
        .await;

    let client = HttpAuditClient::new(ClientConfig::new(server.uri())).unwrap();
    let err = client
        .query(QueryRequest::from_filter(
            &FilterState::default(),
            ResolvedInterval::unbounded(),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Decode { .. }));
}

#[tokio::test]
async fn test_export_posts_request_and_reads_filename() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/audit-logs/export"))
        .and(body_json(json!({
            "filter": {"status": "Failed"},
            "format": "csv",
            "includeMetadata": false
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "content-disposition",
                    r#"attachment; filename="audit-logs-2024-03-01.csv""#,
                )
                .set_body_raw("id,action\ne-1,LOGIN\n", "text/csv"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpAuditClient::new(ClientConfig::new(server.uri())).unwrap();
    let payload = client
        .export(ExportRequest {
            ids: None,
            filter: Some(ExportFilter {
                status: Some(EntryStatus::Failed),
                ..ExportFilter::default()
            }),
            format: ExportFormat::Csv,
            include_metadata: false,
        })
        .await
        .unwrap();

    assert_eq!(payload.bytes, b"id,action\ne-1,LOGIN\n".to_vec());
    assert_eq!(payload.filename.as_deref(), Some("audit-logs-2024-03-01.csv"));
    assert_eq!(payload.content_type.as_deref(), Some("text/csv"));
}

#[tokio::test]
async fn test_sse_transport_delivers_messages() {
    let server = MockServer::start().await;

    let body = format!(
        "data: {}\n\ndata: {}\n\n",
        json!({"type": "heartbeat"}),
        json!({"type": "entry", "entry": raw_entry("live-1")})
    );

    Mock::given(method("GET"))
        .and(path("/audit-logs/stream"))
        .and(query_param("status", "Failed"))
        .and(header("accept", "text/event-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let stream_config = StreamConfig {
        reconnect_base_delay: Duration::from_millis(10),
        reconnect_max_delay: Duration::from_millis(50),
        ..StreamConfig::default()
    };
    let transport =
        SseEventTransport::new(ClientConfig::new(server.uri()).with_stream(stream_config))
            .unwrap();

    let mut stream = transport
        .open(LiveSubscription {
            action: None,
            status: Some(EntryStatus::Failed),
        })
        .await
        .unwrap();

    let first = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .unwrap();
    assert_eq!(first, Some(LiveMessage::Heartbeat));

    let second = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .unwrap();
    assert!(matches!(second, Some(LiveMessage::Entry { entry }) if entry.id == "live-1"));
    assert!(transport.events_received() >= 2);
}

#[tokio::test]
async fn test_sse_transport_reconnects_after_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/audit-logs/stream"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let stream_config = StreamConfig {
        reconnect_base_delay: Duration::from_millis(5),
        reconnect_max_delay: Duration::from_millis(10),
        ..StreamConfig::default()
    };
    let transport =
        SseEventTransport::new(ClientConfig::new(server.uri()).with_stream(stream_config))
            .unwrap();

    let stream = transport.open(LiveSubscription::default()).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while transport.reconnect_attempts() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    assert!(!transport.is_connected());
    drop(stream);
}
