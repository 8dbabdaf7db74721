use std::sync::Arc;

use bytes::Bytes;
use newsqa_client::{
    ApiClient, ApiConfig, ApiResponse, FakeTransport, Method, ResponseBody, SessionStart,
};
use newsqa_core::NewsqaError;
use serde_json::json;

fn setup(transport: &FakeTransport) -> ApiClient {
    ApiClient::new(
        ApiConfig::new("http://qa.test/api/"),
        Arc::new(transport.clone()),
    )
}

// ---------------------------------------------------------------------------
// ApiConfig
// ---------------------------------------------------------------------------

#[test]
fn config_defaults() {
    let config = ApiConfig::default();
    assert_eq!(config.base_url, "http://localhost:4000/api");
    assert!(config.headers.is_empty());
}

#[test]
fn config_builder_methods() {
    let config = ApiConfig::default()
        .with_base_url("https://example.com/api")
        .with_header("X-Client", "newsqa");
    assert_eq!(config.base_url, "https://example.com/api");
    assert_eq!(
        config.headers,
        vec![("X-Client".to_string(), "newsqa".to_string())]
    );
}

// ---------------------------------------------------------------------------
// Session endpoints
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_session_posts_and_parses() {
    let transport = FakeTransport::new();
    transport.push_json(200, json!({"sessionId": "s-1"}));
    let client = setup(&transport);

    let start = client.start_session().await.unwrap();
    assert_eq!(
        start,
        SessionStart {
            session_id: "s-1".to_string()
        }
    );

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::Post);
    assert_eq!(requests[0].url, "http://qa.test/api/session/start");
}

#[tokio::test]
async fn start_session_failure_is_transport_error() {
    let transport = FakeTransport::new();
    transport.push_text(503, "text/plain", "down for maintenance");
    let client = setup(&transport);

    let err = client.start_session().await.unwrap_err();
    match err {
        NewsqaError::Transport(msg) => {
            assert!(msg.contains("503"), "{msg}");
            assert!(msg.contains("down for maintenance"), "{msg}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn list_sessions_parses_summaries() {
    let transport = FakeTransport::new();
    transport.push_json(
        200,
        json!([
            {"sessionId": "a", "createdAt": "2024-01-01T00:00:00Z", "lastActiveAt": 1700000000000i64},
            {"sessionId": "b"}
        ]),
    );
    let client = setup(&transport);

    let sessions = client.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].session_id, "a");
    assert_eq!(sessions[0].created_at, Some(json!("2024-01-01T00:00:00Z")));
    assert_eq!(sessions[0].last_active_at, Some(json!(1700000000000i64)));
    assert_eq!(sessions[1].created_at, None);
}

#[tokio::test]
async fn history_sends_session_id_query() {
    let transport = FakeTransport::new();
    transport.push_json(200, json!({"messages": []}));
    let client = setup(&transport);

    let body = client.session_history("s 1").await.unwrap();
    assert_eq!(body, json!({"messages": []}));

    let request = &transport.requests()[0];
    assert_eq!(request.method, Method::Get);
    assert_eq!(request.url, "http://qa.test/api/session/history");
    assert_eq!(request.query_param("sessionId"), Some("s 1"));
}

#[tokio::test]
async fn empty_session_id_is_rejected_without_request() {
    let transport = FakeTransport::new();
    let client = setup(&transport);

    assert!(matches!(
        client.session_history("").await,
        Err(NewsqaError::Validation(_))
    ));
    assert!(matches!(
        client.clear_session("  ").await,
        Err(NewsqaError::Validation(_))
    ));
    assert!(matches!(
        client.chat("", "hi").await,
        Err(NewsqaError::Validation(_))
    ));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn clear_session_uses_delete() {
    let transport = FakeTransport::new();
    transport.push_json(200, json!({"ok": true}));
    transport.push_text(200, "text/plain", "");
    let client = setup(&transport);

    assert_eq!(client.clear_session("s").await.unwrap(), json!({"ok": true}));
    assert_eq!(client.clear_session("s").await.unwrap(), serde_json::Value::Null);
    assert_eq!(transport.requests()[0].method, Method::Delete);
}

#[tokio::test]
async fn clear_session_failure_includes_body() {
    let transport = FakeTransport::new();
    transport.push_json(404, json!({"error": "no such session"}));
    let client = setup(&transport);

    let err = client.clear_session("s").await.unwrap_err();
    assert!(err.to_string().contains("no such session"), "{err}");
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chat_posts_json_body_and_returns_stream_unread() {
    let transport = FakeTransport::new();
    transport.push_stream(
        "text/event-stream",
        vec![Bytes::from("Hel"), Bytes::from("lo")],
    );
    let client = setup(&transport);

    let response = client.chat("s-1", "What happened?").await.unwrap();
    assert!(response.is_text_stream());
    assert!(matches!(response.body, ResponseBody::Streaming(_)));
    assert_eq!(response.text().await.unwrap(), "Hello");

    let request = &transport.requests()[0];
    assert_eq!(request.url, "http://qa.test/api/chat");
    assert_eq!(
        request.body,
        Some(json!({"sessionId": "s-1", "message": "What happened?"}))
    );
}

#[tokio::test]
async fn chat_non_success_is_transport_error() {
    let transport = FakeTransport::new();
    transport.push_text(500, "text/plain", "boom");
    let client = setup(&transport);

    let err = client.chat("s", "hi").await.unwrap_err();
    assert_eq!(err, NewsqaError::Transport("chat failed (500): boom".to_string()));
}

#[tokio::test]
async fn transport_error_propagates() {
    let transport = FakeTransport::new();
    transport.push_error(NewsqaError::Transport("connection refused".to_string()));
    let client = setup(&transport);

    let err = client.chat("s", "hi").await.unwrap_err();
    assert!(err.to_string().contains("connection refused"));
}

#[tokio::test]
async fn exhausted_fake_reports_error() {
    let transport = FakeTransport::new();
    let client = setup(&transport);
    assert!(client.list_sessions().await.is_err());
}

// ---------------------------------------------------------------------------
// ApiResponse helpers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn into_json_rejects_garbage() {
    let response = ApiResponse::buffered(200, Some("application/json"), "not json");
    assert!(matches!(
        response.into_json().await,
        Err(NewsqaError::Format(_))
    ));
}

#[test]
fn text_stream_detection() {
    let sse = ApiResponse::buffered(200, Some("text/event-stream; charset=utf-8"), "");
    let plain = ApiResponse::buffered(200, Some("Text/Plain"), "");
    let json = ApiResponse::buffered(200, Some("application/json"), "");
    let none = ApiResponse::buffered(200, None, "");
    assert!(sse.is_text_stream());
    assert!(plain.is_text_stream());
    assert!(!json.is_text_stream());
    assert!(!none.is_text_stream());
}
