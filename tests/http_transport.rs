//! Streamable HTTP transport tests, driven in-process through the router.

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use mcp_student_server::config::ServerConfig;
use mcp_student_server::handlers::health::HEALTH_MESSAGE;
use mcp_student_server::roster::Roster;
use mcp_student_server::server::{McpServer, ServerError, SessionStore, SESSION_HEADER};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower::ServiceExt;

fn test_router() -> Router {
    McpServer::new(ServerConfig::default(), Roster::seed()).router()
}

fn post(body: impl Into<Body>, session: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/mcp")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT, "application/json, text/event-stream");
    if let Some(id) = session {
        builder = builder.header(SESSION_HEADER, id);
    }
    builder.body(body.into()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Run the handshake and return the minted session id.
async fn initialize(app: &Router) -> String {
    let body = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-03-26",
            "capabilities": {},
            "clientInfo": { "name": "http-test", "version": "0.1.0" }
        }
    });
    let response = app.clone().oneshot(post(body.to_string(), None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let session = response
        .headers()
        .get(SESSION_HEADER)
        .expect("initialize must mint a session")
        .to_str()
        .unwrap()
        .to_string();

    let value = body_json(response).await;
    assert_eq!(value["result"]["protocolVersion"], "2025-03-26");
    session
}

#[tokio::test]
async fn health_route_reports_running() {
    let response = test_router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], HEALTH_MESSAGE.as_bytes());
    assert_eq!(HEALTH_MESSAGE, "MCP Student Server is running!");
}

#[tokio::test]
async fn tool_call_over_http() {
    let app = test_router();
    let session = initialize(&app).await;

    let initialized = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
    let response = app
        .clone()
        .oneshot(post(initialized.to_string(), Some(&session)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let call = json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "tools/call",
        "params": { "name": "get_student_info", "arguments": { "student_id": "3" } }
    });
    let response = app
        .clone()
        .oneshot(post(call.to_string(), Some(&session)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );

    let value = body_json(response).await;
    assert_eq!(value["id"], 2);
    assert_eq!(
        value["result"]["content"][0]["text"],
        "Student details:\nID: 3\nName: 王五\nAge: 16\nGrade: 高一\nSection: C班"
    );
}

#[tokio::test]
async fn not_found_travels_as_successful_response() {
    let app = test_router();
    let session = initialize(&app).await;

    let call = json!({
        "jsonrpc": "2.0",
        "id": "lookup-99",
        "method": "tools/call",
        "params": { "name": "get_student_info", "arguments": { "student_id": "99" } }
    });
    let response = app
        .clone()
        .oneshot(post(call.to_string(), Some(&session)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let value = body_json(response).await;
    assert_eq!(value["id"], "lookup-99");
    assert!(value.get("error").is_none());
    assert_eq!(value["result"]["isError"], true);
    assert_eq!(value["result"]["content"][0]["text"], "No student found with ID 99");
}

#[tokio::test]
async fn empty_student_id_is_invalid_params() {
    let app = test_router();
    let session = initialize(&app).await;

    let call = json!({
        "jsonrpc": "2.0",
        "id": 3,
        "method": "tools/call",
        "params": { "name": "get_student_info", "arguments": { "student_id": "" } }
    });
    let response = app
        .clone()
        .oneshot(post(call.to_string(), Some(&session)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let value = body_json(response).await;
    assert!(value.get("result").is_none());
    assert_eq!(value["error"]["code"], -32602);
}

#[tokio::test]
async fn request_without_session_is_rejected() {
    let app = test_router();
    let list = json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" });

    let response = app.oneshot(post(list.to_string(), None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let value = body_json(response).await;
    assert_eq!(value["error"]["code"], -32600);
    assert_eq!(value["error"]["message"], "Server not initialized");
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let app = test_router();
    let list = json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" });

    let response = app
        .oneshot(post(list.to_string(), Some("no-such-session")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleted_session_is_gone() {
    let app = test_router();
    let session = initialize(&app).await;

    let delete = Request::builder()
        .method(Method::DELETE)
        .uri("/mcp")
        .header(SESSION_HEADER, &session)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(delete).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let ping = json!({ "jsonrpc": "2.0", "id": 9, "method": "ping" });
    let response = app
        .clone()
        .oneshot(post(ping.to_string(), Some(&session)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_body_is_parse_error() {
    let response = test_router()
        .oneshot(post("{not json", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let value = body_json(response).await;
    assert_eq!(value["error"]["code"], -32700);
    assert!(value.get("id").is_none());
}

#[tokio::test]
async fn json_that_is_not_a_request_is_invalid_request() {
    let app = test_router();
    let bodies = [
        r#"{"id":1}"#,
        "[]",
        r#"[{"jsonrpc":"2.0","id":1,"method":"ping"}]"#,
        "42",
    ];
    for body in bodies {
        let response = app.clone().oneshot(post(body, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(body_json(response).await["error"]["code"], -32600, "{body}");
    }
}

#[tokio::test]
async fn wrong_jsonrpc_version_is_invalid_request() {
    let body = json!({ "jsonrpc": "1.0", "id": 1, "method": "initialize" });
    let response = test_router()
        .oneshot(post(body.to_string(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], -32600);
}

#[tokio::test]
async fn get_on_mcp_is_not_allowed() {
    let response = test_router()
        .oneshot(Request::get("/mcp").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let config = ServerConfig {
        max_message_bytes: 64,
        ..ServerConfig::default()
    };
    let app = McpServer::new(config, Roster::seed()).router();

    let padding = "x".repeat(256);
    let body = json!({ "jsonrpc": "2.0", "id": 1, "method": "ping", "params": { "pad": padding } });
    let response = app.oneshot(post(body.to_string(), None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn bind_failure_is_reported() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr: SocketAddr = taken.local_addr().unwrap();

    let config = ServerConfig {
        bind_addr: addr,
        ..ServerConfig::default()
    };
    let err = McpServer::new(config, Roster::seed()).run().await.unwrap_err();
    assert!(matches!(err, ServerError::Bind { addr: a, .. } if a == addr));
}

#[tokio::test]
async fn serves_health_over_tcp_until_shutdown() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

    let server = McpServer::new(ServerConfig::default(), Roster::seed());
    let handle = tokio::spawn(server.serve(listener, async {
        let _ = stop_rx.await;
    }));

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8(raw).unwrap();

    assert!(text.starts_with("HTTP/1.1 200"));
    assert!(text.ends_with(HEALTH_MESSAGE));

    stop_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

// ---------------------------------------------------------------------------
// Session bounds
// ---------------------------------------------------------------------------

fn initialize_body() -> String {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": { "protocolVersion": "2025-03-26", "capabilities": {} }
    })
    .to_string()
}

#[tokio::test]
async fn initialize_beyond_session_cap_is_unavailable() {
    let config = ServerConfig {
        max_sessions: 2,
        ..ServerConfig::default()
    };
    let app = McpServer::new(config, Roster::seed()).router();

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(post(initialize_body(), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(post(initialize_body(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.headers().get(SESSION_HEADER).is_none());
}

#[tokio::test]
async fn deleting_a_session_frees_a_slot() {
    let config = ServerConfig {
        max_sessions: 1,
        ..ServerConfig::default()
    };
    let app = McpServer::new(config, Roster::seed()).router();
    let session = initialize(&app).await;

    let delete = Request::builder()
        .method(Method::DELETE)
        .uri("/mcp")
        .header(SESSION_HEADER, &session)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(delete).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    initialize(&app).await;
}

#[tokio::test]
async fn idle_session_expires() {
    let config = ServerConfig {
        session_idle_timeout: Duration::from_millis(50),
        ..ServerConfig::default()
    };
    let app = McpServer::new(config, Roster::seed()).router();
    let session = initialize(&app).await;

    tokio::time::sleep(Duration::from_millis(150)).await;

    let ping = json!({ "jsonrpc": "2.0", "id": 2, "method": "ping" });
    let response = app
        .clone()
        .oneshot(post(ping.to_string(), Some(&session)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn session_store_sweeps_idle_sessions_before_insert() {
    let store = SessionStore::new(Duration::from_millis(50), 10);
    for _ in 0..5 {
        store.create().await.unwrap();
    }
    assert_eq!(store.len().await, 5);

    tokio::time::sleep(Duration::from_millis(150)).await;

    let fresh = store.create().await.unwrap();
    assert_eq!(store.len().await, 1);
    assert!(store.touch(&fresh).await);
}

#[tokio::test]
async fn session_store_stays_bounded_under_repeated_initialize() {
    let store = SessionStore::new(Duration::from_secs(60), 100);
    let mut created = 0;
    for _ in 0..5000 {
        if store.create().await.is_some() {
            created += 1;
        }
    }

    assert_eq!(created, 100);
    assert_eq!(store.len().await, 100);
}

#[tokio::test]
async fn session_store_touch_refreshes_and_remove_forgets() {
    let store = SessionStore::new(Duration::from_secs(60), 10);
    assert!(store.is_empty().await);

    let id = store.create().await.unwrap();
    assert!(store.touch(&id).await);
    assert!(!store.touch("unknown").await);

    assert!(store.remove(&id).await);
    assert!(!store.remove(&id).await);
    assert!(!store.touch(&id).await);
    assert!(store.is_empty().await);
}
