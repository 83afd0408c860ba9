use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::handlers;
use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::roster::Roster;

/// Header carrying the session id minted by `initialize`.
pub const SESSION_HEADER: &str = "mcp-session-id";

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Live MCP sessions, keyed by id with the time each was last used.
///
/// Bounded two ways: sessions idle past `idle_timeout` are dropped on lookup
/// and swept before each insert, and at most `capacity` may be live at once.
/// The roster itself is never written after startup.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Instant>>,
    idle_timeout: Duration,
    capacity: usize,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration, capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
            capacity,
        }
    }

    /// Mint a session, or `None` when the store is full of live sessions.
    pub async fn create(&self) -> Option<String> {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();
        let before = sessions.len();
        sessions.retain(|_, last_seen| now.duration_since(*last_seen) <= self.idle_timeout);
        if sessions.len() < before {
            tracing::debug!(expired = before - sessions.len(), "Expired idle sessions");
        }

        if sessions.len() >= self.capacity {
            return None;
        }

        let id = uuid::Uuid::new_v4().to_string();
        sessions.insert(id.clone(), now);
        Some(id)
    }

    /// Check that a session is live and refresh its last-seen time.
    pub async fn touch(&self, id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();
        let Some(last_seen) = sessions.get_mut(id) else {
            return false;
        };
        if now.duration_since(*last_seen) <= self.idle_timeout {
            *last_seen = now;
            return true;
        }

        sessions.remove(id);
        tracing::debug!(session = %id, "Session expired");
        false
    }

    pub async fn remove(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[derive(Clone)]
struct AppState {
    roster: Arc<Roster>,
    sessions: Arc<SessionStore>,
}

/// MCP server speaking the Streamable HTTP transport in JSON response mode.
pub struct McpServer {
    config: ServerConfig,
    roster: Arc<Roster>,
}

impl McpServer {
    pub fn new(config: ServerConfig, roster: Roster) -> Self {
        Self {
            config,
            roster: Arc::new(roster),
        }
    }

    /// Build the HTTP router: `/mcp` for JSON-RPC traffic, `/health` for liveness.
    pub fn router(&self) -> Router {
        let state = AppState {
            roster: Arc::clone(&self.roster),
            sessions: Arc::new(SessionStore::new(
                self.config.session_idle_timeout,
                self.config.max_sessions,
            )),
        };

        Router::new()
            .route("/health", get(health_check))
            .route(
                "/mcp",
                post(handle_post).delete(handle_delete).get(handle_get),
            )
            .layer(DefaultBodyLimit::max(self.config.max_message_bytes))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind the configured address and serve until Ctrl-C.
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.config.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        tracing::info!(%addr, "MCP Student Server starting");
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already-bound listener until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;
        tracing::info!("MCP Student Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn health_check() -> &'static str {
    handlers::health::handle().await
}

async fn handle_post(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    // Not JSON at all → parse error; JSON but not a request object → invalid request
    let value: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "Parse error");
            return rpc_error(StatusCode::BAD_REQUEST, JsonRpcError::parse_error());
        }
    };
    let req: JsonRpcRequest = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "Invalid request");
            return rpc_error(StatusCode::BAD_REQUEST, JsonRpcError::invalid_request());
        }
    };

    if req.jsonrpc != "2.0" {
        return (
            StatusCode::BAD_REQUEST,
            Json(JsonRpcResponse::error(req.id.clone(), JsonRpcError::invalid_request())),
        )
            .into_response();
    }

    // Initialization gate: everything but `initialize` needs a live session
    if req.method == "initialize" {
        return initialize(&state, &req).await;
    }

    let Some(session) = session_id(&headers) else {
        return rpc_error(
            StatusCode::BAD_REQUEST,
            JsonRpcError::invalid_request_with("Server not initialized"),
        );
    };
    if !state.sessions.touch(session).await {
        return rpc_error(
            StatusCode::NOT_FOUND,
            JsonRpcError::invalid_request_with("Session not found"),
        );
    }

    match handlers::dispatch(&req, &state.roster).await {
        Some(resp) => Json(resp).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn initialize(state: &AppState, req: &JsonRpcRequest) -> Response {
    let Some(resp) = handlers::dispatch(req, &state.roster).await else {
        return StatusCode::ACCEPTED.into_response();
    };

    if resp.error.is_some() {
        return Json(resp).into_response();
    }

    let Some(session) = state.sessions.create().await else {
        tracing::warn!("Session limit reached, refusing initialize");
        return rpc_error(
            StatusCode::SERVICE_UNAVAILABLE,
            JsonRpcError::internal_error("Too many active sessions"),
        );
    };
    match HeaderValue::from_str(&session) {
        Ok(value) => {
            tracing::info!(session = %session, "Session created");
            let mut response = Json(resp).into_response();
            response.headers_mut().insert(SESSION_HEADER, value);
            response
        }
        Err(e) => {
            tracing::error!(error = %e, "Session id is not a valid header value");
            state.sessions.remove(&session).await;
            rpc_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                JsonRpcError::internal_error("Internal error"),
            )
        }
    }
}

async fn handle_delete(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    let Some(id) = session_id(&headers) else {
        return StatusCode::BAD_REQUEST;
    };

    if state.sessions.remove(id).await {
        tracing::info!(session = %id, "Session terminated");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// No server-initiated SSE stream is offered.
async fn handle_get() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST, DELETE")],
    )
}

fn session_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

fn rpc_error(status: StatusCode, error: JsonRpcError) -> Response {
    (status, Json(JsonRpcResponse::error(None, error))).into_response()
}
