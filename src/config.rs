use std::net::SocketAddr;
use std::time::Duration;

/// Fixed listen port.
pub const DEFAULT_PORT: u16 = 8080;

/// Maximum bytes per JSON-RPC message (1 MiB).
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Sessions idle longer than this are dropped (30 minutes).
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Upper bound on concurrently live sessions.
pub const MAX_SESSIONS: usize = 1024;

/// Name reported in the `initialize` handshake.
pub const SERVER_NAME: &str = "Student Information Server";

/// Version reported in the `initialize` handshake.
pub const SERVER_VERSION: &str = "1.0.0";

/// Server configuration.
///
/// There is no file or environment layer; the defaults are the deployment.
/// Tests construct their own value to bind an ephemeral port.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub max_message_bytes: usize,
    pub session_idle_timeout: Duration,
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_message_bytes: MAX_MESSAGE_BYTES,
            session_idle_timeout: SESSION_IDLE_TIMEOUT,
            max_sessions: MAX_SESSIONS,
        }
    }
}
