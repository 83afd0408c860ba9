/// Fixed body of the liveness route.
pub const HEALTH_MESSAGE: &str = "MCP Student Server is running!";

/// Liveness check. Independent of the roster; always succeeds.
pub async fn handle() -> &'static str {
    HEALTH_MESSAGE
}
