use mcp_student_server::config::ServerConfig;
use mcp_student_server::roster::Roster;
use mcp_student_server::server::McpServer;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mcp_student_server=info,tower_http=info".into()),
        )
        .with_target(false)
        .init();

    let server = McpServer::new(ServerConfig::default(), Roster::seed());
    if let Err(e) = server.run().await {
        tracing::error!("fatal error: {e}");
        std::process::exit(1);
    }
}
