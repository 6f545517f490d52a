/// Liveness endpoint: answers `GET /` with a fixed body so an external
/// monitor can tell the process is up.
use crate::config::ServerConfig;
use axum::{routing::get, Router};
use tokio::net::TcpListener;

/// Body returned by the liveness route.
pub const LIVENESS_BODY: &str = "Slack Bot is running!";

/// Build the HTTP router. Unknown paths get axum's default 404.
pub fn router() -> Router {
    Router::new().route("/", get(liveness))
}

async fn liveness() -> &'static str {
    LIVENESS_BODY
}

/// Bind the listening socket described by `config`.
pub async fn bind(config: &ServerConfig) -> std::io::Result<TcpListener> {
    TcpListener::bind((config.bind.as_str(), config.port)).await
}

/// Serve the liveness router on an already-bound listener until it fails.
pub async fn serve(listener: TcpListener) -> std::io::Result<()> {
    axum::serve(listener, router()).await
}
