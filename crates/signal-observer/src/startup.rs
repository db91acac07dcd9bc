//! Server startup helper for embedding in the engine binary.
//!
//! [`spawn_observer`] launches the HTTP + `WebSocket` server on a
//! background Tokio task so it runs alongside the run loop.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::server::{ServerConfig, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning the server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Spawn the HTTP server on a background Tokio task.
///
/// Binds to `0.0.0.0:{port}`. The returned [`JoinHandle`] can be aborted
/// or awaited during shutdown.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the address does not parse. Bind
/// failures happen inside the task and are logged.
pub fn spawn_observer(port: u16, state: Arc<AppState>) -> Result<JoinHandle<()>, StartupError> {
    let config = ServerConfig {
        host: String::from("0.0.0.0"),
        port,
    };
    let _ = config.socket_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = crate::server::start_server(&config, state).await {
            tracing::error!(error = %e, "HTTP server exited with error");
        }
    });

    tracing::info!(port, "HTTP server spawned on background task");

    Ok(handle)
}
