//! HTTP API layer.
//!
//! Speakers are the only clients: they fetch cached clips and deliver
//! GENA notifications. Handlers stay thin and delegate to the cache and the
//! subscription manager.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::audio::AudioCache;
use crate::sonos::GenaSubscriptionManager;

pub mod http;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to a TCP port.
    #[error("Failed to bind to port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// The server stopped with an I/O error.
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Shared application state for the API layer.
#[derive(Clone)]
pub struct AppState {
    /// Clips waiting to be fetched by speakers.
    pub cache: Arc<AudioCache>,
    /// Receives AVTransport NOTIFY requests.
    pub gena: Arc<GenaSubscriptionManager>,
}

/// Binds the HTTP listener on all interfaces.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the port is unavailable.
pub async fn bind(port: u16) -> Result<TcpListener, ServerError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { port, source })
}

/// Serves the API on `listener` until `cancel` fires.
pub async fn start_server(
    listener: TcpListener,
    state: AppState,
    cancel: CancellationToken,
) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        log::info!("[Server] Listening on http://{}", addr);
    }
    let app = http::create_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;
    log::info!("[Server] Stopped");
    Ok(())
}
