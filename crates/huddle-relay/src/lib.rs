//! huddle-relay: WebSocket signaling relay for room sessions.
//!
//! Each client claims an id with a `register` frame, then sends `signal`
//! frames addressed to other ids. The relay stamps the sender's id on each
//! signal and forwards it without looking at the payload.

mod connection;
mod registry;

use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;

pub use connection::handle_connection;
pub use registry::PeerRegistry;

/// Accept connections on `listener` forever.
pub async fn serve(listener: TcpListener, registry: PeerRegistry) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let registry = registry.clone();
                tokio::spawn(async move {
                    match accept_async(stream).await {
                        Ok(ws) => handle_connection(ws, addr, registry).await,
                        Err(e) => {
                            tracing::warn!(peer = %addr, error = %e, "WS handshake failed");
                        }
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept error");
            }
        }
    }
}
