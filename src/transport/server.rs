//! Listening socket the extension connects to.
//!
//! # Handshake
//!
//! 1. [`PendingServer::bind`] opens a local port (0 picks a free one)
//! 2. The extension is told [`PendingServer::ws_url`]
//! 3. It connects and upgrades to WebSocket
//! 4. It sends READY naming the active tab
//!
//! [`PendingServer::accept`] covers steps 3 and 4 under one deadline. Stray
//! TCP clients that fail the upgrade are dropped and the wait goes on.

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use crate::channel::ActiveTab;
use crate::error::{Error, Result};

use super::Connection;

// ============================================================================
// PendingServer
// ============================================================================

/// Bound listener waiting for the extension.
///
/// # Example
///
/// ```ignore
/// use std::net::{IpAddr, Ipv4Addr};
/// use storage_inspector::transport::PendingServer;
///
/// let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
/// println!("connect the extension to {}", server.ws_url());
///
/// let (connection, tab) = server.accept(Duration::from_secs(30)).await?;
/// ```
pub struct PendingServer {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl PendingServer {
    /// Binds to `ip:port`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the address cannot be bound.
    pub async fn bind(ip: IpAddr, port: u16) -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::new(ip, port)).await?;
        let local_addr = listener.local_addr()?;

        debug!(%local_addr, "Listening for extension");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Address actually bound.
    #[inline]
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// URL the extension should connect to.
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    /// Waits for the extension to connect and send READY.
    ///
    /// The whole exchange shares one `connect_timeout` budget.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if no extension completes the
    ///   handshake in time
    /// - [`Error::Io`] if the listener fails
    /// - [`Error::Protocol`] if READY is malformed
    pub async fn accept(self, connect_timeout: Duration) -> Result<(Connection, ActiveTab)> {
        let deadline = Instant::now() + connect_timeout;
        let timed_out = || Error::connection_timeout(connect_timeout.as_millis() as u64);

        let ws_stream = loop {
            let (stream, peer) = timeout_at(deadline, self.listener.accept())
                .await
                .map_err(|_| timed_out())??;

            match timeout_at(deadline, tokio_tungstenite::accept_async(stream)).await {
                Ok(Ok(ws_stream)) => {
                    debug!(%peer, "WebSocket upgrade accepted");
                    break ws_stream;
                }
                Ok(Err(e)) => warn!(%peer, error = %e, "WebSocket upgrade failed"),
                Err(_) => return Err(timed_out()),
            }
        };

        let connection = Connection::new(ws_stream);
        let remaining = deadline.saturating_duration_since(Instant::now());
        let tab = connection.wait_ready(remaining).await.map_err(|e| match e {
            Error::ConnectionTimeout { .. } => timed_out(),
            other => other,
        })?;

        info!(addr = %self.local_addr, tab_id = %tab.tab_id, "Extension connected");
        Ok((connection, tab))
    }
}

// ============================================================================
// Tests
// ============================================================================
