//! WebSocket transport layer.
//!
//! Carries requests to the companion extension and answers back over a
//! single local WebSocket.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Bridge (Rust)  │                              │  Extension      │
//! │                 │         WebSocket            │  (Popup /       │
//! │  PendingServer  │◄────────────────────────────►│   Background)   │
//! │  → Connection   │      localhost:PORT          │  WebSocket      │
//! │                 │                              │  Client         │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `PendingServer::bind` opens a local port
//! 2. The extension is given `PendingServer::ws_url`
//! 3. `PendingServer::accept` returns the `Connection` and the READY tab
//! 4. `Connection::send` correlates each request with its answer
//! 5. `Connection::shutdown` closes the socket
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Request correlation and the I/O task |
//! | `server` | Listener and handshake |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and I/O loop.
pub mod connection;

/// WebSocket server for extension communication.
pub mod server;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::Connection;
pub use server::PendingServer;
