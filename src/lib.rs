//! Storage Inspector - per-tab `localStorage`, `sessionStorage` and cookies
//! behind one action protocol.
//!
//! This library lets a tool list, edit, import and export the key/value
//! state of a browser tab without caring which storage it lives in.
//!
//! # Architecture
//!
//! Leaf first:
//!
//! - **Backends** ([`PageStorage`], [`CookieJar`]): one capability set
//!   (read all, write, remove, clear, export, import). Page storage is
//!   reached by running a routine inside the tab; cookies go straight to
//!   the cookie store.
//! - **Dispatcher** ([`Dispatcher`]): checks for restricted pages, routes by
//!   kind, and turns every fault into one [`Failure`] code.
//! - **Reconciler** ([`Reconciler`]): keeps a table of rows consistent with
//!   the backend, owns the add-row draft and the confirm gates.
//!
//! The browser itself sits behind traits in [`channel`]. The
//! [`ExtensionBridge`] implements them over a WebSocket connection to a
//! companion extension; [`memory`] implements them in memory.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::net::{IpAddr, Ipv4Addr};
//! use std::sync::Arc;
//!
//! use storage_inspector::{
//!     Dispatcher, ExtensionBridge, InspectorOptions, PendingServer, Reconciler, Result,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let options = InspectorOptions::default();
//!     let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
//!
//!     let bridge = Arc::new(ExtensionBridge::accept(server, &options).await?);
//!     let dispatcher = Dispatcher::new(bridge.clone(), bridge.clone(), &options);
//!     let view = Reconciler::activate(dispatcher, bridge.as_ref(), options.initial_kind).await?;
//!
//!     for row in view.rows() {
//!         println!("{} = {}", row.key, row.value);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`backend`] | [`StorageBackend`] trait and its two adapters |
//! | [`bridge`] | Collaborators over the extension WebSocket |
//! | [`channel`] | Collaborator traits |
//! | [`dispatch`] | [`Action`], [`Payload`], [`Dispatcher`] |
//! | [`error`] | [`Error`], [`Failure`], [`ViewError`] and result aliases |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`memory`] | In-memory collaborators |
//! | [`options`] | [`InspectorOptions`] |
//! | [`protocol`] | WebSocket message types (internal) |
//! | [`reconciler`] | View model state machine |
//! | [`session`] | Per-activation [`Session`] |
//! | [`snapshot`] | [`Snapshot`], export and import formats |
//! | [`target`] | [`TargetKind`], [`TargetContext`] |
//! | [`transport`] | WebSocket transport layer (internal) |

// ============================================================================
// Modules
// ============================================================================

/// Storage backends.
pub mod backend;

/// Extension bridge.
pub mod bridge;

/// Collaborator traits.
pub mod channel;

/// Action dispatcher.
pub mod dispatch;

/// Error types and result aliases.
///
/// Fallible collaborator and adapter calls return [`Result<T>`]; dispatched
/// actions return [`ActionResult<T>`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// In-memory collaborators.
pub mod memory;

/// Inspector configuration.
pub mod options;

/// WebSocket protocol message types.
///
/// Internal module defining command/response structures.
pub mod protocol;

/// View model.
pub mod reconciler;

/// Inspector session.
pub mod session;

/// Snapshots and the JSON exchange format.
pub mod snapshot;

/// Storage kinds and target contexts.
pub mod target;

/// WebSocket transport layer.
///
/// Internal module handling WebSocket server and connection management.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Core types
pub use backend::{CookieJar, ImportReport, PageStorage, StorageBackend};
pub use dispatch::{Action, Dispatcher, Payload};
pub use reconciler::{BeginAdd, Draft, Field, ImportSource, Reconciler, Row, ViewState};
pub use session::Session;
pub use snapshot::{Entry, Snapshot};
pub use target::{TargetContext, TargetKind};

// Collaborators
pub use bridge::ExtensionBridge;
pub use channel::{
    ActiveTab, ActiveTabProvider, ConfirmPrompt, Confirmer, CookieStore, ScriptChannel,
};
pub use protocol::Cookie;
pub use transport::PendingServer;

// Configuration
pub use options::InspectorOptions;

// Error types
pub use error::{ActionResult, Error, Failure, Result, ViewError, ViewResult};

// Identifier types
pub use identifiers::{RequestId, TabId};
