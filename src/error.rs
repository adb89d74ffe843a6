//! Error types.
//!
//! Two layers:
//!
//! - [`enum@Error`]: everything a collaborator or adapter can run into
//!   (transport faults, routine faults, bad input). Rich, carries context.
//! - [`Failure`]: the three reason codes the dispatcher hands to callers.
//!   Every [`enum@Error`] maps onto exactly one [`Failure`] via
//!   [`Error::reason`].
//!
//! # Usage
//!
//! ```ignore
//! use storage_inspector::{Failure, Result};
//!
//! async fn example(jar: &CookieJar, ctx: &TargetContext) -> Result<()> {
//!     jar.remove(ctx, "session").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants | Reason |
//! |----------|----------|--------|
//! | Configuration | [`Error::Config`] | `EXECUTION_FAILED` |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`] | `EXECUTION_FAILED` |
//! | Protocol | [`Error::Protocol`], [`Error::RequestTimeout`] | `EXECUTION_FAILED` |
//! | Execution | [`Error::Script`], [`Error::StorageUnavailable`], [`Error::Cookie`] | `EXECUTION_FAILED` |
//! | Target | [`Error::RestrictedTarget`] | `RESTRICTED_TARGET` |
//! | Input | [`Error::MalformedInput`] | `MALFORMED_INPUT` |
//! | External | [`Error::Io`], [`Error::Json`] | `EXECUTION_FAILED` |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use serde::Serialize;
use thiserror::Error;

use crate::identifiers::{RequestId, TabId};
use crate::target::TargetKind;

// ============================================================================
// Result Aliases
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

/// Outcome of a dispatched action: a payload or one [`Failure`] code.
pub type ActionResult<T> = StdResult<T, Failure>;

// ============================================================================
// Failure
// ============================================================================

/// Reason code carried by a failed action.
///
/// Presentation code switches on this without knowing backend internals.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Failure {
    /// Privileged or internal page; no backend call was attempted.
    #[error("target page is restricted")]
    RestrictedTarget,

    /// A backend call was attempted and failed.
    #[error("backend execution failed")]
    ExecutionFailed,

    /// Empty key on add, or unparseable import text.
    #[error("malformed input")]
    MalformedInput,
}

impl Failure {
    /// Returns the stable reason code.
    #[inline]
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::RestrictedTarget => "RESTRICTED_TARGET",
            Self::ExecutionFailed => "EXECUTION_FAILED",
            Self::MalformedInput => "MALFORMED_INPUT",
        }
    }

    /// Returns `true` if the target cannot be reached at all.
    ///
    /// Both restricted pages and failed remote execution render the
    /// same "inaccessible" view.
    #[inline]
    #[must_use]
    pub const fn is_inaccessible(&self) -> bool {
        matches!(self, Self::RestrictedTarget | Self::ExecutionFailed)
    }
}

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Timed out waiting for the extension to connect.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// WebSocket connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or error response.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Command request timeout.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// The in-page routine could not run or threw.
    #[error("Script error on tab {tab_id}: {message}")]
    Script {
        /// Tab the routine was sent to.
        tab_id: TabId,
        /// Error message from the execution channel.
        message: String,
    },

    /// The page exposes no storage object for this kind.
    #[error("{kind} is unavailable on tab {tab_id}")]
    StorageUnavailable {
        /// Tab that was queried.
        tab_id: TabId,
        /// Storage kind that was missing.
        kind: TargetKind,
    },

    /// Cookie store operation failed.
    #[error("Cookie store error: {message}")]
    Cookie {
        /// Description of the cookie failure.
        message: String,
    },

    // ========================================================================
    // Target Errors
    // ========================================================================
    /// Target URL uses a privileged scheme.
    #[error("Restricted target: {url}")]
    RestrictedTarget {
        /// The rejected URL.
        url: String,
    },

    // ========================================================================
    // Input Errors
    // ========================================================================
    /// Input rejected before any write happened.
    #[error("Malformed input: {message}")]
    MalformedInput {
        /// Description of what was wrong.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }

    /// Creates a script error.
    #[inline]
    pub fn script(tab_id: TabId, message: impl Into<String>) -> Self {
        Self::Script {
            tab_id,
            message: message.into(),
        }
    }

    /// Creates a storage unavailable error.
    #[inline]
    pub fn storage_unavailable(tab_id: TabId, kind: TargetKind) -> Self {
        Self::StorageUnavailable { tab_id, kind }
    }

    /// Creates a cookie store error.
    #[inline]
    pub fn cookie(message: impl Into<String>) -> Self {
        Self::Cookie {
            message: message.into(),
        }
    }

    /// Creates a restricted target error.
    #[inline]
    pub fn restricted_target(url: impl Into<String>) -> Self {
        Self::RestrictedTarget { url: url.into() }
    }

    /// Creates a malformed input error.
    #[inline]
    pub fn malformed_input(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
        }
    }
}

// ============================================================================
// Reason Mapping
// ============================================================================

impl Error {
    /// Maps this error onto its [`Failure`] code.
    ///
    /// Only the two pre-flight rejections keep their own code; anything
    /// that went wrong after a call was attempted is `EXECUTION_FAILED`.
    #[must_use]
    pub fn reason(&self) -> Failure {
        match self {
            Self::RestrictedTarget { .. } => Failure::RestrictedTarget,
            Self::MalformedInput { .. } => Failure::MalformedInput,
            Self::Config { .. }
            | Self::Connection { .. }
            | Self::ConnectionTimeout { .. }
            | Self::ConnectionClosed
            | Self::Protocol { .. }
            | Self::RequestTimeout { .. }
            | Self::Script { .. }
            | Self::StorageUnavailable { .. }
            | Self::Cookie { .. }
            | Self::Io(_)
            | Self::Json(_) => Failure::ExecutionFailed,
        }
    }
}

impl From<Error> for Failure {
    fn from(err: Error) -> Self {
        err.reason()
    }
}

// ============================================================================
// ViewError
// ============================================================================

/// Result of a view-model operation.
pub type ViewResult<T> = StdResult<T, ViewError>;

/// Why a reconciler operation did not go through.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewError {
    /// The dispatched action failed; the view now shows the reason.
    #[error(transparent)]
    Failed(#[from] Failure),

    /// Draft operation with no draft row open.
    #[error("no draft row is open")]
    NoDraft,

    /// Operation not available in the current view state.
    #[error("operation not available while {state}")]
    InvalidState {
        /// Name of the current state.
        state: &'static str,
    },

    /// Row index past the end of the table.
    #[error("row {index} does not exist")]
    RowOutOfRange {
        /// Requested index.
        index: usize,
    },

    /// Cookie names are not editable in place.
    #[error("keys of this storage kind are read-only")]
    ReadOnlyKey,
}

impl ViewError {
    /// Returns the [`Failure`] code if a dispatched action failed.
    #[inline]
    #[must_use]
    pub fn failure(&self) -> Option<Failure> {
        match self {
            Self::Failed(failure) => Some(*failure),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
