//! Collaborator seams.
//!
//! The core never talks to a browser directly. It goes through these
//! traits:
//!
//! | Trait | Used by | Purpose |
//! |-------|---------|---------|
//! | [`ScriptChannel`] | [`PageStorage`](crate::backend::PageStorage) | Run a routine inside a tab, get its return value |
//! | [`CookieStore`] | [`CookieJar`](crate::backend::CookieJar) | List/set/remove cookies for a URL |
//! | [`ActiveTabProvider`] | [`Session`](crate::session::Session) | Foreground tab at activation |
//! | [`Confirmer`] | [`Reconciler`](crate::reconciler::Reconciler) | Yes/no gate before destructive actions |
//!
//! [`ExtensionBridge`](crate::bridge::ExtensionBridge) implements the first
//! three over WebSocket; [`memory`](crate::memory) implements them in memory.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::identifiers::TabId;
use crate::protocol::Cookie;

// ============================================================================
// ScriptChannel
// ============================================================================

/// Remote execution channel into a tab's isolated context.
///
/// Two outcomes only: the routine's return value, or a fault.
#[async_trait]
pub trait ScriptChannel: Send + Sync {
    /// Runs `routine` in `tab_id` with `args` bound to `arguments`.
    async fn execute(&self, tab_id: TabId, routine: &str, args: Vec<Value>) -> Result<Value>;
}

// ============================================================================
// CookieStore
// ============================================================================

/// Cookie store scoped by URL.
#[async_trait]
pub trait CookieStore: Send + Sync {
    /// Lists every cookie visible to `url`.
    async fn get_all(&self, url: &str) -> Result<Vec<Cookie>>;

    /// Creates or replaces a cookie for `url`.
    async fn set(&self, url: &str, cookie: Cookie) -> Result<()>;

    /// Removes the cookie `name` for `url`.
    async fn remove(&self, url: &str, name: &str) -> Result<()>;

    /// Returns `true` if [`set`](Self::set) resolves only after the write
    /// is visible to [`get_all`](Self::get_all).
    ///
    /// Stores that return before the write lands get a settle delay.
    fn confirms_writes(&self) -> bool {
        true
    }
}

// ============================================================================
// ActiveTabProvider
// ============================================================================

/// The foreground tab at the moment of the query.
///
/// Also the payload of the bridge's READY handshake.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTab {
    /// Tab handle.
    pub tab_id: TabId,
    /// Tab URL (empty if the browser withheld it).
    #[serde(default)]
    pub tab_url: String,
}

/// Supplies the active tab.
#[async_trait]
pub trait ActiveTabProvider: Send + Sync {
    /// Returns the foreground tab.
    async fn active_tab(&self) -> Result<ActiveTab>;
}

// ============================================================================
// Confirmer
// ============================================================================

/// Text of a yes/no confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmPrompt {
    /// Short title.
    pub title: String,
    /// Longer explanation.
    pub message: String,
}

impl ConfirmPrompt {
    /// Creates a new prompt.
    #[inline]
    #[must_use]
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Asks the user to confirm a destructive action.
#[async_trait]
pub trait Confirmer: Send + Sync {
    /// Returns `true` to proceed.
    async fn confirm(&self, prompt: &ConfirmPrompt) -> bool;
}

/// Fixed answer, for scripted use and tests.
#[async_trait]
impl Confirmer for bool {
    async fn confirm(&self, _prompt: &ConfirmPrompt) -> bool {
        *self
    }
}
