//! Commands the extension understands.
//!
//! Each serializes as `{"method": "<module>.<name>", "params": {...}}`.
//!
//! # Command Modules
//!
//! | Module | Commands |
//! |--------|----------|
//! | `browsingContext` | Active tab lookup |
//! | `script` | Routine execution inside a tab |
//! | `storage` | Cookies scoped to a URL |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Command Wrapper
// ============================================================================

/// Any command, grouped by protocol module.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    /// Tab lookup.
    BrowsingContext(BrowsingContextCommand),
    /// In-tab routines.
    Script(ScriptCommand),
    /// Cookie store.
    Storage(StorageCommand),
}

impl Command {
    /// Wire name, used in logs.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::BrowsingContext(BrowsingContextCommand::GetActiveTab) => {
                "browsingContext.getActiveTab"
            }
            Self::Script(ScriptCommand::Evaluate { .. }) => "script.evaluate",
            Self::Storage(StorageCommand::GetAllCookies { .. }) => "storage.getAllCookies",
            Self::Storage(StorageCommand::SetCookie { .. }) => "storage.setCookie",
            Self::Storage(StorageCommand::DeleteCookie { .. }) => "storage.deleteCookie",
        }
    }
}

// ============================================================================
// BrowsingContext Commands
// ============================================================================

/// BrowsingContext module commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum BrowsingContextCommand {
    /// Get the foreground tab of the focused window.
    #[serde(rename = "browsingContext.getActiveTab")]
    GetActiveTab,
}

// ============================================================================
// Script Commands
// ============================================================================

/// Script module commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum ScriptCommand {
    /// Run a self-contained routine in the tab's isolated context.
    #[serde(rename = "script.evaluate")]
    Evaluate {
        /// JavaScript function body.
        script: String,
        /// Values bound to `arguments`.
        #[serde(default)]
        args: Vec<Value>,
    },
}

// ============================================================================
// Storage Commands
// ============================================================================

/// Cookie store commands, each scoped to a page URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum StorageCommand {
    /// List the cookies visible to `url`.
    #[serde(rename = "storage.getAllCookies")]
    GetAllCookies {
        /// Scope URL.
        url: String,
    },

    /// Create or overwrite a cookie.
    #[serde(rename = "storage.setCookie")]
    SetCookie {
        /// Scope URL.
        url: String,
        /// Name and value to write.
        cookie: Cookie,
    },

    /// Delete the named cookie.
    #[serde(rename = "storage.deleteCookie")]
    DeleteCookie {
        /// Scope URL.
        url: String,
        /// Cookie name.
        name: String,
    },
}

// ============================================================================
// Cookie
// ============================================================================

/// A cookie as exchanged with the extension.
///
/// Writes carry only `name` and `value`; the browser fills in the scope
/// from the URL. `domain` and `path` are informational on reads, and any
/// other attribute the browser reports is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Domain the browser stored it under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Path the browser stored it under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Cookie {
    /// Creates a name/value cookie with no explicit scope.
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
