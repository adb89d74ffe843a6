//! Target kinds and the per-activation target context.
//!
//! A [`TargetContext`] names which tab and which storage an action applies
//! to. The tab half is captured once when a session is activated; only the
//! kind changes afterwards.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::identifiers::TabId;

// ============================================================================
// Constants
// ============================================================================

/// Host part of export file names when the URL has none.
const FALLBACK_HOST: &str = "data";

/// UTC timestamp layout for export file names (colons replaced by hyphens).
const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

// ============================================================================
// TargetKind
// ============================================================================

/// Which storage backend a target refers to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    /// Page `localStorage`.
    #[default]
    #[serde(rename = "L")]
    Local,
    /// Page `sessionStorage`.
    #[serde(rename = "S")]
    Session,
    /// Cookies scoped to the tab URL.
    #[serde(rename = "C")]
    Cookie,
}

impl TargetKind {
    /// All kinds in tab-strip order.
    pub const ALL: [Self; 3] = [Self::Local, Self::Session, Self::Cookie];

    /// One-letter code used in file names and remembered preferences.
    #[inline]
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Local => "L",
            Self::Session => "S",
            Self::Cookie => "C",
        }
    }

    /// Parses a one-letter code.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// Human-readable name.
    #[inline]
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Local => "Local Storage",
            Self::Session => "Session Storage",
            Self::Cookie => "Cookies",
        }
    }

    /// Returns `true` for kinds backed by in-page storage.
    #[inline]
    #[must_use]
    pub const fn is_page_storage(&self) -> bool {
        matches!(self, Self::Local | Self::Session)
    }

    /// Returns `true` if entry keys can be renamed in place.
    ///
    /// Cookie names are immutable once created.
    #[inline]
    #[must_use]
    pub const fn has_mutable_keys(&self) -> bool {
        self.is_page_storage()
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// TargetContext
// ============================================================================

/// The tab and storage kind an action applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetContext {
    /// Handle of the tab captured at activation.
    pub tab_id: TabId,
    /// URL of the tab captured at activation.
    pub tab_url: String,
    /// Selected storage kind.
    pub kind: TargetKind,
}

impl TargetContext {
    /// Creates a new target context.
    #[inline]
    #[must_use]
    pub fn new(tab_id: TabId, tab_url: impl Into<String>, kind: TargetKind) -> Self {
        Self {
            tab_id,
            tab_url: tab_url.into(),
            kind,
        }
    }

    /// Returns a copy pointing at another kind on the same tab.
    #[inline]
    #[must_use]
    pub fn with_kind(&self, kind: TargetKind) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }

    /// Returns `true` if the tab URL starts with one of `schemes`.
    #[must_use]
    pub fn is_restricted<S: AsRef<str>>(&self, schemes: &[S]) -> bool {
        is_restricted_url(&self.tab_url, schemes)
    }

    /// Host name of the tab URL, if it has one.
    #[must_use]
    pub fn hostname(&self) -> Option<String> {
        Url::parse(&self.tab_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .filter(|host| !host.is_empty())
    }

    /// Builds the download name for an export taken at `now`.
    ///
    /// Format: `{host}-{code}-{YYYY-MM-DDTHH-MM-SS}.json`, with `data` as
    /// the host when the URL has none.
    #[must_use]
    pub fn export_file_name(&self, now: DateTime<Utc>) -> String {
        let host = self.hostname().unwrap_or_else(|| FALLBACK_HOST.to_string());
        format!(
            "{host}-{}-{}.json",
            self.kind.code(),
            now.format(FILE_TIMESTAMP_FORMAT)
        )
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Returns `true` if `url` starts with any of `schemes` (case-insensitive).
#[must_use]
pub fn is_restricted_url<S: AsRef<str>>(url: &str, schemes: &[S]) -> bool {
    let url = url.trim_start().to_ascii_lowercase();
    schemes
        .iter()
        .any(|scheme| url.starts_with(&scheme.as_ref().to_ascii_lowercase()))
}

// ============================================================================
// Tests
// ============================================================================
