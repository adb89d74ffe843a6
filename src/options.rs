//! Inspector configuration.
//!
//! Controls which pages count as restricted, how long cookie writes are
//! given to settle, and the timeouts used by the extension bridge.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use storage_inspector::{InspectorOptions, TargetKind};
//!
//! let options = InspectorOptions::new()
//!     .with_initial_kind(TargetKind::Cookie)
//!     .with_cookie_settle(Duration::from_millis(200))
//!     .with_restricted_scheme("opera:");
//!
//! options.validate()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};
use crate::target::TargetKind;

// ============================================================================
// Constants
// ============================================================================

/// Schemes the inspector never touches.
///
/// Browser-internal pages, extension pages and local files.
pub const DEFAULT_RESTRICTED_SCHEMES: &[&str] = &[
    "chrome:",
    "edge:",
    "about:",
    "brave:",
    "file:",
    "moz-extension:",
    "chrome-extension:",
    "view-source:",
];

/// Delay after an unconfirmed cookie write before re-reading.
const DEFAULT_COOKIE_SETTLE: Duration = Duration::from_millis(100);

/// Per-request timeout on the bridge.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Time allowed for the extension to connect and send READY.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// InspectorOptions
// ============================================================================

/// Inspector configuration options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectorOptions {
    /// URL scheme prefixes treated as restricted (lowercase, with colon).
    pub restricted_schemes: Vec<String>,

    /// Wait after a cookie write when the store cannot confirm it.
    pub cookie_settle: Duration,

    /// Timeout for one bridge request.
    pub command_timeout: Duration,

    /// Timeout for the extension to connect.
    pub connect_timeout: Duration,

    /// Kind selected when a session is activated.
    pub initial_kind: TargetKind,
}

impl Default for InspectorOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl InspectorOptions {
    /// Creates options with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            restricted_schemes: DEFAULT_RESTRICTED_SCHEMES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            cookie_settle: DEFAULT_COOKIE_SETTLE,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            initial_kind: TargetKind::Local,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl InspectorOptions {
    /// Adds a restricted scheme (`"opera"` and `"opera:"` are equivalent).
    #[inline]
    #[must_use]
    pub fn with_restricted_scheme(mut self, scheme: impl Into<String>) -> Self {
        let mut scheme = scheme.into().to_ascii_lowercase();
        if !scheme.ends_with(':') {
            scheme.push(':');
        }
        if !self.restricted_schemes.contains(&scheme) {
            self.restricted_schemes.push(scheme);
        }
        self
    }

    /// Replaces the restricted scheme list.
    #[inline]
    #[must_use]
    pub fn with_restricted_schemes(
        mut self,
        schemes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.restricted_schemes.clear();
        for scheme in schemes {
            self = self.with_restricted_scheme(scheme);
        }
        self
    }

    /// Sets the cookie settle delay. Zero disables it.
    #[inline]
    #[must_use]
    pub fn with_cookie_settle(mut self, delay: Duration) -> Self {
        self.cookie_settle = delay;
        self
    }

    /// Sets the bridge request timeout.
    #[inline]
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Sets the bridge connect timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the kind selected at activation.
    #[inline]
    #[must_use]
    pub fn with_initial_kind(mut self, kind: TargetKind) -> Self {
        self.initial_kind = kind;
        self
    }

    /// Sets the initial kind from a remembered one-letter code.
    ///
    /// Unknown codes fall back to [`TargetKind::Local`].
    #[inline]
    #[must_use]
    pub fn with_remembered_kind(self, code: &str) -> Self {
        self.with_initial_kind(TargetKind::from_code(code).unwrap_or_default())
    }
}

// ============================================================================
// Validation
// ============================================================================

impl InspectorOptions {
    /// Validates the options configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.command_timeout.is_zero() {
            return Err(Error::config("Command timeout must be greater than zero"));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::config("Connect timeout must be greater than zero"));
        }
        Ok(())
    }

    /// Returns `true` if cookie writes are followed by a settle delay.
    #[inline]
    #[must_use]
    pub fn has_cookie_settle(&self) -> bool {
        !self.cookie_settle.is_zero()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_default() {
        let options = InspectorOptions::new();
        assert_eq!(options.initial_kind, TargetKind::Local);
        assert_eq!(options.cookie_settle, Duration::from_millis(100));
        assert!(options.restricted_schemes.iter().any(|s| s == "about:"));
        assert!(options.restricted_schemes.iter().any(|s| s == "file:"));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_restricted_scheme_normalized() {
        let options = InspectorOptions::new()
            .with_restricted_scheme("OPERA")
            .with_restricted_scheme("opera:");

        let count = options
            .restricted_schemes
            .iter()
            .filter(|s| *s == "opera:")
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_with_restricted_schemes_replaces() {
        let options = InspectorOptions::new().with_restricted_schemes(["chrome"]);
        assert_eq!(options.restricted_schemes, vec!["chrome:".to_string()]);
    }

    #[test]
    fn test_remembered_kind_fallback() {
        let options = InspectorOptions::new().with_remembered_kind("C");
        assert_eq!(options.initial_kind, TargetKind::Cookie);

        let options = InspectorOptions::new().with_remembered_kind("A");
        assert_eq!(options.initial_kind, TargetKind::Local);
    }

    #[test]
    fn test_validate_zero_timeout() {
        let options = InspectorOptions::new().with_command_timeout(Duration::ZERO);
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_zero_settle_disables() {
        let options = InspectorOptions::new().with_cookie_settle(Duration::ZERO);
        assert!(!options.has_cookie_settle());
        assert!(options.validate().is_ok());
    }
}
