//! Inspector session.
//!
//! Holds the target context for one activation. The tab handle and URL
//! are captured once from the [`ActiveTabProvider`] and never refreshed;
//! only the selected kind changes afterwards. If the user navigates the
//! tab while the session is open, actions keep targeting the captured URL.

// ============================================================================
// Imports
// ============================================================================

use tracing::{debug, info};

use crate::channel::ActiveTabProvider;
use crate::error::Result;
use crate::identifiers::TabId;
use crate::target::{TargetContext, TargetKind};

// ============================================================================
// Session
// ============================================================================

/// Per-activation state passed to the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    context: TargetContext,
}

impl Session {
    /// Creates a session from an already-known context.
    #[inline]
    #[must_use]
    pub fn new(context: TargetContext) -> Self {
        Self { context }
    }

    /// Queries the active tab and starts a session on `kind`.
    ///
    /// # Errors
    ///
    /// Returns whatever the provider fails with.
    pub async fn activate(provider: &dyn ActiveTabProvider, kind: TargetKind) -> Result<Self> {
        let tab = provider.active_tab().await?;
        info!(tab_id = %tab.tab_id, url = %tab.tab_url, kind = %kind, "Session activated");
        Ok(Self::new(TargetContext::new(tab.tab_id, tab.tab_url, kind)))
    }

    /// Current target context.
    #[inline]
    #[must_use]
    pub fn context(&self) -> &TargetContext {
        &self.context
    }

    /// Selected kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> TargetKind {
        self.context.kind
    }

    /// Captured tab handle.
    #[inline]
    #[must_use]
    pub fn tab_id(&self) -> TabId {
        self.context.tab_id
    }

    /// Switches the selected kind. Returns `true` if it changed.
    pub fn select_kind(&mut self, kind: TargetKind) -> bool {
        if self.context.kind == kind {
            return false;
        }
        debug!(tab_id = %self.context.tab_id, from = %self.context.kind, to = %kind, "Kind selected");
        self.context.kind = kind;
        true
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::memory::StaticTab;

    #[tokio::test]
    async fn test_activate_captures_tab() {
        let tab = TabId::new(12).expect("valid tab id");
        let provider = StaticTab::new(tab, "https://example.com/page");

        let session = Session::activate(&provider, TargetKind::Session)
            .await
            .expect("activate");
        assert_eq!(session.tab_id(), tab);
        assert_eq!(session.context().tab_url, "https://example.com/page");
        assert_eq!(session.kind(), TargetKind::Session);
    }

    #[test]
    fn test_select_kind_keeps_tab() {
        let tab = TabId::new(3).expect("valid tab id");
        let mut session = Session::new(TargetContext::new(tab, "https://a.com/", TargetKind::Local));

        assert!(session.select_kind(TargetKind::Cookie));
        assert!(!session.select_kind(TargetKind::Cookie));
        assert_eq!(session.context().tab_url, "https://a.com/");
        assert_eq!(session.tab_id(), tab);
    }
}
