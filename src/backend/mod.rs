//! Storage backends.
//!
//! One capability set, two implementations:
//!
//! | Backend | Kinds | Transport |
//! |---------|-------|-----------|
//! | [`PageStorage`] | LOCAL, SESSION | Routine run inside the tab via [`ScriptChannel`](crate::channel::ScriptChannel) |
//! | [`CookieJar`] | COOKIE | [`CookieStore`](crate::channel::CookieStore) scoped to the tab URL |
//!
//! Export and import have default implementations built on
//! [`read_all`](StorageBackend::read_all) and [`write`](StorageBackend::write).
//! Import is best-effort: once the text parses, each key is written on its
//! own and a failed key does not undo the others.

// ============================================================================
// Submodules
// ============================================================================

mod cookie;
mod page;

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::Result;
use crate::snapshot::{Snapshot, parse_import};
use crate::target::TargetContext;

// ============================================================================
// Re-exports
// ============================================================================

pub use cookie::CookieJar;
pub use page::PageStorage;

pub(crate) use page::{PageMessage, PageOp};

// ============================================================================
// ImportReport
// ============================================================================

/// Outcome of a best-effort import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Entries written.
    pub written: usize,
    /// Entries the backend refused.
    pub failed: usize,
}

impl ImportReport {
    /// Returns `true` if every entry was written.
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

// ============================================================================
// StorageBackend
// ============================================================================

/// Capability set shared by every storage backend.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Reads every entry visible to `ctx`, in backend order.
    async fn read_all(&self, ctx: &TargetContext) -> Result<Snapshot>;

    /// Creates or updates `key`.
    ///
    /// When `previous_key` is set and differs from `key`, the previous
    /// entry is removed first.
    async fn write(
        &self,
        ctx: &TargetContext,
        key: &str,
        value: &str,
        previous_key: Option<&str>,
    ) -> Result<()>;

    /// Removes `key`.
    async fn remove(&self, ctx: &TargetContext, key: &str) -> Result<()>;

    /// Removes every entry.
    async fn clear(&self, ctx: &TargetContext) -> Result<()>;

    /// Serializes the current snapshot as four-space indented JSON.
    async fn export_all(&self, ctx: &TargetContext) -> Result<String> {
        let snapshot = self.read_all(ctx).await?;
        debug!(tab_id = %ctx.tab_id, kind = %ctx.kind, count = snapshot.len(), "Exporting");
        snapshot.to_pretty_json()
    }

    /// Parses `json_text` and writes each entry independently.
    ///
    /// Nothing is written if parsing fails.
    async fn import_all(&self, ctx: &TargetContext, json_text: &str) -> Result<ImportReport> {
        let entries = parse_import(json_text)?;
        let mut report = ImportReport::default();

        for entry in entries {
            match self.write(ctx, &entry.key, &entry.value, None).await {
                Ok(()) => report.written += 1,
                Err(e) => {
                    warn!(tab_id = %ctx.tab_id, key = %entry.key, error = %e, "Import entry failed");
                    report.failed += 1;
                }
            }
        }

        debug!(tab_id = %ctx.tab_id, kind = %ctx.kind, ?report, "Imported");
        Ok(report)
    }

    /// Waits until earlier writes are visible to [`read_all`](Self::read_all).
    async fn settle(&self, _ctx: &TargetContext) {}
}
