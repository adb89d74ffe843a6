//! Cookie backend.
//!
//! Cookies are scoped to the tab URL captured in the context. The store
//! has no rename and no bulk clear, so:
//!
//! - a rename is remove-old then set-new (two steps, not atomic)
//! - clear lists every cookie and removes them one by one (best-effort)

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::channel::CookieStore;
use crate::error::Result;
use crate::protocol::Cookie;
use crate::snapshot::Snapshot;
use crate::target::TargetContext;

use super::StorageBackend;

// ============================================================================
// CookieJar
// ============================================================================

/// Backend for cookies visible to the tab URL.
#[derive(Clone)]
pub struct CookieJar {
    store: Arc<dyn CookieStore>,
    settle_delay: Duration,
}

impl CookieJar {
    /// Creates a backend over a cookie store.
    ///
    /// `settle_delay` is awaited by [`settle`](StorageBackend::settle) when
    /// the store does not confirm its writes.
    #[must_use]
    pub fn new(store: Arc<dyn CookieStore>, settle_delay: Duration) -> Self {
        Self {
            store,
            settle_delay,
        }
    }
}

#[async_trait]
impl StorageBackend for CookieJar {
    async fn read_all(&self, ctx: &TargetContext) -> Result<Snapshot> {
        let cookies = self.store.get_all(&ctx.tab_url).await?;

        // Same name on several paths collapses to one row; last value wins.
        let snapshot: Snapshot = cookies
            .into_iter()
            .map(|cookie| (cookie.name, cookie.value))
            .collect();

        debug!(tab_id = %ctx.tab_id, count = snapshot.len(), "Read cookies");
        Ok(snapshot)
    }

    async fn write(
        &self,
        ctx: &TargetContext,
        key: &str,
        value: &str,
        previous_key: Option<&str>,
    ) -> Result<()> {
        if let Some(previous) = previous_key.filter(|previous| *previous != key) {
            debug!(tab_id = %ctx.tab_id, from = %previous, to = %key, "Renaming cookie");
            self.store.remove(&ctx.tab_url, previous).await?;
        }

        debug!(tab_id = %ctx.tab_id, name = %key, value_len = value.len(), "Setting cookie");
        self.store
            .set(&ctx.tab_url, Cookie::new(key, value))
            .await
    }

    async fn remove(&self, ctx: &TargetContext, key: &str) -> Result<()> {
        debug!(tab_id = %ctx.tab_id, name = %key, "Deleting cookie");
        self.store.remove(&ctx.tab_url, key).await
    }

    async fn clear(&self, ctx: &TargetContext) -> Result<()> {
        let cookies = self.store.get_all(&ctx.tab_url).await?;
        let total = cookies.len();
        let mut failed = 0usize;

        for cookie in cookies {
            if let Err(e) = self.store.remove(&ctx.tab_url, &cookie.name).await {
                warn!(tab_id = %ctx.tab_id, name = %cookie.name, error = %e, "Cookie removal failed");
                failed += 1;
            }
        }

        debug!(tab_id = %ctx.tab_id, total, failed, "Cleared cookies");
        Ok(())
    }

    async fn settle(&self, ctx: &TargetContext) {
        if self.store.confirms_writes() || self.settle_delay.is_zero() {
            return;
        }

        debug!(tab_id = %ctx.tab_id, delay_ms = self.settle_delay.as_millis() as u64, "Waiting for cookie store");
        tokio::time::sleep(self.settle_delay).await;
    }
}

// ============================================================================
// Tests
// ============================================================================
