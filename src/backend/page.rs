//! In-page storage backend (`localStorage` / `sessionStorage`).
//!
//! Every operation is one round trip: a fixed routine is run inside the
//! tab with a [`PageMessage`] as its only argument. The routine picks the
//! storage object from the message kind, performs the operation and
//! returns a JSON value. It returns `null` when the page has no usable
//! storage object (sandboxed frames, opaque origins).

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::channel::ScriptChannel;
use crate::error::{Error, Result};
use crate::snapshot::{Snapshot, parse_import};
use crate::target::{TargetContext, TargetKind};

use super::{ImportReport, StorageBackend};

// ============================================================================
// Constants
// ============================================================================

/// Routine executed inside the page. `arguments[0]` is a [`PageMessage`].
const STORAGE_ROUTINE: &str = r#"
const msg = arguments[0];
let storage = null;
try {
    storage = msg.kind === 'L' ? window.localStorage : window.sessionStorage;
} catch (e) {
    storage = null;
}
if (!storage) {
    return null;
}
switch (msg.op) {
    case 'read': {
        const entries = [];
        for (let i = 0; i < storage.length; i++) {
            const key = storage.key(i);
            entries.push([key, storage.getItem(key)]);
        }
        return entries;
    }
    case 'write':
        if (msg.previousKey != null && msg.previousKey !== msg.key) {
            storage.removeItem(msg.previousKey);
        }
        storage.setItem(msg.key, msg.value);
        return true;
    case 'remove':
        storage.removeItem(msg.key);
        return true;
    case 'clear':
        storage.clear();
        return true;
    case 'import': {
        let failed = 0;
        for (const [key, value] of msg.entries) {
            try {
                storage.setItem(key, value);
            } catch (e) {
                failed++;
            }
        }
        return { failed: failed };
    }
}
throw new Error('unknown storage op: ' + msg.op);
"#;

// ============================================================================
// PageMessage
// ============================================================================

/// Argument handed to the in-page routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct PageMessage {
    /// `L` or `S`.
    pub kind: TargetKind,
    /// Operation.
    #[serde(flatten)]
    pub op: PageOp,
}

/// Operation performed by the in-page routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub(crate) enum PageOp {
    /// Return all entries as `[key, value]` pairs.
    Read,
    /// Set one entry, removing `previous_key` first when it differs.
    Write {
        key: String,
        value: String,
        #[serde(
            default,
            rename = "previousKey",
            skip_serializing_if = "Option::is_none"
        )]
        previous_key: Option<String>,
    },
    /// Remove one entry.
    Remove { key: String },
    /// Remove every entry.
    Clear,
    /// Set each entry independently, returning `{failed}`.
    Import { entries: Vec<(String, String)> },
}

impl PageOp {
    fn name(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write { .. } => "write",
            Self::Remove { .. } => "remove",
            Self::Clear => "clear",
            Self::Import { .. } => "import",
        }
    }
}

// ============================================================================
// PageStorage
// ============================================================================

/// Backend for `localStorage` and `sessionStorage`.
///
/// The storage object is chosen per call from the context's kind.
#[derive(Clone)]
pub struct PageStorage {
    channel: Arc<dyn ScriptChannel>,
}

impl PageStorage {
    /// Creates a backend over a remote execution channel.
    #[must_use]
    pub fn new(channel: Arc<dyn ScriptChannel>) -> Self {
        Self { channel }
    }

    /// Runs the routine and returns its non-null result.
    async fn run(&self, ctx: &TargetContext, op: PageOp) -> Result<Value> {
        if !ctx.kind.is_page_storage() {
            return Err(Error::config(format!(
                "{} is not backed by page storage",
                ctx.kind
            )));
        }

        let op_name = op.name();
        let message = PageMessage { kind: ctx.kind, op };
        let args = vec![serde_json::to_value(&message)?];

        debug!(tab_id = %ctx.tab_id, kind = %ctx.kind, op = op_name, "Running storage routine");

        let value = self
            .channel
            .execute(ctx.tab_id, STORAGE_ROUTINE, args)
            .await?;

        if value.is_null() {
            warn!(tab_id = %ctx.tab_id, kind = %ctx.kind, "Page storage unavailable");
            return Err(Error::storage_unavailable(ctx.tab_id, ctx.kind));
        }

        Ok(value)
    }
}

#[async_trait]
impl StorageBackend for PageStorage {
    async fn read_all(&self, ctx: &TargetContext) -> Result<Snapshot> {
        let value = self.run(ctx, PageOp::Read).await?;
        let snapshot: Snapshot = serde_json::from_value(value)?;

        debug!(tab_id = %ctx.tab_id, kind = %ctx.kind, count = snapshot.len(), "Read page storage");
        Ok(snapshot)
    }

    async fn write(
        &self,
        ctx: &TargetContext,
        key: &str,
        value: &str,
        previous_key: Option<&str>,
    ) -> Result<()> {
        debug!(
            tab_id = %ctx.tab_id,
            key = %key,
            previous_key = ?previous_key,
            value_len = value.len(),
            "Writing page storage"
        );

        let op = PageOp::Write {
            key: key.to_string(),
            value: value.to_string(),
            previous_key: previous_key.map(str::to_string),
        };
        self.run(ctx, op).await?;
        Ok(())
    }

    async fn remove(&self, ctx: &TargetContext, key: &str) -> Result<()> {
        debug!(tab_id = %ctx.tab_id, key = %key, "Removing page storage key");

        let op = PageOp::Remove {
            key: key.to_string(),
        };
        self.run(ctx, op).await?;
        Ok(())
    }

    async fn clear(&self, ctx: &TargetContext) -> Result<()> {
        debug!(tab_id = %ctx.tab_id, kind = %ctx.kind, "Clearing page storage");

        self.run(ctx, PageOp::Clear).await?;
        Ok(())
    }

    /// Parses locally, then writes every entry in a single routine call.
    async fn import_all(&self, ctx: &TargetContext, json_text: &str) -> Result<ImportReport> {
        let entries: Vec<(String, String)> = parse_import(json_text)?
            .into_iter()
            .map(|entry| (entry.key, entry.value))
            .collect();
        let total = entries.len();

        let value = self.run(ctx, PageOp::Import { entries }).await?;

        let failed = value
            .get("failed")
            .and_then(Value::as_u64)
            .map_or(0, |n| usize::try_from(n).unwrap_or(total))
            .min(total);

        if failed > 0 {
            warn!(tab_id = %ctx.tab_id, failed, total, "Some imported entries were rejected");
        }

        Ok(ImportReport {
            written: total - failed,
            failed,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
