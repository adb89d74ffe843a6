//! Action dispatcher.
//!
//! The single normalization boundary between callers and backends.
//! Every call goes through the same three steps:
//!
//! 1. Restricted-target check on the tab URL (no backend call on a hit)
//! 2. Routing by kind: cookies to [`CookieJar`], everything else to
//!    [`PageStorage`]
//! 3. Normalization: any [`Error`](crate::error::Error) becomes one
//!    [`Failure`] code
//!
//! Callers only ever see `Ok(Payload)` or `Err(Failure)`.
//!
//! # Example
//!
//! ```ignore
//! let dispatcher = Dispatcher::new(script, cookies, &InspectorOptions::default());
//!
//! match dispatcher.dispatch(&ctx, Action::Get).await {
//!     Ok(Payload::Snapshot(snapshot)) => println!("{} entries", snapshot.len()),
//!     Ok(_) => unreachable!(),
//!     Err(Failure::RestrictedTarget) => println!("inaccessible"),
//!     Err(failure) => println!("failed: {failure}"),
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::{CookieJar, PageStorage, StorageBackend};
use crate::channel::{CookieStore, ScriptChannel};
use crate::error::{ActionResult, Failure, Result};
use crate::options::InspectorOptions;
use crate::snapshot::Snapshot;
use crate::target::{TargetContext, TargetKind};

// ============================================================================
// Action
// ============================================================================

/// A logical storage action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Read the full snapshot.
    Get,
    /// Create or update `key`, replacing `previous_key` when it differs.
    Set {
        /// Key to write.
        key: String,
        /// Value to write.
        value: String,
        /// Last-known key of the row being edited.
        previous_key: Option<String>,
    },
    /// Remove one key.
    Remove {
        /// Key to remove.
        key: String,
    },
    /// Remove every key.
    Clear,
    /// Serialize the snapshot as JSON text.
    Export,
    /// Write every entry of a flat JSON object.
    Import {
        /// JSON text.
        json: String,
    },
}

impl Action {
    /// Creates a plain `set` without rename.
    #[inline]
    #[must_use]
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Set {
            key: key.into(),
            value: value.into(),
            previous_key: None,
        }
    }

    /// Creates a `set` that replaces `previous_key`.
    #[inline]
    #[must_use]
    pub fn rename(
        previous_key: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Set {
            key: key.into(),
            value: value.into(),
            previous_key: Some(previous_key.into()),
        }
    }

    /// Creates a `remove`.
    #[inline]
    #[must_use]
    pub fn remove(key: impl Into<String>) -> Self {
        Self::Remove { key: key.into() }
    }

    /// Creates an `import`.
    #[inline]
    #[must_use]
    pub fn import(json: impl Into<String>) -> Self {
        Self::Import { json: json.into() }
    }

    /// Protocol name of the action.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Set { .. } => "set",
            Self::Remove { .. } => "remove",
            Self::Clear => "clear",
            Self::Export => "export",
            Self::Import { .. } => "import",
        }
    }

    /// Returns `true` if the action changes backend state.
    #[must_use]
    pub const fn is_mutating(&self) -> bool {
        !matches!(self, Self::Get | Self::Export)
    }
}

// ============================================================================
// Payload
// ============================================================================

/// Successful outcome of an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Result of `get`.
    Snapshot(Snapshot),
    /// Result of `export`.
    Text(String),
    /// Result of every mutating action.
    Empty,
}

impl Payload {
    /// Returns the snapshot, if this is one.
    #[must_use]
    pub fn into_snapshot(self) -> Option<Snapshot> {
        match self {
            Self::Snapshot(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    /// Returns the text, if this is one.
    #[must_use]
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Routes actions to the backend for the context's kind.
#[derive(Clone)]
pub struct Dispatcher {
    page: PageStorage,
    cookies: CookieJar,
    restricted_schemes: Vec<String>,
}

impl Dispatcher {
    /// Creates a dispatcher over the two collaborator channels.
    #[must_use]
    pub fn new(
        script: Arc<dyn ScriptChannel>,
        cookies: Arc<dyn CookieStore>,
        options: &InspectorOptions,
    ) -> Self {
        Self {
            page: PageStorage::new(script),
            cookies: CookieJar::new(cookies, options.cookie_settle),
            restricted_schemes: options.restricted_schemes.clone(),
        }
    }

    /// Backend serving `kind`.
    #[must_use]
    pub fn backend(&self, kind: TargetKind) -> &dyn StorageBackend {
        match kind {
            TargetKind::Cookie => &self.cookies,
            TargetKind::Local | TargetKind::Session => &self.page,
        }
    }

    /// Returns `true` if actions on `ctx` are short-circuited.
    #[inline]
    #[must_use]
    pub fn is_restricted(&self, ctx: &TargetContext) -> bool {
        ctx.is_restricted(&self.restricted_schemes)
    }

    /// Runs `action` against `ctx`.
    pub async fn dispatch(&self, ctx: &TargetContext, action: Action) -> ActionResult<Payload> {
        let name = action.name();

        if self.is_restricted(ctx) {
            debug!(tab_id = %ctx.tab_id, url = %ctx.tab_url, action = name, "Restricted target, skipping");
            return Err(Failure::RestrictedTarget);
        }

        self.route(ctx, action).await.map_err(|e| {
            let failure = e.reason();
            warn!(
                tab_id = %ctx.tab_id,
                kind = %ctx.kind,
                action = name,
                reason = failure.code(),
                error = %e,
                "Action failed"
            );
            failure
        })
    }

    /// Waits until writes made through `ctx`'s backend are readable.
    pub async fn settle(&self, ctx: &TargetContext) {
        self.backend(ctx.kind).settle(ctx).await;
    }

    async fn route(&self, ctx: &TargetContext, action: Action) -> Result<Payload> {
        let backend = self.backend(ctx.kind);

        match action {
            Action::Get => backend.read_all(ctx).await.map(Payload::Snapshot),
            Action::Set {
                key,
                value,
                previous_key,
            } => {
                backend
                    .write(ctx, &key, &value, previous_key.as_deref())
                    .await?;
                Ok(Payload::Empty)
            }
            Action::Remove { key } => {
                backend.remove(ctx, &key).await?;
                Ok(Payload::Empty)
            }
            Action::Clear => {
                backend.clear(ctx).await?;
                Ok(Payload::Empty)
            }
            Action::Export => backend.export_all(ctx).await.map(Payload::Text),
            Action::Import { json } => {
                let report = backend.import_all(ctx, &json).await?;
                debug!(tab_id = %ctx.tab_id, written = report.written, failed = report.failed, "Import finished");
                Ok(Payload::Empty)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
