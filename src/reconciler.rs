//! View model.
//!
//! Keeps a table of rows consistent with the backend of the selected kind.
//!
//! # States
//!
//! | State | Rows | Entered by |
//! |-------|------|------------|
//! | [`ViewState::Empty`] | none | refresh with no entries |
//! | [`ViewState::Populated`] | snapshot order | refresh with entries |
//! | [`ViewState::Editing`] | kept | [`Reconciler::begin_add`] |
//! | [`ViewState::Restricted`] | none | inaccessible refresh or mutation |
//! | [`ViewState::Error`] | re-read | other failed mutation |
//!
//! Every refresh is a full read that replaces the rows and drops any open
//! draft. Cell edits and single deletes patch the rows in place instead,
//! so an open draft survives them. A failed mutation re-reads the rows but
//! keeps the draft.
//!
//! All operations take `&mut self`. A refresh cannot overlap another
//! operation on the same reconciler, so a stale read never lands on top
//! of a newer one.

// ============================================================================
// Imports
// ============================================================================

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::channel::{ActiveTabProvider, ConfirmPrompt, Confirmer};
use crate::dispatch::{Action, Dispatcher, Payload};
use crate::error::{ActionResult, Failure, Result, ViewError, ViewResult};
use crate::session::Session;
use crate::snapshot::{Entry, Snapshot};
use crate::target::{TargetContext, TargetKind};

// ============================================================================
// Constants
// ============================================================================

const DELETE_TITLE: &str = "Delete Item?";
const CLEAR_TITLE: &str = "Clear All Data?";

// ============================================================================
// Types
// ============================================================================

/// One rendered row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// Last key known to the backend.
    pub key: String,
    /// Last value written or read.
    pub value: String,
}

impl From<Entry> for Row {
    fn from(entry: Entry) -> Self {
        Self {
            key: entry.key,
            value: entry.value,
        }
    }
}

/// Uncommitted new entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    /// Key typed so far.
    pub key: String,
    /// Value typed so far.
    pub value: String,
}

/// Column of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Key column.
    Key,
    /// Value column.
    Value,
}

/// What [`Reconciler::begin_add`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginAdd {
    /// A blank draft was opened.
    Created,
    /// A draft was already open; it should get focus.
    Refocused,
}

/// Current view state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    /// Backend reachable, no entries.
    Empty,
    /// Backend reachable, at least one entry.
    Populated,
    /// A draft row is open.
    Editing(Draft),
    /// Target cannot be inspected.
    Restricted,
    /// The last mutation failed.
    Error(Failure),
}

impl ViewState {
    /// Short state name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Populated => "populated",
            Self::Editing(_) => "editing",
            Self::Restricted => "restricted",
            Self::Error(_) => "error",
        }
    }
}

/// Where import text comes from.
///
/// A chosen file wins over pasted text, even when the file is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSource {
    /// Contents of a chosen file.
    pub file: Option<String>,
    /// Pasted text.
    pub text: Option<String>,
}

impl ImportSource {
    /// Source backed by file contents.
    #[inline]
    #[must_use]
    pub fn file(contents: impl Into<String>) -> Self {
        Self {
            file: Some(contents.into()),
            text: None,
        }
    }

    /// Source backed by pasted text.
    #[inline]
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            file: None,
            text: Some(text.into()),
        }
    }

    /// Adds pasted text alongside a file.
    #[inline]
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Picks the text to import.
    ///
    /// # Errors
    ///
    /// [`Failure::MalformedInput`] if there is no file and the pasted text
    /// is blank.
    pub fn resolve(&self) -> ActionResult<&str> {
        if let Some(file) = &self.file {
            return Ok(file);
        }
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .ok_or(Failure::MalformedInput)
    }
}

// ============================================================================
// Reconciler
// ============================================================================

/// Table state for one session.
pub struct Reconciler {
    dispatcher: Dispatcher,
    session: Session,
    state: ViewState,
    rows: Vec<Row>,
}

impl Reconciler {
    /// Creates a reconciler. Nothing is read until [`refresh`](Self::refresh).
    #[must_use]
    pub fn new(dispatcher: Dispatcher, session: Session) -> Self {
        Self {
            dispatcher,
            session,
            state: ViewState::Empty,
            rows: Vec::new(),
        }
    }

    /// Activates a session on the foreground tab and performs the first refresh.
    ///
    /// # Errors
    ///
    /// Returns the provider's error if the active tab cannot be queried.
    pub async fn activate(
        dispatcher: Dispatcher,
        provider: &dyn ActiveTabProvider,
        kind: TargetKind,
    ) -> Result<Self> {
        let session = Session::activate(provider, kind).await?;
        let mut reconciler = Self::new(dispatcher, session);
        reconciler.refresh().await;
        Ok(reconciler)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// Current rows, in snapshot order.
    #[inline]
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Open draft, if any.
    #[must_use]
    pub fn draft(&self) -> Option<&Draft> {
        match &self.state {
            ViewState::Editing(draft) => Some(draft),
            _ => None,
        }
    }

    /// Open draft for in-place typing.
    pub fn draft_mut(&mut self) -> Option<&mut Draft> {
        match &mut self.state {
            ViewState::Editing(draft) => Some(draft),
            _ => None,
        }
    }

    /// Session this view belongs to.
    #[inline]
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Target of every action.
    #[inline]
    #[must_use]
    pub fn context(&self) -> &TargetContext {
        self.session.context()
    }

    /// Returns `true` if add/clear/import controls should be shown.
    #[must_use]
    pub fn shows_mutating_controls(&self) -> bool {
        match self.state {
            ViewState::Restricted => false,
            ViewState::Error(_) => !self.rows.is_empty(),
            _ => true,
        }
    }

    /// Returns `true` if the key column can be edited.
    #[inline]
    #[must_use]
    pub fn keys_editable(&self) -> bool {
        self.session.kind().has_mutable_keys()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Re-reads the backend and rebuilds the rows.
    ///
    /// Any open draft is dropped.
    pub async fn refresh(&mut self) -> &ViewState {
        let ctx = self.session.context().clone();
        let result = self.dispatcher.dispatch(&ctx, Action::Get).await;
        self.apply_read(result);
        debug!(tab_id = %ctx.tab_id, kind = %ctx.kind, state = self.state.name(), rows = self.rows.len(), "Refreshed");
        &self.state
    }

    /// Switches kind and refreshes.
    pub async fn select_kind(&mut self, kind: TargetKind) -> &ViewState {
        self.session.select_kind(kind);
        self.refresh().await
    }

    /// Exports the current backend contents as JSON text.
    ///
    /// # Errors
    ///
    /// [`ViewError::Failed`] with the dispatcher's reason. State is unchanged.
    pub async fn export(&self) -> ViewResult<String> {
        let payload = self
            .dispatcher
            .dispatch(self.session.context(), Action::Export)
            .await?;
        Ok(payload.into_text().unwrap_or_default())
    }

    /// Download name for an export taken at `now`.
    #[must_use]
    pub fn export_file_name(&self, now: DateTime<Utc>) -> String {
        self.session.context().export_file_name(now)
    }

    // ========================================================================
    // Draft
    // ========================================================================

    /// Opens a blank draft row.
    ///
    /// # Errors
    ///
    /// [`ViewError::InvalidState`] unless the view is empty, populated or
    /// already editing.
    pub fn begin_add(&mut self) -> ViewResult<BeginAdd> {
        match self.state {
            ViewState::Empty | ViewState::Populated => {
                self.state = ViewState::Editing(Draft::default());
                Ok(BeginAdd::Created)
            }
            ViewState::Editing(_) => Ok(BeginAdd::Refocused),
            ref other => Err(ViewError::InvalidState {
                state: other.name(),
            }),
        }
    }

    /// Writes the draft as `key`/`value` and refreshes.
    ///
    /// The key is trimmed. On failure the draft stays open and the rows are
    /// re-read.
    ///
    /// # Errors
    ///
    /// - [`ViewError::NoDraft`] if no draft is open
    /// - [`Failure::MalformedInput`] if the trimmed key is empty; the
    ///   backend is not called and nothing changes
    /// - any dispatcher failure
    pub async fn commit_add(&mut self, key: &str, value: &str) -> ViewResult<()> {
        if self.draft().is_none() {
            return Err(ViewError::NoDraft);
        }

        let key = key.trim();
        if key.is_empty() {
            return Err(Failure::MalformedInput.into());
        }

        let ctx = self.session.context().clone();
        if let Err(failure) = self.dispatcher.dispatch(&ctx, Action::set(key, value)).await {
            return Err(self.record_failure(failure).await);
        }

        self.dispatcher.settle(&ctx).await;
        self.refresh().await;
        Ok(())
    }

    /// Commits whatever was typed into the draft.
    ///
    /// # Errors
    ///
    /// Same as [`commit_add`](Self::commit_add).
    pub async fn commit_draft(&mut self) -> ViewResult<()> {
        let draft = self.draft().cloned().ok_or(ViewError::NoDraft)?;
        self.commit_add(&draft.key, &draft.value).await
    }

    /// Drops the draft and refreshes.
    pub async fn cancel_add(&mut self) -> &ViewState {
        self.refresh().await
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Writes one cell of an existing row.
    ///
    /// The row's last-known key is sent as the previous key, so a key edit
    /// renames the entry. Rows are patched in place, no refresh.
    ///
    /// # Errors
    ///
    /// - [`ViewError::RowOutOfRange`] for a bad index
    /// - [`ViewError::ReadOnlyKey`] for a key edit on a cookie
    /// - any dispatcher failure; the rows are re-read and an inaccessible
    ///   reason moves the view to [`ViewState::Restricted`]
    pub async fn edit_cell(&mut self, index: usize, field: Field, new_value: &str) -> ViewResult<()> {
        let row = self
            .rows
            .get(index)
            .ok_or(ViewError::RowOutOfRange { index })?;

        if field == Field::Key && !self.keys_editable() {
            return Err(ViewError::ReadOnlyKey);
        }

        let previous_key = row.key.clone();
        let updated = match field {
            Field::Key => Row {
                key: new_value.to_string(),
                value: row.value.clone(),
            },
            Field::Value => Row {
                key: row.key.clone(),
                value: new_value.to_string(),
            },
        };
        let action = Action::rename(previous_key, updated.key.clone(), updated.value.clone());

        let ctx = self.session.context().clone();
        if let Err(failure) = self.dispatcher.dispatch(&ctx, action).await {
            return Err(self.record_failure(failure).await);
        }

        // A rename onto an existing key replaced that entry in the backend.
        let duplicate = self
            .rows
            .iter()
            .enumerate()
            .position(|(i, other)| i != index && other.key == updated.key);
        if let Some(slot) = self.rows.get_mut(index) {
            *slot = updated;
        }
        if let Some(duplicate) = duplicate {
            self.rows.remove(duplicate);
        }

        self.mark_ok();
        Ok(())
    }

    /// Asks for confirmation, then removes one row.
    ///
    /// Returns `Ok(false)` if the user declined. The row is dropped locally;
    /// a refresh only happens when the table becomes empty.
    ///
    /// # Errors
    ///
    /// - [`ViewError::RowOutOfRange`] for a bad index
    /// - any dispatcher failure; the rows are re-read and an inaccessible
    ///   reason moves the view to [`ViewState::Restricted`]
    pub async fn delete_row(&mut self, index: usize, confirmer: &dyn Confirmer) -> ViewResult<bool> {
        let key = self
            .rows
            .get(index)
            .map(|row| row.key.clone())
            .ok_or(ViewError::RowOutOfRange { index })?;

        let prompt = ConfirmPrompt::new(
            DELETE_TITLE,
            format!("Are you sure you want to delete \"{key}\"?"),
        );
        if !confirmer.confirm(&prompt).await {
            return Ok(false);
        }

        let ctx = self.session.context().clone();
        if let Err(failure) = self.dispatcher.dispatch(&ctx, Action::remove(key)).await {
            return Err(self.record_failure(failure).await);
        }

        self.rows.remove(index);
        if self.rows.is_empty() {
            self.dispatcher.settle(&ctx).await;
            self.refresh().await;
        } else {
            self.mark_ok();
        }
        Ok(true)
    }

    /// Asks for confirmation, then removes every entry and refreshes.
    ///
    /// Returns `Ok(false)` if the user declined. No prompt is shown while the
    /// mutating controls are hidden.
    ///
    /// # Errors
    ///
    /// - [`ViewError::InvalidState`] if the mutating controls are hidden
    /// - any dispatcher failure from the clear itself
    pub async fn clear_all(&mut self, confirmer: &dyn Confirmer) -> ViewResult<bool> {
        self.ensure_mutable()?;

        let ctx = self.session.context().clone();
        let prompt = ConfirmPrompt::new(
            CLEAR_TITLE,
            format!("This will delete ALL items in {}.", ctx.kind.label()),
        );
        if !confirmer.confirm(&prompt).await {
            return Ok(false);
        }

        let result = self.dispatcher.dispatch(&ctx, Action::Clear).await;
        self.dispatcher.settle(&ctx).await;
        if let Err(failure) = result {
            return Err(self.record_failure(failure).await);
        }

        self.refresh().await;
        Ok(true)
    }

    /// Imports a flat JSON object and refreshes.
    ///
    /// # Errors
    ///
    /// - [`ViewError::InvalidState`] if the mutating controls are hidden
    /// - [`Failure::MalformedInput`] if there is nothing to import or the
    ///   text does not parse; nothing is written and the view is unchanged
    /// - any other dispatcher failure, handled as for [`edit_cell`](Self::edit_cell)
    pub async fn import(&mut self, source: &ImportSource) -> ViewResult<()> {
        self.ensure_mutable()?;
        let json = source.resolve()?.to_string();

        let ctx = self.session.context().clone();
        if let Err(failure) = self.dispatcher.dispatch(&ctx, Action::import(json)).await {
            return Err(self.record_failure(failure).await);
        }

        self.dispatcher.settle(&ctx).await;
        self.refresh().await;
        Ok(())
    }

    // ========================================================================
    // Internal
    // ========================================================================

    fn apply_read(&mut self, result: ActionResult<Payload>) {
        match result.map(|payload| payload.into_snapshot().unwrap_or_default()) {
            Ok(snapshot) => self.show(snapshot),
            Err(failure) if failure.is_inaccessible() => {
                self.rows.clear();
                self.state = ViewState::Restricted;
            }
            Err(failure) => {
                self.rows.clear();
                self.state = ViewState::Error(failure);
            }
        }
    }

    fn show(&mut self, snapshot: Snapshot) {
        self.rows = snapshot.into_entries().into_iter().map(Row::from).collect();
        self.state = if self.rows.is_empty() {
            ViewState::Empty
        } else {
            ViewState::Populated
        };
    }

    /// Leaves the error state once a mutation succeeds. A draft stays open.
    fn mark_ok(&mut self) {
        if let ViewState::Error(_) = self.state {
            self.state = if self.rows.is_empty() {
                ViewState::Empty
            } else {
                ViewState::Populated
            };
        }
    }

    fn ensure_mutable(&self) -> ViewResult<()> {
        if self.shows_mutating_controls() {
            Ok(())
        } else {
            Err(ViewError::InvalidState {
                state: self.state.name(),
            })
        }
    }

    /// Brings the view back in line with the backend after a failed write.
    ///
    /// A failed write may still have changed the backend (a rename drops the
    /// old key before writing the new one), so rows are re-read rather than
    /// kept. `MALFORMED_INPUT` made no call and changes nothing. With no
    /// draft open, an inaccessible reason moves to [`ViewState::Restricted`].
    /// An open draft survives as long as the re-read succeeds.
    async fn record_failure(&mut self, failure: Failure) -> ViewError {
        warn!(tab_id = %self.session.tab_id(), reason = failure.code(), "Mutation failed");
        if failure == Failure::MalformedInput {
            return failure.into();
        }

        let draft = self.draft().cloned();
        if draft.is_none() && failure.is_inaccessible() {
            self.rows.clear();
            self.state = ViewState::Restricted;
            return failure.into();
        }

        let ctx = self.session.context().clone();
        let result = self.dispatcher.dispatch(&ctx, Action::Get).await;
        self.apply_read(result);

        if matches!(self.state, ViewState::Empty | ViewState::Populated) {
            self.state = match draft {
                Some(draft) => ViewState::Editing(draft),
                None => ViewState::Error(failure),
            };
        }
        failure.into()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::time::Duration;

    use chrono::TimeZone;
    use tokio_test::{assert_err, assert_ok};

    use crate::channel::{CookieStore, ScriptChannel};
    use crate::identifiers::TabId;
    use crate::memory::{MemoryCookies, MemoryPage, RecordingConfirmer, StaticTab};
    use crate::options::InspectorOptions;

    const URL: &str = "https://app.example.com/home";

    struct Fixture {
        page: Arc<MemoryPage>,
        cookies: Arc<MemoryCookies>,
        view: Reconciler,
    }

    fn build(page: MemoryPage, cookies: MemoryCookies, url: &str, kind: TargetKind) -> Fixture {
        build_with(page, cookies, url, kind, InspectorOptions::new())
    }

    fn build_with(
        page: MemoryPage,
        cookies: MemoryCookies,
        url: &str,
        kind: TargetKind,
        options: InspectorOptions,
    ) -> Fixture {
        let page = Arc::new(page);
        let cookies = Arc::new(cookies);
        let dispatcher = Dispatcher::new(
            Arc::clone(&page) as Arc<dyn ScriptChannel>,
            Arc::clone(&cookies) as Arc<dyn CookieStore>,
            &options,
        );
        let ctx = TargetContext::new(TabId::new(5).expect("valid tab id"), url, kind);
        Fixture {
            page,
            cookies,
            view: Reconciler::new(dispatcher, Session::new(ctx)),
        }
    }

    fn keys(view: &Reconciler) -> Vec<&str> {
        view.rows().iter().map(|row| row.key.as_str()).collect()
    }

    // ------------------------------------------------------------------------
    // refresh
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_refresh_empty_and_populated() {
        let mut fx = build(MemoryPage::new(), MemoryCookies::new(), URL, TargetKind::Local);
        assert_eq!(fx.view.refresh().await, &ViewState::Empty);

        let mut fx = build(
            MemoryPage::new().with_local([("b", "2"), ("a", "1")]),
            MemoryCookies::new(),
            URL,
            TargetKind::Local,
        );
        assert_eq!(fx.view.refresh().await, &ViewState::Populated);
        assert_eq!(keys(&fx.view), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_restricted_page() {
        let mut fx = build(MemoryPage::new(), MemoryCookies::new(), "about:blank", TargetKind::Cookie);

        assert_eq!(fx.view.refresh().await, &ViewState::Restricted);
        assert!(!fx.view.shows_mutating_controls());
        assert_eq!(fx.page.calls(), 0);
        assert_eq!(fx.cookies.calls(), 0);
    }

    #[tokio::test]
    async fn test_execution_fault_renders_restricted() {
        let mut fx = build(
            MemoryPage::new().with_local([("a", "1")]),
            MemoryCookies::new(),
            URL,
            TargetKind::Local,
        );
        fx.view.refresh().await;
        fx.page.set_failing(true);

        assert_eq!(fx.view.refresh().await, &ViewState::Restricted);
        assert!(fx.view.rows().is_empty());
    }

    #[tokio::test]
    async fn test_select_kind_never_merges_backends() {
        let mut fx = build(
            MemoryPage::new().with_local([("l", "1")]).with_session([("s", "1")]),
            MemoryCookies::new().with_cookies(URL, [("c", "1")]),
            URL,
            TargetKind::Local,
        );

        fx.view.refresh().await;
        assert_eq!(keys(&fx.view), vec!["l"]);

        fx.view.select_kind(TargetKind::Session).await;
        assert_eq!(keys(&fx.view), vec!["s"]);

        fx.view.select_kind(TargetKind::Cookie).await;
        assert_eq!(keys(&fx.view), vec!["c"]);
        assert!(!fx.view.keys_editable());
    }

    #[tokio::test]
    async fn test_activate_refreshes() {
        let page = Arc::new(MemoryPage::new().with_session([("k", "v")]));
        let dispatcher = Dispatcher::new(
            Arc::clone(&page) as Arc<dyn ScriptChannel>,
            Arc::new(MemoryCookies::new()) as Arc<dyn CookieStore>,
            &InspectorOptions::new(),
        );
        let provider = StaticTab::new(TabId::new(8).expect("valid tab id"), URL);

        let view = Reconciler::activate(dispatcher, &provider, TargetKind::Session)
            .await
            .expect("activate");
        assert_eq!(view.state(), &ViewState::Populated);
        assert_eq!(view.context().tab_url, URL);
    }

    // ------------------------------------------------------------------------
    // draft
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_begin_add_is_single_draft() {
        let mut fx = build(MemoryPage::new(), MemoryCookies::new(), URL, TargetKind::Local);
        fx.view.refresh().await;

        assert_eq!(fx.view.begin_add(), Ok(BeginAdd::Created));
        if let Some(draft) = fx.view.draft_mut() {
            draft.key.push_str("half");
        }
        assert_eq!(fx.view.begin_add(), Ok(BeginAdd::Refocused));
        assert_eq!(fx.view.draft().map(|d| d.key.as_str()), Some("half"));
    }

    #[tokio::test]
    async fn test_begin_add_rejected_when_restricted() {
        let mut fx = build(MemoryPage::new(), MemoryCookies::new(), "chrome://newtab", TargetKind::Local);
        fx.view.refresh().await;

        assert_eq!(
            fx.view.begin_add(),
            Err(ViewError::InvalidState { state: "restricted" })
        );
    }

    #[tokio::test]
    async fn test_commit_add_blank_key_changes_nothing() {
        let mut fx = build(MemoryPage::new(), MemoryCookies::new(), URL, TargetKind::Local);
        fx.view.refresh().await;
        assert_ok!(fx.view.begin_add());
        let before = fx.view.state().clone();
        let calls = fx.page.calls();

        for key in ["", "   "] {
            let result = fx.view.commit_add(key, "value").await;
            assert_eq!(result, Err(ViewError::Failed(Failure::MalformedInput)));
        }

        assert_eq!(fx.page.calls(), calls);
        assert_eq!(fx.view.state(), &before);
    }

    #[tokio::test]
    async fn test_commit_add_writes_trimmed_key_and_refreshes() {
        let mut fx = build(
            MemoryPage::new().with_local([("a", "1")]),
            MemoryCookies::new(),
            URL,
            TargetKind::Local,
        );
        fx.view.refresh().await;
        assert_ok!(fx.view.begin_add());

        assert_ok!(fx.view.commit_add("  token ", "xyz").await);
        assert_eq!(fx.view.state(), &ViewState::Populated);
        assert_eq!(keys(&fx.view), vec!["a", "token"]);
        assert_eq!(fx.page.local().get("token"), Some("xyz"));
    }

    #[tokio::test]
    async fn test_commit_draft_uses_typed_text() {
        let mut fx = build(MemoryPage::new(), MemoryCookies::new(), URL, TargetKind::Session);
        fx.view.refresh().await;
        assert_ok!(fx.view.begin_add());
        if let Some(draft) = fx.view.draft_mut() {
            draft.key = "theme".to_string();
            draft.value = "dark".to_string();
        }

        assert_ok!(fx.view.commit_draft().await);
        assert_eq!(fx.page.session().get("theme"), Some("dark"));
        assert!(fx.view.draft().is_none());
    }

    #[tokio::test]
    async fn test_commit_add_without_draft() {
        let mut fx = build(MemoryPage::new(), MemoryCookies::new(), URL, TargetKind::Local);
        fx.view.refresh().await;

        assert_eq!(fx.view.commit_add("k", "v").await, Err(ViewError::NoDraft));
    }

    #[tokio::test]
    async fn test_commit_add_failure_keeps_draft() {
        let mut fx = build(MemoryPage::new(), MemoryCookies::new(), URL, TargetKind::Local);
        fx.page.reject_key("huge");
        fx.view.refresh().await;
        assert_ok!(fx.view.begin_add());

        let result = fx.view.commit_add("huge", "x").await;
        assert_eq!(result, Err(ViewError::Failed(Failure::ExecutionFailed)));
        assert!(fx.view.draft().is_some());
    }

    #[tokio::test]
    async fn test_cancel_add_drops_draft() {
        let mut fx = build(MemoryPage::new(), MemoryCookies::new(), URL, TargetKind::Local);
        fx.view.refresh().await;
        assert_ok!(fx.view.begin_add());

        assert_eq!(fx.view.cancel_add().await, &ViewState::Empty);
        assert!(fx.view.draft().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cookie_add_waits_for_settle() {
        let options = InspectorOptions::new().with_cookie_settle(Duration::from_millis(100));
        let mut fx = build_with(
            MemoryPage::new(),
            MemoryCookies::new().with_write_lag(Duration::from_millis(40)),
            URL,
            TargetKind::Cookie,
            options,
        );
        fx.view.refresh().await;
        assert_ok!(fx.view.begin_add());

        assert_ok!(fx.view.commit_add("sid", "1").await);
        assert_eq!(keys(&fx.view), vec!["sid"]);
    }

    // ------------------------------------------------------------------------
    // edit / delete / clear
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_edit_value_patches_row() {
        let mut fx = build(
            MemoryPage::new().with_local([("a", "1"), ("b", "2")]),
            MemoryCookies::new(),
            URL,
            TargetKind::Local,
        );
        fx.view.refresh().await;
        let calls = fx.page.calls();

        assert_ok!(fx.view.edit_cell(1, Field::Value, "20").await);
        assert_eq!(fx.view.rows()[1].value, "20");
        assert_eq!(fx.page.local().get("b"), Some("20"));
        assert_eq!(fx.page.calls(), calls + 1);
    }

    #[tokio::test]
    async fn test_edit_key_renames() {
        let mut fx = build(
            MemoryPage::new().with_local([("x", "1")]),
            MemoryCookies::new(),
            URL,
            TargetKind::Local,
        );
        fx.view.refresh().await;

        assert_ok!(fx.view.edit_cell(0, Field::Key, "y").await);
        assert_eq!(keys(&fx.view), vec!["y"]);
        assert_eq!(fx.page.local().keys().collect::<Vec<_>>(), vec!["y"]);

        // Second keystroke renames from the updated key.
        assert_ok!(fx.view.edit_cell(0, Field::Key, "yz").await);
        assert_eq!(fx.page.local().keys().collect::<Vec<_>>(), vec!["yz"]);
    }

    #[tokio::test]
    async fn test_edit_key_onto_existing_collapses_rows() {
        let mut fx = build(
            MemoryPage::new().with_local([("a", "1"), ("b", "2")]),
            MemoryCookies::new(),
            URL,
            TargetKind::Local,
        );
        fx.view.refresh().await;

        assert_ok!(fx.view.edit_cell(0, Field::Key, "b").await);
        assert_eq!(fx.view.rows(), &[Row { key: "b".into(), value: "1".into() }]);
        assert_eq!(fx.page.local().get("b"), Some("1"));
    }

    #[tokio::test]
    async fn test_edit_cookie_key_is_read_only() {
        let mut fx = build(
            MemoryPage::new(),
            MemoryCookies::new().with_cookies(URL, [("sid", "1")]),
            URL,
            TargetKind::Cookie,
        );
        fx.view.refresh().await;

        assert_eq!(fx.view.edit_cell(0, Field::Key, "other").await, Err(ViewError::ReadOnlyKey));
        assert_ok!(fx.view.edit_cell(0, Field::Value, "2").await);
        assert_eq!(fx.view.edit_cell(4, Field::Value, "2").await, Err(ViewError::RowOutOfRange { index: 4 }));
    }

    #[tokio::test]
    async fn test_edit_keeps_open_draft() {
        let mut fx = build(
            MemoryPage::new().with_local([("a", "1")]),
            MemoryCookies::new(),
            URL,
            TargetKind::Local,
        );
        fx.view.refresh().await;
        assert_ok!(fx.view.begin_add());

        assert_ok!(fx.view.edit_cell(0, Field::Value, "9").await);
        assert!(fx.view.draft().is_some());
    }

    #[tokio::test]
    async fn test_failed_rename_rereads_rows() {
        let mut fx = build(
            MemoryPage::new().with_local([("x", "1"), ("z", "2")]),
            MemoryCookies::new(),
            URL,
            TargetKind::Local,
        );
        fx.view.refresh().await;
        fx.page.reject_key("y");
        assert_ok!(fx.view.begin_add());
        if let Some(draft) = fx.view.draft_mut() {
            draft.key.push_str("typed");
        }

        let result = fx.view.edit_cell(0, Field::Key, "y").await;
        assert_eq!(result, Err(ViewError::Failed(Failure::ExecutionFailed)));

        // The old key is gone from the backend, so it is gone from the table.
        assert_eq!(fx.page.local().keys().collect::<Vec<_>>(), vec!["z"]);
        assert_eq!(keys(&fx.view), vec!["z"]);
        assert_eq!(fx.view.draft().map(|d| d.key.as_str()), Some("typed"));
    }

    #[tokio::test]
    async fn test_failed_rename_without_draft_is_restricted() {
        let mut fx = build(
            MemoryPage::new().with_local([("x", "1")]),
            MemoryCookies::new(),
            URL,
            TargetKind::Local,
        );
        fx.view.refresh().await;
        fx.page.reject_key("y");

        assert_err!(fx.view.edit_cell(0, Field::Key, "y").await);
        assert!(fx.page.local().is_empty());
        assert_eq!(fx.view.state(), &ViewState::Restricted);
        assert!(fx.view.rows().is_empty());
        assert!(!fx.view.shows_mutating_controls());
    }

    #[tokio::test]
    async fn test_failed_delete_hides_controls() {
        let mut fx = build(
            MemoryPage::new().with_local([("a", "1")]),
            MemoryCookies::new(),
            URL,
            TargetKind::Local,
        );
        fx.view.refresh().await;
        fx.page.set_failing(true);

        let result = fx.view.delete_row(0, &true).await;
        assert_eq!(result, Err(ViewError::Failed(Failure::ExecutionFailed)));
        assert_eq!(fx.view.state(), &ViewState::Restricted);
        assert!(!fx.view.shows_mutating_controls());
    }

    #[tokio::test]
    async fn test_delete_declined() {
        let mut fx = build(
            MemoryPage::new().with_local([("a", "1")]),
            MemoryCookies::new(),
            URL,
            TargetKind::Local,
        );
        fx.view.refresh().await;
        let confirmer = RecordingConfirmer::new(false);
        let calls = fx.page.calls();

        assert_eq!(fx.view.delete_row(0, &confirmer).await, Ok(false));
        assert_eq!(fx.page.calls(), calls);
        assert_eq!(
            confirmer.prompts(),
            vec![ConfirmPrompt::new("Delete Item?", "Are you sure you want to delete \"a\"?")]
        );
    }

    #[tokio::test]
    async fn test_delete_patches_without_refresh() {
        let mut fx = build(
            MemoryPage::new().with_local([("a", "1"), ("b", "2")]),
            MemoryCookies::new(),
            URL,
            TargetKind::Local,
        );
        fx.view.refresh().await;
        let calls = fx.page.calls();

        assert_eq!(fx.view.delete_row(0, &true).await, Ok(true));
        assert_eq!(keys(&fx.view), vec!["b"]);
        assert_eq!(fx.page.calls(), calls + 1);
    }

    #[tokio::test]
    async fn test_delete_last_row_refreshes() {
        let mut fx = build(
            MemoryPage::new().with_local([("a", "1")]),
            MemoryCookies::new(),
            URL,
            TargetKind::Local,
        );
        fx.view.refresh().await;
        let calls = fx.page.calls();

        assert_eq!(fx.view.delete_row(0, &true).await, Ok(true));
        assert_eq!(fx.view.state(), &ViewState::Empty);
        assert_eq!(fx.page.calls(), calls + 2);
    }

    #[tokio::test]
    async fn test_clear_all() {
        let mut fx = build(
            MemoryPage::new(),
            MemoryCookies::new().with_cookies(URL, [("a", "1"), ("b", "2")]),
            URL,
            TargetKind::Cookie,
        );
        fx.view.refresh().await;
        let confirmer = RecordingConfirmer::new(true);

        assert_eq!(fx.view.clear_all(&confirmer).await, Ok(true));
        assert_eq!(fx.view.state(), &ViewState::Empty);
        assert_eq!(
            confirmer.prompts()[0].message,
            "This will delete ALL items in Cookies."
        );
    }

    #[tokio::test]
    async fn test_clear_declined() {
        let mut fx = build(
            MemoryPage::new().with_session([("a", "1")]),
            MemoryCookies::new(),
            URL,
            TargetKind::Session,
        );
        fx.view.refresh().await;

        assert_eq!(fx.view.clear_all(&false).await, Ok(false));
        assert_eq!(fx.page.session().len(), 1);
    }

    #[tokio::test]
    async fn test_hidden_controls_skip_prompt() {
        let mut fx = build(MemoryPage::new(), MemoryCookies::new(), "chrome://settings", TargetKind::Local);
        fx.view.refresh().await;
        let confirmer = RecordingConfirmer::new(true);

        assert_eq!(
            fx.view.clear_all(&confirmer).await,
            Err(ViewError::InvalidState { state: "restricted" })
        );
        assert_eq!(
            fx.view.import(&ImportSource::text(r#"{"a":"1"}"#)).await,
            Err(ViewError::InvalidState { state: "restricted" })
        );
        assert!(confirmer.prompts().is_empty());
        assert_eq!(fx.page.calls(), 0);
    }

    // ------------------------------------------------------------------------
    // import / export
    // ------------------------------------------------------------------------

    #[test]
    fn test_import_source_resolution() {
        assert_eq!(ImportSource::text("  {}  ").resolve(), Ok("{}"));
        assert_eq!(
            ImportSource::file("{\"f\":\"1\"}").with_text("{}").resolve(),
            Ok("{\"f\":\"1\"}")
        );
        assert_eq!(ImportSource::text("   ").resolve(), Err(Failure::MalformedInput));
        assert_eq!(ImportSource::default().resolve(), Err(Failure::MalformedInput));
    }

    #[tokio::test]
    async fn test_import_then_refresh() {
        let mut fx = build(MemoryPage::new(), MemoryCookies::new(), URL, TargetKind::Local);
        fx.view.refresh().await;

        assert_ok!(fx.view.import(&ImportSource::text(r#"{"a":"1","b":"2"}"#)).await);
        assert_eq!(keys(&fx.view), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_import_nothing_makes_no_call() {
        let mut fx = build(MemoryPage::new(), MemoryCookies::new(), URL, TargetKind::Local);
        fx.view.refresh().await;
        let calls = fx.page.calls();

        let result = fx.view.import(&ImportSource::default()).await;
        assert_eq!(result, Err(ViewError::Failed(Failure::MalformedInput)));

        let result = fx.view.import(&ImportSource::text("{broken")).await;
        assert_eq!(result, Err(ViewError::Failed(Failure::MalformedInput)));

        assert_eq!(fx.page.calls(), calls);
        assert_eq!(fx.view.state(), &ViewState::Empty);
    }

    #[tokio::test]
    async fn test_export_and_file_name() {
        let mut fx = build(
            MemoryPage::new(),
            MemoryCookies::new().with_cookies(URL, [("sid", "1")]),
            URL,
            TargetKind::Cookie,
        );
        fx.view.refresh().await;

        let text = fx.view.export().await.expect("export");
        assert_eq!(text, "{\n    \"sid\": \"1\"\n}");

        let now = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).single().expect("valid time");
        assert_eq!(
            fx.view.export_file_name(now),
            "app.example.com-C-2024-03-09T07-05-01.json"
        );
    }

    #[tokio::test]
    async fn test_export_restricted() {
        let fx = build(MemoryPage::new(), MemoryCookies::new(), "file:///tmp/x.html", TargetKind::Local);

        assert_eq!(
            fx.view.export().await,
            Err(ViewError::Failed(Failure::RestrictedTarget))
        );
    }
}
