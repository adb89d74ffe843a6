//! In-memory collaborators.
//!
//! Stand-ins for a real browser, useful in tests and for running the
//! reconciler offline:
//!
//! | Type | Implements | Notes |
//! |------|------------|-------|
//! | [`MemoryPage`] | [`ScriptChannel`] | Interprets the storage routine's message directly |
//! | [`MemoryCookies`] | [`CookieStore`] | Scoped by URL host, optional write lag |
//! | [`StaticTab`] | [`ActiveTabProvider`] | Fixed tab |
//! | [`RecordingConfirmer`] | [`Confirmer`] | Fixed answer, remembers prompts |
//!
//! Every collaborator counts calls so tests can assert that nothing was
//! attempted.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{Value, json};
use tokio::time::Instant;
use url::Url;

use crate::backend::{PageMessage, PageOp};
use crate::channel::{ActiveTab, ActiveTabProvider, ConfirmPrompt, Confirmer, CookieStore, ScriptChannel};
use crate::error::{Error, Result};
use crate::identifiers::TabId;
use crate::protocol::Cookie;
use crate::snapshot::Snapshot;
use crate::target::TargetKind;

// ============================================================================
// MemoryPage
// ============================================================================

#[derive(Debug, Default)]
struct PageState {
    local: Snapshot,
    session: Snapshot,
    unavailable: bool,
    failing: bool,
    rejected_keys: FxHashSet<String>,
}

impl PageState {
    fn area(&mut self, kind: TargetKind) -> &mut Snapshot {
        match kind {
            TargetKind::Session => &mut self.session,
            _ => &mut self.local,
        }
    }
}

/// One page's `localStorage` and `sessionStorage`.
///
/// Instead of evaluating JavaScript, it decodes the routine's argument and
/// applies it to in-memory maps, returning the same value shapes.
#[derive(Debug, Default)]
pub struct MemoryPage {
    state: Mutex<PageState>,
    calls: AtomicUsize,
}

impl MemoryPage {
    /// Creates a page with empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds `localStorage`.
    #[must_use]
    pub fn with_local<K: Into<String>, V: Into<String>>(
        self,
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        self.state.lock().local = entries.into_iter().collect();
        self
    }

    /// Seeds `sessionStorage`.
    #[must_use]
    pub fn with_session<K: Into<String>, V: Into<String>>(
        self,
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        self.state.lock().session = entries.into_iter().collect();
        self
    }

    /// Makes the page report no storage object (routine returns `null`).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    /// Makes every execution fault, as if the tab could not be injected.
    pub fn set_failing(&self, failing: bool) {
        self.state.lock().failing = failing;
    }

    /// Makes `setItem` throw for `key` (quota exceeded and the like).
    pub fn reject_key(&self, key: impl Into<String>) {
        self.state.lock().rejected_keys.insert(key.into());
    }

    /// Current `localStorage` contents.
    #[must_use]
    pub fn local(&self) -> Snapshot {
        self.state.lock().local.clone()
    }

    /// Current `sessionStorage` contents.
    #[must_use]
    pub fn session(&self) -> Snapshot {
        self.state.lock().session.clone()
    }

    /// Number of routine executions received.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScriptChannel for MemoryPage {
    async fn execute(&self, tab_id: TabId, _routine: &str, args: Vec<Value>) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.lock();
        if state.failing {
            return Err(Error::script(tab_id, "cannot access contents of the page"));
        }
        if state.unavailable {
            return Ok(Value::Null);
        }

        let arg = args
            .into_iter()
            .next()
            .ok_or_else(|| Error::script(tab_id, "missing routine argument"))?;
        let message: PageMessage = serde_json::from_value(arg)?;

        let rejected = state.rejected_keys.clone();
        let storage = state.area(message.kind);

        match message.op {
            PageOp::Read => Ok(serde_json::to_value(
                storage
                    .iter()
                    .map(|entry| (entry.key.as_str(), entry.value.as_str()))
                    .collect::<Vec<_>>(),
            )?),
            PageOp::Write {
                key,
                value,
                previous_key,
            } => {
                if let Some(previous) = previous_key.filter(|previous| *previous != key) {
                    storage.remove(&previous);
                }
                if rejected.contains(&key) {
                    return Err(Error::script(tab_id, "QuotaExceededError"));
                }
                storage.insert(key, value);
                Ok(Value::Bool(true))
            }
            PageOp::Remove { key } => {
                storage.remove(&key);
                Ok(Value::Bool(true))
            }
            PageOp::Clear => {
                *storage = Snapshot::new();
                Ok(Value::Bool(true))
            }
            PageOp::Import { entries } => {
                let mut failed = 0usize;
                for (key, value) in entries {
                    if rejected.contains(&key) {
                        failed += 1;
                    } else {
                        storage.insert(key, value);
                    }
                }
                Ok(json!({ "failed": failed }))
            }
        }
    }
}

// ============================================================================
// MemoryCookies
// ============================================================================

#[derive(Debug)]
struct PendingWrite {
    scope: String,
    cookie: Cookie,
    visible_at: Instant,
}

#[derive(Debug, Default)]
struct CookieState {
    jars: FxHashMap<String, Vec<Cookie>>,
    pending: Vec<PendingWrite>,
    failing: bool,
    rejected_removals: FxHashSet<String>,
    removals: Vec<String>,
}

impl CookieState {
    fn apply(jar: &mut Vec<Cookie>, cookie: Cookie) {
        match jar.iter_mut().find(|existing| existing.name == cookie.name) {
            Some(existing) => *existing = cookie,
            None => jar.push(cookie),
        }
    }

    fn flush_visible(&mut self) {
        let now = Instant::now();
        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|write| write.visible_at <= now);
        self.pending = waiting;

        for write in ready {
            Self::apply(self.jars.entry(write.scope).or_default(), write.cookie);
        }
    }
}

/// Cookie store keyed by URL host.
///
/// With a write lag, [`set`](CookieStore::set) returns before the cookie is
/// visible and [`confirms_writes`](CookieStore::confirms_writes) is `false`.
#[derive(Debug, Default)]
pub struct MemoryCookies {
    state: Mutex<CookieState>,
    write_lag: Duration,
    calls: AtomicUsize,
}

impl MemoryCookies {
    /// Creates an empty store that applies writes immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays visibility of every write by `lag`.
    #[must_use]
    pub fn with_write_lag(mut self, lag: Duration) -> Self {
        self.write_lag = lag;
        self
    }

    /// Seeds cookies for `url`.
    #[must_use]
    pub fn with_cookies<K: Into<String>, V: Into<String>>(
        self,
        url: &str,
        cookies: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        {
            let mut state = self.state.lock();
            let jar = state.jars.entry(scope_of(url)).or_default();
            for (name, value) in cookies {
                CookieState::apply(jar, Cookie::new(name, value));
            }
        }
        self
    }

    /// Makes every call fail.
    pub fn set_failing(&self, failing: bool) {
        self.state.lock().failing = failing;
    }

    /// Makes removal of `name` fail.
    pub fn reject_removal(&self, name: impl Into<String>) {
        self.state.lock().rejected_removals.insert(name.into());
    }

    /// Names passed to successful removals, in call order.
    #[must_use]
    pub fn removals(&self) -> Vec<String> {
        self.state.lock().removals.clone()
    }

    /// Number of store calls received.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn begin_call(&self) -> Result<parking_lot::MutexGuard<'_, CookieState>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        if state.failing {
            return Err(Error::cookie("cookie store unavailable"));
        }
        state.flush_visible();
        Ok(state)
    }
}

#[async_trait]
impl CookieStore for MemoryCookies {
    async fn get_all(&self, url: &str) -> Result<Vec<Cookie>> {
        let state = self.begin_call()?;
        Ok(state.jars.get(&scope_of(url)).cloned().unwrap_or_default())
    }

    async fn set(&self, url: &str, cookie: Cookie) -> Result<()> {
        let mut state = self.begin_call()?;
        let scope = scope_of(url);

        if self.write_lag.is_zero() {
            CookieState::apply(state.jars.entry(scope).or_default(), cookie);
        } else {
            state.pending.push(PendingWrite {
                scope,
                cookie,
                visible_at: Instant::now() + self.write_lag,
            });
        }
        Ok(())
    }

    async fn remove(&self, url: &str, name: &str) -> Result<()> {
        let mut state = self.begin_call()?;
        if state.rejected_removals.contains(name) {
            return Err(Error::cookie(format!("cannot remove {name}")));
        }

        if let Some(jar) = state.jars.get_mut(&scope_of(url)) {
            jar.retain(|cookie| cookie.name != name);
        }
        state.removals.push(name.to_string());
        Ok(())
    }

    fn confirms_writes(&self) -> bool {
        self.write_lag.is_zero()
    }
}

/// Cookie scope for a URL: its host, or the raw text if it has none.
fn scope_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

// ============================================================================
// StaticTab
// ============================================================================

/// Active tab provider that always reports the same tab.
#[derive(Debug, Clone)]
pub struct StaticTab {
    tab: ActiveTab,
}

impl StaticTab {
    /// Creates a provider for `tab_id` at `tab_url`.
    #[must_use]
    pub fn new(tab_id: TabId, tab_url: impl Into<String>) -> Self {
        Self {
            tab: ActiveTab {
                tab_id,
                tab_url: tab_url.into(),
            },
        }
    }
}

#[async_trait]
impl ActiveTabProvider for StaticTab {
    async fn active_tab(&self) -> Result<ActiveTab> {
        Ok(self.tab.clone())
    }
}

// ============================================================================
// RecordingConfirmer
// ============================================================================

/// Confirmer with a fixed answer that keeps every prompt it was shown.
#[derive(Debug, Default)]
pub struct RecordingConfirmer {
    answer: bool,
    prompts: Mutex<Vec<ConfirmPrompt>>,
}

impl RecordingConfirmer {
    /// Creates a confirmer that always answers `answer`.
    #[must_use]
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts shown so far.
    #[must_use]
    pub fn prompts(&self) -> Vec<ConfirmPrompt> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl Confirmer for RecordingConfirmer {
    async fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        self.prompts.lock().push(prompt.clone());
        self.answer
    }
}

// ============================================================================
// Tests
// ============================================================================
