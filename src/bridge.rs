//! Browser extension bridge.
//!
//! The companion extension connects to a local WebSocket server, reports
//! the active tab in its READY message and then answers requests. Over
//! that connection, [`ExtensionBridge`] provides all three browser-facing
//! collaborators:
//!
//! | Trait | Method(s) |
//! |-------|-----------|
//! | [`ScriptChannel`] | `script.evaluate` |
//! | [`CookieStore`] | `storage.getAllCookies`, `storage.setCookie`, `storage.deleteCookie` |
//! | [`ActiveTabProvider`] | `browsingContext.getActiveTab` |
//!
//! # Example
//!
//! ```ignore
//! use std::net::{IpAddr, Ipv4Addr};
//! use std::sync::Arc;
//!
//! let options = InspectorOptions::default();
//! let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
//! println!("extension should connect to {}", server.ws_url());
//!
//! let bridge = Arc::new(ExtensionBridge::accept(server, &options).await?);
//! let dispatcher = Dispatcher::new(bridge.clone(), bridge.clone(), &options);
//! let view = Reconciler::activate(dispatcher, bridge.as_ref(), options.initial_kind).await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::channel::{ActiveTab, ActiveTabProvider, CookieStore, ScriptChannel};
use crate::error::{Error, Result};
use crate::identifiers::TabId;
use crate::options::InspectorOptions;
use crate::protocol::{
    BrowsingContextCommand, Command, Cookie, Request, Response, ScriptCommand, StorageCommand,
};
use crate::transport::{Connection, PendingServer};

// ============================================================================
// ExtensionBridge
// ============================================================================

/// Collaborators backed by a connected browser extension.
pub struct ExtensionBridge {
    connection: Connection,
    ready: ActiveTab,
    command_timeout: Duration,
}

impl ExtensionBridge {
    /// Wraps an established connection.
    #[must_use]
    pub fn new(connection: Connection, ready: ActiveTab, command_timeout: Duration) -> Self {
        Self {
            connection,
            ready,
            command_timeout,
        }
    }

    /// Waits for the extension to connect to `server`.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `options` are invalid
    /// - [`Error::ConnectionTimeout`] if the extension does not connect or
    ///   send READY within `options.connect_timeout`
    pub async fn accept(server: PendingServer, options: &InspectorOptions) -> Result<Self> {
        options.validate()?;

        let (connection, ready) = server.accept(options.connect_timeout).await?;
        Ok(Self::new(connection, ready, options.command_timeout))
    }

    /// Tab reported in the READY handshake.
    #[inline]
    #[must_use]
    pub fn ready(&self) -> &ActiveTab {
        &self.ready
    }

    /// Underlying connection.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Closes the connection.
    pub fn shutdown(&self) {
        self.connection.shutdown();
    }

    async fn send(&self, request: Request) -> Result<Response> {
        self.connection.send(request, self.command_timeout).await
    }

    /// Sends a cookie command and returns its result.
    async fn send_cookie(&self, command: Command) -> Result<Value> {
        let response = self.send(Request::untargeted(command)).await?;
        response.into_value().map_err(Error::cookie)
    }
}

// ============================================================================
// ScriptChannel
// ============================================================================

#[async_trait]
impl ScriptChannel for ExtensionBridge {
    async fn execute(&self, tab_id: TabId, routine: &str, args: Vec<Value>) -> Result<Value> {
        debug!(%tab_id, script_len = routine.len(), "Executing routine");

        let command = Command::Script(ScriptCommand::Evaluate {
            script: routine.to_string(),
            args,
        });
        let mut result = self
            .send(Request::new(tab_id, command))
            .await?
            .into_value()
            .map_err(|message| Error::script(tab_id, message))?;

        Ok(result
            .get_mut("value")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }
}

// ============================================================================
// CookieStore
// ============================================================================

#[async_trait]
impl CookieStore for ExtensionBridge {
    async fn get_all(&self, url: &str) -> Result<Vec<Cookie>> {
        let command = Command::Storage(StorageCommand::GetAllCookies {
            url: url.to_string(),
        });
        let result = self.send_cookie(command).await?;

        let cookies: Vec<Cookie> = result
            .get("cookies")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| serde_json::from_value::<Cookie>(v.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();

        debug!(url = %url, count = cookies.len(), "Got all cookies");
        Ok(cookies)
    }

    async fn set(&self, url: &str, cookie: Cookie) -> Result<()> {
        debug!(url = %url, name = %cookie.name, "Setting cookie");

        let command = Command::Storage(StorageCommand::SetCookie {
            url: url.to_string(),
            cookie,
        });
        self.send_cookie(command).await?;
        Ok(())
    }

    async fn remove(&self, url: &str, name: &str) -> Result<()> {
        debug!(url = %url, name = %name, "Deleting cookie");

        let command = Command::Storage(StorageCommand::DeleteCookie {
            url: url.to_string(),
            name: name.to_string(),
        });
        self.send_cookie(command).await?;
        Ok(())
    }

    /// The extension answers only after the cookie API callback fired.
    fn confirms_writes(&self) -> bool {
        true
    }
}

// ============================================================================
// ActiveTabProvider
// ============================================================================

#[async_trait]
impl ActiveTabProvider for ExtensionBridge {
    async fn active_tab(&self) -> Result<ActiveTab> {
        let command = Command::BrowsingContext(BrowsingContextCommand::GetActiveTab);
        self.send(Request::untargeted(command)).await?.decode()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;

    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message;

    use crate::dispatch::{Action, Dispatcher};
    use crate::error::Failure;
    use crate::memory::{MemoryCookies, MemoryPage};
    use crate::snapshot::Snapshot;
    use crate::target::{TargetContext, TargetKind};

    const TAB_ID: u32 = 77;
    const TAB_URL: &str = "https://shop.example.com/cart";

    /// Answers one request the way the extension would, using in-memory state.
    async fn answer(request: &Value, page: &MemoryPage, cookies: &MemoryCookies) -> Value {
        let id = request["id"].clone();
        let params = &request["params"];
        let url = params["url"].as_str().unwrap_or_default();

        let outcome: Result<Value> = match request["method"].as_str().unwrap_or_default() {
            "script.evaluate" => {
                let tab_id = request["tabId"]
                    .as_u64()
                    .and_then(|raw| TabId::new(raw as u32))
                    .expect("targeted request");
                let script = params["script"].as_str().unwrap_or_default();
                let args = params["args"].as_array().cloned().unwrap_or_default();
                page.execute(tab_id, script, args)
                    .await
                    .map(|value| json!({ "value": value }))
            }
            "storage.getAllCookies" => cookies
                .get_all(url)
                .await
                .map(|list| json!({ "cookies": list })),
            "storage.setCookie" => {
                let cookie: Cookie =
                    serde_json::from_value(params["cookie"].clone()).expect("cookie param");
                cookies.set(url, cookie).await.map(|()| json!({}))
            }
            "storage.deleteCookie" => {
                let name = params["name"].as_str().unwrap_or_default();
                cookies.remove(url, name).await.map(|()| json!({}))
            }
            "browsingContext.getActiveTab" => Ok(json!({ "tabId": TAB_ID, "tabUrl": TAB_URL })),
            other => Err(Error::protocol(format!("unknown method {other}"))),
        };

        match outcome {
            Ok(result) => json!({ "id": id, "type": "success", "result": result }),
            Err(e) => json!({ "id": id, "type": "error", "error": "failed", "message": e.to_string() }),
        }
    }

    /// Connects a fake extension to `ws_url` and serves requests until closed.
    fn spawn_extension(ws_url: String, page: Arc<MemoryPage>, cookies: Arc<MemoryCookies>) {
        tokio::spawn(async move {
            let (stream, _) = connect_async(ws_url).await.expect("connect");
            let (mut write, mut read) = stream.split();

            let ready = json!({
                "id": "00000000-0000-0000-0000-000000000000",
                "type": "success",
                "result": { "tabId": TAB_ID, "tabUrl": TAB_URL }
            });
            write
                .send(Message::Text(ready.to_string().into()))
                .await
                .expect("send ready");

            while let Some(Ok(Message::Text(text))) = read.next().await {
                let request: Value = serde_json::from_str(&text).expect("request json");
                let reply = answer(&request, &page, &cookies).await;
                if write.send(Message::Text(reply.to_string().into())).await.is_err() {
                    break;
                }
            }
        });
    }

    async fn connect(page: Arc<MemoryPage>, cookies: Arc<MemoryCookies>) -> Arc<ExtensionBridge> {
        let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            .await
            .expect("bind");
        spawn_extension(server.ws_url(), page, cookies);

        let options = InspectorOptions::new().with_connect_timeout(Duration::from_secs(5));
        Arc::new(ExtensionBridge::accept(server, &options).await.expect("accept"))
    }

    #[tokio::test]
    async fn test_ready_and_active_tab() {
        let bridge = connect(Arc::new(MemoryPage::new()), Arc::new(MemoryCookies::new())).await;

        assert_eq!(bridge.ready().tab_id.as_u32(), TAB_ID);
        assert_eq!(bridge.ready().tab_url, TAB_URL);

        let tab = bridge.active_tab().await.expect("active tab");
        assert_eq!(tab.tab_id.as_u32(), TAB_ID);
        assert_eq!(tab.tab_url, TAB_URL);
        bridge.shutdown();
    }

    #[tokio::test]
    async fn test_dispatch_over_bridge() {
        let page = Arc::new(MemoryPage::new().with_local([("a", "1")]));
        let cookies = Arc::new(MemoryCookies::new().with_cookies(TAB_URL, [("sid", "x")]));
        let bridge = connect(Arc::clone(&page), Arc::clone(&cookies)).await;

        let dispatcher = Dispatcher::new(
            Arc::clone(&bridge) as Arc<dyn ScriptChannel>,
            Arc::clone(&bridge) as Arc<dyn CookieStore>,
            &InspectorOptions::new(),
        );
        let tab = TabId::new(TAB_ID).expect("valid tab id");

        let local = TargetContext::new(tab, TAB_URL, TargetKind::Local);
        dispatcher
            .dispatch(&local, Action::rename("a", "b", "2"))
            .await
            .expect("rename");
        let expected: Snapshot = [("b", "2")].into_iter().collect();
        assert_eq!(page.local(), expected);

        let jar = local.with_kind(TargetKind::Cookie);
        let snapshot = dispatcher
            .dispatch(&jar, Action::Get)
            .await
            .expect("get")
            .into_snapshot()
            .expect("snapshot payload");
        assert_eq!(snapshot.get("sid"), Some("x"));

        dispatcher.dispatch(&jar, Action::Clear).await.expect("clear");
        assert_eq!(cookies.removals(), vec!["sid".to_string()]);
        bridge.shutdown();
    }

    #[tokio::test]
    async fn test_script_fault_is_execution_failure() {
        let page = Arc::new(MemoryPage::new());
        page.set_failing(true);
        let bridge = connect(Arc::clone(&page), Arc::new(MemoryCookies::new())).await;
        let tab = TabId::new(TAB_ID).expect("valid tab id");

        let err = bridge
            .execute(tab, "return 1;", vec![])
            .await
            .expect_err("fault");
        assert!(matches!(err, Error::Script { .. }));
        assert_eq!(err.reason(), Failure::ExecutionFailed);
        bridge.shutdown();
    }
}
