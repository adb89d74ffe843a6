//! Extension connection and its I/O task.
//!
//! A [`Connection`] owns one WebSocket to the companion extension. Calls to
//! [`Connection::send`] register a waiter keyed by [`RequestId`] and hand the
//! request to a background task; the task writes it, reads answers and
//! resolves waiters as their responses arrive.
//!
//! The READY handshake is an ordinary response with the nil id. Its waiter
//! is registered before the I/O task starts, so a READY that arrives before
//! anyone calls [`Connection::wait_ready`] is still delivered.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, trace, warn};

use crate::channel::ActiveTab;
use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::{Request, Response};

// ============================================================================
// Constants
// ============================================================================

/// Upper bound on requests awaiting an answer.
const MAX_IN_FLIGHT: usize = 64;

// ============================================================================
// Types
// ============================================================================

type Reply = oneshot::Sender<Result<Response>>;
type Waiters = Arc<Mutex<FxHashMap<RequestId, Reply>>>;
type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;

/// Work handed to the I/O task.
enum Outbound {
    Request { request: Request, reply: Reply },
    Forget(RequestId),
    Close,
}

// ============================================================================
// Connection
// ============================================================================

/// Live WebSocket link to the extension.
///
/// Cheap to clone; every clone talks to the same I/O task.
#[derive(Clone)]
pub struct Connection {
    outbound: mpsc::UnboundedSender<Outbound>,
    waiters: Waiters,
    ready: Arc<Mutex<Option<oneshot::Receiver<Result<Response>>>>>,
}

impl Connection {
    /// Takes over an upgraded WebSocket and starts the I/O task.
    pub(crate) fn new(ws_stream: WebSocketStream<TcpStream>) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let waiters = Waiters::default();

        let (ready_tx, ready_rx) = oneshot::channel();
        waiters.lock().insert(RequestId::ready(), ready_tx);

        tokio::spawn(run(ws_stream, outbound_rx, Arc::clone(&waiters)));

        Self {
            outbound,
            waiters,
            ready: Arc::new(Mutex::new(Some(ready_rx))),
        }
    }

    /// Waits for READY and returns the tab it names.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if READY does not arrive in time
    /// - [`Error::ConnectionClosed`] if the socket closes first
    /// - [`Error::Protocol`] if READY was already consumed, reports a
    ///   failure or lacks a usable `tabId`
    pub async fn wait_ready(&self, ready_timeout: Duration) -> Result<ActiveTab> {
        let receiver = self
            .ready
            .lock()
            .take()
            .ok_or_else(|| Error::protocol("READY already consumed"))?;

        let response = timeout(ready_timeout, receiver)
            .await
            .map_err(|_| Error::connection_timeout(ready_timeout.as_millis() as u64))?
            .map_err(|_| Error::ConnectionClosed)??;

        let tab: ActiveTab = response.decode()?;
        debug!(tab_id = %tab.tab_id, url = %tab.tab_url, "READY received");
        Ok(tab)
    }

    /// Sends `request` and waits up to `request_timeout` for its answer.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if too many requests are already in flight
    /// - [`Error::ConnectionClosed`] if the I/O task has stopped
    /// - [`Error::RequestTimeout`] if no answer arrives in time
    pub async fn send(&self, request: Request, request_timeout: Duration) -> Result<Response> {
        let in_flight = self.in_flight();
        if in_flight >= MAX_IN_FLIGHT {
            warn!(in_flight, max = MAX_IN_FLIGHT, "Request rejected");
            return Err(Error::protocol(format!(
                "too many requests in flight ({in_flight})"
            )));
        }

        let request_id = request.id;
        let (reply, answer) = oneshot::channel();
        self.outbound
            .send(Outbound::Request { request, reply })
            .map_err(|_| Error::ConnectionClosed)?;

        match timeout(request_timeout, answer).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                let _ = self.outbound.send(Outbound::Forget(request_id));
                Err(Error::request_timeout(
                    request_id,
                    request_timeout.as_millis() as u64,
                ))
            }
        }
    }

    /// Number of waiters, the READY slot included until it resolves.
    #[inline]
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.waiters.lock().len()
    }

    /// Asks the I/O task to close the socket.
    ///
    /// Not called on drop since clones share the task.
    pub fn shutdown(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

// ============================================================================
// I/O Task
// ============================================================================

async fn run(
    ws_stream: WebSocketStream<TcpStream>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    waiters: Waiters,
) {
    let (mut sink, mut source) = ws_stream.split();

    loop {
        tokio::select! {
            keep_going = read_one(&mut source, &waiters) => {
                if !keep_going {
                    break;
                }
            }

            work = outbound.recv() => match work {
                Some(Outbound::Request { request, reply }) => {
                    write_request(&mut sink, request, reply, &waiters).await;
                }
                Some(Outbound::Forget(request_id)) => {
                    waiters.lock().remove(&request_id);
                    debug!(%request_id, "Dropped timed-out waiter");
                }
                Some(Outbound::Close) => {
                    let _ = sink.close().await;
                    break;
                }
                None => break,
            }
        }
    }

    close_waiters(&waiters);
    debug!("Extension I/O task stopped");
}

/// Reads one frame. Returns `false` once the socket is done.
async fn read_one(source: &mut WsSource, waiters: &Waiters) -> bool {
    match source.next().await {
        Some(Ok(Message::Text(text))) => {
            deliver(&text, waiters);
            true
        }
        Some(Ok(Message::Close(frame))) => {
            debug!(?frame, "Extension closed the socket");
            false
        }
        Some(Ok(_)) => true,
        Some(Err(e)) => {
            error!(error = %e, "WebSocket read failed");
            false
        }
        None => false,
    }
}

/// Resolves the waiter an incoming frame answers.
fn deliver(text: &str, waiters: &Waiters) {
    let response: Response = match serde_json::from_str(text) {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, frame = %text, "Unparseable frame");
            return;
        }
    };

    let Some(reply) = waiters.lock().remove(&response.id) else {
        warn!(id = %response.id, "Answer for unknown request");
        return;
    };
    let _ = reply.send(Ok(response));
}

async fn write_request(sink: &mut WsSink, request: Request, reply: Reply, waiters: &Waiters) {
    let request_id = request.id;
    let method = request.command.method();

    let frame = match serde_json::to_string(&request) {
        Ok(frame) => frame,
        Err(e) => {
            let _ = reply.send(Err(Error::Json(e)));
            return;
        }
    };

    waiters.lock().insert(request_id, reply);

    if let Err(e) = sink.send(Message::Text(frame.into())).await {
        if let Some(reply) = waiters.lock().remove(&request_id) {
            let _ = reply.send(Err(Error::connection(e.to_string())));
        }
        return;
    }

    trace!(%request_id, method, "Request written");
}

fn close_waiters(waiters: &Waiters) {
    let orphaned: Vec<Reply> = waiters.lock().drain().map(|(_, reply)| reply).collect();
    if !orphaned.is_empty() {
        debug!(count = orphaned.len(), "Failing orphaned waiters");
    }
    for reply in orphaned {
        let _ = reply.send(Err(Error::ConnectionClosed));
    }
}

// ============================================================================
// Tests
// ============================================================================
