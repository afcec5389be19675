//! DevTools protocol client: one WebSocket per debug target.
//!
//! Commands are framed as `{id, method, params}` with a per-connection,
//! monotonically increasing id. A background reader task routes every
//! inbound frame carrying an `id` to the command waiting on it; frames for
//! unknown ids (events, stale or foreign responses) are dropped.
//!
//! Connections are never pooled. Open one per attempt and `close` it on
//! every exit path.

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

use crate::errors::{AutomationError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Outbound command frame
#[derive(Debug, Serialize)]
struct CommandFrame<'a> {
    id: u64,
    method: &'a str,
    params: Value,
}

/// A command waiting for its response
struct PendingCommand {
    method: String,
    issued_at: Instant,
    tx: oneshot::Sender<Result<Value>>,
}

/// Table of in-flight commands keyed by id.
///
/// At most one entry exists per id. An entry leaves the table when its
/// response arrives, when its caller gives up, or when the socket drops.
#[derive(Default)]
pub(crate) struct PendingCommands {
    inner: Mutex<HashMap<u64, PendingCommand>>,
}

impl PendingCommands {
    pub(crate) async fn register(&self, id: u64, method: &str) -> oneshot::Receiver<Result<Value>> {
        let (tx, rx) = oneshot::channel();
        let previous = self.inner.lock().await.insert(
            id,
            PendingCommand {
                method: method.to_string(),
                issued_at: Instant::now(),
                tx,
            },
        );
        debug_assert!(previous.is_none(), "command id {id} reused");
        rx
    }

    /// Route an inbound frame. Returns `true` if it answered a pending command.
    pub(crate) async fn resolve(&self, frame: &Value) -> bool {
        let Some(id) = frame.get("id").and_then(Value::as_u64) else {
            trace!(
                method = frame.get("method").and_then(serde_json::Value::as_str),
                "ignoring event frame"
            );
            return false;
        };

        let Some(pending) = self.inner.lock().await.remove(&id) else {
            debug!(id, "response for unknown or expired command id");
            return false;
        };

        let outcome = match frame.get("error") {
            Some(error) => Err(AutomationError::RemoteProtocol {
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            }),
            None => Ok(frame.get("result").cloned().unwrap_or(Value::Null)),
        };

        trace!(
            id,
            method = %pending.method,
            elapsed_ms = pending.issued_at.elapsed().as_millis() as u64,
            "command answered"
        );
        // The caller may already have timed out and dropped its receiver
        let _ = pending.tx.send(outcome);
        true
    }

    pub(crate) async fn forget(&self, id: u64) -> bool {
        self.inner.lock().await.remove(&id).is_some()
    }

    /// Fail every in-flight command, used when the socket goes away
    pub(crate) async fn fail_all(&self, url: &str, reason: &str) {
        let mut inner = self.inner.lock().await;
        for (_, pending) in inner.drain() {
            let _ = pending.tx.send(Err(AutomationError::Connection {
                url: url.to_string(),
                reason: reason.to_string(),
            }));
        }
    }

    pub(crate) async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

/// Live protocol connection to a single debug target
pub struct Connection {
    url: String,
    next_id: AtomicU64,
    pending: Arc<PendingCommands>,
    writer: Mutex<WsSink>,
    command_timeout: Duration,
    reader: tokio::task::JoinHandle<()>,
}

impl Connection {
    /// Open a WebSocket to `url` (a target's `webSocketDebuggerUrl`)
    pub async fn connect(url: &str, command_timeout: Duration) -> Result<Self> {
        let connection_error = |reason: String| AutomationError::Connection {
            url: url.to_string(),
            reason,
        };

        url::Url::parse(url).map_err(|e| connection_error(format!("invalid URL: {}", e)))?;

        let (stream, _) = tokio::time::timeout(command_timeout, tokio_tungstenite::connect_async(url))
            .await
            .map_err(|_| connection_error("timed out opening socket".to_string()))?
            .map_err(|e| connection_error(e.to_string()))?;

        let (writer, reader) = stream.split();
        let pending = Arc::new(PendingCommands::default());

        let reader = {
            let pending = Arc::clone(&pending);
            let url = url.to_string();
            tokio::spawn(async move { read_loop(reader, pending, url).await })
        };

        debug!(url, "DevTools socket open");

        Ok(Self {
            url: url.to_string(),
            next_id: AtomicU64::new(1),
            pending,
            writer: Mutex::new(writer),
            command_timeout,
            reader,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send a command and wait for its result, bounded by the command timeout
    pub async fn send(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let frame = serde_json::to_string(&CommandFrame { id, method, params })
            .map_err(|e| AutomationError::InvalidResponse(e.to_string()))?;

        // Register before writing so a fast response cannot be missed
        let rx = self.pending.register(id, method).await;

        trace!(id, method, "send");
        let written = self.writer.lock().await.send(Message::Text(frame.into())).await;
        if let Err(e) = written {
            self.pending.forget(id).await;
            return Err(AutomationError::Connection {
                url: self.url.clone(),
                reason: e.to_string(),
            });
        }

        match tokio::time::timeout(self.command_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(AutomationError::Connection {
                url: self.url.clone(),
                reason: "socket closed".to_string(),
            }),
            Err(_) => {
                self.pending.forget(id).await;
                debug!(id, method, "command timed out");
                Err(AutomationError::CommandTimeout {
                    method: method.to_string(),
                })
            }
        }
    }

    /// Release the socket. Safe to call after the remote already hung up.
    pub async fn close(self) {
        if let Err(e) = self.writer.lock().await.close().await {
            trace!(url = %self.url, "close frame not sent: {}", e);
        }
        self.pending.fail_all(&self.url, "connection closed").await;
        debug!(url = %self.url, "DevTools socket closed");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop(mut reader: WsSource, pending: Arc<PendingCommands>, url: String) {
    while let Some(message) = reader.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text.to_string(),
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => text,
                Err(_) => continue,
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(url = %url, "socket read error: {}", e);
                break;
            }
        };

        trace!("recv: {}", text);
        match serde_json::from_str::<Value>(&text) {
            Ok(frame) => {
                pending.resolve(&frame).await;
            }
            Err(e) => warn!(url = %url, "unparseable DevTools frame: {}", e),
        }
    }

    pending.fail_all(&url, "socket closed").await;
}

#[cfg(test)]
#[path = "protocol_test.rs"]
mod protocol_test;
