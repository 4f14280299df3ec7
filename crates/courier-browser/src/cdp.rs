//! CDP (Chrome DevTools Protocol) WebSocket transport.
//!
//! Speaks the DevTools JSON-RPC dialect over a WebSocket: commands carry an
//! auto-incrementing `id` and are correlated with their replies; messages
//! without an `id` are events and are forwarded on a channel. A background
//! reader task owns the receive half of the socket.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::BrowserError;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Default per-command reply deadline.
const COMMAND_DEADLINE: Duration = Duration::from_secs(30);

/// An event pushed by the browser (a message with a `method` and no `id`).
#[derive(Debug, Clone)]
pub struct PageEvent {
    pub method: String,
    pub params: Value,
}

/// Error object carried in a failed command reply.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct WireError {
    pub code: i64,
    pub message: String,
}

/// The reply to a single command.
#[derive(Debug, Clone)]
pub struct CommandReply {
    pub result: Option<Value>,
    pub error: Option<WireError>,
}

/// A decoded incoming wire message.
#[derive(Debug)]
pub enum Incoming {
    Reply { id: u64, reply: CommandReply },
    Event(PageEvent),
}

/// Classify one incoming JSON message. Replies carry an `id`; everything
/// with a `method` but no `id` is an event. Anything else is noise.
pub fn decode_incoming(json: &Value) -> Option<Incoming> {
    if let Some(id) = json.get("id").and_then(Value::as_u64) {
        return Some(Incoming::Reply {
            id,
            reply: CommandReply {
                result: json.get("result").cloned(),
                error: json
                    .get("error")
                    .and_then(|e| serde_json::from_value(e.clone()).ok()),
            },
        });
    }
    let method = json.get("method")?.as_str()?.to_string();
    Some(Incoming::Event(PageEvent {
        method,
        params: json.get("params").cloned().unwrap_or(Value::Null),
    }))
}

/// One CDP WebSocket connection to a page target.
pub struct CdpConnection {
    next_id: AtomicU64,
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<CommandReply>>>>,
    sink: Arc<Mutex<WsSink>>,
    events: mpsc::UnboundedReceiver<PageEvent>,
    _reader: tokio::task::JoinHandle<()>,
}

impl CdpConnection {
    /// Connect to a page target's `webSocketDebuggerUrl`.
    pub async fn connect(ws_url: &str) -> Result<Self, BrowserError> {
        let (stream, _) = tokio_tungstenite::connect_async(ws_url).await.map_err(|e| {
            BrowserError::ConnectionFailed {
                url: ws_url.to_string(),
                reason: e.to_string(),
            }
        })?;
        tracing::debug!(url = ws_url, "CDP connection established");

        let (sink, source) = stream.split();
        let pending: Arc<Mutex<HashMap<u64, oneshot::Sender<CommandReply>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let (event_tx, events) = mpsc::unbounded_channel();

        let reader_pending = Arc::clone(&pending);
        let reader = tokio::spawn(async move {
            Self::read_loop(source, reader_pending, event_tx).await;
        });

        Ok(Self {
            next_id: AtomicU64::new(1),
            pending,
            sink: Arc::new(Mutex::new(sink)),
            events,
            _reader: reader,
        })
    }

    /// Send a command and wait for its reply with the default deadline.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, BrowserError> {
        self.call_with_deadline(method, params, COMMAND_DEADLINE).await
    }

    /// Send a command and wait for its reply.
    pub async fn call_with_deadline(
        &self,
        method: &str,
        params: Value,
        deadline: Duration,
    ) -> Result<Value, BrowserError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let frame = serde_json::json!({ "id": id, "method": method, "params": params });
        let text = frame.to_string();

        tracing::trace!(id, method, "sending CDP command");

        // Register before sending so a fast reply cannot slip past us.
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        {
            let mut sink = self.sink.lock().await;
            sink.send(Message::Text(text.into()))
                .await
                .map_err(|e| BrowserError::Protocol {
                    detail: format!("failed to send WebSocket message: {e}"),
                })?;
        }

        let reply = tokio::time::timeout(deadline, rx)
            .await
            .map_err(|_| BrowserError::CommandTimeout {
                method: method.to_string(),
                duration: deadline,
            })?
            .map_err(|_| BrowserError::Protocol {
                detail: "reply channel closed".to_string(),
            })?;

        if let Some(err) = reply.error {
            return Err(BrowserError::Cdp {
                code: err.code,
                message: err.message,
            });
        }
        Ok(reply.result.unwrap_or(Value::Null))
    }

    /// Receive the next event, or `None` once the socket is gone.
    pub async fn next_event(&mut self) -> Option<PageEvent> {
        self.events.recv().await
    }

    /// Send `{domain}.enable`; most domains stay silent until enabled.
    pub async fn enable(&self, domain: &str) -> Result<(), BrowserError> {
        self.call(&format!("{domain}.enable"), serde_json::json!({}))
            .await?;
        Ok(())
    }

    async fn read_loop(
        mut source: WsSource,
        pending: Arc<Mutex<HashMap<u64, oneshot::Sender<CommandReply>>>>,
        event_tx: mpsc::UnboundedSender<PageEvent>,
    ) {
        while let Some(next) = source.next().await {
            let msg = match next {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!(error = %e, "WebSocket read error, stopping reader");
                    break;
                }
            };
            let text = match msg {
                Message::Text(t) => t.to_string(),
                Message::Close(_) => {
                    tracing::debug!("WebSocket closed by remote");
                    break;
                }
                _ => continue,
            };
            let json: Value = match serde_json::from_str(&text) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(error = %e, "unparsable CDP message, skipping");
                    continue;
                }
            };
            match decode_incoming(&json) {
                Some(Incoming::Reply { id, reply }) => {
                    if let Some(tx) = pending.lock().await.remove(&id) {
                        let _ = tx.send(reply);
                    } else {
                        tracing::trace!(id, "reply for unknown command id");
                    }
                }
                Some(Incoming::Event(event)) => {
                    // Dropped if nobody is listening.
                    let _ = event_tx.send(event);
                }
                None => {}
            }
        }

        // Fail all in-flight commands once the socket is gone.
        for (_, tx) in pending.lock().await.drain() {
            let _ = tx.send(CommandReply {
                result: None,
                error: Some(WireError {
                    code: -1,
                    message: "WebSocket connection closed".to_string(),
                }),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_with_result_decodes() {
        let json = serde_json::json!({"id": 3, "result": {"frameId": "F1"}});
        match decode_incoming(&json) {
            Some(Incoming::Reply { id, reply }) => {
                assert_eq!(id, 3);
                assert_eq!(reply.result.unwrap()["frameId"], "F1");
                assert!(reply.error.is_none());
            }
            other => panic!("expected reply, got {other:?}"),
        }
    }

    #[test]
    fn reply_with_error_decodes() {
        let json = serde_json::json!({
            "id": 9,
            "error": {"code": -32602, "message": "Invalid params"}
        });
        match decode_incoming(&json) {
            Some(Incoming::Reply { reply, .. }) => {
                let err = reply.error.unwrap();
                assert_eq!(err.code, -32602);
                assert_eq!(err.message, "Invalid params");
            }
            other => panic!("expected reply, got {other:?}"),
        }
    }

    #[test]
    fn message_without_id_is_an_event() {
        let json = serde_json::json!({
            "method": "Page.loadEventFired",
            "params": {"timestamp": 12.5}
        });
        match decode_incoming(&json) {
            Some(Incoming::Event(event)) => {
                assert_eq!(event.method, "Page.loadEventFired");
                assert_eq!(event.params["timestamp"], 12.5);
            }
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[test]
    fn event_without_params_gets_null() {
        let json = serde_json::json!({"method": "Page.domContentEventFired"});
        match decode_incoming(&json) {
            Some(Incoming::Event(event)) => assert_eq!(event.params, Value::Null),
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[test]
    fn message_with_neither_id_nor_method_is_noise() {
        let json = serde_json::json!({"params": {"x": 1}});
        assert!(decode_incoming(&json).is_none());
    }

    #[test]
    fn message_with_id_and_method_is_a_reply() {
        // DevTools never sends both, but id wins if it did.
        let json = serde_json::json!({"id": 1, "method": "Page.navigate", "result": {}});
        assert!(matches!(decode_incoming(&json), Some(Incoming::Reply { .. })));
    }
}
