//! Duplex Transport: accepts concurrent tool-calling clients over WebSocket
//! and routes each envelope through the Tool Dispatcher.
//!
//! Each accepted connection gets its own client id and its own outbound
//! channel; a dispatch task spawned for an inbound envelope captures that
//! client's handle directly, so a response can only ever reach the client
//! it was dispatched for. That structural guarantee stands in for an
//! explicit `envelope_id -> client_id` lookup table: there is no shared map
//! to consult, so one client's envelope ids can never collide with
//! another's, and disconnecting a client (removing it from `clients`) is
//! all that is needed to drop every response still in flight for it.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

use crate::dispatcher;
use crate::error::BridgeError;
use crate::session_registry::SessionRegistry;

#[derive(Debug, Deserialize)]
struct InboundEnvelope {
    id: String,
    payload: ToolCallPayload,
}

#[derive(Debug, Deserialize)]
struct ToolCallPayload {
    params: ToolCallParams,
    #[serde(default)]
    id: Value,
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Serialize)]
struct OutboundEnvelope {
    id: String,
    direction: &'static str,
    timestamp: u64,
    payload: ResponsePayload,
}

#[derive(Debug, Serialize)]
struct ResponsePayload {
    #[serde(rename = "requestId")]
    request_id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl OutboundEnvelope {
    fn from_result(envelope_id: String, request_id: Value, result: Result<Value, BridgeError>) -> Self {
        let payload = match result {
            Ok(value) => ResponsePayload { request_id, result: Some(value), error: None },
            Err(err) => {
                let envelope = err.to_envelope();
                ResponsePayload {
                    request_id,
                    result: None,
                    error: Some(ErrorBody { code: envelope.code, message: envelope.message.to_owned() }),
                }
            }
        };
        Self { id: envelope_id, direction: "from-chrome", timestamp: now_ms(), payload }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Per-connection state: the channel a dispatch task writes a response
/// through, and the set of envelope ids currently outstanding for this
/// client.
struct ClientHandle {
    outbound_tx: mpsc::Sender<Message>,
    outstanding: StdMutex<HashSet<String>>,
}

/// Accepts client WebSocket connections on a fixed port and routes each
/// envelope's `tools/call` payload to the Tool Dispatcher.
pub struct DuplexTransport {
    sessions: Arc<SessionRegistry>,
    clients: Mutex<std::collections::HashMap<u64, Arc<ClientHandle>>>,
    next_client_id: AtomicU64,
}

impl DuplexTransport {
    #[must_use]
    pub fn new(sessions: Arc<SessionRegistry>) -> Self {
        Self {
            sessions,
            clients: Mutex::new(std::collections::HashMap::new()),
            next_client_id: AtomicU64::new(1),
        }
    }

    /// Binds `listen_addr` and accepts client connections until the
    /// listener itself fails (process shutdown is handled by the caller).
    ///
    /// # Errors
    ///
    /// Returns the I/O error if binding the listen address fails.
    pub async fn serve(self: Arc<Self>, listen_addr: SocketAddr) -> std::io::Result<()> {
        let listener = TcpListener::bind(listen_addr).await?;
        info!(%listen_addr, "duplex transport listening");
        self.accept_loop(listener).await
    }

    /// Runs the accept loop against an already-bound listener. Split out
    /// from `serve` so tests can bind to an OS-assigned port and read back
    /// its address before handing the listener off.
    async fn accept_loop(self: Arc<Self>, listener: TcpListener) -> std::io::Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            let this = Arc::clone(&self);
            tokio::spawn(async move {
                this.handle_connection(stream, peer).await;
            });
        }
    }

    async fn handle_connection(self: Arc<Self>, stream: TcpStream, peer: SocketAddr) {
        let ws = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(err) => {
                warn!(%peer, error = %err, "websocket handshake failed");
                return;
            }
        };
        let (mut sink, mut source) = ws.split();
        let client_id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(64);
        let handle = Arc::new(ClientHandle {
            outbound_tx,
            outstanding: StdMutex::new(HashSet::new()),
        });
        self.clients.lock().await.insert(client_id, Arc::clone(&handle));
        info!(client_id, %peer, "client connected");

        let writer = tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                if sink.send(msg).await.is_err() {
                    break;
                }
            }
        });

        while let Some(msg) = source.next().await {
            match msg {
                Ok(Message::Text(text)) => self.handle_inbound(client_id, text.as_str()).await,
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(err) => {
                    warn!(client_id, error = %err, "client socket error");
                    break;
                }
            }
        }

        self.clients.lock().await.remove(&client_id);
        writer.abort();
        info!(client_id, "client disconnected");
    }

    async fn handle_inbound(self: &Arc<Self>, client_id: u64, text: &str) {
        let envelope: InboundEnvelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(client_id, error = %err, "malformed envelope, dropping");
                return;
            }
        };

        {
            let clients = self.clients.lock().await;
            let Some(handle) = clients.get(&client_id) else {
                return;
            };
            handle.outstanding.lock().unwrap().insert(envelope.id.clone());
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let started_at = Instant::now();
            let tool_name = envelope.payload.params.name.clone();
            let result =
                dispatcher::dispatch_tool_call(&this.sessions, &tool_name, &envelope.payload.params.arguments)
                    .await;
            let elapsed_ms = started_at.elapsed().as_millis();
            match &result {
                Ok(_) => info!(client_id, tool = %tool_name, elapsed_ms, "tool dispatch ok"),
                Err(err) => {
                    info!(client_id, tool = %tool_name, elapsed_ms, error = %err, "tool dispatch failed");
                }
            }
            this.emit_response(client_id, envelope, result).await;
        });
    }

    async fn emit_response(&self, client_id: u64, envelope: InboundEnvelope, result: Result<Value, BridgeError>) {
        let clients = self.clients.lock().await;
        let Some(handle) = clients.get(&client_id) else {
            // Client disconnected before the dispatch finished; drop the response.
            return;
        };
        handle.outstanding.lock().unwrap().remove(&envelope.id);
        let outbound = OutboundEnvelope::from_result(envelope.id, envelope.payload.id, result);
        match serde_json::to_string(&outbound) {
            Ok(text) => {
                let _ = handle.outbound_tx.try_send(Message::Text(text.into()));
            }
            Err(err) => warn!(client_id, error = %err, "failed to serialize response envelope"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_envelope_carries_result_not_error_on_success() {
        let envelope =
            OutboundEnvelope::from_result("e1".into(), Value::from(7), Ok(serde_json::json!({"ok": true})));
        assert_eq!(envelope.id, "e1");
        assert_eq!(envelope.direction, "from-chrome");
        assert!(envelope.payload.result.is_some());
        assert!(envelope.payload.error.is_none());
    }

    #[test]
    fn outbound_envelope_carries_error_not_result_on_failure() {
        let envelope = OutboundEnvelope::from_result(
            "e2".into(),
            Value::from(7),
            Err(BridgeError::not_found("tab")),
        );
        assert!(envelope.payload.result.is_none());
        let error = envelope.payload.error.unwrap();
        assert_eq!(error.code, "NotFound");
    }

    fn same_id_envelope() -> String {
        serde_json::json!({
            "id": "7",
            "payload": { "params": { "name": "not_a_real_tool", "arguments": {} }, "id": 7 }
        })
        .to_string()
    }

    #[tokio::test]
    async fn disconnecting_one_client_never_routes_its_response_to_another() {
        use crate::cdp::CdpConfig;
        use crate::registry::TargetRegistry;

        let registry = SessionRegistry::new(TargetRegistry::new("127.0.0.1", 1), CdpConfig::default());
        let transport = Arc::new(DuplexTransport::new(Arc::new(registry)));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(Arc::clone(&transport).accept_loop(listener));

        let url = format!("ws://{addr}");

        // C1 sends envelope id "7", then disconnects before any response
        // can reach it.
        let (mut c1, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
        c1.send(Message::Text(same_id_envelope().into())).await.unwrap();
        drop(c1);

        // C2 independently sends the same envelope id "7".
        let (mut c2, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
        c2.send(Message::Text(same_id_envelope().into())).await.unwrap();

        let response = tokio::time::timeout(std::time::Duration::from_secs(2), c2.next())
            .await
            .expect("c2 should receive a response")
            .expect("stream should not end")
            .expect("frame should not error");
        let Message::Text(text) = response else {
            panic!("expected a text frame")
        };
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["id"], "7");
        assert_eq!(parsed["payload"]["error"]["code"], "BadArguments");

        // No second response lands on C2 for the id C1 used.
        let extra = tokio::time::timeout(std::time::Duration::from_millis(200), c2.next()).await;
        assert!(
            extra.is_err(),
            "c2 should not receive a second response for the envelope id c1 sent"
        );
    }
}
