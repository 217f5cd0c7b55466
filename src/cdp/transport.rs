use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::error::CdpError;
use super::types::{CdpCommand, CdpEvent, MessageKind, RawCdpMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Capacity of the event ring, FIFO eviction.
const EVENT_RING_CAPACITY: usize = 1000;

/// Capacity of the network request registry, FIFO eviction.
const NETWORK_REQUESTS_CAPACITY: usize = 500;

/// An event retained in the bounded ring, for pull-style retrieval via
/// `buffered_events`.
#[derive(Debug, Clone)]
pub struct RingEvent {
    pub method: String,
    pub params: Value,
    pub timestamp_ms: u64,
}

/// A tracked network request, keyed by CDP `requestId`.
#[derive(Debug, Clone)]
pub struct NetworkRequestEntry {
    pub url: String,
    pub http_method: String,
    pub sent_at_ms: u64,
    pub finished_at_ms: Option<u64>,
}

/// Command sent from a `CdpSession` handle to the background transport task.
pub enum TransportCommand {
    /// Send a CDP command and deliver the response via the oneshot channel.
    SendCommand {
        command: CdpCommand,
        response_tx: oneshot::Sender<Result<Value, CdpError>>,
        deadline: Instant,
    },
    /// Subscribe to events matching a method name (`"*"` for every event).
    Subscribe {
        method: String,
        event_tx: mpsc::Sender<CdpEvent>,
    },
    /// Return the slice of the event ring matching `method` (if given) and
    /// at or after `since_ts_ms`.
    BufferedEvents {
        method: Option<String>,
        since_ts_ms: u64,
        reply_tx: oneshot::Sender<Vec<RingEvent>>,
    },
    /// Empty the event ring. Subscribers are unaffected.
    ClearEventRing,
    /// Read the current `(doc_version, root_node_id)` pair.
    DocState {
        reply_tx: oneshot::Sender<(u64, Option<i64>)>,
    },
    /// Cache a freshly queried document root, tagged with the document
    /// version it was valid for. Ignored if `doc_version` has since
    /// advanced.
    SetRootNodeId { node_id: i64, doc_version: u64 },
    /// Look up the HTTP method recorded for a request id by the State
    /// Tracker (never taken from `responseReceived`).
    LookupRequestMethod {
        request_id: String,
        reply_tx: oneshot::Sender<Option<String>>,
    },
    /// Atomically claim a domain as "being enabled". Replies `true` if this
    /// call is the first to claim it (the caller must now issue the actual
    /// `<Domain>.enable` command), `false` if another caller already has.
    ClaimDomain {
        domain: String,
        reply_tx: oneshot::Sender<bool>,
    },
    /// Release a claim made by `ClaimDomain` whose enable command failed,
    /// so a later call can retry.
    ReleaseDomain { domain: String },
    /// Shut down the transport gracefully.
    Shutdown,
}

/// Tracks an in-flight command awaiting its response.
struct PendingRequest {
    response_tx: oneshot::Sender<Result<Value, CdpError>>,
    method: String,
    deadline: Instant,
}

/// Clonable handle for communicating with the transport task.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    command_tx: mpsc::Sender<TransportCommand>,
    connected: Arc<AtomicBool>,
    next_id: Arc<AtomicU64>,
}

impl TransportHandle {
    /// Send a transport command to the background task.
    ///
    /// # Errors
    ///
    /// Returns `CdpError::Internal` if the transport task has exited.
    pub async fn send(&self, cmd: TransportCommand) -> Result<(), CdpError> {
        self.command_tx
            .send(cmd)
            .await
            .map_err(|_| CdpError::Internal("transport task is not running".into()))
    }

    /// Check whether the transport is currently connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Generate the next unique message ID for this connection.
    pub fn next_message_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Spawn the transport background task, opening the WebSocket to `url`.
///
/// Returns a `TransportHandle` for sending commands to the task.
///
/// # Errors
///
/// Returns `CdpError::Connection` or `CdpError::ConnectionTimeout` if the
/// initial WebSocket connection cannot be established.
pub async fn spawn_transport(
    url: &str,
    channel_capacity: usize,
    connect_timeout: Duration,
) -> Result<TransportHandle, CdpError> {
    let ws_stream = connect_ws(url, connect_timeout).await?;
    let connected = Arc::new(AtomicBool::new(true));
    let next_id = Arc::new(AtomicU64::new(1));
    let (command_tx, command_rx) = mpsc::channel(channel_capacity);

    let handle = TransportHandle {
        command_tx,
        connected: Arc::clone(&connected),
        next_id,
    };

    tokio::spawn(async move {
        let mut task = TransportTask {
            ws_stream,
            command_rx,
            pending: HashMap::new(),
            subscribers: HashMap::new(),
            event_ring: VecDeque::with_capacity(EVENT_RING_CAPACITY),
            network_requests: HashMap::new(),
            network_order: VecDeque::with_capacity(NETWORK_REQUESTS_CAPACITY),
            doc_version: 0,
            root_node_id: None,
            enabled_domains: HashSet::new(),
            connected,
            started_at: Instant::now(),
        };
        task.run().await;
    });

    Ok(handle)
}

/// Establish a WebSocket connection with a timeout.
async fn connect_ws(url: &str, timeout: Duration) -> Result<WsStream, CdpError> {
    match tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url)).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(e)) => Err(CdpError::Connection(e.to_string())),
        Err(_) => Err(CdpError::ConnectionTimeout),
    }
}

/// The background transport task that exclusively owns the WebSocket
/// connection and all session-scoped state.
struct TransportTask {
    ws_stream: WsStream,
    command_rx: mpsc::Receiver<TransportCommand>,
    pending: HashMap<u64, PendingRequest>,
    subscribers: HashMap<String, Vec<mpsc::Sender<CdpEvent>>>,
    event_ring: VecDeque<RingEvent>,
    network_requests: HashMap<String, NetworkRequestEntry>,
    network_order: VecDeque<String>,
    doc_version: u64,
    root_node_id: Option<i64>,
    enabled_domains: HashSet<String>,
    connected: Arc<AtomicBool>,
    started_at: Instant,
}

impl TransportTask {
    async fn run(&mut self) {
        loop {
            let next_deadline = self.earliest_deadline();
            let timeout_sleep = async {
                if let Some(deadline) = next_deadline {
                    tokio::time::sleep_until(deadline).await;
                } else {
                    std::future::pending::<()>().await;
                }
            };

            tokio::select! {
                ws_msg = self.ws_stream.next() => {
                    match ws_msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text_message(&text);
                        }
                        Some(Ok(Message::Close(_)) | Err(_)) | None => {
                            self.handle_disconnect().await;
                            return;
                        }
                        Some(Ok(_)) => {
                            // Binary, Ping, Pong, Frame — ignore
                        }
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(TransportCommand::SendCommand { command, response_tx, deadline }) => {
                            self.handle_send_command(command, response_tx, deadline).await;
                        }
                        Some(TransportCommand::Subscribe { method, event_tx }) => {
                            self.subscribers.entry(method).or_default().push(event_tx);
                        }
                        Some(TransportCommand::BufferedEvents { method, since_ts_ms, reply_tx }) => {
                            let events = self
                                .event_ring
                                .iter()
                                .filter(|e| {
                                    e.timestamp_ms >= since_ts_ms
                                        && method.as_deref().is_none_or(|m| m == e.method)
                                })
                                .cloned()
                                .collect();
                            let _ = reply_tx.send(events);
                        }
                        Some(TransportCommand::ClearEventRing) => {
                            self.event_ring.clear();
                        }
                        Some(TransportCommand::DocState { reply_tx }) => {
                            let _ = reply_tx.send((self.doc_version, self.root_node_id));
                        }
                        Some(TransportCommand::SetRootNodeId { node_id, doc_version }) => {
                            if doc_version == self.doc_version {
                                self.root_node_id = Some(node_id);
                            }
                        }
                        Some(TransportCommand::LookupRequestMethod { request_id, reply_tx }) => {
                            let method = self
                                .network_requests
                                .get(&request_id)
                                .map(|e| e.http_method.clone());
                            let _ = reply_tx.send(method);
                        }
                        Some(TransportCommand::ClaimDomain { domain, reply_tx }) => {
                            let claimed = self.enabled_domains.insert(domain);
                            let _ = reply_tx.send(claimed);
                        }
                        Some(TransportCommand::ReleaseDomain { domain }) => {
                            self.enabled_domains.remove(&domain);
                        }
                        Some(TransportCommand::Shutdown) | None => {
                            self.drain_pending();
                            let _ = self.ws_stream.close(None).await;
                            self.connected.store(false, Ordering::Relaxed);
                            return;
                        }
                    }
                }

                () = timeout_sleep => {
                    self.sweep_timeouts();
                }
            }
        }
    }

    fn handle_text_message(&mut self, text: &str) {
        let Ok(raw) = serde_json::from_str::<RawCdpMessage>(text) else {
            return;
        };

        let Some(kind) = raw.classify() else {
            return;
        };

        match kind {
            MessageKind::Response(response) => {
                if let Some(pending) = self.pending.remove(&response.id) {
                    let result = match response.result {
                        Ok(value) => Ok(value),
                        Err(proto_err) => Err(CdpError::Protocol {
                            code: proto_err.code,
                            message: proto_err.message,
                        }),
                    };
                    let _ = pending.response_tx.send(result);
                }
            }
            MessageKind::Event { method, params } => {
                let timestamp_ms = self.started_at.elapsed().as_millis() as u64;
                self.append_to_ring(&method, &params, timestamp_ms);
                self.dispatch_event(&method, &params, timestamp_ms);
                self.update_state_tracker(&method, &params, timestamp_ms);
            }
        }
    }

    fn append_to_ring(&mut self, method: &str, params: &Value, timestamp_ms: u64) {
        if self.event_ring.len() >= EVENT_RING_CAPACITY {
            self.event_ring.pop_front();
        }
        self.event_ring.push_back(RingEvent {
            method: method.to_owned(),
            params: params.clone(),
            timestamp_ms,
        });
    }

    fn dispatch_event(&mut self, method: &str, params: &Value, timestamp_ms: u64) {
        let event = CdpEvent {
            method: method.to_owned(),
            params: params.clone(),
            timestamp_ms,
        };
        for key in [method, "*"] {
            if let Some(senders) = self.subscribers.get_mut(key) {
                senders.retain(|tx| tx.try_send(event.clone()).is_ok() || !tx.is_closed());
                if senders.is_empty() {
                    self.subscribers.remove(key);
                }
            }
        }
    }

    /// Derived state kept by observing events.
    fn update_state_tracker(&mut self, method: &str, params: &Value, now_ms: u64) {
        match method {
            "DOM.documentUpdated" => self.advance_doc_version(),
            "Page.frameNavigated" => {
                let is_main_frame = params
                    .get("frame")
                    .and_then(|f| f.get("parentId"))
                    .is_none();
                if is_main_frame {
                    self.advance_doc_version();
                }
            }
            "Network.requestWillBeSent" => {
                let Some(request_id) = params.get("requestId").and_then(Value::as_str) else {
                    return;
                };
                let url = params
                    .get("request")
                    .and_then(|r| r.get("url"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned();
                let http_method = params
                    .get("request")
                    .and_then(|r| r.get("method"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned();
                if self.network_order.len() >= NETWORK_REQUESTS_CAPACITY
                    && let Some(oldest) = self.network_order.pop_front()
                {
                    self.network_requests.remove(&oldest);
                }
                self.network_order.push_back(request_id.to_owned());
                self.network_requests.insert(
                    request_id.to_owned(),
                    NetworkRequestEntry {
                        url,
                        http_method,
                        sent_at_ms: now_ms,
                        finished_at_ms: None,
                    },
                );
            }
            "Network.loadingFinished" | "Network.loadingFailed" => {
                if let Some(request_id) = params.get("requestId").and_then(Value::as_str)
                    && let Some(entry) = self.network_requests.get_mut(request_id)
                {
                    entry.finished_at_ms = Some(now_ms);
                }
            }
            _ => {}
        }
    }

    fn advance_doc_version(&mut self) {
        self.doc_version += 1;
        self.root_node_id = None;
    }

    async fn handle_send_command(
        &mut self,
        command: CdpCommand,
        response_tx: oneshot::Sender<Result<Value, CdpError>>,
        deadline: Instant,
    ) {
        let id = command.id;
        let method = command.method.clone();

        let json = match serde_json::to_string(&command) {
            Ok(j) => j,
            Err(e) => {
                let _ =
                    response_tx.send(Err(CdpError::Internal(format!("serialization error: {e}"))));
                return;
            }
        };

        if let Err(e) = self.ws_stream.send(Message::Text(json.into())).await {
            let _ = response_tx.send(Err(CdpError::Connection(format!(
                "WebSocket write error: {e}"
            ))));
            return;
        }

        self.pending.insert(
            id,
            PendingRequest {
                response_tx,
                method,
                deadline,
            },
        );
    }

    fn earliest_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    fn sweep_timeouts(&mut self) {
        let now = Instant::now();
        let timed_out: Vec<u64> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(&id, _)| id)
            .collect();

        for id in timed_out {
            if let Some(pending) = self.pending.remove(&id) {
                let _ = pending.response_tx.send(Err(CdpError::CommandTimeout {
                    method: pending.method,
                }));
            }
        }
    }

    fn drain_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        for (_, req) in pending {
            let _ = req.response_tx.send(Err(CdpError::NotConnected));
        }
    }

    /// On close, clear all session-scoped state — but only because this
    /// task instance is, by construction, the only owner of this socket's
    /// state; a superseded task never runs this path since its `connected`
    /// flag belongs to a handle no one holds anymore.
    async fn handle_disconnect(&mut self) {
        self.connected.store(false, Ordering::Relaxed);
        self.drain_pending();
        self.subscribers.clear();
        self.event_ring.clear();
        self.network_requests.clear();
        self.network_order.clear();
        self.enabled_domains.clear();
    }
}
