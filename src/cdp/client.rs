use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant};

use super::error::CdpError;
use super::transport::{RingEvent, TransportCommand, TransportHandle, spawn_transport};
use super::types::CdpEvent;

/// Configuration for a CDP session connection.
#[derive(Debug, Clone)]
pub struct CdpConfig {
    /// Timeout for the initial WebSocket connection (default: 10s).
    pub connect_timeout: Duration,
    /// Timeout for individual CDP commands (default: 30s).
    pub command_timeout: Duration,
    /// Capacity of the internal command and event channels (default: 256).
    pub channel_capacity: usize,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(30),
            channel_capacity: 256,
        }
    }
}

/// One CDP session: exclusively owns one WebSocket to one target.
///
/// Commands and session-scoped state (pending map, subscribers, event ring,
/// network registry, document version) live in a background transport task;
/// this handle is cheap to clone and share across tool-call dispatch tasks.
#[derive(Debug, Clone)]
pub struct CdpSession {
    handle: TransportHandle,
    config: CdpConfig,
    ws_url: String,
    target_id: String,
}

impl CdpSession {
    /// Open a WebSocket to `ws_url` and auto-enable the standard domain
    /// set: `Page`, `Runtime`, `Network`, `DOM`, followed by
    /// `Page.setLifecycleEventsEnabled`.
    ///
    /// # Errors
    ///
    /// Returns `CdpError::Connection`/`ConnectionTimeout` if the WebSocket
    /// cannot be established, or any error from the auto-enable commands.
    pub async fn connect(
        target_id: &str,
        ws_url: &str,
        config: CdpConfig,
    ) -> Result<Self, CdpError> {
        let handle = spawn_transport(ws_url, config.channel_capacity, config.connect_timeout).await?;
        let session = Self {
            handle,
            config,
            ws_url: ws_url.to_owned(),
            target_id: target_id.to_owned(),
        };
        session.auto_enable_domains().await?;
        Ok(session)
    }

    async fn auto_enable_domains(&self) -> Result<(), CdpError> {
        self.ensure_domain("Page", "Page.enable", None).await?;
        self.ensure_domain("Runtime", "Runtime.enable", None).await?;
        self.ensure_domain(
            "Network",
            "Network.enable",
            Some(json!({
                "maxResourceBufferSize": 10 * 1024 * 1024,
                "maxTotalBufferSize": 50 * 1024 * 1024,
            })),
        )
        .await?;
        self.ensure_domain("DOM", "DOM.enable", None).await?;
        self.send_command(
            "Page.setLifecycleEventsEnabled",
            Some(json!({ "enabled": true })),
        )
        .await?;
        Ok(())
    }

    /// Idempotently enable a CDP domain: the first caller to claim `domain`
    /// issues `enable_method`; later callers are no-ops. If the enable
    /// command fails, the claim is released so a later call can retry.
    ///
    /// # Errors
    ///
    /// Returns any error from issuing `enable_method`, or `CdpError::Internal`
    /// if the transport task has exited.
    pub async fn ensure_domain(
        &self,
        domain: &str,
        enable_method: &str,
        params: Option<Value>,
    ) -> Result<(), CdpError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.handle
            .send(TransportCommand::ClaimDomain {
                domain: domain.to_owned(),
                reply_tx,
            })
            .await?;
        let claimed = reply_rx
            .await
            .map_err(|_| CdpError::Internal("transport task exited before claiming domain".into()))?;
        if !claimed {
            return Ok(());
        }
        if let Err(e) = self.send_command(enable_method, params).await {
            let _ = self
                .handle
                .send(TransportCommand::ReleaseDomain {
                    domain: domain.to_owned(),
                })
                .await;
            return Err(e);
        }
        Ok(())
    }

    /// Send a CDP command and await its response.
    ///
    /// # Errors
    ///
    /// Returns `CdpError::CommandTimeout` if the browser does not respond
    /// within the configured timeout, `CdpError::Protocol` if the browser
    /// returns an error, or `CdpError::NotConnected`/`Internal` if the
    /// transport is unavailable.
    pub async fn send_command(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, CdpError> {
        if !self.handle.is_connected() {
            return Err(CdpError::NotConnected);
        }
        let id = self.handle.next_message_id();
        let command = super::types::CdpCommand {
            id,
            method: method.to_owned(),
            params,
        };

        let (response_tx, response_rx) = oneshot::channel();
        let deadline = Instant::now() + self.config.command_timeout;

        self.handle
            .send(TransportCommand::SendCommand {
                command,
                response_tx,
                deadline,
            })
            .await?;

        response_rx
            .await
            .map_err(|_| CdpError::Internal("transport task exited before responding".into()))?
    }

    /// Subscribe to events matching `method` (`"*"` for every event).
    ///
    /// # Errors
    ///
    /// Returns `CdpError::Internal` if the transport task has exited.
    pub async fn subscribe(&self, method: &str) -> Result<mpsc::Receiver<CdpEvent>, CdpError> {
        let (event_tx, event_rx) = mpsc::channel(self.config.channel_capacity);
        self.handle
            .send(TransportCommand::Subscribe {
                method: method.to_owned(),
                event_tx,
            })
            .await?;
        Ok(event_rx)
    }

    /// Pull-style retrieval of recently observed events.
    ///
    /// # Errors
    ///
    /// Returns `CdpError::Internal` if the transport task has exited.
    pub async fn buffered_events(
        &self,
        method: Option<&str>,
        since_ts_ms: u64,
    ) -> Result<Vec<RingEvent>, CdpError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.handle
            .send(TransportCommand::BufferedEvents {
                method: method.map(str::to_owned),
                since_ts_ms,
                reply_tx,
            })
            .await?;
        reply_rx
            .await
            .map_err(|_| CdpError::Internal("transport task exited before replying".into()))
    }

    /// # Errors
    ///
    /// Returns `CdpError::Internal` if the transport task has exited.
    pub async fn clear_event_ring(&self) -> Result<(), CdpError> {
        self.handle.send(TransportCommand::ClearEventRing).await
    }

    /// Read `(doc_version, root_node_id)`.
    ///
    /// # Errors
    ///
    /// Returns `CdpError::Internal` if the transport task has exited.
    pub async fn doc_state(&self) -> Result<(u64, Option<i64>), CdpError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.handle
            .send(TransportCommand::DocState { reply_tx })
            .await?;
        reply_rx
            .await
            .map_err(|_| CdpError::Internal("transport task exited before replying".into()))
    }

    /// Cache a freshly queried document root node id, tagged with the
    /// document version it was valid for.
    ///
    /// # Errors
    ///
    /// Returns `CdpError::Internal` if the transport task has exited.
    pub async fn set_root_node_id(&self, node_id: i64, doc_version: u64) -> Result<(), CdpError> {
        self.handle
            .send(TransportCommand::SetRootNodeId {
                node_id,
                doc_version,
            })
            .await
    }

    /// Look up the HTTP method recorded for `request_id` by the State
    /// Tracker (never derived from `Network.responseReceived`).
    ///
    /// # Errors
    ///
    /// Returns `CdpError::Internal` if the transport task has exited.
    pub async fn lookup_request_method(
        &self,
        request_id: &str,
    ) -> Result<Option<String>, CdpError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.handle
            .send(TransportCommand::LookupRequestMethod {
                request_id: request_id.to_owned(),
                reply_tx,
            })
            .await?;
        reply_rx
            .await
            .map_err(|_| CdpError::Internal("transport task exited before replying".into()))
    }

    /// Gracefully close the WebSocket connection.
    ///
    /// # Errors
    ///
    /// Returns `CdpError::Internal` if the transport task has already exited.
    pub async fn close(&self) -> Result<(), CdpError> {
        self.handle.send(TransportCommand::Shutdown).await
    }

    /// Check if the session's socket is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.handle.is_connected()
    }

    /// The target id this session is bound to.
    #[must_use]
    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// The WebSocket URL this session is connected to.
    #[must_use]
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }
}
