//! Integration tests for the CDP session/transport layer. Each test spins
//! up a mock WebSocket server standing in for a browser's
//! `/devtools/page/<id>` endpoint and drives a real `CdpSession` against
//! it.

use std::net::SocketAddr;
use std::time::Duration;

use cdp_bridge_host::cdp::{CdpConfig, CdpError, CdpSession};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

// =============================================================================
// Mock server helpers
// =============================================================================

/// Echoes `{"id": N, "result": {}}` for every command, which is enough to
/// satisfy `CdpSession::connect`'s auto-enable handshake (Page/Runtime/
/// Network/DOM.enable, Page.setLifecycleEventsEnabled).
async fn start_echo_server() -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let (mut sink, mut source) = ws.split();
                while let Some(Ok(msg)) = source.next().await {
                    if let Message::Text(text) = msg {
                        let cmd: Value = serde_json::from_str(&text).unwrap();
                        let response = json!({"id": cmd["id"], "result": {}});
                        sink.send(Message::Text(response.to_string().into())).await.unwrap();
                    }
                }
            });
        }
    });
    (addr, handle)
}

/// Echoes a server-computed result for every command instead of `{}`.
async fn start_custom_result_server(result_fn: fn(&Value) -> Value) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let (mut sink, mut source) = ws.split();
                while let Some(Ok(msg)) = source.next().await {
                    if let Message::Text(text) = msg {
                        let cmd: Value = serde_json::from_str(&text).unwrap();
                        let response = json!({"id": cmd["id"], "result": result_fn(&cmd)});
                        sink.send(Message::Text(response.to_string().into())).await.unwrap();
                    }
                }
            });
        }
    });
    (addr, handle)
}

/// Accepts the handshake and every command but never replies (timeout tests).
async fn start_silent_server() -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let (_sink, mut source) = ws.split();
                while source.next().await.is_some() {}
            });
        }
    });
    (addr, handle)
}

/// Returns a CDP protocol error `{code, message}` for every command after
/// the handshake has already succeeded via a prior echo round — used only
/// once the session is up, so the handshake itself is echoed.
async fn start_handshake_then_error_server(code: i64, message: &str) -> (SocketAddr, JoinHandle<()>) {
    let message = message.to_owned();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let message = message.clone();
            tokio::spawn(async move {
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let (mut sink, mut source) = ws.split();
                let mut handshake_done = false;
                while let Some(Ok(msg)) = source.next().await {
                    if let Message::Text(text) = msg {
                        let cmd: Value = serde_json::from_str(&text).unwrap();
                        let is_lifecycle = cmd["method"] == "Page.setLifecycleEventsEnabled";
                        let response = if handshake_done {
                            json!({"id": cmd["id"], "error": {"code": code, "message": message}})
                        } else {
                            json!({"id": cmd["id"], "result": {}})
                        };
                        if is_lifecycle {
                            handshake_done = true;
                        }
                        sink.send(Message::Text(response.to_string().into())).await.unwrap();
                    }
                }
            });
        }
    });
    (addr, handle)
}

/// Drops the connection after `n` successful responses.
async fn start_drop_after_server(n: usize) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let (mut sink, mut source) = ws.split();
                let mut count = 0;
                while let Some(Ok(msg)) = source.next().await {
                    if let Message::Text(text) = msg {
                        let cmd: Value = serde_json::from_str(&text).unwrap();
                        let response = json!({"id": cmd["id"], "result": {}});
                        sink.send(Message::Text(response.to_string().into())).await.unwrap();
                        count += 1;
                        if count >= n {
                            drop(sink);
                            return;
                        }
                    }
                }
            });
        }
    });
    (addr, handle)
}

/// An echo server that also lets the test push arbitrary spontaneous event
/// frames (no `id`) at will, via the returned sender.
async fn start_event_server() -> (SocketAddr, mpsc::Sender<Value>, JoinHandle<()>) {
    let (event_tx, mut event_rx) = mpsc::channel::<Value>(2048);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let (mut sink, mut source) = ws.split();
            loop {
                tokio::select! {
                    msg = source.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let cmd: Value = serde_json::from_str(&text).unwrap();
                                let response = json!({"id": cmd["id"], "result": {}});
                                sink.send(Message::Text(response.to_string().into())).await.unwrap();
                            }
                            None | Some(Err(_)) => break,
                            _ => {}
                        }
                    }
                    event = event_rx.recv() => {
                        match event {
                            Some(event) => {
                                sink.send(Message::Text(event.to_string().into())).await.unwrap();
                            }
                            None => break,
                        }
                    }
                }
            }
        }
    });
    (addr, event_tx, handle)
}

fn ws_url(addr: SocketAddr) -> String {
    format!("ws://{addr}")
}

fn quick_config() -> CdpConfig {
    CdpConfig {
        connect_timeout: Duration::from_secs(5),
        command_timeout: Duration::from_secs(5),
        channel_capacity: 256,
    }
}

/// Waits for `doc_version` to reach at least `target`, polling rather than
/// assuming a fixed event-propagation delay.
async fn wait_for_doc_version(session: &CdpSession, target: u64) -> u64 {
    for _ in 0..200 {
        let (version, _) = session.doc_state().await.unwrap();
        if version >= target {
            return version;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("doc_version never reached {target}");
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn connect_auto_enables_domains_and_reports_connected() {
    let (addr, _handle) = start_echo_server().await;
    let session = CdpSession::connect("target-1", &ws_url(addr), quick_config()).await.unwrap();
    assert!(session.is_connected());
    assert_eq!(session.target_id(), "target-1");
}

#[tokio::test]
async fn send_command_round_trip() {
    let (addr, _handle) = start_echo_server().await;
    let session = CdpSession::connect("t", &ws_url(addr), quick_config()).await.unwrap();

    let result = session
        .send_command("Page.navigate", Some(json!({"url": "https://example.com"})))
        .await;
    assert!(result.unwrap().is_object());
}

#[tokio::test]
async fn concurrent_commands_correlate_by_id() {
    let (addr, _handle) = start_custom_result_server(|cmd| json!({"echo_id": cmd["id"]})).await;
    let session = CdpSession::connect("t", &ws_url(addr), quick_config()).await.unwrap();

    let futures: Vec<_> = (0..10)
        .map(|i| {
            let session = &session;
            async move { session.send_command(&format!("Test.method{i}"), None).await }
        })
        .collect();
    let results = futures_util::future::join_all(futures).await;

    let ids: std::collections::HashSet<u64> = results
        .iter()
        .map(|r| r.as_ref().unwrap()["echo_id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids.len(), 10, "each command should resolve to its own response, never another's");
}

#[tokio::test]
async fn subscribers_receive_matching_events_only() {
    let (addr, event_tx, _handle) = start_event_server().await;
    let session = CdpSession::connect("t", &ws_url(addr), quick_config()).await.unwrap();

    let mut loads = session.subscribe("Page.loadEventFired").await.unwrap();
    let mut consoles = session.subscribe("Console.messageAdded").await.unwrap();

    event_tx
        .send(json!({"method": "Page.loadEventFired", "params": {"timestamp": 1.0}}))
        .await
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(2), loads.recv())
        .await
        .expect("timed out")
        .expect("channel closed");
    assert_eq!(event.method, "Page.loadEventFired");

    // The console subscriber never sees the load event.
    let nothing = tokio::time::timeout(Duration::from_millis(100), consoles.recv()).await;
    assert!(nothing.is_err(), "unrelated subscriber should not receive the event");
}

#[tokio::test]
async fn dropped_subscriber_does_not_disrupt_the_session() {
    let (addr, event_tx, _handle) = start_event_server().await;
    let session = CdpSession::connect("t", &ws_url(addr), quick_config()).await.unwrap();

    let rx = session.subscribe("Console.messageAdded").await.unwrap();
    drop(rx);
    tokio::time::sleep(Duration::from_millis(50)).await;

    event_tx
        .send(json!({"method": "Console.messageAdded", "params": {"text": "hello"}}))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(session.is_connected());
}

#[tokio::test]
async fn event_ring_evicts_oldest_past_capacity() {
    let (addr, event_tx, _handle) = start_event_server().await;
    let session = CdpSession::connect("t", &ws_url(addr), quick_config()).await.unwrap();

    // Ring capacity is 1000; push past it and confirm FIFO eviction.
    const TOTAL: usize = 1010;
    for i in 0..TOTAL {
        event_tx
            .send(json!({"method": "Custom.tagged", "params": {"i": i}}))
            .await
            .unwrap();
    }

    // Give the transport task time to drain the channel.
    let mut buffered = Vec::new();
    for _ in 0..100 {
        buffered = session.buffered_events(Some("Custom.tagged"), 0).await.unwrap();
        if buffered.len() == 1000 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(buffered.len(), 1000, "ring should be capped at 1000 events");
    let first_i = buffered.first().unwrap().params["i"].as_u64().unwrap();
    let last_i = buffered.last().unwrap().params["i"].as_u64().unwrap();
    assert_eq!(first_i, (TOTAL - 1000) as u64, "oldest 10 events should have been evicted");
    assert_eq!(last_i, (TOTAL - 1) as u64);
}

#[tokio::test]
async fn clear_event_ring_empties_buffered_events() {
    let (addr, event_tx, _handle) = start_event_server().await;
    let session = CdpSession::connect("t", &ws_url(addr), quick_config()).await.unwrap();

    event_tx.send(json!({"method": "Custom.tagged", "params": {}})).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!session.buffered_events(None, 0).await.unwrap().is_empty());

    session.clear_event_ring().await.unwrap();
    assert!(session.buffered_events(None, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn doc_version_advances_on_document_updated_and_main_frame_navigation_only() {
    let (addr, event_tx, _handle) = start_event_server().await;
    let session = CdpSession::connect("t", &ws_url(addr), quick_config()).await.unwrap();

    let (initial, _) = session.doc_state().await.unwrap();

    event_tx.send(json!({"method": "DOM.documentUpdated", "params": {}})).await.unwrap();
    let after_first = wait_for_doc_version(&session, initial + 1).await;
    assert_eq!(after_first, initial + 1);

    // A subframe navigation (parentId present) must not advance doc_version.
    event_tx
        .send(json!({
            "method": "Page.frameNavigated",
            "params": {"frame": {"id": "child", "parentId": "main"}}
        }))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let (still, _) = session.doc_state().await.unwrap();
    assert_eq!(still, after_first, "subframe navigation must not advance doc_version");

    // A main-frame navigation (no parentId) does advance it.
    event_tx
        .send(json!({
            "method": "Page.frameNavigated",
            "params": {"frame": {"id": "main"}}
        }))
        .await
        .unwrap();
    wait_for_doc_version(&session, after_first + 1).await;
}

#[tokio::test]
async fn set_root_node_id_is_discarded_once_doc_version_has_moved_on() {
    let (addr, event_tx, _handle) = start_event_server().await;
    let session = CdpSession::connect("t", &ws_url(addr), quick_config()).await.unwrap();

    let (version, _) = session.doc_state().await.unwrap();
    session.set_root_node_id(42, version).await.unwrap();
    let (_, root) = session.doc_state().await.unwrap();
    assert_eq!(root, Some(42));

    event_tx.send(json!({"method": "DOM.documentUpdated", "params": {}})).await.unwrap();
    wait_for_doc_version(&session, version + 1).await;
    let (_, root_after) = session.doc_state().await.unwrap();
    assert_eq!(root_after, None, "stale root id must be discarded, not reused after a document update");
}

#[tokio::test]
async fn request_method_is_resolved_from_request_will_be_sent_not_response_received() {
    let (addr, event_tx, _handle) = start_event_server().await;
    let session = CdpSession::connect("t", &ws_url(addr), quick_config()).await.unwrap();

    event_tx
        .send(json!({
            "method": "Network.requestWillBeSent",
            "params": {"requestId": "r1", "request": {"url": "https://example.com", "method": "POST"}}
        }))
        .await
        .unwrap();
    // A same-request responseReceived with a misleading `type` must not
    // override the method recorded from requestWillBeSent.
    event_tx
        .send(json!({
            "method": "Network.responseReceived",
            "params": {"requestId": "r1", "type": "Document", "response": {"status": 200}}
        }))
        .await
        .unwrap();

    let mut method = None;
    for _ in 0..50 {
        method = session.lookup_request_method("r1").await.unwrap();
        if method.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(method.as_deref(), Some("POST"));
}

#[tokio::test]
async fn network_requests_registry_evicts_oldest_past_capacity() {
    let (addr, event_tx, _handle) = start_event_server().await;
    let session = CdpSession::connect("t", &ws_url(addr), quick_config()).await.unwrap();

    // Registry capacity is 500; push past it and confirm FIFO eviction.
    const TOTAL: usize = 505;
    for i in 0..TOTAL {
        event_tx
            .send(json!({
                "method": "Network.requestWillBeSent",
                "params": {"requestId": format!("r{i}"), "request": {"url": "https://example.com", "method": "GET"}}
            }))
            .await
            .unwrap();
    }

    let mut oldest_evicted = false;
    for _ in 0..100 {
        oldest_evicted = session.lookup_request_method("r0").await.unwrap().is_none();
        let newest_present = session
            .lookup_request_method(&format!("r{}", TOTAL - 1))
            .await
            .unwrap()
            .is_some();
        if oldest_evicted && newest_present {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(oldest_evicted, "oldest request should have been evicted once past capacity");
}

#[tokio::test]
async fn command_timeout_surfaces_as_timeout_error() {
    let (addr, _handle) = start_silent_server().await;
    let config = CdpConfig {
        connect_timeout: Duration::from_secs(5),
        command_timeout: Duration::from_millis(200),
        channel_capacity: 256,
    };
    // The handshake itself never completes against a silent server, so
    // connect will time out too — that is itself the behavior under test.
    let result = CdpSession::connect("t", &ws_url(addr), config).await;
    assert!(matches!(result, Err(CdpError::CommandTimeout { .. })));
}

#[tokio::test]
async fn websocket_close_marks_session_disconnected() {
    // auto-enable issues 5 commands before the session is considered "up";
    // drop after that many so the close happens post-handshake.
    let (addr, _handle) = start_drop_after_server(5).await;
    let session = CdpSession::connect("t", &ws_url(addr), quick_config()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!session.is_connected(), "session should report disconnected after the server drops it");

    let err = session.send_command("Anything", None).await.unwrap_err();
    assert!(matches!(err, CdpError::NotConnected));
}

#[tokio::test]
async fn protocol_error_after_handshake_is_surfaced_verbatim() {
    let (addr, _handle) = start_handshake_then_error_server(-32000, "No such node").await;
    let session = CdpSession::connect("t", &ws_url(addr), quick_config()).await.unwrap();

    let err = session.send_command("DOM.describeNode", None).await.unwrap_err();
    match err {
        CdpError::Protocol { code, message } => {
            assert_eq!(code, -32000);
            assert_eq!(message, "No such node");
        }
        other => panic!("expected Protocol error, got: {other}"),
    }
}
