use serde_json::Value;
use tokio::time::{Duration, Instant};

use crate::cdp::CdpSession;
use crate::error::BridgeError;

/// Resolves once `inflight <= max_inflight` has held for `idle_ms`
/// continuously, or rejects `Timeout` after `timeout_ms` overall.
///
/// `Network.requestWillBeSent` increments `inflight` unless the resource
/// type is `WebSocket` (persistent WS connections must not block idle).
/// `Network.loadingFinished`/`loadingFailed` decrement it. Each invocation
/// owns its own timer; concurrent invocations do not share state.
///
/// # Errors
///
/// Returns `ErrorKind::Timeout` if idle is never reached within
/// `timeout_ms`.
pub async fn wait_for_network_idle(
    session: &CdpSession,
    idle_ms: u64,
    timeout_ms: u64,
    max_inflight: i64,
) -> Result<(), BridgeError> {
    let mut req_rx = session
        .subscribe("Network.requestWillBeSent")
        .await
        .map_err(BridgeError::from)?;
    let mut fin_rx = session
        .subscribe("Network.loadingFinished")
        .await
        .map_err(BridgeError::from)?;
    let mut fail_rx = session
        .subscribe("Network.loadingFailed")
        .await
        .map_err(BridgeError::from)?;

    let idle_duration = Duration::from_millis(idle_ms);
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);

    let mut inflight: i64 = 0;
    let idle_timer = tokio::time::sleep(idle_duration);
    tokio::pin!(idle_timer);

    loop {
        tokio::select! {
            event = req_rx.recv() => {
                let Some(event) = event else { return Err(BridgeError::timeout("wait_for_network_idle")); };
                if event.params.get("type").and_then(Value::as_str) != Some("WebSocket") {
                    inflight += 1;
                    if inflight > max_inflight {
                        idle_timer.as_mut().reset(Instant::now() + idle_duration);
                    }
                }
            }
            event = fin_rx.recv() => {
                if event.is_some() {
                    inflight = (inflight - 1).max(0);
                    if inflight <= max_inflight {
                        idle_timer.as_mut().reset(Instant::now() + idle_duration);
                    }
                }
            }
            event = fail_rx.recv() => {
                if event.is_some() {
                    inflight = (inflight - 1).max(0);
                    if inflight <= max_inflight {
                        idle_timer.as_mut().reset(Instant::now() + idle_duration);
                    }
                }
            }
            () = &mut idle_timer => {
                if inflight <= max_inflight {
                    return Ok(());
                }
                idle_timer.as_mut().reset(Instant::now() + idle_duration);
            }
            () = tokio::time::sleep_until(deadline) => {
                return Err(BridgeError::timeout("wait_for_network_idle"));
            }
        }
    }
}
