use serde_json::Value;

use crate::cdp::CdpSession;
use crate::error::BridgeError;
use crate::events::wait_for_event;

/// `wait_until` values accepted by `wait_for_load`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    Load,
    DomContentLoaded,
}

impl WaitUntil {
    fn lifecycle_name(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::DomContentLoaded => "DOMContentLoaded",
        }
    }
}

/// Subscribes to `Page.lifecycleEvent`, resolving on the named lifecycle
/// name for the main frame (i.e. `frame_id` omitted by the caller —
/// filtering further by a specific frame is left to the caller via a
/// subsequent `buffered_events` pull if needed).
///
/// # Errors
///
/// Returns `ErrorKind::Timeout` if the lifecycle event does not fire within
/// `timeout_ms`.
pub async fn wait_for_load(
    session: &CdpSession,
    wait_until: WaitUntil,
    timeout_ms: u64,
) -> Result<Value, BridgeError> {
    let rx = session
        .subscribe("Page.lifecycleEvent")
        .await
        .map_err(BridgeError::from)?;
    let name = wait_until.lifecycle_name();
    let event = wait_for_event(rx, timeout_ms, |params| {
        params.get("name").and_then(Value::as_str) == Some(name)
    })
    .await?;
    Ok(event.params)
}
