//! Observability tools: `console_enable`, `console_messages`,
//! `console_clear`, `performance_metrics`.
//!
//! Console messages are pulled from the Event Layer's ring buffer rather
//! than a live subscription, matching the pull-style retrieval pattern
//! `buffered_events` was built for.

use serde_json::{Value, json};

use crate::cdp::CdpSession;
use crate::error::BridgeError;
use crate::tools::optional_u64;

/// # Errors
///
/// Propagates `Runtime.enable` errors (already auto-enabled at connect
/// time; this call is idempotent).
pub async fn console_enable(session: &CdpSession, _args: &Value) -> Result<Value, BridgeError> {
    session
        .send_command("Runtime.enable", None)
        .await
        .map_err(BridgeError::from)
}

/// Returns `Runtime.consoleAPICalled` entries at or after `since_ts_ms`
/// (default: the full retained ring), via `buffered_events`.
///
/// # Errors
///
/// Propagates transport errors from the buffered-events query.
pub async fn console_messages(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let since_ts_ms = optional_u64(args, "since_ts_ms", 0);
    let events = session
        .buffered_events(Some("Runtime.consoleAPICalled"), since_ts_ms)
        .await
        .map_err(BridgeError::from)?;
    Ok(Value::Array(
        events
            .into_iter()
            .map(|e| {
                json!({
                    "type": e.params.get("type").cloned().unwrap_or(Value::Null),
                    "args": e.params.get("args").cloned().unwrap_or(Value::Null),
                    "timestamp_ms": e.timestamp_ms,
                })
            })
            .collect(),
    ))
}

/// Empties the event ring via `clear_event_ring`; live subscribers (if
/// any) are unaffected.
///
/// # Errors
///
/// Propagates transport errors.
pub async fn console_clear(session: &CdpSession, _args: &Value) -> Result<Value, BridgeError> {
    session.clear_event_ring().await.map_err(BridgeError::from)?;
    Ok(Value::Null)
}

/// # Errors
///
/// Propagates `Performance.getMetrics` errors.
pub async fn performance_metrics(session: &CdpSession, _args: &Value) -> Result<Value, BridgeError> {
    session
        .send_command("Performance.enable", None)
        .await
        .map_err(BridgeError::from)?;
    session
        .send_command("Performance.getMetrics", None)
        .await
        .map_err(BridgeError::from)
}
