//! Navigation tools: `navigate`, `page_reload`, `page_wait_for_load`,
//! `page_wait_for_network_idle`, `page_layout_metrics`.

use serde_json::{Value, json};

use crate::cdp::CdpSession;
use crate::error::BridgeError;
use crate::primitives::{self, WaitUntil};
use crate::tools::{optional_bool, optional_i64, optional_u64, require_str};

/// # Errors
///
/// Propagates CDP errors from `Page.navigate`.
pub async fn navigate(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let url = require_str(args, "url")?;
    session
        .send_command("Page.navigate", Some(json!({ "url": url })))
        .await
        .map_err(BridgeError::from)
}

/// # Errors
///
/// Propagates CDP errors from `Page.reload`.
pub async fn page_reload(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let ignore_cache = optional_bool(args, "ignore_cache", false);
    session
        .send_command(
            "Page.reload",
            Some(json!({ "ignoreCache": ignore_cache })),
        )
        .await
        .map_err(BridgeError::from)
}

/// # Errors
///
/// `BadArguments` for an unrecognized `wait_until`; otherwise propagates
/// `primitives::wait_for_load` errors.
pub async fn page_wait_for_load(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let wait_until = match args.get("wait_until").and_then(Value::as_str) {
        Some("load") | None => WaitUntil::Load,
        Some("domcontentloaded") => WaitUntil::DomContentLoaded,
        Some(other) => {
            return Err(BridgeError::bad_arguments(format!(
                "unknown wait_until `{other}`"
            )));
        }
    };
    let timeout_ms = optional_u64(args, "timeout_ms", 30_000);
    primitives::wait_for_load(session, wait_until, timeout_ms).await
}

/// # Errors
///
/// Propagates `primitives::wait_for_network_idle` errors.
pub async fn page_wait_for_network_idle(
    session: &CdpSession,
    args: &Value,
) -> Result<Value, BridgeError> {
    let idle_ms = optional_u64(args, "idle_ms", 500);
    let timeout_ms = optional_u64(args, "timeout_ms", 30_000);
    let max_inflight = optional_i64(args, "max_inflight", 0);
    primitives::wait_for_network_idle(session, idle_ms, timeout_ms, max_inflight).await?;
    Ok(Value::Null)
}

/// # Errors
///
/// Propagates `Page.getLayoutMetrics` errors.
pub async fn page_layout_metrics(session: &CdpSession, _args: &Value) -> Result<Value, BridgeError> {
    primitives::layout_metrics(session).await
}
