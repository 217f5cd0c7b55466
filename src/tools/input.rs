//! Input tools: `computer` (mouse/keyboard/screenshot actions), `find`,
//! `form_input`, `get_page_text`, `javascript_tool`.
//!
//! Mouse and keyboard events are dispatched the way `interact.rs` built
//! them for Chrome's `Input` domain: a `mousePressed`/`mouseReleased` pair
//! per click, one `keyDown`/`keyUp` pair per key.

use serde_json::{Value, json};

use crate::cdp::CdpSession;
use crate::error::BridgeError;
use crate::primitives;
use crate::tools::{optional_f64, optional_i64, optional_str, require_str};

/// # Errors
///
/// `BadArguments` for an unrecognized `action`; otherwise propagates CDP
/// errors from the underlying `Input`/`Page` command.
pub async fn computer(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let action = require_str(args, "action")?;
    match action {
        "screenshot" => screenshot(session).await,
        "left_click" => click(session, args, 1).await,
        "double_click" => click(session, args, 2).await,
        "type" => type_text(session, args).await,
        "key" => key_press(session, args).await,
        "scroll" => scroll(session, args).await,
        "wait" => {
            let ms = optional_i64(args, "duration_ms", 1000).max(0) as u64;
            tokio::time::sleep(tokio::time::Duration::from_millis(ms)).await;
            Ok(Value::Null)
        }
        other => Err(BridgeError::bad_arguments(format!(
            "unknown computer action `{other}`"
        ))),
    }
}

async fn screenshot(session: &CdpSession) -> Result<Value, BridgeError> {
    let result = session
        .send_command("Page.captureScreenshot", Some(json!({ "format": "png" })))
        .await
        .map_err(BridgeError::from)?;
    let data = result
        .get("data")
        .and_then(Value::as_str)
        .ok_or_else(|| BridgeError::internal("Page.captureScreenshot response missing data"))?;
    Ok(json!({ "type": "image", "data": data, "media_type": "image/png" }))
}

async fn click(session: &CdpSession, args: &Value, click_count: u8) -> Result<Value, BridgeError> {
    let x = args
        .get("x")
        .and_then(Value::as_f64)
        .ok_or_else(|| BridgeError::bad_arguments("missing required argument `x`"))?;
    let y = args
        .get("y")
        .and_then(Value::as_f64)
        .ok_or_else(|| BridgeError::bad_arguments("missing required argument `y`"))?;
    let button = optional_str(args, "button").unwrap_or("left");

    for count in 1..=click_count {
        for event_type in ["mousePressed", "mouseReleased"] {
            session
                .send_command(
                    "Input.dispatchMouseEvent",
                    Some(json!({
                        "type": event_type,
                        "x": x,
                        "y": y,
                        "button": button,
                        "clickCount": count,
                    })),
                )
                .await
                .map_err(BridgeError::from)?;
        }
    }
    Ok(Value::Null)
}

async fn type_text(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let text = require_str(args, "text")?;
    for ch in text.chars() {
        session
            .send_command(
                "Input.dispatchKeyEvent",
                Some(json!({ "type": "char", "text": ch.to_string() })),
            )
            .await
            .map_err(BridgeError::from)?;
    }
    Ok(Value::Null)
}

async fn key_press(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let key = require_str(args, "key")?;
    for event_type in ["keyDown", "keyUp"] {
        session
            .send_command(
                "Input.dispatchKeyEvent",
                Some(json!({ "type": event_type, "key": key, "code": key })),
            )
            .await
            .map_err(BridgeError::from)?;
    }
    Ok(Value::Null)
}

async fn scroll(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let x = optional_f64(args, "x", 0.0);
    let y = optional_f64(args, "y", 0.0);
    let delta_x = optional_f64(args, "delta_x", 0.0);
    let delta_y = optional_f64(args, "delta_y", 0.0);
    session
        .send_command(
            "Input.dispatchMouseEvent",
            Some(json!({
                "type": "mouseWheel",
                "x": x,
                "y": y,
                "deltaX": delta_x,
                "deltaY": delta_y,
            })),
        )
        .await
        .map_err(BridgeError::from)
}

/// Locates the first element matching `selector` and returns its box model,
/// composing the DOM `query` primitive with `DOM.getBoxModel`.
///
/// # Errors
///
/// `NotFound` if nothing matches; propagates CDP errors.
pub async fn find(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let selector = require_str(args, "selector")?;
    let node = primitives::query(session, selector, None).await?;
    session
        .send_command("DOM.getBoxModel", Some(json!({ "nodeId": node.node_id })))
        .await
        .map_err(BridgeError::from)
}

/// # Errors
///
/// `NotFound` if `selector` matches nothing; propagates CDP errors from
/// `Runtime.callFunctionOn`.
pub async fn form_input(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let selector = require_str(args, "selector")?;
    let value = require_str(args, "value")?;
    let node = primitives::query(session, selector, None).await?;
    let resolved = session
        .send_command(
            "DOM.resolveNode",
            Some(json!({ "nodeId": node.node_id })),
        )
        .await
        .map_err(BridgeError::from)?;
    let object_id = resolved
        .get("object")
        .and_then(|o| o.get("objectId"))
        .and_then(Value::as_str)
        .ok_or_else(|| BridgeError::internal("DOM.resolveNode response missing objectId"))?;
    session
        .send_command(
            "Runtime.callFunctionOn",
            Some(json!({
                "objectId": object_id,
                "functionDeclaration": "function(v) { this.value = v; this.dispatchEvent(new Event('input', {bubbles: true})); this.dispatchEvent(new Event('change', {bubbles: true})); }",
                "arguments": [{ "value": value }],
            })),
        )
        .await
        .map_err(BridgeError::from)
}

/// # Errors
///
/// Propagates `Runtime.evaluate` errors.
pub async fn get_page_text(session: &CdpSession, _args: &Value) -> Result<Value, BridgeError> {
    let result = session
        .send_command(
            "Runtime.evaluate",
            Some(json!({
                "expression": "document.body ? document.body.innerText : ''",
                "returnByValue": true,
            })),
        )
        .await
        .map_err(BridgeError::from)?;
    Ok(result.get("result").and_then(|r| r.get("value")).cloned().unwrap_or(Value::Null))
}

/// # Errors
///
/// `CdpError` if evaluation throws (surfaced verbatim); `BadArguments` if
/// `expression` is missing.
pub async fn javascript_tool(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let expression = require_str(args, "expression")?;
    let result = session
        .send_command(
            "Runtime.evaluate",
            Some(json!({
                "expression": expression,
                "returnByValue": true,
                "awaitPromise": true,
            })),
        )
        .await
        .map_err(BridgeError::from)?;

    if let Some(exception) = result.get("exceptionDetails") {
        let message = exception
            .get("exception")
            .and_then(|e| e.get("description"))
            .and_then(Value::as_str)
            .unwrap_or("JavaScript exception")
            .to_owned();
        return Err(BridgeError::cdp_error(-32000, message));
    }

    Ok(result.get("result").and_then(|r| r.get("value")).cloned().unwrap_or(Value::Null))
}
