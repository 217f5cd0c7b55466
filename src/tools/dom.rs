//! DOM tools: `element_query`, `element_query_all`,
//! `element_scroll_into_view`, `element_box_model`, `element_focus`,
//! `element_html`.

use serde_json::{Value, json};

use crate::cdp::CdpSession;
use crate::error::BridgeError;
use crate::primitives::{self, NodeReference};
use crate::tools::require_i64;

/// # Errors
///
/// `NotFound` if the selector matches nothing; propagates CDP errors.
pub async fn element_query(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let selector = crate::tools::require_str(args, "selector")?;
    let node = primitives::query(session, selector, None).await?;
    Ok(node_reference_json(&node))
}

/// # Errors
///
/// Propagates CDP errors; an empty match yields an empty list.
pub async fn element_query_all(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let selector = crate::tools::require_str(args, "selector")?;
    let nodes = primitives::query_all(session, selector, None).await?;
    Ok(Value::Array(nodes.iter().map(node_reference_json).collect()))
}

/// # Errors
///
/// `StaleNode` if `node_id`'s document version has advanced; otherwise
/// propagates `DOM.scrollIntoViewIfNeeded` errors.
pub async fn element_scroll_into_view(
    session: &CdpSession,
    args: &Value,
) -> Result<Value, BridgeError> {
    let node_id = resolve_fresh_node(session, args).await?;
    session
        .send_command(
            "DOM.scrollIntoViewIfNeeded",
            Some(json!({ "nodeId": node_id })),
        )
        .await
        .map_err(BridgeError::from)
}

/// # Errors
///
/// `StaleNode` if `node_id`'s document version has advanced; otherwise
/// propagates `DOM.getBoxModel` errors.
pub async fn element_box_model(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let node_id = resolve_fresh_node(session, args).await?;
    session
        .send_command("DOM.getBoxModel", Some(json!({ "nodeId": node_id })))
        .await
        .map_err(BridgeError::from)
}

/// # Errors
///
/// `StaleNode` if `node_id`'s document version has advanced; otherwise
/// propagates `DOM.focus` errors.
pub async fn element_focus(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let node_id = resolve_fresh_node(session, args).await?;
    session
        .send_command("DOM.focus", Some(json!({ "nodeId": node_id })))
        .await
        .map_err(BridgeError::from)
}

/// # Errors
///
/// `StaleNode` if `node_id`'s document version has advanced; otherwise
/// propagates `DOM.getOuterHTML` errors.
pub async fn element_html(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let node_id = resolve_fresh_node(session, args).await?;
    session
        .send_command("DOM.getOuterHTML", Some(json!({ "nodeId": node_id })))
        .await
        .map_err(BridgeError::from)
}

/// Checks the caller's `node_id` plus the `doc_version_at_query` it was
/// returned with. `StaleNode` if the document has since advanced — the
/// core never silently re-queries.
async fn resolve_fresh_node(session: &CdpSession, args: &Value) -> Result<i64, BridgeError> {
    let node_id = require_i64(args, "node_id")?;
    let doc_version_at_query = args
        .get("doc_version_at_query")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let node_ref = NodeReference {
        node_id,
        selector: None,
        doc_version_at_query,
    };
    node_ref.check_fresh(session).await?;
    Ok(node_id)
}

fn node_reference_json(node: &NodeReference) -> Value {
    json!({
        "node_id": node.node_id,
        "selector": node.selector,
        "doc_version_at_query": node.doc_version_at_query,
    })
}
