use serde_json::json;

use crate::cdp::CdpSession;
use crate::error::BridgeError;

/// A node reference: `{ node_id, selector?, doc_version_at_query }`. Stale
/// iff `doc_version_at_query < session.doc_version`.
#[derive(Debug, Clone)]
pub struct NodeReference {
    pub node_id: i64,
    pub selector: Option<String>,
    pub doc_version_at_query: u64,
}

impl NodeReference {
    /// # Errors
    ///
    /// Returns any transport error from reading the session's current
    /// document version.
    pub async fn check_fresh(&self, session: &CdpSession) -> Result<(), BridgeError> {
        let (doc_version, _) = session.doc_state().await.map_err(BridgeError::from)?;
        if self.doc_version_at_query < doc_version {
            return Err(BridgeError::stale_node());
        }
        Ok(())
    }
}

/// Ensures `root_node_id` is fresh (issuing `DOM.getDocument` if absent),
/// then resolves `selector` within `scope` (or the document root) via
/// `DOM.querySelector`.
///
/// # Errors
///
/// `NotFound` if the selector matches nothing; propagates CDP errors
/// otherwise.
pub async fn query(
    session: &CdpSession,
    selector: &str,
    scope: Option<i64>,
) -> Result<NodeReference, BridgeError> {
    let root_node_id = match scope {
        Some(id) => id,
        None => ensure_root_node(session).await?,
    };

    let (doc_version_at_query, _) = session.doc_state().await.map_err(BridgeError::from)?;

    let result = session
        .send_command(
            "DOM.querySelector",
            Some(json!({ "nodeId": root_node_id, "selector": selector })),
        )
        .await
        .map_err(BridgeError::from)?;

    let node_id = result
        .get("nodeId")
        .and_then(serde_json::Value::as_i64)
        .filter(|&id| id != 0)
        .ok_or_else(|| BridgeError::not_found(format!("selector {selector}")))?;

    Ok(NodeReference {
        node_id,
        selector: Some(selector.to_owned()),
        doc_version_at_query,
    })
}

/// Resolve every node matching `selector` within `scope`.
///
/// # Errors
///
/// Propagates CDP errors; an empty match is not an error, it yields an
/// empty vector.
pub async fn query_all(
    session: &CdpSession,
    selector: &str,
    scope: Option<i64>,
) -> Result<Vec<NodeReference>, BridgeError> {
    let root_node_id = match scope {
        Some(id) => id,
        None => ensure_root_node(session).await?,
    };
    let (doc_version_at_query, _) = session.doc_state().await.map_err(BridgeError::from)?;

    let result = session
        .send_command(
            "DOM.querySelectorAll",
            Some(json!({ "nodeId": root_node_id, "selector": selector })),
        )
        .await
        .map_err(BridgeError::from)?;

    let node_ids = result
        .get("nodeIds")
        .and_then(serde_json::Value::as_array)
        .cloned()
        .unwrap_or_default();

    Ok(node_ids
        .into_iter()
        .filter_map(|v| v.as_i64())
        .map(|node_id| NodeReference {
            node_id,
            selector: Some(selector.to_owned()),
            doc_version_at_query,
        })
        .collect())
}

async fn ensure_root_node(session: &CdpSession) -> Result<i64, BridgeError> {
    let (doc_version, root_node_id) = session.doc_state().await.map_err(BridgeError::from)?;
    if let Some(id) = root_node_id {
        return Ok(id);
    }

    let result = session
        .send_command(
            "DOM.getDocument",
            Some(json!({ "depth": -1, "pierce": true })),
        )
        .await
        .map_err(BridgeError::from)?;

    let node_id = result
        .get("root")
        .and_then(|root| root.get("nodeId"))
        .and_then(serde_json::Value::as_i64)
        .ok_or_else(|| BridgeError::internal("DOM.getDocument response missing root.nodeId"))?;

    session
        .set_root_node_id(node_id, doc_version)
        .await
        .map_err(BridgeError::from)?;

    Ok(node_id)
}
