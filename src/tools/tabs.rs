//! Tab tools: `tabs_context_mcp`, `tabs_create_mcp`, `read_page`.
//!
//! Unlike the other tool modules these act on the Target Registry directly
//! rather than a single bound CDP session, since enumerating and creating
//! tabs is a browser-wide operation.

use serde_json::{Value, json};

use crate::error::BridgeError;
use crate::session_registry::SessionRegistry;
use crate::tools::optional_str;

/// # Errors
///
/// `BrowserUnavailable` if the discovery endpoint is unreachable.
pub async fn tabs_context_mcp(sessions: &SessionRegistry, _args: &Value) -> Result<Value, BridgeError> {
    let targets = sessions.target_registry().list().await?;
    Ok(Value::Array(
        targets
            .into_iter()
            .map(|t| {
                json!({
                    "id": t.id,
                    "type": t.target_type,
                    "title": t.title,
                    "url": t.url,
                })
            })
            .collect(),
    ))
}

/// # Errors
///
/// `BrowserUnavailable` if the "create tab" endpoint is unreachable.
pub async fn tabs_create_mcp(sessions: &SessionRegistry, args: &Value) -> Result<Value, BridgeError> {
    let url = optional_str(args, "url");
    let target = sessions.target_registry().create(url).await?;
    Ok(json!({ "id": target.id, "type": target.target_type, "title": target.title, "url": target.url }))
}

/// Returns the visible text of the bound tab's page, reusing the same
/// `Runtime.evaluate` extraction `get_page_text` uses.
///
/// # Errors
///
/// Propagates session resolution and CDP errors.
pub async fn read_page(sessions: &SessionRegistry, args: &Value) -> Result<Value, BridgeError> {
    let session = sessions.session_for(crate::tools::tab_id(args)).await?;
    crate::tools::input::get_page_text(&session, args).await
}
