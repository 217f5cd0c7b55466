use serde::Serialize;
use serde_json::{Value, json};

use crate::cdp::CdpSession;
use crate::error::BridgeError;
use crate::events::wait_for_event;

/// Result shape returned by `wait_for_file_chooser`.
#[derive(Debug, Clone, Serialize)]
pub struct FileChooserResult {
    pub frame_id: String,
    pub mode: String,
    pub backend_node_id: i64,
}

/// Enables file-chooser interception (idempotent — repeated calls simply
/// re-issue the same `enabled: true` command), then waits for
/// `Page.fileChooserOpened`.
///
/// # Errors
///
/// `Timeout` if no file chooser opens within `timeout_ms`.
pub async fn wait_for_file_chooser(
    session: &CdpSession,
    timeout_ms: u64,
) -> Result<FileChooserResult, BridgeError> {
    session
        .send_command(
            "Page.setInterceptFileChooserDialog",
            Some(json!({ "enabled": true })),
        )
        .await
        .map_err(BridgeError::from)?;

    let rx = session
        .subscribe("Page.fileChooserOpened")
        .await
        .map_err(BridgeError::from)?;

    let event = wait_for_event(rx, timeout_ms, |_| true).await?;
    let params = event.params;

    Ok(FileChooserResult {
        frame_id: params
            .get("frameId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        mode: params
            .get("mode")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        backend_node_id: params
            .get("backendNodeId")
            .and_then(Value::as_i64)
            .unwrap_or_default(),
    })
}
