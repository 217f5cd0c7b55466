//! Dialog and file tools: `dialog_handle`, `dialog_wait`, `file_upload`,
//! `file_chooser_wait`.

use serde_json::{Value, json};

use crate::cdp::CdpSession;
use crate::error::BridgeError;
use crate::primitives::{self, DialogAction};
use crate::tools::{optional_str, optional_u64, require_i64};

/// Immediately resolves a currently-open dialog without first waiting for
/// `Page.javascriptDialogOpening` — used when the caller already knows one
/// is open (e.g. from a prior `dialog_wait`).
///
/// # Errors
///
/// Propagates `Page.handleJavaScriptDialog` errors.
pub async fn dialog_handle(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let accept = args.get("accept").and_then(Value::as_bool).unwrap_or(true);
    let mut params = json!({ "accept": accept });
    if let Some(text) = optional_str(args, "prompt_text") {
        params["promptText"] = json!(text);
    }
    session
        .send_command("Page.handleJavaScriptDialog", Some(params))
        .await
        .map_err(BridgeError::from)
}

/// # Errors
///
/// `Timeout` if no dialog opens within `timeout_ms`; propagates
/// `Page.handleJavaScriptDialog` errors when `auto_handle` is set.
pub async fn dialog_wait(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let timeout_ms = optional_u64(args, "timeout_ms", 30_000);
    let auto_handle = args.get("auto_handle").and_then(Value::as_bool).unwrap_or(false);
    let action = match optional_str(args, "action") {
        Some("dismiss") => DialogAction::Dismiss,
        _ => DialogAction::Accept,
    };
    let result = primitives::wait_for_dialog(
        session,
        timeout_ms,
        auto_handle.then_some(action),
        optional_str(args, "prompt_text"),
    )
    .await?;
    serde_json::to_value(result).map_err(|e| BridgeError::internal(e.to_string()))
}

/// Path translation: `/mnt/<drive>/...` becomes `<DRIVE>:\...` before being
/// handed to `DOM.setFileInputFiles`; any other path passes through
/// unchanged.
///
/// # Errors
///
/// `BadArguments` if `files` is missing or not an array of strings.
pub async fn file_upload(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let node_id = require_i64(args, "node_id")?;
    let files = args
        .get("files")
        .and_then(Value::as_array)
        .ok_or_else(|| BridgeError::bad_arguments("missing required argument `files`"))?;
    let translated: Vec<String> = files
        .iter()
        .map(|v| {
            v.as_str()
                .map(translate_path)
                .ok_or_else(|| BridgeError::bad_arguments("`files` must be an array of strings"))
        })
        .collect::<Result<_, _>>()?;

    session
        .send_command(
            "DOM.setFileInputFiles",
            Some(json!({ "files": translated, "nodeId": node_id })),
        )
        .await
        .map_err(BridgeError::from)
}

/// `/mnt/c/temp/x.txt` → `C:\temp\x.txt`. Paths not matching the
/// `/mnt/<drive>/...` shape pass through unchanged.
fn translate_path(path: &str) -> String {
    let Some(rest) = path.strip_prefix("/mnt/") else {
        return path.to_owned();
    };
    let mut parts = rest.splitn(2, '/');
    let Some(drive) = parts.next().filter(|d| d.len() == 1) else {
        return path.to_owned();
    };
    let tail = parts.next().unwrap_or("");
    format!("{}:\\{}", drive.to_uppercase(), tail.replace('/', "\\"))
}

/// # Errors
///
/// `Timeout` if no file chooser opens within `timeout_ms`.
pub async fn file_chooser_wait(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let timeout_ms = optional_u64(args, "timeout_ms", 30_000);
    let result = primitives::wait_for_file_chooser(session, timeout_ms).await?;
    Ok(json!({
        "frame_id": result.frame_id,
        "mode": result.mode,
        "backend_node_id": result.backend_node_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_mnt_drive_path() {
        assert_eq!(translate_path("/mnt/c/temp/x.txt"), "C:\\temp\\x.txt");
    }

    #[test]
    fn leaves_other_paths_unchanged() {
        assert_eq!(translate_path("/home/user/x.txt"), "/home/user/x.txt");
    }
}
