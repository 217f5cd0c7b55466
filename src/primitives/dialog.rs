use serde::Serialize;
use serde_json::{Value, json};

use crate::cdp::CdpSession;
use crate::error::BridgeError;
use crate::events::wait_for_event;

/// The outcome requested by an auto-handling caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogAction {
    Accept,
    Dismiss,
}

/// Result shape returned by `wait_for_dialog`.
#[derive(Debug, Clone, Serialize)]
pub struct DialogResult {
    #[serde(rename = "type")]
    pub dialog_type: String,
    pub message: String,
    pub url: String,
    pub default_prompt: String,
    pub has_browser_handler: bool,
}

/// Wait for `Page.javascriptDialogOpening`; if `auto_handle`, immediately
/// resolve it with `Page.handleJavaScriptDialog`. `prompt_text` is only
/// forwarded when the dialog type is `prompt`.
///
/// # Errors
///
/// `Timeout` if no dialog opens within `timeout_ms`; propagates
/// `Page.handleJavaScriptDialog` errors when `auto_handle` is set.
pub async fn wait_for_dialog(
    session: &CdpSession,
    timeout_ms: u64,
    auto_handle: Option<DialogAction>,
    prompt_text: Option<&str>,
) -> Result<DialogResult, BridgeError> {
    let rx = session
        .subscribe("Page.javascriptDialogOpening")
        .await
        .map_err(BridgeError::from)?;

    let event = wait_for_event(rx, timeout_ms, |_| true).await?;
    let params = event.params;

    let dialog_type = params
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    if let Some(action) = auto_handle {
        let mut handle_params = json!({ "accept": action == DialogAction::Accept });
        if dialog_type == "prompt"
            && let Some(text) = prompt_text
        {
            handle_params["promptText"] = json!(text);
        }
        session
            .send_command("Page.handleJavaScriptDialog", Some(handle_params))
            .await
            .map_err(BridgeError::from)?;
    }

    Ok(DialogResult {
        dialog_type,
        message: params
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        url: params
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        default_prompt: params
            .get("defaultPrompt")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        has_browser_handler: params
            .get("hasBrowserHandler")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    })
}
