//! Tool Dispatcher: a table keyed by tool name. Each entry resolves a CDP
//! session (unless the tool operates on the registry directly) and routes
//! to the handler implementing it.

use serde_json::Value;

use crate::cdp::CdpSession;
use crate::error::BridgeError;
use crate::session_registry::SessionRegistry;
use crate::tools;

/// Tool names that require a bound CDP session (`requires_connected_target:
/// true`). Every other recognized name
/// (`tabs_context_mcp`, `tabs_create_mcp`, `read_page`) operates on the
/// registry directly. Checked before resolving a session so an unknown
/// tool name fails fast with `BadArguments` rather than first attempting
/// (and possibly failing) a browser connection.
const SESSION_TOOLS: &[&str] = &[
    "navigate",
    "page_reload",
    "page_wait_for_load",
    "page_wait_for_network_idle",
    "page_layout_metrics",
    "cookies_get",
    "cookies_set",
    "cookies_delete",
    "cookies_clear",
    "network_headers",
    "network_cache",
    "network_block",
    "network_wait_for_response",
    "element_query",
    "element_query_all",
    "element_scroll_into_view",
    "element_box_model",
    "element_focus",
    "element_html",
    "computer",
    "find",
    "form_input",
    "get_page_text",
    "javascript_tool",
    "dialog_handle",
    "dialog_wait",
    "file_upload",
    "file_chooser_wait",
    "emulate_device",
    "emulate_geolocation",
    "emulate_timezone",
    "emulate_user_agent",
    "console_enable",
    "console_messages",
    "console_clear",
    "performance_metrics",
];

/// Route `tool_name` to its handler. If the tool requires a connected
/// target, `args.tab_id` is resolved to a (possibly reused) session first —
/// see `SessionRegistry::session_for` for the resolution and reuse rules.
///
/// # Errors
///
/// `BadArguments` for an unrecognized tool name. Otherwise propagates
/// whatever the resolved handler returns — target resolution errors,
/// `StaleNode`, `Timeout`, `CdpError`, etc.
pub async fn dispatch_tool_call(
    sessions: &SessionRegistry,
    tool_name: &str,
    args: &Value,
) -> Result<Value, BridgeError> {
    match tool_name {
        "tabs_context_mcp" => tools::tabs::tabs_context_mcp(sessions, args).await,
        "tabs_create_mcp" => tools::tabs::tabs_create_mcp(sessions, args).await,
        "read_page" => tools::tabs::read_page(sessions, args).await,

        name if SESSION_TOOLS.contains(&name) => {
            let session = sessions.session_for(tools::tab_id(args)).await?;
            dispatch_session_tool(&session, name, args).await
        }

        other => Err(BridgeError::bad_arguments(format!(
            "unknown tool `{other}`"
        ))),
    }
}

async fn dispatch_session_tool(
    session: &CdpSession,
    tool_name: &str,
    args: &Value,
) -> Result<Value, BridgeError> {
    match tool_name {
        "navigate" => tools::navigation::navigate(session, args).await,
        "page_reload" => tools::navigation::page_reload(session, args).await,
        "page_wait_for_load" => tools::navigation::page_wait_for_load(session, args).await,
        "page_wait_for_network_idle" => {
            tools::navigation::page_wait_for_network_idle(session, args).await
        }
        "page_layout_metrics" => tools::navigation::page_layout_metrics(session, args).await,

        "cookies_get" => tools::network::cookies_get(session, args).await,
        "cookies_set" => tools::network::cookies_set(session, args).await,
        "cookies_delete" => tools::network::cookies_delete(session, args).await,
        "cookies_clear" => tools::network::cookies_clear(session, args).await,
        "network_headers" => tools::network::network_headers(session, args).await,
        "network_cache" => tools::network::network_cache(session, args).await,
        "network_block" => tools::network::network_block(session, args).await,
        "network_wait_for_response" => {
            tools::network::network_wait_for_response(session, args).await
        }

        "element_query" => tools::dom::element_query(session, args).await,
        "element_query_all" => tools::dom::element_query_all(session, args).await,
        "element_scroll_into_view" => tools::dom::element_scroll_into_view(session, args).await,
        "element_box_model" => tools::dom::element_box_model(session, args).await,
        "element_focus" => tools::dom::element_focus(session, args).await,
        "element_html" => tools::dom::element_html(session, args).await,

        "computer" => tools::input::computer(session, args).await,
        "find" => tools::input::find(session, args).await,
        "form_input" => tools::input::form_input(session, args).await,
        "get_page_text" => tools::input::get_page_text(session, args).await,
        "javascript_tool" => tools::input::javascript_tool(session, args).await,

        "dialog_handle" => tools::dialogs::dialog_handle(session, args).await,
        "dialog_wait" => tools::dialogs::dialog_wait(session, args).await,
        "file_upload" => tools::dialogs::file_upload(session, args).await,
        "file_chooser_wait" => tools::dialogs::file_chooser_wait(session, args).await,

        "emulate_device" => tools::emulation::emulate_device(session, args).await,
        "emulate_geolocation" => tools::emulation::emulate_geolocation(session, args).await,
        "emulate_timezone" => tools::emulation::emulate_timezone(session, args).await,
        "emulate_user_agent" => tools::emulation::emulate_user_agent(session, args).await,

        "console_enable" => tools::observability::console_enable(session, args).await,
        "console_messages" => tools::observability::console_messages(session, args).await,
        "console_clear" => tools::observability::console_clear(session, args).await,
        "performance_metrics" => tools::observability::performance_metrics(session, args).await,

        other => unreachable!("`{other}` is in SESSION_TOOLS but has no arm in dispatch_session_tool"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdp::CdpConfig;
    use crate::registry::TargetRegistry;

    #[tokio::test]
    async fn unknown_tool_is_bad_arguments_without_touching_the_browser() {
        // Port 1 is never a live browser; if this resolved a session first
        // it would fail with BrowserUnavailable instead.
        let registry = SessionRegistry::new(TargetRegistry::new("127.0.0.1", 1), CdpConfig::default());
        let err = dispatch_tool_call(&registry, "not_a_real_tool", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), crate::error::ErrorKind::BadArguments));
    }

    #[test]
    fn session_tools_table_has_no_duplicates() {
        let mut sorted = SESSION_TOOLS.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), SESSION_TOOLS.len());
    }
}
