//! Network tools: cookies, request headers/cache/block overrides, and
//! `network_wait_for_response`.

use serde_json::{Value, json};

use crate::cdp::CdpSession;
use crate::error::BridgeError;
use crate::primitives::{self, ResponseFilter};
use crate::tools::{optional_str, optional_u64, require_str};

/// # Errors
///
/// Propagates `Network.getCookies` errors.
pub async fn cookies_get(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let params = optional_str(args, "url").map(|url| json!({ "urls": [url] }));
    session
        .send_command("Network.getCookies", params)
        .await
        .map_err(BridgeError::from)
}

/// # Errors
///
/// `BadArguments` if `cookies` is missing or not an array; otherwise
/// propagates `Network.setCookies` errors.
pub async fn cookies_set(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let cookies = args
        .get("cookies")
        .filter(|v| v.is_array())
        .ok_or_else(|| BridgeError::bad_arguments("missing required argument `cookies`"))?;
    session
        .send_command("Network.setCookies", Some(json!({ "cookies": cookies })))
        .await
        .map_err(BridgeError::from)
}

/// # Errors
///
/// Propagates `Network.deleteCookies` errors.
pub async fn cookies_delete(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let name = require_str(args, "name")?;
    let mut params = json!({ "name": name });
    if let Some(url) = optional_str(args, "url") {
        params["url"] = json!(url);
    }
    if let Some(domain) = optional_str(args, "domain") {
        params["domain"] = json!(domain);
    }
    session
        .send_command("Network.deleteCookies", Some(params))
        .await
        .map_err(BridgeError::from)
}

/// # Errors
///
/// Propagates `Network.clearBrowserCookies` errors.
pub async fn cookies_clear(session: &CdpSession, _args: &Value) -> Result<Value, BridgeError> {
    session
        .send_command("Network.clearBrowserCookies", None)
        .await
        .map_err(BridgeError::from)
}

/// Open question resolution: an empty `{headers: {}}` replaces any prior
/// override with none, matching `Network.setExtraHTTPHeaders`'s own
/// replace-not-merge semantics.
///
/// # Errors
///
/// `BadArguments` if `headers` is not an object; otherwise propagates
/// `Network.setExtraHTTPHeaders` errors.
pub async fn network_headers(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let headers = args
        .get("headers")
        .filter(|v| v.is_object())
        .cloned()
        .unwrap_or_else(|| json!({}));
    session
        .send_command(
            "Network.setExtraHTTPHeaders",
            Some(json!({ "headers": headers })),
        )
        .await
        .map_err(BridgeError::from)
}

/// # Errors
///
/// Propagates `Network.setCacheDisabled` errors.
pub async fn network_cache(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let enabled = args.get("enabled").and_then(Value::as_bool).unwrap_or(true);
    session
        .send_command(
            "Network.setCacheDisabled",
            Some(json!({ "cacheDisabled": !enabled })),
        )
        .await
        .map_err(BridgeError::from)
}

/// # Errors
///
/// `BadArguments` if `patterns` is missing or not an array; otherwise
/// propagates `Network.setBlockedURLs` errors.
pub async fn network_block(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let patterns = args
        .get("patterns")
        .filter(|v| v.is_array())
        .cloned()
        .unwrap_or_else(|| json!([]));
    session
        .send_command("Network.setBlockedURLs", Some(json!({ "urls": patterns })))
        .await
        .map_err(BridgeError::from)
}

/// # Errors
///
/// Propagates `primitives::wait_for_response` errors, including
/// `BadPattern` for an invalid `url_regex`.
pub async fn network_wait_for_response(
    session: &CdpSession,
    args: &Value,
) -> Result<Value, BridgeError> {
    let filter = ResponseFilter {
        url_substring: optional_str(args, "url_substring").map(str::to_owned),
        url_regex: optional_str(args, "url_regex").map(str::to_owned),
        http_method: optional_str(args, "http_method").map(str::to_owned),
        status: args.get("status").and_then(Value::as_u64).map(|s| s as u16),
        resource_type: optional_str(args, "resource_type").map(str::to_owned),
    };
    let timeout_ms = optional_u64(args, "timeout_ms", 30_000);
    let result = primitives::wait_for_response(session, &filter, timeout_ms).await?;
    Ok(json!({
        "request_id": result.request_id,
        "url": result.url,
        "status": result.status,
        "headers": result.headers,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_headers_object_replaces_rather_than_no_ops() {
        let args = json!({ "headers": {} });
        let headers = args.get("headers").filter(|v| v.is_object()).cloned();
        assert_eq!(headers, Some(json!({})));
    }
}
