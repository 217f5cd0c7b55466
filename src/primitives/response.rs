use regex::Regex;
use serde_json::Value;
use tokio::time::Duration;

use crate::cdp::CdpSession;
use crate::error::BridgeError;

/// Caller-supplied predicates for `wait_for_response`. All `Some` fields
/// must hold for a response to match.
#[derive(Debug, Default, Clone)]
pub struct ResponseFilter {
    pub url_substring: Option<String>,
    pub url_regex: Option<String>,
    pub http_method: Option<String>,
    pub status: Option<u16>,
    pub resource_type: Option<String>,
}

/// The result returned by `wait_for_response`.
#[derive(Debug, Clone)]
pub struct ResponseMatch {
    pub request_id: String,
    pub url: String,
    pub status: u16,
    pub headers: Value,
}

/// Filter on `Network.responseReceived`. `http_method` is resolved via the
/// State Tracker, never from `responseReceived.type`. The regex filter is
/// compiled once up front, not inside the hot path.
///
/// # Errors
///
/// `BadPattern` if `url_regex` fails to compile, surfaced at call time;
/// `Timeout` if no response matches within `timeout_ms`.
pub async fn wait_for_response(
    session: &CdpSession,
    filter: &ResponseFilter,
    timeout_ms: u64,
) -> Result<ResponseMatch, BridgeError> {
    let regex = filter
        .url_regex
        .as_deref()
        .map(Regex::new)
        .transpose()
        .map_err(|e| BridgeError::bad_pattern(e.to_string()))?;

    let mut rx = session
        .subscribe("Network.responseReceived")
        .await
        .map_err(BridgeError::from)?;

    let wait = async {
        while let Some(event) = rx.recv().await {
            if let Some(result) = try_match(session, filter, regex.as_ref(), &event.params).await
            {
                return Some(result);
            }
        }
        None
    };

    match tokio::time::timeout(Duration::from_millis(timeout_ms), wait).await {
        Ok(Some(result)) => Ok(result),
        Ok(None) | Err(_) => Err(BridgeError::timeout("wait_for_response")),
    }
}

async fn try_match(
    session: &CdpSession,
    filter: &ResponseFilter,
    regex: Option<&Regex>,
    params: &Value,
) -> Option<ResponseMatch> {
    let request_id = params.get("requestId")?.as_str()?.to_owned();
    let response = params.get("response")?;
    let url = response.get("url")?.as_str()?.to_owned();
    let status = response.get("status")?.as_u64()? as u16;

    if let Some(substring) = &filter.url_substring
        && !url.contains(substring.as_str())
    {
        return None;
    }
    if let Some(regex) = regex
        && !regex.is_match(&url)
    {
        return None;
    }
    if let Some(wanted_status) = filter.status
        && status != wanted_status
    {
        return None;
    }
    if let Some(wanted_type) = &filter.resource_type {
        let resource_type = params.get("type").and_then(Value::as_str).unwrap_or_default();
        if resource_type != wanted_type {
            return None;
        }
    }
    if let Some(wanted_method) = &filter.http_method {
        // The HTTP method is never taken from `responseReceived.type`; it
        // must be looked up by requestId in the State Tracker.
        let tracked_method = session.lookup_request_method(&request_id).await.ok()??;
        if &tracked_method != wanted_method {
            return None;
        }
    }

    Some(ResponseMatch {
        request_id,
        url,
        status,
        headers: response.get("headers").cloned().unwrap_or(Value::Null),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_regex_fails_at_compile_time() {
        let err = Regex::new("(unterminated").unwrap_err();
        let bridge = BridgeError::bad_pattern(err.to_string());
        assert!(matches!(bridge.kind(), crate::error::ErrorKind::BadPattern));
    }
}
