mod http;

use serde::Deserialize;

use crate::error::BridgeError;

/// A debuggable target (tab, worker, or other) as discovered over the
/// browser's HTTP endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub id: String,
    #[serde(rename = "type")]
    pub target_type: String,
    pub title: String,
    pub url: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    pub ws_url: Option<String>,
}

impl Target {
    #[must_use]
    pub fn is_page(&self) -> bool {
        self.target_type == "page"
    }
}

/// A caller-supplied reference to a target, as accepted by `resolve`.
pub enum TargetRef {
    /// No reference given: resolves to the first `page`-typed target.
    Default,
    /// The k-th `page`-typed target in sort order.
    Index(usize),
    /// An exact target id match.
    Id(String),
}

impl TargetRef {
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None => Self::Default,
            Some(s) => match s.parse::<usize>() {
                Ok(index) => Self::Index(index),
                Err(_) => Self::Id(s.to_owned()),
            },
        }
    }
}

/// Enumerates and resolves debuggable targets against one browser instance.
/// Holds no state of its own beyond the discovery endpoint address; every
/// call re-queries the browser.
#[derive(Debug, Clone)]
pub struct TargetRegistry {
    host: String,
    port: u16,
}

impl TargetRegistry {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `list()`: ordered sequence of Targets, stably sorted by `id`
    /// ascending so that numeric references are stable across calls.
    ///
    /// # Errors
    ///
    /// Returns `BrowserUnavailable` if the discovery endpoint is
    /// unreachable.
    pub async fn list(&self) -> Result<Vec<Target>, BridgeError> {
        let body = http::http_request("GET", &self.host, self.port, "/json/list").await?;
        let mut targets: Vec<Target> = serde_json::from_str(&body)
            .map_err(|e| BridgeError::internal(format!("malformed /json/list body: {e}")))?;
        targets.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(targets)
    }

    /// `resolve(ref)` → Target, per the three reference forms above.
    ///
    /// # Errors
    ///
    /// `IndexOutOfRange` if a numeric index has no corresponding page
    /// target; `NotFound` if a string id matches no target; propagates
    /// `list()`'s errors otherwise.
    pub async fn resolve(&self, reference: &TargetRef) -> Result<Target, BridgeError> {
        let targets = self.list().await?;
        match reference {
            TargetRef::Default => targets
                .into_iter()
                .find(Target::is_page)
                .ok_or_else(|| BridgeError::not_found("no page targets available")),
            TargetRef::Index(index) => {
                let page_targets: Vec<Target> =
                    targets.into_iter().filter(Target::is_page).collect();
                page_targets
                    .get(*index)
                    .cloned()
                    .ok_or_else(|| BridgeError::index_out_of_range(*index, page_targets.len()))
            }
            TargetRef::Id(id) => targets
                .into_iter()
                .find(|t| &t.id == id)
                .ok_or_else(|| BridgeError::not_found(format!("target id {id}"))),
        }
    }

    /// `create(url?)` → Target, via `PUT /json/new[?url=...]`.
    ///
    /// # Errors
    ///
    /// Returns `BrowserUnavailable` on discovery failure, or `Internal` if
    /// the response cannot be parsed as a target descriptor.
    pub async fn create(&self, url: Option<&str>) -> Result<Target, BridgeError> {
        let path = match url {
            Some(u) => format!("/json/new?{}", urlencode(u)),
            None => "/json/new".to_owned(),
        };
        let body = http::http_request("PUT", &self.host, self.port, &path).await?;
        serde_json::from_str(&body)
            .map_err(|e| BridgeError::internal(format!("malformed /json/new body: {e}")))
    }

    /// `close(id)`, via `GET /json/close/<id>`.
    ///
    /// # Errors
    ///
    /// Returns `BrowserUnavailable` if the discovery endpoint rejects the
    /// request.
    pub async fn close(&self, id: &str) -> Result<(), BridgeError> {
        let path = format!("/json/close/{id}");
        http::http_request("GET", &self.host, self.port, &path).await?;
        Ok(())
    }
}

/// Percent-encode the subset of characters that can appear in a URL query
/// value for `/json/new?<url>`; the browser does not require full RFC 3986
/// coverage here, only that `&`/`#`/space not prematurely terminate the
/// query string.
fn urlencode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b':' | b'/'
            | b'?' | b'=' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(id: &str, target_type: &str) -> Target {
        Target {
            id: id.to_owned(),
            target_type: target_type.to_owned(),
            title: String::new(),
            url: String::new(),
            ws_url: Some(format!("ws://127.0.0.1:9222/devtools/page/{id}")),
        }
    }

    #[test]
    fn target_ref_parses_numeric_as_index() {
        assert!(matches!(TargetRef::parse(Some("2")), TargetRef::Index(2)));
    }

    #[test]
    fn target_ref_parses_non_numeric_as_id() {
        assert!(matches!(TargetRef::parse(Some("abc-123")), TargetRef::Id(id) if id == "abc-123"));
    }

    #[test]
    fn target_ref_absent_is_default() {
        assert!(matches!(TargetRef::parse(None), TargetRef::Default));
    }

    #[test]
    fn is_page_matches_type_field() {
        assert!(target("1", "page").is_page());
        assert!(!target("1", "worker").is_page());
    }

    #[test]
    fn urlencode_passes_through_safe_characters() {
        assert_eq!(urlencode("https://example.com/a?b=1"), "https://example.com/a?b=1");
    }

    #[test]
    fn urlencode_escapes_spaces() {
        assert_eq!(urlencode("a b"), "a%20b");
    }
}
