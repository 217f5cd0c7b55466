use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Duration;

use crate::cdp::CdpEvent;
use crate::error::BridgeError;

/// Resolves with the first event for which `predicate(params)` is truthy,
/// or rejects `Timeout` otherwise.
///
/// The caller must have subscribed (obtained `rx`) *before* performing any
/// action that could trigger the awaited event — this function only
/// consumes what arrives on `rx` after it is called, it does not itself
/// enforce subscribe-before-action ordering.
///
/// `timeout_ms = 0` rejects immediately without consuming any event.
///
/// # Errors
///
/// Returns `BridgeError` with `ErrorKind::Timeout` if no matching event
/// arrives within `timeout_ms`, or if the channel closes first (the owning
/// session disconnected).
pub async fn wait_for_event<F>(
    mut rx: mpsc::Receiver<CdpEvent>,
    timeout_ms: u64,
    predicate: F,
) -> Result<CdpEvent, BridgeError>
where
    F: Fn(&Value) -> bool,
{
    if timeout_ms == 0 {
        return Err(BridgeError::timeout("wait_for_event"));
    }

    let wait = async {
        while let Some(event) = rx.recv().await {
            if predicate(&event.params) {
                return Some(event);
            }
        }
        None
    };

    match tokio::time::timeout(Duration::from_millis(timeout_ms), wait).await {
        Ok(Some(event)) => Ok(event),
        Ok(None) | Err(_) => Err(BridgeError::timeout("wait_for_event")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn resolves_on_first_matching_event() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(CdpEvent {
            method: "Page.lifecycleEvent".into(),
            params: json!({"name": "init"}),
            timestamp_ms: 0,
        })
        .await
        .unwrap();
        tx.send(CdpEvent {
            method: "Page.lifecycleEvent".into(),
            params: json!({"name": "load"}),
            timestamp_ms: 1,
        })
        .await
        .unwrap();

        let event = wait_for_event(rx, 1000, |p| p["name"] == "load")
            .await
            .unwrap();
        assert_eq!(event.params["name"], "load");
    }

    #[tokio::test]
    async fn zero_timeout_rejects_without_consuming() {
        let (_tx, rx) = mpsc::channel(8);
        let result = wait_for_event(rx, 0, |_| true).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn times_out_when_no_match_arrives() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(CdpEvent {
            method: "Page.lifecycleEvent".into(),
            params: json!({"name": "init"}),
            timestamp_ms: 0,
        })
        .await
        .unwrap();
        drop(tx);

        let result = wait_for_event(rx, 50, |p| p["name"] == "load").await;
        assert!(result.is_err());
    }
}
