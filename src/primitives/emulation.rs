use serde_json::{Value, json};

use crate::cdp::CdpSession;
use crate::error::BridgeError;

/// Pass-through to `Emulation.setDeviceMetricsOverride`.
///
/// # Errors
///
/// Propagates CDP errors.
pub async fn set_device_metrics(
    session: &CdpSession,
    width: i64,
    height: i64,
    device_scale_factor: f64,
    mobile: bool,
) -> Result<(), BridgeError> {
    session
        .send_command(
            "Emulation.setDeviceMetricsOverride",
            Some(json!({
                "width": width,
                "height": height,
                "deviceScaleFactor": device_scale_factor,
                "mobile": mobile,
            })),
        )
        .await
        .map_err(BridgeError::from)?;
    session
        .send_command(
            "Emulation.setTouchEmulationEnabled",
            Some(json!({ "enabled": mobile })),
        )
        .await
        .map_err(BridgeError::from)?;
    Ok(())
}

/// Restores the default (non-overridden) viewport: set then clear must
/// restore the default reported by `page_layout_metrics`.
///
/// # Errors
///
/// Propagates CDP errors.
pub async fn clear_device_metrics(session: &CdpSession) -> Result<(), BridgeError> {
    session
        .send_command("Emulation.clearDeviceMetricsOverride", None)
        .await
        .map_err(BridgeError::from)?;
    session
        .send_command(
            "Emulation.setTouchEmulationEnabled",
            Some(json!({ "enabled": false })),
        )
        .await
        .map_err(BridgeError::from)?;
    Ok(())
}

/// # Errors
///
/// Propagates CDP errors.
pub async fn set_user_agent(session: &CdpSession, user_agent: &str) -> Result<(), BridgeError> {
    session
        .send_command(
            "Emulation.setUserAgentOverride",
            Some(json!({ "userAgent": user_agent })),
        )
        .await
        .map_err(BridgeError::from)?;
    Ok(())
}

/// # Errors
///
/// Propagates CDP errors.
pub async fn set_timezone(session: &CdpSession, timezone_id: &str) -> Result<(), BridgeError> {
    session
        .send_command(
            "Emulation.setTimezoneOverride",
            Some(json!({ "timezoneId": timezone_id })),
        )
        .await
        .map_err(BridgeError::from)?;
    Ok(())
}

/// Preceded by a best-effort `Browser.grantPermissions(["geolocation"])`;
/// failure of the grant is swallowed so older browsers still function.
///
/// # Errors
///
/// Propagates errors from `Emulation.setGeolocationOverride` only.
pub async fn set_geolocation(
    session: &CdpSession,
    latitude: f64,
    longitude: f64,
    accuracy: f64,
) -> Result<(), BridgeError> {
    let _ = session
        .send_command(
            "Browser.grantPermissions",
            Some(json!({ "permissions": ["geolocation"] })),
        )
        .await;
    session
        .send_command(
            "Emulation.setGeolocationOverride",
            Some(json!({
                "latitude": latitude,
                "longitude": longitude,
                "accuracy": accuracy,
            })),
        )
        .await
        .map_err(BridgeError::from)?;
    Ok(())
}

/// Layout metrics used both directly by the `page_layout_metrics` tool and
/// by the device-metrics round-trip test.
///
/// # Errors
///
/// Propagates CDP errors.
pub async fn layout_metrics(session: &CdpSession) -> Result<Value, BridgeError> {
    session
        .send_command("Page.getLayoutMetrics", None)
        .await
        .map_err(BridgeError::from)
}
