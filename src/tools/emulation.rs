//! Emulation tools: `emulate_device`, `emulate_geolocation`,
//! `emulate_timezone`, `emulate_user_agent`.

use serde_json::Value;

use crate::cdp::CdpSession;
use crate::error::BridgeError;
use crate::primitives;
use crate::tools::{optional_bool, optional_f64, require_i64, require_str};

/// # Errors
///
/// `BadArguments` if `width`/`height` are missing; otherwise propagates
/// CDP errors.
pub async fn emulate_device(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    if args.get("clear").and_then(Value::as_bool).unwrap_or(false) {
        primitives::clear_device_metrics(session).await?;
        return Ok(Value::Null);
    }
    let width = require_i64(args, "width")?;
    let height = require_i64(args, "height")?;
    let device_scale_factor = optional_f64(args, "device_scale_factor", 1.0);
    let mobile = optional_bool(args, "mobile", false);
    primitives::set_device_metrics(session, width, height, device_scale_factor, mobile).await?;
    Ok(Value::Null)
}

/// # Errors
///
/// Propagates `Emulation.setGeolocationOverride` errors.
pub async fn emulate_geolocation(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let latitude = args
        .get("latitude")
        .and_then(Value::as_f64)
        .ok_or_else(|| BridgeError::bad_arguments("missing required argument `latitude`"))?;
    let longitude = args
        .get("longitude")
        .and_then(Value::as_f64)
        .ok_or_else(|| BridgeError::bad_arguments("missing required argument `longitude`"))?;
    let accuracy = optional_f64(args, "accuracy", 1.0);
    primitives::set_geolocation(session, latitude, longitude, accuracy).await?;
    Ok(Value::Null)
}

/// # Errors
///
/// Propagates `Emulation.setTimezoneOverride` errors.
pub async fn emulate_timezone(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let timezone_id = require_str(args, "timezone_id")?;
    primitives::set_timezone(session, timezone_id).await?;
    Ok(Value::Null)
}

/// # Errors
///
/// Propagates `Emulation.setUserAgentOverride` errors.
pub async fn emulate_user_agent(session: &CdpSession, args: &Value) -> Result<Value, BridgeError> {
    let user_agent = require_str(args, "user_agent")?;
    primitives::set_user_agent(session, user_agent).await?;
    Ok(Value::Null)
}
