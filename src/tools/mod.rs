//! Tool handlers reachable by name from the Tool Dispatcher. Each handler
//! takes the session registry (to resolve `tab_id`) and the raw
//! `arguments` object from the envelope, and returns the JSON result to
//! place on the success envelope.

pub mod dialogs;
pub mod dom;
pub mod emulation;
pub mod input;
pub mod navigation;
pub mod network;
pub mod observability;
pub mod tabs;

use serde_json::Value;

use crate::error::BridgeError;

/// Extracts a required string argument.
///
/// # Errors
///
/// `BadArguments` if the key is absent or not a string.
pub fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, BridgeError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| BridgeError::bad_arguments(format!("missing required argument `{key}`")))
}

/// Extracts a required integer argument.
///
/// # Errors
///
/// `BadArguments` if the key is absent or not an integer.
pub fn require_i64(args: &Value, key: &str) -> Result<i64, BridgeError> {
    args.get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| BridgeError::bad_arguments(format!("missing required argument `{key}`")))
}

#[must_use]
pub fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

#[must_use]
pub fn optional_u64(args: &Value, key: &str, default: u64) -> u64 {
    args.get(key).and_then(Value::as_u64).unwrap_or(default)
}

#[must_use]
pub fn optional_i64(args: &Value, key: &str, default: i64) -> i64 {
    args.get(key).and_then(Value::as_i64).unwrap_or(default)
}

#[must_use]
pub fn optional_bool(args: &Value, key: &str, default: bool) -> bool {
    args.get(key).and_then(Value::as_bool).unwrap_or(default)
}

#[must_use]
pub fn optional_f64(args: &Value, key: &str, default: f64) -> f64 {
    args.get(key).and_then(Value::as_f64).unwrap_or(default)
}

#[must_use]
pub fn tab_id(args: &Value) -> Option<&str> {
    optional_str(args, "tab_id")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn require_str_missing_is_bad_arguments() {
        let args = json!({});
        let err = require_str(&args, "selector").unwrap_err();
        assert!(matches!(err.kind(), crate::error::ErrorKind::BadArguments));
    }

    #[test]
    fn optional_u64_falls_back_to_default() {
        let args = json!({});
        assert_eq!(optional_u64(&args, "timeout_ms", 30_000), 30_000);
    }
}
