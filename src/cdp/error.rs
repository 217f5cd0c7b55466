use std::fmt;

/// Errors that can occur during CDP communication.
#[derive(Debug)]
pub enum CdpError {
    /// WebSocket connection could not be established.
    Connection(String),

    /// Connection attempt exceeded the configured timeout.
    ConnectionTimeout,

    /// A command did not receive a response within the configured timeout.
    CommandTimeout {
        /// The CDP method that timed out.
        method: String,
    },

    /// The browser returned a CDP protocol-level error.
    Protocol {
        /// The CDP error code (e.g., -32000).
        code: i64,
        /// The CDP error message.
        message: String,
    },

    /// The command was issued while the socket was not open, or the socket
    /// closed while the command was pending.
    NotConnected,

    /// Failed to parse a message received from the browser.
    InvalidResponse(String),

    /// Internal error (e.g., transport task died or channel closed).
    Internal(String),
}

impl fmt::Display for CdpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(msg) => write!(f, "CDP connection error: {msg}"),
            Self::ConnectionTimeout => write!(f, "CDP connection timed out"),
            Self::CommandTimeout { method } => {
                write!(f, "CDP command timed out: {method}")
            }
            Self::Protocol { code, message } => {
                write!(f, "CDP protocol error ({code}): {message}")
            }
            Self::NotConnected => write!(f, "CDP session is not connected"),
            Self::InvalidResponse(msg) => {
                write!(f, "CDP invalid response: {msg}")
            }
            Self::Internal(msg) => write!(f, "CDP internal error: {msg}"),
        }
    }
}

impl std::error::Error for CdpError {}

impl From<CdpError> for crate::error::BridgeError {
    fn from(e: CdpError) -> Self {
        use crate::error::ErrorKind;
        match &e {
            CdpError::Protocol { code, message } => Self::cdp_error(*code, message.clone()),
            CdpError::Connection(_) => Self::new(ErrorKind::BrowserUnavailable, e.to_string()),
            CdpError::NotConnected => Self::new(ErrorKind::NotConnected, e.to_string()),
            CdpError::ConnectionTimeout | CdpError::CommandTimeout { .. } => {
                Self::new(ErrorKind::Timeout, e.to_string())
            }
            CdpError::InvalidResponse(_) | CdpError::Internal(_) => {
                Self::new(ErrorKind::Internal, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_connection() {
        let err = CdpError::Connection("refused".into());
        assert_eq!(err.to_string(), "CDP connection error: refused");
    }

    #[test]
    fn display_connection_timeout() {
        let err = CdpError::ConnectionTimeout;
        assert_eq!(err.to_string(), "CDP connection timed out");
    }

    #[test]
    fn display_command_timeout() {
        let err = CdpError::CommandTimeout {
            method: "Page.navigate".into(),
        };
        assert_eq!(err.to_string(), "CDP command timed out: Page.navigate");
    }

    #[test]
    fn display_protocol() {
        let err = CdpError::Protocol {
            code: -32000,
            message: "Not found".into(),
        };
        assert_eq!(err.to_string(), "CDP protocol error (-32000): Not found");
    }

    #[test]
    fn display_not_connected() {
        let err = CdpError::NotConnected;
        assert_eq!(err.to_string(), "CDP session is not connected");
    }

    #[test]
    fn display_invalid_response() {
        let err = CdpError::InvalidResponse("bad json".into());
        assert_eq!(err.to_string(), "CDP invalid response: bad json");
    }

    #[test]
    fn display_internal() {
        let err = CdpError::Internal("channel closed".into());
        assert_eq!(err.to_string(), "CDP internal error: channel closed");
    }

    #[test]
    fn error_trait_is_implemented() {
        let err: &dyn std::error::Error = &CdpError::NotConnected;
        assert!(err.source().is_none());
    }

    #[test]
    fn protocol_errors_convert_to_cdp_error_kind() {
        let err = CdpError::Protocol {
            code: -32000,
            message: "boom".into(),
        };
        let bridge: crate::error::BridgeError = err.into();
        assert!(matches!(
            bridge.kind(),
            crate::error::ErrorKind::CdpError { code: -32000, .. }
        ));
    }
}
