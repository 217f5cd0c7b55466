use std::fmt;

use serde::Serialize;

/// The error taxonomy surfaced to tool-calling clients.
///
/// Codes are illustrative names, not numeric constants; they are the `code`
/// field of the envelope error shape emitted by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// Discovery endpoint unreachable, or the target WebSocket refused the
    /// handshake.
    BrowserUnavailable,
    /// A command was issued, or was pending, while the CDP socket was
    /// closed.
    NotConnected,
    /// A command or event wait exceeded its deadline.
    Timeout,
    /// The browser returned a CDP protocol-level error verbatim.
    CdpError { code: i64, message: String },
    /// A Node Reference is older than the session's current `doc_version`.
    StaleNode,
    /// A numeric target index was out of range.
    IndexOutOfRange,
    /// A target, node, or other referenced entity could not be found.
    NotFound,
    /// A caller-supplied regular expression failed to compile.
    BadPattern,
    /// A required tool argument was missing or malformed.
    BadArguments,
    /// An unhandled dispatcher exception; details are logged, not surfaced.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BrowserUnavailable => write!(f, "BrowserUnavailable"),
            Self::NotConnected => write!(f, "NotConnected"),
            Self::Timeout => write!(f, "Timeout"),
            Self::CdpError { .. } => write!(f, "CdpError"),
            Self::StaleNode => write!(f, "StaleNode"),
            Self::IndexOutOfRange => write!(f, "IndexOutOfRange"),
            Self::NotFound => write!(f, "NotFound"),
            Self::BadPattern => write!(f, "BadPattern"),
            Self::BadArguments => write!(f, "BadArguments"),
            Self::Internal => write!(f, "Internal"),
        }
    }
}

/// An error produced anywhere below the dispatcher, carrying the `ErrorKind`
/// it should be reported under plus a human-readable message.
#[derive(Debug, Clone)]
pub struct BridgeError {
    kind: ErrorKind,
    message: String,
}

impl BridgeError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn cdp_error(code: i64, message: String) -> Self {
        let display = message.clone();
        Self {
            kind: ErrorKind::CdpError { code, message },
            message: display,
        }
    }

    #[must_use]
    pub fn stale_node() -> Self {
        Self::new(ErrorKind::StaleNode, "node reference is stale")
    }

    #[must_use]
    pub fn index_out_of_range(index: usize, len: usize) -> Self {
        Self::new(
            ErrorKind::IndexOutOfRange,
            format!("target index {index} out of range (have {len} page targets)"),
        )
    }

    #[must_use]
    pub fn not_found(what: impl fmt::Display) -> Self {
        Self::new(ErrorKind::NotFound, format!("not found: {what}"))
    }

    #[must_use]
    pub fn bad_pattern(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadPattern, message)
    }

    #[must_use]
    pub fn bad_arguments(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadArguments, message)
    }

    #[must_use]
    pub fn timeout(operation: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Timeout, format!("timed out: {operation}"))
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    #[must_use]
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The `{code, message}` shape emitted inside a dispatcher error
    /// envelope.
    #[must_use]
    pub fn to_envelope(&self) -> ErrorEnvelope<'_> {
        ErrorEnvelope {
            code: self.kind.to_string(),
            message: &self.message,
        }
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for BridgeError {}

#[derive(Serialize)]
pub struct ErrorEnvelope<'a> {
    pub code: String,
    pub message: &'a str,
}
