use clap::Parser;

/// Log level accepted by `--log-level` / `RUST_LOG`.
#[derive(Debug, Clone, Copy, clap::ValueEnum, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Host process startup configuration.
#[derive(Debug, Parser, Clone)]
#[command(
    name = "cdp-bridge-host",
    about = "Bridges tool-calling clients to a Chromium-family browser over CDP"
)]
pub struct HostConfig {
    /// Host the target browser's remote-debugging endpoint listens on.
    #[arg(long, env = "CDP_BRIDGE_CDP_HOST", default_value = "127.0.0.1")]
    pub cdp_host: String,

    /// Port the target browser's remote-debugging endpoint listens on.
    #[arg(long, env = "CDP_BRIDGE_CDP_PORT", default_value_t = 9222)]
    pub cdp_port: u16,

    /// Port this host accepts client WebSocket connections on.
    #[arg(long, env = "CDP_BRIDGE_LISTEN_PORT", default_value_t = 19222)]
    pub listen_port: u16,

    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ports_match_host_and_listener_conventions() {
        let config = HostConfig::parse_from(["cdp-bridge-host"]);
        assert_eq!(config.cdp_port, 9222);
        assert_eq!(config.listen_port, 19222);
        assert_eq!(config.cdp_host, "127.0.0.1");
    }

    #[test]
    fn log_level_as_filter() {
        assert_eq!(LogLevel::Debug.as_filter(), "debug");
        assert_eq!(LogLevel::Error.as_filter(), "error");
    }
}
