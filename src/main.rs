use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cdp_bridge_host::cdp::CdpConfig;
use cdp_bridge_host::config::HostConfig;
use cdp_bridge_host::duplex::DuplexTransport;
use cdp_bridge_host::registry::TargetRegistry;
use cdp_bridge_host::session_registry::SessionRegistry;

#[tokio::main]
async fn main() {
    let config = HostConfig::parse();
    init_tracing(&config);

    tracing::info!(
        cdp_host = %config.cdp_host,
        cdp_port = config.cdp_port,
        listen_port = config.listen_port,
        "starting cdp bridge host"
    );

    let target_registry = TargetRegistry::new(config.cdp_host.clone(), config.cdp_port);
    let sessions = Arc::new(SessionRegistry::new(target_registry, CdpConfig::default()));
    let transport = Arc::new(DuplexTransport::new(sessions));

    let listen_addr = match format!("127.0.0.1:{}", config.listen_port).parse() {
        Ok(addr) => addr,
        Err(err) => {
            tracing::error!(error = %err, "invalid listen port");
            std::process::exit(1);
        }
    };

    tokio::select! {
        result = transport.serve(listen_addr) => {
            if let Err(err) = result {
                tracing::error!(error = %err, "duplex transport exited");
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal, exiting");
        }
    }
}

fn init_tracing(config: &HostConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level.as_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
