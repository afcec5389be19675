use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::daemon::{DaemonClient, DaemonRequest, DaemonResponse, dispatch};
use crate::relay::Relay;

async fn request_daemon(request: DaemonRequest) -> Result<DaemonResponse> {
    tokio::task::spawn_blocking(move || DaemonClient::send_request(request))
        .await
        .context("Daemon client task failed")?
        .context("Failed to communicate with daemon")
}

/// DevTools port of the running daemon, if one answers
async fn running_daemon_port() -> Option<u16> {
    if !DaemonClient::is_daemon_running() {
        return None;
    }
    match request_daemon(DaemonRequest::Ping).await {
        Ok(DaemonResponse::Pong { port }) => Some(port),
        Ok(other) => {
            warn!("Daemon answered ping with {:?}", other);
            None
        }
        Err(e) => {
            warn!("Daemon is not responding: {:#}", e);
            None
        }
    }
}

/// Only a daemon driving the same DevTools port may serve the request
pub fn should_forward(daemon_port: Option<u16>, port: u16, local: bool) -> bool {
    !local && daemon_port == Some(port)
}

/// Run a request on the daemon if one is up for `config.port`, otherwise in
/// this process.
///
/// `local` forces in-process execution.
pub async fn execute(config: &Config, request: DaemonRequest, local: bool) -> Result<DaemonResponse> {
    let daemon_port = if local { None } else { running_daemon_port().await };

    if should_forward(daemon_port, config.port, local) {
        debug!("Forwarding request to daemon");
        return request_daemon(request).await?.into_result();
    }
    if let Some(other) = daemon_port {
        warn!(
            "Daemon is attached to port {}, running in-process against port {}",
            other, config.port
        );
    }

    let relay = Relay::new(config.clone());
    dispatch(&relay, request).await.into_result()
}

/// Print a result as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn unexpected(response: DaemonResponse) -> anyhow::Error {
    anyhow::anyhow!("Unexpected response from daemon: {:?}", response)
}
