use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use interprocess::local_socket::tokio::Stream as AsyncStream;
use interprocess::local_socket::tokio::prelude::*;
use interprocess::local_socket::{
    GenericFilePath, ListenerOptions, Name, Stream, ToFsName, traits::Stream as StreamTrait,
};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tokio::sync::Notify;
use tracing::{debug, error, info};

use crate::errors::RelayFailure;
use crate::inject::InjectionResult;
use crate::relay::{AskOutcome, Relay};
use crate::targets::DebugTarget;

/// Messages that can be sent to the daemon
#[derive(Debug, Serialize, Deserialize)]
pub enum DaemonRequest {
    Send {
        text: String,
    },
    Wait {
        timeout_ms: Option<u64>,
    },
    Ask {
        text: String,
        timeout_ms: Option<u64>,
    },
    Screenshot,
    Targets,

    // Daemon control
    Ping,
    Shutdown,
}

/// Responses from the daemon
#[derive(Debug, Serialize, Deserialize)]
pub enum DaemonResponse {
    Success(String),
    Error { message: String, exit_code: i32 },
    Sent(InjectionResult),
    Completed(bool),
    Answered(AskOutcome),
    /// Base64-encoded JPEG
    Screenshot { data: String, bytes: usize },
    Targets(Vec<DebugTarget>),
    /// DevTools port the daemon's relay talks to
    Pong { port: u16 },
}

impl DaemonResponse {
    fn failure(err: crate::errors::AutomationError) -> Self {
        DaemonResponse::Error {
            exit_code: err.exit_code(),
            message: err.to_string(),
        }
    }

    /// Turn an error response into an `Err` carrying the daemon's exit code
    pub fn into_result(self) -> Result<Self> {
        match self {
            DaemonResponse::Error { message, exit_code } => {
                Err(RelayFailure { message, exit_code }.into())
            }
            other => Ok(other),
        }
    }
}

/// Run one request against `relay`.
///
/// Shared by the daemon and the in-process path so both behave the same.
pub async fn dispatch(relay: &Relay, request: DaemonRequest) -> DaemonResponse {
    let timeout = |ms: Option<u64>| ms.map(Duration::from_millis);

    match request {
        DaemonRequest::Send { text } => match relay.send_text(&text).await {
            Ok(result) => DaemonResponse::Sent(result),
            Err(e) => DaemonResponse::failure(e),
        },
        DaemonRequest::Wait { timeout_ms } => {
            match relay.wait_for_completion(timeout(timeout_ms)).await {
                Ok(done) => DaemonResponse::Completed(done),
                Err(e) => DaemonResponse::failure(e),
            }
        }
        DaemonRequest::Ask { text, timeout_ms } => {
            match relay.ask(&text, timeout(timeout_ms)).await {
                Ok(outcome) => DaemonResponse::Answered(outcome),
                Err(e) => DaemonResponse::failure(e),
            }
        }
        DaemonRequest::Screenshot => match relay.capture_region().await {
            Ok(bytes) => DaemonResponse::Screenshot {
                bytes: bytes.len(),
                data: B64.encode(&bytes),
            },
            Err(e) => DaemonResponse::failure(e),
        },
        DaemonRequest::Targets => match relay.targets().await {
            Ok(targets) => DaemonResponse::Targets(targets),
            Err(e) => DaemonResponse::failure(e),
        },
        DaemonRequest::Ping => DaemonResponse::Pong {
            port: relay.config().port,
        },
        DaemonRequest::Shutdown => DaemonResponse::Success("Daemon shutting down".to_string()),
    }
}

/// Background relay service owning one `Relay` for its whole lifetime
pub struct Daemon {
    relay: Arc<Relay>,
    shutdown: Arc<Notify>,
}

impl Daemon {
    pub fn new(relay: Relay) -> Self {
        Self {
            relay: Arc::new(relay),
            shutdown: Arc::new(Notify::new()),
        }
    }

    fn get_socket_path() -> Result<PathBuf> {
        let runtime_dir = dirs::runtime_dir()
            .or_else(dirs::cache_dir)
            .or_else(|| std::env::temp_dir().into())
            .context("Could not determine runtime directory")?;

        Ok(runtime_dir.join("chatprobe-daemon.sock"))
    }

    fn get_socket_name() -> Result<Name<'static>> {
        let socket_path = Self::get_socket_path()?;
        let path_string = socket_path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Socket path is not valid UTF-8"))?
            .to_owned();
        // Leaked once per process; the name must outlive the listener
        let path_str: &'static str = Box::leak(path_string.into_boxed_str());
        Ok(path_str.to_fs_name::<GenericFilePath>()?)
    }

    pub fn is_running() -> bool {
        if let Ok(name) = Self::get_socket_name() {
            // Just check if we can connect - don't send data to avoid EOF errors
            Stream::connect(name).is_ok()
        } else {
            false
        }
    }

    /// Serve requests until a `Shutdown` request arrives
    pub async fn start(&self) -> Result<()> {
        if Self::is_running() {
            anyhow::bail!("Daemon is already running");
        }

        // Remove a stale socket left by a crashed daemon
        let socket_path = Self::get_socket_path()?;
        if socket_path.exists() {
            std::fs::remove_file(&socket_path)?;
        }

        let listener = ListenerOptions::new()
            .name(Self::get_socket_name()?)
            .create_tokio()?;
        info!(
            port = self.relay.config().port,
            "Daemon listening on {:?}",
            socket_path
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(stream) => {
                        // Each client gets its own task so a long wait never
                        // blocks pings or sends
                        let relay = Arc::clone(&self.relay);
                        let shutdown = Arc::clone(&self.shutdown);
                        tokio::spawn(async move {
                            if let Err(e) = Self::handle_client(stream, relay, shutdown).await {
                                error!("Error handling client: {}", e);
                            }
                        });
                    }
                    Err(e) => error!("Error accepting connection: {}", e),
                },
                _ = self.shutdown.notified() => break,
            }
        }

        drop(listener);
        let _ = std::fs::remove_file(&socket_path);
        info!("Daemon stopped");
        Ok(())
    }

    async fn handle_client(
        stream: AsyncStream,
        relay: Arc<Relay>,
        shutdown: Arc<Notify>,
    ) -> Result<()> {
        let mut reader = tokio::io::BufReader::new(&stream);
        let mut request_line = String::new();

        // 0 bytes is just a liveness check from is_running
        if reader.read_line(&mut request_line).await? == 0 || request_line.trim().is_empty() {
            return Ok(());
        }

        let request: DaemonRequest = serde_json::from_str(request_line.trim_end())?;
        info!("Received request: {}", describe(&request));

        let is_shutdown = matches!(request, DaemonRequest::Shutdown);
        let response = dispatch(&relay, request).await;

        debug!("Sending response");
        let mut response_json = serde_json::to_string(&response)?;
        response_json.push('\n');
        let mut writer = &stream;
        writer.write_all(response_json.as_bytes()).await?;
        writer.flush().await?;

        if is_shutdown {
            info!("Daemon shutting down");
            shutdown.notify_one();
        }
        Ok(())
    }
}

/// Log line for a request without echoing message text
fn describe(request: &DaemonRequest) -> String {
    match request {
        DaemonRequest::Send { text } => format!("Send ({} chars)", text.chars().count()),
        DaemonRequest::Ask { text, timeout_ms } => {
            format!("Ask ({} chars, timeout {:?}ms)", text.chars().count(), timeout_ms)
        }
        other => format!("{:?}", other),
    }
}

pub struct DaemonClient;

impl DaemonClient {
    pub fn send_request(request: DaemonRequest) -> Result<DaemonResponse> {
        let name = Daemon::get_socket_name()?;

        let mut stream =
            Stream::connect(name).context("Failed to connect to daemon. Is it running?")?;

        let request_json = serde_json::to_string(&request)?;
        stream.write_all(request_json.as_bytes())?;
        stream.write_all(b"\n")?;
        stream.flush()?;

        let mut reader = BufReader::new(stream);
        let mut response_line = String::new();
        match reader.read_line(&mut response_line) {
            Ok(0) => anyhow::bail!("Daemon closed connection without sending response"),
            Ok(_) => {
                let response: DaemonResponse = serde_json::from_str(&response_line).context(
                    format!("Failed to parse daemon response: {}", response_line),
                )?;
                Ok(response)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn is_daemon_running() -> bool {
        Daemon::is_running()
    }
}

#[cfg(test)]
#[path = "../daemon_test.rs"]
mod daemon_test;
