//! # chatprobe
#![allow(clippy::uninlined_format_args)]
//!
//! CLI tool that drives an IDE's AI-agent chat panel over the Chrome DevTools
//! Protocol.
//!
//! Sends text into the chat input, waits for the agent to stop generating,
//! and captures a screenshot of the chat area. The IDE must be started with
//! `--remote-debugging-port=<port>`.
//!
//! ## CLI Usage
//!
//! ```bash
//! # Send a message to the agent
//! chatprobe send "Add tests for the parser"
//!
//! # Wait until the agent finishes (default timeout from config)
//! chatprobe wait --timeout 120000
//!
//! # Send, then wait
//! chatprobe ask "Summarise the failing tests"
//!
//! # Screenshot the chat panel
//! chatprobe screenshot --output chat.jpg
//!
//! # List every debug target and whether it is searched
//! chatprobe targets | jq '.[] | select(.candidate)'
//!
//! # Use a different debugging port
//! chatprobe --port 9333 send "hello"
//! ```
//!
//! ### Daemon Mode
//!
//! ```bash
//! chatprobe daemon start
//! chatprobe send "hello"      # forwarded to the daemon
//! chatprobe --port 9333 send "hello"  # other port, runs in-process
//! chatprobe daemon stop
//! ```
//!
//! Results are printed as JSON on stdout. Errors are printed as
//! `{"error": true, "message": ..., "exit_code": ...}`; logs go to stderr.
//!
//! ## Library Usage
//!
//! ```no_run
//! use chatprobe::{Config, Relay};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let relay = Relay::new(Config::default());
//! relay.send_text("Run the test suite").await?;
//! let finished = relay.wait_for_completion(None).await?;
//! let jpeg = relay.capture_region().await?;
//! # Ok(())
//! # }
//! ```

/// Sequential search over debug targets with capped diagnostics
pub mod candidates;
/// CLI command handlers
pub mod commands;
/// Configuration file and environment handling
pub mod config;
/// Background relay service over a local socket
pub mod daemon;
/// Error types and exit codes
pub mod errors;
/// Script evaluation and the other protocol commands
pub mod evaluator;
/// Chat input location and text injection
pub mod inject;
/// Agent completion polling
pub mod poller;
/// DevTools WebSocket client
pub mod protocol;
/// The relay service object
pub mod relay;
/// Chat-area screenshots
pub mod screenshot;
/// Page scripts evaluated in the remote UI
pub mod scripts;
/// DevTools target directory
pub mod targets;

pub use config::Config;
pub use errors::{AutomationError, Result};
pub use inject::InjectionResult;
pub use relay::{AskOutcome, Relay};
pub use targets::{DebugTarget, TargetKind};
