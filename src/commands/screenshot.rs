use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use serde_json::json;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

use crate::commands::utils;
use crate::config::Config;
use crate::daemon::{DaemonRequest, DaemonResponse};

/// `chatprobe-<unix-seconds>.jpg` in the current directory
pub fn default_output_path() -> PathBuf {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    PathBuf::from(format!("chatprobe-{}.jpg", secs))
}

pub async fn handle_screenshot(config: &Config, output: Option<PathBuf>, local: bool) -> Result<()> {
    info!(port = config.port, "Taking screenshot of agent chat");

    let data = match utils::execute(config, DaemonRequest::Screenshot, local).await? {
        DaemonResponse::Screenshot { data, .. } => data,
        other => return Err(utils::unexpected(other)),
    };
    let bytes = B64
        .decode(data.as_bytes())
        .context("Daemon returned invalid screenshot data")?;

    let output = output.unwrap_or_else(default_output_path);
    std::fs::write(&output, &bytes)
        .with_context(|| format!("Failed to write screenshot to {}", output.display()))?;

    utils::print_json(&json!({
        "saved_to": output.display().to_string(),
        "bytes": bytes.len(),
    }))
}
