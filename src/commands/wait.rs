use anyhow::Result;
use serde_json::json;
use tracing::info;

use crate::commands::utils;
use crate::config::Config;
use crate::daemon::{DaemonRequest, DaemonResponse};

pub async fn handle_wait(config: &Config, timeout_ms: Option<u64>, local: bool) -> Result<()> {
    let effective = timeout_ms.unwrap_or(config.wait_timeout_ms);
    info!("Waiting for the agent to finish (timeout {}ms)", effective);

    match utils::execute(config, DaemonRequest::Wait { timeout_ms }, local).await? {
        // A timeout is a normal outcome, not an error
        DaemonResponse::Completed(completed) => utils::print_json(&json!({
            "completed": completed,
            "timeout_ms": effective,
        })),
        other => Err(utils::unexpected(other)),
    }
}
