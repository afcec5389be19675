use anyhow::Result;
use serde_json::json;
use tracing::info;

use crate::commands::utils;
use crate::config::Config;
use crate::daemon::{DaemonRequest, DaemonResponse};

pub async fn handle_ask(
    config: &Config,
    text: String,
    timeout_ms: Option<u64>,
    local: bool,
) -> Result<()> {
    info!(port = config.port, "Asking the agent");

    match utils::execute(config, DaemonRequest::Ask { text, timeout_ms }, local).await? {
        DaemonResponse::Answered(outcome) => utils::print_json(&json!({
            "sent": outcome.injection,
            "completed": outcome.completed,
        })),
        other => Err(utils::unexpected(other)),
    }
}
