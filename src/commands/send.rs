use anyhow::Result;
use tracing::info;

use crate::commands::utils;
use crate::config::Config;
use crate::daemon::{DaemonRequest, DaemonResponse};

pub async fn handle_send(config: &Config, text: String, local: bool) -> Result<()> {
    info!(port = config.port, "Sending message to agent chat");

    match utils::execute(config, DaemonRequest::Send { text }, local).await? {
        DaemonResponse::Sent(result) => utils::print_json(&result),
        other => Err(utils::unexpected(other)),
    }
}
