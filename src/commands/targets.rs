use anyhow::Result;
use serde_json::json;

use crate::commands::utils;
use crate::config::Config;
use crate::daemon::{DaemonRequest, DaemonResponse};

pub async fn handle_targets(config: &Config, local: bool) -> Result<()> {
    let targets = match utils::execute(config, DaemonRequest::Targets, local).await? {
        DaemonResponse::Targets(targets) => targets,
        other => return Err(utils::unexpected(other)),
    };

    let listing: Vec<_> = targets
        .iter()
        .map(|t| {
            json!({
                "id": t.id,
                "kind": t.kind,
                "title": t.title,
                "url": t.url,
                "candidate": t.is_candidate(),
            })
        })
        .collect();
    utils::print_json(&listing)
}
