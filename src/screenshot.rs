//! Capture a JPEG of the agent chat area

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::candidates::{self, Outcome};
use crate::config::Config;
use crate::errors::{AutomationError, Result};
use crate::evaluator::{RemoteEvaluator, ScreenshotRegion};
use crate::protocol::Connection;
use crate::scripts;
use crate::targets::{self, DebugTarget};

/// Below this height the matched element is replaced by an ancestor
pub const MIN_ELEMENT_HEIGHT: f64 = 100.0;
/// Below this height the whole document body is captured instead
pub const MIN_REGION_HEIGHT: f64 = 200.0;

/// What the region probe found on one target
#[derive(Debug, Clone, Deserialize)]
pub struct RegionProbe {
    pub found: bool,
    #[serde(default)]
    pub selector: Option<String>,
    /// Matched element first, then its ancestors outward
    #[serde(default)]
    pub chain: Vec<ScreenshotRegion>,
    pub body: Option<ScreenshotRegion>,
}

impl RegionProbe {
    /// Pick the capture rectangle, or `None` if nothing usable was reported.
    ///
    /// Walks outward from the matched element while it is shorter than
    /// [`MIN_ELEMENT_HEIGHT`], then falls back to the body if the result is
    /// still shorter than [`MIN_REGION_HEIGHT`].
    pub fn choose_region(&self) -> Option<ScreenshotRegion> {
        if !self.found || self.chain.is_empty() {
            return None;
        }

        let region = self
            .chain
            .iter()
            .find(|r| r.height >= MIN_ELEMENT_HEIGHT)
            .or(self.chain.last())
            .copied()?;

        if region.height < MIN_REGION_HEIGHT || region.width <= 0.0 {
            return self.body.filter(|b| b.width > 0.0 && b.height > 0.0).map(clamp);
        }
        Some(clamp(region))
    }
}

/// Clip rectangles must start inside the page
fn clamp(region: ScreenshotRegion) -> ScreenshotRegion {
    let x = region.x.max(0.0);
    let y = region.y.max(0.0);
    ScreenshotRegion {
        x,
        y,
        width: (region.width - (x - region.x)).max(1.0),
        height: (region.height - (y - region.y)).max(1.0),
    }
}

/// Capture the chat area of the first target that has one
pub async fn capture(config: &Config) -> Result<Vec<u8>> {
    let candidates = targets::list_candidates(config.port).await?;
    info!(candidates = candidates.len(), "Capturing agent chat");

    candidates::first_success(&candidates, config.max_diagnostics, |target| {
        capture_target(target, config)
    })
    .await
    .map_err(|diagnostics| {
        warn!("No chat region found on port {}", config.port);
        AutomationError::NoChatRegionFound {
            diagnostics: diagnostics.summary(),
        }
    })
}

async fn capture_target(target: DebugTarget, config: &Config) -> Result<Outcome<Vec<u8>>> {
    let endpoint = target.debugger_endpoint.as_deref().unwrap_or_default();
    let conn = Connection::connect(endpoint, config.command_timeout()).await?;
    let outcome = capture_on(&conn, config.jpeg_quality).await;
    conn.close().await;

    if let Ok(Outcome::Success(bytes)) = &outcome {
        info!(target = %target.label(), bytes = bytes.len(), "Captured chat region");
    }
    outcome
}

async fn capture_on(conn: &Connection, quality: u8) -> Result<Outcome<Vec<u8>>> {
    let evaluator = RemoteEvaluator::new(conn);
    let value = evaluator.evaluate(&scripts::probe_region(), false).await?;
    let probe: RegionProbe = serde_json::from_value(value)
        .map_err(|e| AutomationError::InvalidResponse(format!("region probe: {}", e)))?;

    let Some(region) = probe.choose_region() else {
        return Ok(Outcome::Miss("no visible chat container".to_string()));
    };
    debug!(selector = ?probe.selector, ?region, "capture region");

    let bytes = evaluator.capture_screenshot(region, quality).await?;
    if bytes.is_empty() {
        return Ok(Outcome::Miss("empty screenshot".to_string()));
    }
    Ok(Outcome::Success(bytes))
}
