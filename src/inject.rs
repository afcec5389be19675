//! Locate the agent chat input, type into it and submit

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::candidates::{self, Outcome};
use crate::config::Config;
use crate::errors::{AutomationError, Result};
use crate::evaluator::RemoteEvaluator;
use crate::protocol::Connection;
use crate::scripts;
use crate::targets::{self, DebugTarget};

/// What the injection script reported for one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectionResult {
    pub found: bool,
    /// `<strategy>:<selector>` that located the input
    #[serde(default)]
    pub strategy: String,
    /// `native` (editing command) or `assign` (value + synthetic events)
    #[serde(default)]
    pub insertion: Option<String>,
    /// `button` or `enter-key`
    #[serde(default)]
    pub submission: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    /// Visible input-like elements, reported when nothing matched
    #[serde(default)]
    pub inputs: Vec<String>,
}

impl InjectionResult {
    fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| AutomationError::InvalidResponse(format!("injection result: {}", e)))
    }

    /// One-line reason for a failed injection
    pub fn failure_reason(&self) -> String {
        let mut reason = self
            .error
            .clone()
            .unwrap_or_else(|| "chat input not found".to_string());
        if !self.inputs.is_empty() {
            reason.push_str(&format!(" (visible inputs: {})", self.inputs.join(", ")));
        }
        reason
    }
}

/// Type `text` into the chat input on an open connection and submit it.
///
/// After the page reports a submission, Enter is also sent through the
/// input domain. That second path is best-effort and cannot turn a reported
/// success into a failure.
pub async fn inject_text(conn: &Connection, text: &str, settle_delay_ms: u64) -> Result<InjectionResult> {
    let evaluator = RemoteEvaluator::new(conn);
    let value = evaluator
        .evaluate(&scripts::inject_chat(text, settle_delay_ms), true)
        .await?;
    let result = InjectionResult::from_value(value)?;

    if result.found {
        debug!(
            strategy = %result.strategy,
            insertion = ?result.insertion,
            submission = ?result.submission,
            "chat input filled and submitted"
        );
        if let Err(e) = evaluator.press_enter().await {
            debug!("protocol-level Enter failed after page submit: {}", e);
        }
    }

    Ok(result)
}

/// Send `text` to the first target exposing a chat input
pub async fn send_text(text: &str, config: &Config) -> Result<InjectionResult> {
    let candidates = targets::list_candidates(config.port).await?;
    info!(
        candidates = candidates.len(),
        "Sending {} chars to agent chat",
        text.chars().count()
    );

    candidates::first_success(&candidates, config.max_diagnostics, |target| {
        attempt_injection(target, text, config)
    })
    .await
    .map_err(|diagnostics| {
        warn!("No chat input found on port {}", config.port);
        AutomationError::NoChatInputFound {
            diagnostics: diagnostics.summary(),
        }
    })
}

async fn attempt_injection(
    target: DebugTarget,
    text: &str,
    config: &Config,
) -> Result<Outcome<InjectionResult>> {
    let endpoint = target.debugger_endpoint.as_deref().unwrap_or_default();
    let conn = Connection::connect(endpoint, config.command_timeout()).await?;
    let result = inject_text(&conn, text, config.settle_delay_ms).await;
    conn.close().await;

    let result = result?;
    if result.found {
        info!(target = %target.label(), strategy = %result.strategy, "Message submitted");
        Ok(Outcome::Success(result))
    } else {
        Ok(Outcome::Miss(result.failure_reason()))
    }
}
