//! The relay service: the three chat operations behind one owned object.
//!
//! Command front-ends (CLI, daemon) construct one `Relay` and share it by
//! reference. Every call does its own target listing and opens fresh
//! connections; nothing is cached between calls.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::errors::{AutomationError, Result};
use crate::inject::{self, InjectionResult};
use crate::poller;
use crate::screenshot;
use crate::targets::{self, DebugTarget};

/// Result of sending a message and waiting for the answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskOutcome {
    pub injection: InjectionResult,
    /// `false` if the wait timed out
    pub completed: bool,
}

pub struct Relay {
    config: Config,
}

impl Relay {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Type `text` into the agent chat and submit it. Whitespace-only text is
    /// rejected; anything else is typed exactly as given.
    pub async fn send_text(&self, text: &str) -> Result<InjectionResult> {
        if text.trim().is_empty() {
            return Err(AutomationError::EmptyMessage);
        }
        inject::send_text(text, &self.config).await
    }

    /// Wait for the agent to go idle; `None` uses the configured timeout
    pub async fn wait_for_completion(&self, timeout: Option<Duration>) -> Result<bool> {
        let timeout = timeout.unwrap_or_else(|| self.config.wait_timeout());
        poller::wait_for_completion(&self.config, timeout).await
    }

    /// JPEG bytes of the chat area
    pub async fn capture_region(&self) -> Result<Vec<u8>> {
        screenshot::capture(&self.config).await
    }

    /// Send, then wait. A failed send does not start the wait.
    pub async fn ask(&self, text: &str, timeout: Option<Duration>) -> Result<AskOutcome> {
        let injection = self.send_text(text).await?;
        info!("Message sent, waiting for the agent");
        let completed = self.wait_for_completion(timeout).await?;
        Ok(AskOutcome {
            injection,
            completed,
        })
    }

    /// Every directory entry, candidate or not
    pub async fn targets(&self) -> Result<Vec<DebugTarget>> {
        targets::list_all(self.config.port).await
    }
}
