//! Runtime configuration for the chat relay

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::{AutomationError, Result};

/// Environment variable overriding the debugging port
pub const PORT_ENV: &str = "CHATPROBE_PORT";

/// Tunables for target discovery, injection, polling and capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote debugging port of the IDE
    pub port: u16,
    /// Timeout for a single CDP command
    pub command_timeout_ms: u64,
    /// Default overall timeout when waiting for the agent to finish
    pub wait_timeout_ms: u64,
    /// Delay between completion probes
    pub poll_interval_ms: u64,
    /// Consecutive idle probes required before the agent counts as done
    pub idle_threshold: u32,
    /// In-page delay between inserting text and submitting it
    pub settle_delay_ms: u64,
    /// Maximum number of per-target diagnostic lines in an error
    pub max_diagnostics: usize,
    /// JPEG quality for chat screenshots
    pub jpeg_quality: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 9222,
            command_timeout_ms: 3_000,
            wait_timeout_ms: 300_000,
            poll_interval_ms: 2_000,
            idle_threshold: 2,
            settle_delay_ms: 150,
            max_diagnostics: 5,
            jpeg_quality: 80,
        }
    }
}

impl Config {
    /// Default location of the config file (`~/.chatprobe/config.json`)
    pub fn default_path() -> Result<PathBuf> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| AutomationError::Config("Unable to determine home directory".into()))?;
        Ok(home_dir.join(".chatprobe").join("config.json"))
    }

    /// Load the effective configuration: defaults, then the config file, then
    /// the environment, then an explicit port
    pub fn load(path: Option<&Path>, port_override: Option<u16>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        let mut config = Self::from_file(&path)?;
        config.apply_env()?;
        if let Some(port) = port_override {
            config.port = port;
        }
        config.validate()?;
        Ok(config)
    }

    /// Read a config file; a missing file yields the defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path).map_err(|e| {
            AutomationError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|e| {
            AutomationError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(raw) = std::env::var(PORT_ENV) {
            self.port = raw.trim().parse().map_err(|_| {
                AutomationError::Config(format!("{} is not a valid port: {:?}", PORT_ENV, raw))
            })?;
        }
        Ok(())
    }

    /// Reject values that would make the relay spin or never finish
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(AutomationError::Config("port must be non-zero".into()));
        }
        if self.command_timeout_ms == 0 {
            return Err(AutomationError::Config(
                "command_timeout_ms must be non-zero".into(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(AutomationError::Config(
                "poll_interval_ms must be non-zero".into(),
            ));
        }
        if self.idle_threshold == 0 {
            return Err(AutomationError::Config(
                "idle_threshold must be at least 1".into(),
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(AutomationError::Config(
                "jpeg_quality must be between 1 and 100".into(),
            ));
        }
        Ok(())
    }

    /// Write this configuration, refusing to replace an existing file
    pub fn write_new(&self, path: &Path) -> Result<()> {
        if path.exists() {
            return Err(AutomationError::Config(format!(
                "{} already exists",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AutomationError::Config(format!("{}: {}", parent.display(), e)))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AutomationError::Config(e.to_string()))?;
        fs::write(path, json)
            .map_err(|e| AutomationError::Config(format!("{}: {}", path.display(), e)))?;
        info!("Wrote config to {}", path.display());
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
