//! Wait for the agent to finish answering.
//!
//! Each tick probes the candidates for the first surface hosting the chat and
//! classifies it as generating or idle. Completion needs `threshold`
//! consecutive idle ticks, which absorbs the flicker between "submitted" and
//! "generating".

use serde::Deserialize;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

use crate::candidates::{self, Outcome};
use crate::config::Config;
use crate::errors::{AutomationError, Result};
use crate::evaluator::RemoteEvaluator;
use crate::protocol::Connection;
use crate::scripts;
use crate::targets::{self, DebugTarget};

/// Raw affordances reported by the state probe
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSignals {
    pub has_chat: bool,
    pub has_stop: bool,
    pub has_send: bool,
    pub input_disabled: bool,
}

/// One tick's view of the chat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollObservation {
    pub has_chat: bool,
    pub is_generating: bool,
    pub is_idle: bool,
}

impl PollObservation {
    pub const IDLE: Self = Self {
        has_chat: true,
        is_generating: false,
        is_idle: true,
    };

    pub const GENERATING: Self = Self {
        has_chat: true,
        is_generating: true,
        is_idle: false,
    };

    /// A stop control or a disabled input means the agent is busy; a send
    /// control without either means it is waiting for input. The send control
    /// counts even when disabled, since it stays disabled until the user types.
    pub fn classify(signals: StateSignals) -> Self {
        let is_generating = signals.has_chat && (signals.has_stop || signals.input_disabled);
        Self {
            has_chat: signals.has_chat,
            is_generating,
            is_idle: signals.has_chat && !is_generating && signals.has_send,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Polling,
    Idle(u32),
    Done,
    TimedOut,
}

/// Debounce state machine over successive observations
#[derive(Debug)]
pub struct CompletionTracker {
    threshold: u32,
    idle_count: u32,
    state: PollState,
}

impl CompletionTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            idle_count: 0,
            state: PollState::Polling,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Feed one tick. `None` means no surface hosted the chat this tick and
    /// leaves the counter untouched.
    pub fn observe(&mut self, observation: Option<PollObservation>) -> PollState {
        if matches!(self.state, PollState::Done | PollState::TimedOut) {
            return self.state;
        }

        let Some(observation) = observation else {
            return self.state;
        };

        if observation.is_idle && !observation.is_generating {
            self.idle_count += 1;
            self.state = if self.idle_count >= self.threshold {
                PollState::Done
            } else {
                PollState::Idle(self.idle_count)
            };
        } else {
            self.idle_count = 0;
            self.state = PollState::Polling;
        }
        self.state
    }

    pub fn time_out(&mut self) -> PollState {
        if self.state != PollState::Done {
            self.state = PollState::TimedOut;
        }
        self.state
    }
}

/// Poll `sample` until the tracker reports done or `timeout` elapses.
///
/// Returns `Ok(false)` on timeout. An error from `sample` ends the wait.
pub async fn poll_until_idle<S, Fut>(
    mut sample: S,
    threshold: u32,
    interval: Duration,
    timeout: Duration,
) -> Result<bool>
where
    S: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<PollObservation>>>,
{
    let started = Instant::now();
    let mut tracker = CompletionTracker::new(threshold);
    let mut tick = 0u32;

    loop {
        tick += 1;
        let observation = sample().await?;
        let state = tracker.observe(observation);
        trace!(tick, ?observation, ?state, "poll tick");

        if state == PollState::Done {
            info!(tick, elapsed_ms = started.elapsed().as_millis() as u64, "Agent finished");
            return Ok(true);
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            tracker.time_out();
            info!(tick, "Timed out waiting for agent");
            return Ok(false);
        }

        tokio::time::sleep(interval.min(timeout - elapsed)).await;
    }
}

/// Wait until the chat on `config.port` has been idle for
/// `config.idle_threshold` consecutive ticks
pub async fn wait_for_completion(config: &Config, timeout: Duration) -> Result<bool> {
    info!(
        port = config.port,
        timeout_ms = timeout.as_millis() as u64,
        "Waiting for agent to finish"
    );
    poll_until_idle(
        || sample(config),
        config.idle_threshold,
        config.poll_interval(),
        timeout,
    )
    .await
}

/// Observation from the first chat-bearing candidate, if any
async fn sample(config: &Config) -> Result<Option<PollObservation>> {
    let candidates = targets::list_candidates(config.port).await?;

    match candidates::first_success(&candidates, config.max_diagnostics, |target| {
        probe_target(target, config)
    })
    .await
    {
        Ok(observation) => Ok(Some(observation)),
        Err(diagnostics) => {
            debug!("No chat surface this tick:\n{}", diagnostics);
            Ok(None)
        }
    }
}

async fn probe_target(target: DebugTarget, config: &Config) -> Result<Outcome<PollObservation>> {
    let endpoint = target.debugger_endpoint.as_deref().unwrap_or_default();
    let conn = Connection::connect(endpoint, config.command_timeout()).await?;
    let value = RemoteEvaluator::new(&conn)
        .evaluate(&scripts::probe_state(), false)
        .await;
    conn.close().await;

    let signals: StateSignals = serde_json::from_value(value?)
        .map_err(|e| AutomationError::InvalidResponse(format!("state probe: {}", e)))?;

    if signals.has_chat {
        Ok(Outcome::Success(PollObservation::classify(signals)))
    } else {
        Ok(Outcome::Miss("no chat surface".to_string()))
    }
}

#[cfg(test)]
#[path = "poller_test.rs"]
mod poller_test;
