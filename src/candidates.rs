//! Sequential trial over candidate targets.
//!
//! Injection, completion probing and screenshotting all follow the same
//! search: try each target in directory order, stop at the first success,
//! and turn every failure into a `[kind] title: reason` line.

use std::fmt;
use std::future::Future;
use tracing::debug;

use crate::errors::Result;
use crate::targets::DebugTarget;

/// Result of one attempt that did not error
#[derive(Debug)]
pub enum Outcome<T> {
    /// The target did what was asked
    Success(T),
    /// The target answered but does not host what we look for
    Miss(String),
}

/// Per-target failure lines collected during one search
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    lines: Vec<String>,
    cap: usize,
}

impl Diagnostics {
    /// `cap` bounds how many lines [`Diagnostics::summary`] reports
    pub fn new(cap: usize) -> Self {
        Self {
            lines: Vec::new(),
            cap,
        }
    }

    pub fn record(&mut self, target: &DebugTarget, reason: impl fmt::Display) {
        let line = format!("{}: {}", target.label(), reason);
        debug!("{}", line);
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The first `cap` lines, one per line, with a count of the rest
    pub fn summary(&self) -> String {
        if self.lines.is_empty() {
            return "no debug targets to try".to_string();
        }
        let shown = self.cap.max(1).min(self.lines.len());
        let mut out = self.lines[..shown].join("\n");
        let hidden = self.lines.len() - shown;
        if hidden > 0 {
            out.push_str(&format!("\n(+{} more)", hidden));
        }
        out
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Try `attempt` on each candidate in order and return the first success.
///
/// Errors and misses never stop the search; they are recorded and the next
/// candidate is tried. Candidates are attempted strictly one at a time.
pub async fn first_success<T, F, Fut>(
    candidates: &[DebugTarget],
    cap: usize,
    mut attempt: F,
) -> std::result::Result<T, Diagnostics>
where
    F: FnMut(DebugTarget) -> Fut,
    Fut: Future<Output = Result<Outcome<T>>>,
{
    let mut diagnostics = Diagnostics::new(cap);

    for target in candidates {
        match attempt(target.clone()).await {
            Ok(Outcome::Success(value)) => {
                debug!(target = %target.label(), "candidate succeeded");
                return Ok(value);
            }
            Ok(Outcome::Miss(reason)) => diagnostics.record(target, reason),
            Err(e) => diagnostics.record(target, e),
        }
    }

    Err(diagnostics)
}
