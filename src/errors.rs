use thiserror::Error;

/// Failures raised while driving the remote chat UI.
///
/// Per-candidate variants (`Connection`, `CommandTimeout`, `RemoteProtocol`,
/// `Evaluation`, `InvalidResponse`) are normally caught by the candidate
/// search and turned into diagnostic lines. Only `DirectoryUnavailable`,
/// the two "nothing matched" variants and `Config` reach the caller.
#[derive(Debug, Error)]
pub enum AutomationError {
    /// The DevTools target directory could not be read (exit code 4)
    #[error(
        "DevTools endpoint unavailable on port {port}: {reason}. \
         Relaunch the IDE with --remote-debugging-port={port}"
    )]
    DirectoryUnavailable { port: u16, reason: String },

    /// The WebSocket to a target could not be opened or dropped (exit code 4)
    #[error("connection to {url} failed: {reason}")]
    Connection { url: String, reason: String },

    /// No response for a command within the per-command timeout (exit code 5)
    #[error("CDP command '{method}' timed out")]
    CommandTimeout { method: String },

    /// The remote side answered with an `error` object
    #[error("CDP error: {message}")]
    RemoteProtocol { message: String },

    /// The evaluated script threw
    #[error("page script threw: {description}")]
    Evaluation { description: String },

    /// A response did not have the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Every candidate was tried and none exposed a chat input (exit code 2)
    #[error("chat input not found in any debug target:\n{diagnostics}")]
    NoChatInputFound { diagnostics: String },

    /// Every candidate was tried and none yielded a capture region (exit code 2)
    #[error("chat region not found in any debug target:\n{diagnostics}")]
    NoChatRegionFound { diagnostics: String },

    /// Nothing to send after trimming
    #[error("message is empty")]
    EmptyMessage,

    /// Invalid or unreadable configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl AutomationError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            AutomationError::NoChatInputFound { .. } | AutomationError::NoChatRegionFound { .. } => {
                2
            }
            AutomationError::DirectoryUnavailable { .. } | AutomationError::Connection { .. } => 4,
            AutomationError::CommandTimeout { .. } => 5,
            _ => 1,
        }
    }
}

/// An error reported by the daemon, already rendered to text
#[derive(Debug, Error)]
#[error("{message}")]
pub struct RelayFailure {
    pub message: String,
    pub exit_code: i32,
}

/// Exit code for an error reaching `main`
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| {
            cause
                .downcast_ref::<AutomationError>()
                .map(AutomationError::exit_code)
                .or_else(|| cause.downcast_ref::<RelayFailure>().map(|f| f.exit_code))
        })
        .unwrap_or(1)
}

pub type Result<T, E = AutomationError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let err = AutomationError::NoChatInputFound {
            diagnostics: String::new(),
        };
        assert_eq!(err.exit_code(), 2);

        let err = AutomationError::DirectoryUnavailable {
            port: 9222,
            reason: "connection refused".to_string(),
        };
        assert_eq!(err.exit_code(), 4);

        let err = AutomationError::CommandTimeout {
            method: "Runtime.evaluate".to_string(),
        };
        assert_eq!(err.exit_code(), 5);

        let err = AutomationError::Evaluation {
            description: "ReferenceError".to_string(),
        };
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_directory_unavailable_mentions_port() {
        let err = AutomationError::DirectoryUnavailable {
            port: 9333,
            reason: "connection refused".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("port 9333"));
        assert!(msg.contains("--remote-debugging-port=9333"));
    }

    #[test]
    fn test_exit_code_through_anyhow_context() {
        let err = anyhow::Error::new(AutomationError::NoChatRegionFound {
            diagnostics: "[page] IDE: no region".to_string(),
        })
        .context("Failed to capture chat region");
        assert_eq!(exit_code_for(&err), 2);

        let err = anyhow::Error::new(RelayFailure {
            message: "CDP command 'Runtime.evaluate' timed out".to_string(),
            exit_code: 5,
        });
        assert_eq!(exit_code_for(&err), 5);

        let err = anyhow::anyhow!("daemon said no");
        assert_eq!(exit_code_for(&err), 1);
    }
}
