use std::time::Duration;

use thiserror::Error;

/// Outcome classification for a backend call, in priority order: a timeout
/// is reported as a timeout even though reqwest surfaces it as a request
/// error, then any other transport failure, then a non-2xx reply.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The call exceeded its per-operation budget.
    #[error("chat backend timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Connection refused/reset, DNS failure, broken body, and the like.
    #[error("chat backend unreachable: {0}")]
    Transport(reqwest::Error),

    /// The backend answered with a non-2xx status. Status and body are kept
    /// raw so callers can pass them through unchanged.
    #[error("chat backend returned HTTP {status}")]
    Backend { status: u16, body: String },
}

impl GatewayError {
    /// Classify a reqwest failure against the budget that was in force.
    pub(crate) fn classify(err: reqwest::Error, budget: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                seconds: budget.as_secs(),
            }
        } else {
            Self::Transport(err)
        }
    }

    /// HTTP-equivalent status for this outcome.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Timeout { .. } => 504,
            Self::Transport(_) => 502,
            Self::Backend { status, .. } => *status,
        }
    }

    /// Short machine-readable marker for response metadata.
    pub fn marker(&self) -> String {
        match self {
            Self::Timeout { .. } => "timeout".into(),
            Self::Transport(_) => "connection_error".into(),
            Self::Backend { status, .. } => format!("http_{status}"),
        }
    }
}
