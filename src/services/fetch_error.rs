use std::time::Duration;
use thiserror::Error;

/// Why a fetch did not produce rows
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("server responded with status {0}")]
    Status(u16),

    #[error("no response within {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("unexpected response shape: {0}")]
    Schema(String),

    #[error("request was cancelled")]
    Cancelled,
}

/// Coarse failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    TransportFailure,
    Timeout,
    SchemaViolation,
    Cancelled,
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Transport(_) | FetchError::Status(_) => FetchErrorKind::TransportFailure,
            FetchError::Timeout(_) => FetchErrorKind::Timeout,
            FetchError::Schema(_) => FetchErrorKind::SchemaViolation,
            FetchError::Cancelled => FetchErrorKind::Cancelled,
        }
    }

    /// Whether this is a real failure rather than an aborted transport.
    /// Superseded requests are dropped by the lifecycle before this matters.
    pub fn is_user_visible(&self) -> bool {
        self.kind() != FetchErrorKind::Cancelled
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Schema(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}
