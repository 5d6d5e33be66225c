use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RemoteError>;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("No response within {0:?}")]
    Timeout(Duration),

    #[error("Service marked unavailable for another {retry_in:?}")]
    Unavailable { retry_in: Duration },

    #[error("No endpoint configured for {0}")]
    NotConfigured(&'static str),
}

impl RemoteError {
    /// Failures that say the service itself is unhealthy. These open the
    /// unavailability window; a malformed body only degrades the one call.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Status { .. } | Self::Timeout(_)
        )
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Network(format!("timed out: {err}"))
        } else {
            Self::Network(err.to_string())
        }
    }
}
