use thiserror::Error;

/// Failures from the hub discovery connector.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("hub transport error: {0}")]
    Transport(String),
    #[error("hub rate limited")]
    RateLimited,
    #[error("hub request timed out")]
    Timeout,
}

impl HubError {
    /// Transient errors are worth a bounded retry; the rest terminate the
    /// lookup for this candidate only.
    pub fn is_transient(&self) -> bool {
        matches!(self, HubError::RateLimited | HubError::Timeout | HubError::Transport(_))
    }
}

/// Failures from the LLM completion client.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Output was not parseable into the structured result. Recorded as an
    /// analysis failure; the candidate stays eligible for the next run's
    /// delta check.
    #[error("malformed completion output: {0}")]
    Malformed(String),
    #[error("completion rate limited")]
    RateLimited,
    #[error("completion timed out")]
    Timeout,
    #[error("completion transport error: {0}")]
    Transport(String),
}

impl LlmError {
    pub fn is_transient(&self) -> bool {
        matches!(self, LlmError::RateLimited | LlmError::Timeout | LlmError::Transport(_))
    }
}
