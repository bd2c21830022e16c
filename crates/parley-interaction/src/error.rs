//! Transport-level failures.
//!
//! Every failure of a backend exchange is caught at the adapter boundary and
//! returned as one of these values; nothing panics past it.

use parley_core::ParleyError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request never produced a response (DNS, refused connection, reset).
    #[error("Backend request failed: {0}")]
    Network(String),

    /// The backend answered with a non-success status.
    #[error("Backend returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The configured request timeout elapsed.
    #[error("Backend request timed out")]
    Timeout,

    /// The body matched none of the recognized envelope shapes.
    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    /// A start reply carried no session identifier.
    #[error("Backend start reply carried no session identifier")]
    MissingSessionId,
}

impl TransportError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }

    /// Whether resubmitting the same message could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout => true,
            Self::Status { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            Self::MalformedResponse(_) | Self::MissingSessionId => false,
        }
    }

    /// Maps a failure of the session-establishment call. Always fatal.
    pub fn into_start_failure(self) -> ParleyError {
        ParleyError::StartFailure(self.to_string())
    }

    /// Maps a failure of a mid-conversation exchange. Always recoverable.
    pub fn into_turn_error(self) -> ParleyError {
        match self {
            Self::MalformedResponse(message) => ParleyError::MalformedResponse(message),
            other => ParleyError::TurnTransport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_and_turn_mappings_differ_in_severity() {
        let start = TransportError::Timeout.into_start_failure();
        let turn = TransportError::Timeout.into_turn_error();

        assert!(!start.is_recoverable());
        assert!(turn.is_recoverable());
    }

    #[test]
    fn malformed_turn_keeps_its_kind() {
        let err = TransportError::malformed("not json").into_turn_error();
        assert!(matches!(err, ParleyError::MalformedResponse(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn server_errors_are_retryable() {
        let unavailable = TransportError::Status {
            status: 503,
            message: "down".into(),
        };
        let forbidden = TransportError::Status {
            status: 403,
            message: "no".into(),
        };
        assert!(unavailable.is_retryable());
        assert!(!forbidden.is_retryable());
    }
}
