//! Error types for the Parley conversation orchestrator.

use crate::persona::PersonaSlot;
use crate::session::{SessionId, SessionStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a user submission was turned away at the input boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The submitted text was empty after trimming.
    EmptyInput,
    /// A backend exchange or a reveal is still in progress.
    Busy,
    /// The session has completed, failed, or been torn down.
    SessionClosed,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::EmptyInput => write!(f, "message is empty"),
            RejectReason::Busy => write!(f, "a reply is still in progress"),
            RejectReason::SessionClosed => write!(f, "the session is closed"),
        }
    }
}

/// A shared error type for the whole conversation core.
///
/// Transport- and parse-level failures are converted into these typed variants
/// at the transport boundary; the state machine never sees raw I/O errors.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum ParleyError {
    /// The session-establishment call failed or returned unusable data.
    /// Fatal for the attempt; a retry needs a brand-new session.
    #[error("Failed to start session: {0}")]
    StartFailure(String),

    /// A mid-conversation exchange failed. The session stays usable.
    #[error("Turn failed: {0}")]
    TurnTransport(String),

    /// The backend body matched none of the recognized envelope shapes.
    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    /// A third distinct persona name appeared after both slots were bound.
    #[error("Unrecognized persona '{name}', attributed to {fallback} slot")]
    UnrecognizedPersona { name: String, fallback: PersonaSlot },

    /// An append was attempted after the session was torn down or closed.
    #[error("Stale append ignored for session {session}")]
    StaleAppend { session: String },

    /// A user submission was rejected at the boundary (never queued).
    #[error("Input rejected: {reason}")]
    InputRejected { reason: RejectReason },

    /// A status change that the lifecycle does not allow.
    #[error("Invalid status transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    /// The results consumer could not take the analysis.
    #[error("Result handoff failed: {0}")]
    Handoff(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (config file access)
    #[error("IO error: {message}")]
    Io { message: String },
}

impl ParleyError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a StartFailure error
    pub fn start_failure(message: impl Into<String>) -> Self {
        Self::StartFailure(message.into())
    }

    /// Creates a TurnTransport error
    pub fn turn_transport(message: impl Into<String>) -> Self {
        Self::TurnTransport(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn handoff(message: impl Into<String>) -> Self {
        Self::Handoff(message.into())
    }

    /// Creates an InputRejected error
    pub fn rejected(reason: RejectReason) -> Self {
        Self::InputRejected { reason }
    }

    /// Creates a StaleAppend error for the given session identifier, if any.
    pub fn stale_append(session: Option<&SessionId>) -> Self {
        Self::StaleAppend {
            session: session
                .map(ToString::to_string)
                .unwrap_or_else(|| "<unbound>".to_string()),
        }
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Whether the session survives this error and may accept another submission.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::TurnTransport(_)
                | Self::MalformedResponse(_)
                | Self::UnrecognizedPersona { .. }
                | Self::StaleAppend { .. }
                | Self::InputRejected {
                    reason: RejectReason::EmptyInput | RejectReason::Busy
                }
        )
    }

    /// Check if this is a StartFailure error
    pub fn is_start_failure(&self) -> bool {
        matches!(self, Self::StartFailure(_))
    }

    /// Returns the rejection reason when this error is an input rejection.
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::InputRejected { reason } => Some(*reason),
            _ => None,
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for ParleyError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<toml::de::Error> for ParleyError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("TOML parse error: {err}"))
    }
}

/// A type alias for `Result<T, ParleyError>`.
pub type Result<T> = std::result::Result<T, ParleyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_failure_is_terminal() {
        let err = ParleyError::start_failure("connection refused");
        assert!(err.is_start_failure());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn turn_failures_and_busy_rejections_are_recoverable() {
        assert!(ParleyError::turn_transport("timeout").is_recoverable());
        assert!(ParleyError::rejected(RejectReason::Busy).is_recoverable());
        assert!(!ParleyError::rejected(RejectReason::SessionClosed).is_recoverable());
    }

    #[test]
    fn stale_append_names_unbound_sessions() {
        let err = ParleyError::stale_append(None);
        assert_eq!(err.to_string(), "Stale append ignored for session <unbound>");
    }
}
