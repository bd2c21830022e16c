//! Normalized backend envelopes.
//!
//! Whatever framing the backend used on the wire, the rest of the system only
//! ever sees these types.

use crate::session::SessionId;
use serde::{Deserialize, Serialize};

/// One interviewer line in a turn, as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaLine {
    pub character: String,
    pub content: String,
}

impl PersonaLine {
    pub fn new(character: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            character: character.into(),
            content: content.into(),
        }
    }
}

/// Opaque final result of the assessment.
///
/// Passed through to the results consumer exactly as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisResult(serde_json::Value);

impl AnalysisResult {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_inner(self) -> serde_json::Value {
        self.0
    }
}

/// A backend response after unwrapping.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEnvelope {
    /// Ordered interviewer messages. When `closing` is set the turn is the
    /// last one: its messages are revealed, then the analysis is handed off.
    Turn {
        messages: Vec<PersonaLine>,
        closing: Option<AnalysisResult>,
    },
    /// Terminal "analysis ready" signal.
    Analysis(AnalysisResult),
    /// Acknowledged, nothing to show.
    Empty,
}

impl BackendEnvelope {
    pub fn turn(messages: Vec<PersonaLine>) -> Self {
        BackendEnvelope::Turn {
            messages,
            closing: None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BackendEnvelope::Turn { .. } => "turn",
            BackendEnvelope::Analysis(_) => "analysis",
            BackendEnvelope::Empty => "empty",
        }
    }
}

/// A normalized envelope together with any session id found in the body.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendReply {
    pub session_id: Option<SessionId>,
    pub envelope: BackendEnvelope,
}

impl BackendReply {
    pub fn new(envelope: BackendEnvelope) -> Self {
        Self {
            session_id: None,
            envelope,
        }
    }

    pub fn with_session_id(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }
}
