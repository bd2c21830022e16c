//! Conversation session domain model.
//!
//! A `ConversationSession` is created once per assessment attempt, moves
//! strictly forward through [`SessionStatus`], and is discarded when it
//! reaches `Completed` or `Failed`. A retry always builds a new session.

use super::message::{Author, Message};
use super::transcript::Transcript;
use crate::error::{ParleyError, Result};
use crate::persona::PersonaSlots;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque session token issued by the backend on start.
///
/// Kept exactly as issued, in the JSON type the backend used, so it can be
/// echoed back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionId {
    Numeric(serde_json::Number),
    Text(String),
}

impl SessionId {
    /// Reads a session id from a JSON value. Blank strings and other types
    /// are not identifiers.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => Some(SessionId::Numeric(n.clone())),
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(SessionId::Text(s.clone())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SessionId::Numeric(n) => serde_json::Value::Number(n.clone()),
            SessionId::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl From<i64> for SessionId {
    fn from(n: i64) -> Self {
        SessionId::Numeric(n.into())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionId::Numeric(n) => write!(f, "{n}"),
            SessionId::Text(s) => f.write_str(s),
        }
    }
}

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// The start call is in flight, or its opening batch is being revealed.
    Connecting,
    /// Waiting for the user; the only status that accepts input.
    Idle,
    /// One backend exchange is outstanding, or its batch is being revealed.
    AwaitingReply,
    /// The analysis was handed off. Terminal.
    Completed,
    /// The start call failed. Terminal.
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    ///
    /// `Failed` is reachable from every non-terminal status; nothing leaves a
    /// terminal status.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        match (self, next) {
            (Completed | Failed, _) => false,
            (_, Failed) => true,
            (Connecting, Idle | Completed) => true,
            (Idle, AwaitingReply) => true,
            (AwaitingReply, Idle | Completed) => true,
            _ => false,
        }
    }
}

/// The single authoritative conversation state for one assessment attempt.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    /// Local identifier of this attempt, used in logs before the backend
    /// issues a session id.
    attempt_id: Uuid,
    session_id: Option<SessionId>,
    status: SessionStatus,
    personas: PersonaSlots,
    transcript: Transcript,
    torn_down: bool,
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationSession {
    /// Creates a session in `Connecting` status with no backend id yet.
    pub fn new() -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            session_id: None,
            status: SessionStatus::Connecting,
            personas: PersonaSlots::default(),
            transcript: Transcript::new(),
            torn_down: false,
        }
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn personas(&self) -> &PersonaSlots {
        &self.personas
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// True when appends and transitions are still meaningful.
    pub fn is_live(&self) -> bool {
        !self.torn_down && !self.status.is_terminal()
    }

    /// Whether a user submission may be accepted right now.
    pub fn accepts_input(&self) -> bool {
        !self.torn_down && self.status == SessionStatus::Idle
    }

    /// Binds the backend-issued session id. The first binding wins; a later,
    /// different id is ignored and reported as `false`.
    pub fn bind_session_id(&mut self, id: SessionId) -> bool {
        match &self.session_id {
            None => {
                self.session_id = Some(id);
                true
            }
            Some(existing) => existing == &id,
        }
    }

    /// Moves to `next` if the lifecycle allows it.
    pub fn transition(&mut self, next: SessionStatus) -> Result<SessionStatus> {
        if self.status == next {
            return Ok(self.status);
        }
        if !self.status.can_transition_to(next) {
            return Err(ParleyError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        let previous = self.status;
        self.status = next;
        Ok(previous)
    }

    /// Replaces the persona slots with a resolver result.
    ///
    /// Slots only ever grow: names already bound are kept even if the
    /// replacement disagrees.
    pub fn update_personas(&mut self, slots: PersonaSlots) {
        self.personas = self.personas.merged_with(slots);
    }

    /// Appends a message to the transcript.
    ///
    /// After teardown or a terminal status this is a no-op reported as
    /// [`ParleyError::StaleAppend`]; callers log it and move on.
    pub fn append(&mut self, author: Author, text: &str) -> Result<&Message> {
        if !self.is_live() {
            return Err(ParleyError::stale_append(self.session_id.as_ref()));
        }
        Ok(self.transcript.push(author, text))
    }

    /// Marks the session as discarded. Status is left untouched; every later
    /// append becomes a stale no-op.
    pub fn tear_down(&mut self) {
        self.torn_down = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::PersonaSlot;

    #[test]
    fn session_id_keeps_json_type() {
        let numeric = SessionId::from_json(&serde_json::json!(42)).unwrap();
        let text = SessionId::from_json(&serde_json::json!("abc")).unwrap();

        assert_eq!(numeric.to_json(), serde_json::json!(42));
        assert_eq!(text.to_json(), serde_json::json!("abc"));
        assert!(SessionId::from_json(&serde_json::json!("  ")).is_none());
        assert!(SessionId::from_json(&serde_json::json!(null)).is_none());
    }

    #[test]
    fn text_session_id_is_kept_verbatim() {
        let issued = serde_json::json!(" tok ");
        let id = SessionId::from_json(&issued).unwrap();
        assert_eq!(id.to_json(), issued);
    }

    #[test]
    fn non_i64_numbers_are_valid_ids() {
        for issued in [serde_json::json!(42.0), serde_json::json!(u64::MAX)] {
            let id = SessionId::from_json(&issued).unwrap();
            assert_eq!(id.to_json(), issued);
        }
    }

    #[test]
    fn lifecycle_moves_forward_only() {
        let mut session = ConversationSession::new();
        assert_eq!(session.status(), SessionStatus::Connecting);
        assert!(!session.accepts_input());

        session.transition(SessionStatus::Idle).unwrap();
        assert!(session.accepts_input());
        session.transition(SessionStatus::AwaitingReply).unwrap();
        session.transition(SessionStatus::Idle).unwrap();
        session.transition(SessionStatus::AwaitingReply).unwrap();
        session.transition(SessionStatus::Completed).unwrap();

        let err = session.transition(SessionStatus::Idle).unwrap_err();
        assert!(matches!(err, ParleyError::InvalidTransition { .. }));
        assert!(session.transition(SessionStatus::Failed).is_err());
    }

    #[test]
    fn idle_cannot_jump_to_completed() {
        let mut session = ConversationSession::new();
        session.transition(SessionStatus::Idle).unwrap();
        assert!(session.transition(SessionStatus::Completed).is_err());
        assert!(session.transition(SessionStatus::Failed).is_ok());
    }

    #[test]
    fn first_session_id_wins() {
        let mut session = ConversationSession::new();
        assert!(session.bind_session_id(SessionId::from(7_i64)));
        assert!(!session.bind_session_id(SessionId::from(8_i64)));
        assert_eq!(session.session_id(), Some(&SessionId::from(7_i64)));
    }

    #[test]
    fn append_after_teardown_is_stale() {
        let mut session = ConversationSession::new();
        session.transition(SessionStatus::Idle).unwrap();
        session.append(Author::User, "hello").unwrap();

        session.tear_down();
        let err = session
            .append(Author::Persona(PersonaSlot::Primary), "late")
            .unwrap_err();

        assert!(matches!(err, ParleyError::StaleAppend { .. }));
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.status(), SessionStatus::Idle);
    }

    #[test]
    fn append_after_completion_is_stale() {
        let mut session = ConversationSession::new();
        session.transition(SessionStatus::Completed).unwrap();
        assert!(session.append(Author::User, "too late").is_err());
        assert!(session.transcript().is_empty());
    }
}
