//! Transcript message types.

use crate::persona::PersonaSlot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a message, unique and monotonic within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// Who authored a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "slot", rename_all = "snake_case")]
pub enum Author {
    /// The human participant.
    User,
    /// One of the interviewer personas, by logical slot.
    Persona(PersonaSlot),
}

/// A single entry in the session transcript.
///
/// Messages are never mutated once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub author: Author,
    /// Rendered content, trimmed but otherwise opaque.
    pub text: String,
    /// Display-only timestamp; never used for ordering decisions.
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_from_user(&self) -> bool {
        self.author == Author::User
    }
}
