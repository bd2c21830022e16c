//! Append-only conversation log.

use super::message::{Author, Message, MessageId};
use serde::{Deserialize, Serialize};

/// Ordered, append-only sequence of messages.
///
/// The only mutation is [`Transcript::push`]; existing entries are exposed
/// read-only and are never reordered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<Message>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message and returns it. Text is trimmed, nothing more.
    pub(crate) fn push(&mut self, author: Author, text: &str) -> &Message {
        self.next_id += 1;
        self.messages.push(Message {
            id: MessageId(self.next_id),
            author,
            text: text.trim().to_string(),
            created_at: chrono::Utc::now(),
        });
        &self.messages[self.messages.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }
}
