//! Conversation events published to front-ends.

use parley_core::envelope::AnalysisResult;
use parley_core::persona::PersonaSlot;
use parley_core::session::{Message, SessionStatus};

/// Something observable happened in the conversation.
///
/// Events are published after the session state they describe has been
/// committed, in the same order as the underlying changes.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationEvent {
    StatusChanged {
        from: SessionStatus,
        to: SessionStatus,
    },
    /// A persona slot received its display name.
    PersonaBound { slot: PersonaSlot, name: String },
    MessageAppended(Message),
    /// Recoverable failure text to show without interrupting the session.
    Notice(String),
    /// The analysis was handed off; the session accepts no more input.
    Completed(AnalysisResult),
}
