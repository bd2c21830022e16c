//! Application layer for Parley.
//!
//! Sequences one assessment conversation: the paced reveal of persona turns,
//! the session state machine, and the final handoff of the analysis.

pub mod conversation;
pub mod events;
pub mod handoff;
pub mod scheduler;

#[cfg(test)]
mod test_support;

pub use conversation::{Conversation, TurnOutcome};
pub use events::ConversationEvent;
pub use handoff::{ChannelConsumer, Handoff, ResultsConsumer};
pub use scheduler::Reveal;
