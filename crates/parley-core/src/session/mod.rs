//! Session domain module.
//!
//! # Module Structure
//!
//! - `model`: The session aggregate (`ConversationSession`), its id and status
//! - `message`: Transcript entries (`Message`, `Author`, `MessageId`)
//! - `transcript`: The append-only log (`Transcript`)
//!
//! # Usage
//!
//! ```ignore
//! use parley_core::session::{ConversationSession, SessionStatus};
//! use parley_core::session::{Author, Message};
//! ```

mod message;
mod model;
mod transcript;

// Re-export public API
pub use message::{Author, Message, MessageId};
pub use model::{ConversationSession, SessionId, SessionStatus};
pub use transcript::Transcript;
