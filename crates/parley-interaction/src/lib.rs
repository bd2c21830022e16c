//! Transport adapter for the assessment backend.
//!
//! The [`Backend`] trait is the only way the orchestrator reaches the
//! backend. Implementations return normalized [`BackendReply`] values or a
//! typed [`TransportError`]; raw I/O and parse failures never cross it.

pub mod error;
pub mod http_backend;
pub mod normalize;

use async_trait::async_trait;
use parley_core::envelope::BackendReply;
use parley_core::session::SessionId;

pub use error::TransportError;
pub use http_backend::HttpBackend;
pub use normalize::normalize;

/// One request/response exchange with the backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Opens a new backend session with the fixed begin signal. A successful
    /// reply always carries a session id.
    async fn start(&self, begin_message: &str) -> Result<BackendReply, TransportError>;

    /// Sends one user message within an existing session.
    async fn chat(&self, session_id: &SessionId, message: &str) -> Result<BackendReply, TransportError>;

    /// Sends `payload` as a start call when there is no session yet, or as a
    /// chat call otherwise.
    async fn send(&self, session_id: Option<&SessionId>, payload: &str) -> Result<BackendReply, TransportError> {
        match session_id {
            Some(id) => self.chat(id, payload).await,
            None => self.start(payload).await,
        }
    }
}
