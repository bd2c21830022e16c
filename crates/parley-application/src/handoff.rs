//! Completion handoff to the results view.

use async_trait::async_trait;
use parley_core::envelope::AnalysisResult;
use parley_core::error::{ParleyError, Result};
use parley_core::session::SessionId;
use tokio::sync::mpsc;

/// Receives the final analysis of a session, exactly once.
#[async_trait]
pub trait ResultsConsumer: Send + Sync {
    async fn deliver(&self, session_id: &SessionId, result: AnalysisResult) -> Result<()>;
}

/// A delivered analysis, as seen by the receiving side of a [`ChannelConsumer`].
#[derive(Debug, Clone, PartialEq)]
pub struct Handoff {
    pub session_id: SessionId,
    pub result: AnalysisResult,
}

/// Forwards results over a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelConsumer {
    tx: mpsc::Sender<Handoff>,
}

impl ChannelConsumer {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Handoff>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ResultsConsumer for ChannelConsumer {
    async fn deliver(&self, session_id: &SessionId, result: AnalysisResult) -> Result<()> {
        self.tx
            .send(Handoff {
                session_id: session_id.clone(),
                result,
            })
            .await
            .map_err(|_| ParleyError::handoff("results receiver is closed"))
    }
}
