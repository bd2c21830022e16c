//! Conversation state machine.
//!
//! [`Conversation`] owns the one authoritative [`ConversationSession`] of an
//! assessment attempt and sequences it:
//!
//! ```text
//! Connecting --start ok--> (reveal opening batch) --> Idle
//! Idle --submit--> AwaitingReply --turn--> (reveal) --> Idle
//!                               --empty / turn failure--> Idle
//!                               --analysis--> Completed (handoff)
//! Connecting --start failure--> Failed
//! ```
//!
//! The status stays busy (`Connecting` or `AwaitingReply`) from the moment a
//! batch is received until its last message is appended, so input is gated
//! by a single busy-to-idle transition per exchange.

use crate::events::ConversationEvent;
use crate::handoff::ResultsConsumer;
use crate::scheduler::Reveal;
use futures::StreamExt;
use parley_core::config::ConversationConfig;
use parley_core::envelope::{AnalysisResult, BackendEnvelope, BackendReply, PersonaLine};
use parley_core::error::{ParleyError, RejectReason, Result};
use parley_core::persona::{PersonaSlot, PersonaSlots, resolve};
use parley_core::session::{Author, ConversationSession, Message, SessionId, SessionStatus};
use parley_interaction::{Backend, TransportError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;

const EVENT_CAPACITY: usize = 256;

/// What a completed `start` or `submit` call led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// A batch was revealed and the session is idle again.
    Revealed { appended: usize },
    /// The backend acknowledged without content.
    NoOp,
    /// The analysis was handed off.
    Completed,
    /// The session was torn down or closed before the exchange finished; its
    /// remaining effects were dropped.
    Discarded,
}

/// Orchestrates one assessment attempt against a backend.
pub struct Conversation {
    session: Mutex<ConversationSession>,
    backend: Arc<dyn Backend>,
    consumer: Arc<dyn ResultsConsumer>,
    begin_message: String,
    reveal_delay: Duration,
    started: AtomicBool,
    teardown: CancellationToken,
    events: broadcast::Sender<ConversationEvent>,
}

impl Conversation {
    pub fn new(
        backend: Arc<dyn Backend>,
        consumer: Arc<dyn ResultsConsumer>,
        settings: &ConversationConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            session: Mutex::new(ConversationSession::new()),
            backend,
            consumer,
            begin_message: settings.begin_message.clone(),
            reveal_delay: settings.reveal_delay(),
            started: AtomicBool::new(false),
            teardown: CancellationToken::new(),
            events,
        }
    }

    /// Subscribes to conversation events from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.events.subscribe()
    }

    pub async fn status(&self) -> SessionStatus {
        self.session.lock().await.status()
    }

    pub async fn session_id(&self) -> Option<SessionId> {
        self.session.lock().await.session_id().cloned()
    }

    pub async fn personas(&self) -> PersonaSlots {
        self.session.lock().await.personas().clone()
    }

    /// Snapshot of the transcript.
    pub async fn transcript(&self) -> Vec<Message> {
        self.session.lock().await.transcript().as_slice().to_vec()
    }

    /// Whether a submission would be accepted right now.
    pub async fn accepts_input(&self) -> bool {
        self.session.lock().await.accepts_input()
    }

    /// Opens the backend session and reveals the opening batch.
    ///
    /// Any failure here is fatal: the session moves to `Failed` and a new
    /// `Conversation` is needed to retry.
    pub async fn start(&self) -> Result<TurnOutcome> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ParleyError::rejected(RejectReason::Busy));
        }
        let attempt = self.session.lock().await.attempt_id();
        tracing::info!(%attempt, "starting conversation");

        let reply = tokio::select! {
            biased;
            _ = self.teardown.cancelled() => return Ok(TurnOutcome::Discarded),
            reply = self.backend.start(&self.begin_message) => reply,
        };

        let reply = match reply.and_then(require_session_id) {
            Ok(reply) => reply,
            Err(err) => {
                let err = err.into_start_failure();
                tracing::error!(%attempt, error = %err, "session start failed");
                self.fail().await;
                return Err(err);
            }
        };

        {
            let mut session = self.session.lock().await;
            if let Some(id) = reply.session_id.clone() {
                session.bind_session_id(id);
            }
            tracing::info!(
                session_id = ?session.session_id().map(ToString::to_string),
                "backend session established"
            );
        }

        self.apply_envelope(reply.envelope).await
    }

    /// Submits one user message.
    ///
    /// The message is appended optimistically before the backend is called.
    /// Empty text, a busy session, or a closed session are rejected without
    /// touching the transcript. A failed exchange returns the session to
    /// `Idle` with a notice and is reported as a recoverable error.
    pub async fn submit(&self, text: &str) -> Result<TurnOutcome> {
        let text = text.trim();
        let session_id = {
            let mut session = self.session.lock().await;
            if text.is_empty() {
                return Err(ParleyError::rejected(RejectReason::EmptyInput));
            }
            if session.is_torn_down() || session.status().is_terminal() {
                return Err(ParleyError::rejected(RejectReason::SessionClosed));
            }
            if !session.accepts_input() {
                tracing::debug!(status = ?session.status(), "submission rejected while busy");
                return Err(ParleyError::rejected(RejectReason::Busy));
            }
            let session_id = session
                .session_id()
                .cloned()
                .ok_or_else(|| ParleyError::rejected(RejectReason::SessionClosed))?;

            let message = session.append(Author::User, text)?.clone();
            self.set_status(&mut session, SessionStatus::AwaitingReply)?;
            self.emit(ConversationEvent::MessageAppended(message));
            session_id
        };

        let reply = tokio::select! {
            biased;
            _ = self.teardown.cancelled() => return Ok(TurnOutcome::Discarded),
            reply = self.backend.chat(&session_id, text) => reply,
        };

        match reply {
            Ok(reply) => {
                match &reply.session_id {
                    Some(id) if id != &session_id => {
                        tracing::warn!(%session_id, reported = %id, "backend reported a different session id");
                    }
                    _ => {}
                }
                self.apply_envelope(reply.envelope).await
            }
            Err(err) => {
                let retryable = err.is_retryable();
                let err = err.into_turn_error();
                tracing::warn!(%session_id, error = %err, retryable, "turn failed");
                let mut session = self.session.lock().await;
                if session.is_live() {
                    self.set_status(&mut session, SessionStatus::Idle)?;
                    self.emit(ConversationEvent::Notice(err.to_string()));
                }
                Err(err)
            }
        }
    }

    /// Abandons the session. In-flight exchanges and reveals stop, and every
    /// later append is dropped. Status is left as is.
    pub async fn abandon(&self) {
        let mut session = self.session.lock().await;
        if session.is_torn_down() {
            return;
        }
        session.tear_down();
        self.teardown.cancel();
        tracing::info!(
            session_id = ?session.session_id().map(ToString::to_string),
            status = ?session.status(),
            "conversation abandoned"
        );
    }

    /// Applies one normalized envelope to the session.
    pub(crate) async fn apply_envelope(&self, envelope: BackendEnvelope) -> Result<TurnOutcome> {
        tracing::debug!(kind = envelope.kind(), "applying envelope");
        match envelope {
            BackendEnvelope::Empty => self.settle(TurnOutcome::NoOp).await,
            BackendEnvelope::Turn { messages, closing } => {
                let appended = self.reveal(messages).await;
                match closing {
                    Some(result) => self.complete(result).await,
                    None => self.settle(TurnOutcome::Revealed { appended }).await,
                }
            }
            BackendEnvelope::Analysis(result) => self.complete(result).await,
        }
    }

    /// Resolves personas for `lines` and appends them one by one, paced by the
    /// reveal delay. Returns how many were appended.
    async fn reveal(&self, lines: Vec<PersonaLine>) -> usize {
        let batch = {
            let mut session = self.session.lock().await;
            if !session.is_live() {
                tracing::debug!(count = lines.len(), "dropping batch for closed session");
                return 0;
            }
            self.assign_slots(&mut session, lines)
        };

        let cancel = self.teardown.child_token();
        let stream = Reveal::new(batch, self.reveal_delay, cancel.clone()).into_stream();
        tokio::pin!(stream);

        let mut appended = 0;
        while let Some((slot, text)) = stream.next().await {
            let mut session = self.session.lock().await;
            match session.append(Author::Persona(slot), &text) {
                Ok(message) => {
                    let message = message.clone();
                    tracing::debug!(id = %message.id, %slot, "persona message appended");
                    appended += 1;
                    self.emit(ConversationEvent::MessageAppended(message));
                }
                Err(err) => {
                    tracing::debug!(error = %err, "stopping reveal");
                    cancel.cancel();
                    break;
                }
            }
        }
        appended
    }

    /// Binds persona names and pairs each non-empty line with its slot.
    fn assign_slots(
        &self,
        session: &mut ConversationSession,
        lines: Vec<PersonaLine>,
    ) -> Vec<(PersonaSlot, String)> {
        let resolution = resolve(session.personas(), lines.iter().map(|l| l.character.as_str()));

        for (slot, name) in &resolution.newly_bound {
            tracing::info!(%slot, name = %name, "persona bound");
            self.emit(ConversationEvent::PersonaBound {
                slot: *slot,
                name: name.clone(),
            });
        }
        session.update_personas(resolution.slots);

        lines
            .into_iter()
            .zip(resolution.assignments)
            .filter_map(|(line, slot)| {
                let name = line.character.trim();
                if resolution.unrecognized.iter().any(|n| n == name) {
                    let err = ParleyError::UnrecognizedPersona {
                        name: name.to_string(),
                        fallback: slot,
                    };
                    tracing::warn!(error = %err, "unrecognized persona");
                }
                if line.content.trim().is_empty() {
                    tracing::debug!(%slot, "skipping empty persona line");
                    return None;
                }
                Some((slot, line.content))
            })
            .collect()
    }

    /// Ends a busy period by returning to `Idle`, unless the session closed
    /// in the meantime.
    async fn settle(&self, outcome: TurnOutcome) -> Result<TurnOutcome> {
        let mut session = self.session.lock().await;
        if !session.is_live() {
            return Ok(TurnOutcome::Discarded);
        }
        self.set_status(&mut session, SessionStatus::Idle)?;
        Ok(outcome)
    }

    /// Moves to `Completed` and hands the result to the consumer. Runs at most
    /// once per session.
    async fn complete(&self, result: AnalysisResult) -> Result<TurnOutcome> {
        let session_id = {
            let mut session = self.session.lock().await;
            if !session.is_live() {
                tracing::debug!("analysis for closed session ignored");
                return Ok(TurnOutcome::Discarded);
            }
            self.set_status(&mut session, SessionStatus::Completed)?;
            session.session_id().cloned()
        };

        self.emit(ConversationEvent::Completed(result.clone()));
        match session_id {
            Some(id) => {
                tracing::info!(session_id = %id, "handing off analysis");
                self.consumer.deliver(&id, result).await?;
            }
            None => tracing::warn!("analysis received without a session id; not delivered"),
        }
        Ok(TurnOutcome::Completed)
    }

    async fn fail(&self) {
        let mut session = self.session.lock().await;
        if let Err(err) = self.set_status(&mut session, SessionStatus::Failed) {
            tracing::debug!(error = %err, "session already closed");
        }
    }

    fn set_status(&self, session: &mut ConversationSession, next: SessionStatus) -> Result<()> {
        let previous = session.transition(next)?;
        if previous != next {
            tracing::info!(
                session_id = ?session.session_id().map(ToString::to_string),
                from = ?previous,
                to = ?next,
                "status changed"
            );
            self.emit(ConversationEvent::StatusChanged {
                from: previous,
                to: next,
            });
        }
        Ok(())
    }

    fn emit(&self, event: ConversationEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

fn require_session_id(reply: BackendReply) -> std::result::Result<BackendReply, TransportError> {
    if reply.session_id.is_none() {
        return Err(TransportError::MissingSessionId);
    }
    Ok(reply)
}
