//! Scripted backend double for state-machine tests.

use async_trait::async_trait;
use parley_core::envelope::{AnalysisResult, BackendEnvelope, BackendReply, PersonaLine};
use parley_core::session::SessionId;
use parley_interaction::{Backend, TransportError};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub(crate) type Reply = Result<BackendReply, TransportError>;

/// Replays canned replies, optionally after a delay, and records traffic.
pub(crate) struct ScriptedBackend {
    start: Mutex<Option<Reply>>,
    turns: Mutex<VecDeque<Reply>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    received: Mutex<Vec<(SessionId, String)>>,
}

impl ScriptedBackend {
    pub(crate) fn new(start: Reply) -> Self {
        Self {
            start: Mutex::new(Some(start)),
            turns: Mutex::new(VecDeque::new()),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn then(self, reply: Reply) -> Self {
        self.turns.lock().unwrap().push_back(reply);
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn received(&self) -> Vec<(SessionId, String)> {
        self.received.lock().unwrap().clone()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn exchange(&self, reply: Option<Reply>) -> Reply {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply.unwrap_or_else(|| Ok(BackendReply::new(BackendEnvelope::Empty)))
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn start(&self, _begin_message: &str) -> Reply {
        let reply = self.start.lock().unwrap().take();
        self.exchange(reply).await
    }

    async fn chat(&self, session_id: &SessionId, message: &str) -> Reply {
        self.received
            .lock()
            .unwrap()
            .push((session_id.clone(), message.to_string()));
        let reply = self.turns.lock().unwrap().pop_front();
        self.exchange(reply).await
    }
}

pub(crate) fn lines(pairs: &[(&str, &str)]) -> Vec<PersonaLine> {
    pairs
        .iter()
        .map(|(character, content)| PersonaLine::new(*character, *content))
        .collect()
}

pub(crate) fn turn(pairs: &[(&str, &str)]) -> Reply {
    Ok(BackendReply::new(BackendEnvelope::turn(lines(pairs))))
}

pub(crate) fn opening(id: i64, pairs: &[(&str, &str)]) -> Reply {
    Ok(BackendReply::new(BackendEnvelope::turn(lines(pairs))).with_session_id(SessionId::from(id)))
}

pub(crate) fn analysis(value: serde_json::Value) -> Reply {
    Ok(BackendReply::new(BackendEnvelope::Analysis(AnalysisResult::new(value))))
}
