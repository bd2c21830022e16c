//! Interactive loop for one assessment attempt.

use crate::render::Renderer;
use anyhow::Context;
use colored::Colorize;
use parley_application::{Conversation, ConversationEvent, TurnOutcome};
use parley_core::session::SessionStatus;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

const PROMPT: &str = ">> ";

/// How the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ending {
    Completed,
    Abandoned,
}

/// What to do after one line of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    End(Ending),
}

pub struct Repl {
    conversation: Arc<Conversation>,
    events: broadcast::Receiver<ConversationEvent>,
    renderer: Renderer,
}

impl Repl {
    pub fn new(conversation: Arc<Conversation>) -> Self {
        let events = conversation.subscribe();
        Self {
            conversation,
            events,
            renderer: Renderer::new(),
        }
    }

    /// Starts the session, rendering the opening turn as it is revealed.
    pub async fn start(&mut self) -> anyhow::Result<TurnOutcome> {
        let conversation = Arc::clone(&self.conversation);
        drive(&mut self.events, &mut self.renderer, conversation.start())
            .await
            .context("could not start the assessment; run parley again to retry")
    }

    pub async fn run(&mut self) -> anyhow::Result<Ending> {
        let mut rl = DefaultEditor::new()?;

        loop {
            if let Some(ending) = self.closed_ending().await {
                return Ok(ending);
            }

            match rl.readline(PROMPT) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = rl.add_history_entry(line.trim());
                    }
                    if let Step::End(ending) = self.handle_line(&line).await? {
                        return Ok(ending);
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "CTRL-C detected. Type 'quit' to leave the assessment.".yellow());
                }
                Err(ReadlineError::Eof) => {
                    println!("{}", "CTRL-D detected.".bright_black());
                    return Ok(self.leave().await);
                }
                Err(err) => {
                    self.conversation.abandon().await;
                    return Err(err.into());
                }
            }
        }
    }

    /// Applies one line of user input.
    pub async fn handle_line(&mut self, line: &str) -> anyhow::Result<Step> {
        let trimmed = line.trim();

        if trimmed == "quit" || trimmed == "exit" {
            return Ok(Step::End(self.leave().await));
        }
        if trimmed.is_empty() {
            return Ok(Step::Continue);
        }

        let conversation = Arc::clone(&self.conversation);
        match drive(&mut self.events, &mut self.renderer, conversation.submit(trimmed)).await {
            Ok(TurnOutcome::Completed) => Ok(Step::End(Ending::Completed)),
            Ok(TurnOutcome::Discarded) => Ok(Step::End(Ending::Abandoned)),
            Ok(_) => Ok(Step::Continue),
            Err(err) if err.reject_reason().is_some() && err.is_recoverable() => {
                println!("{}", err.to_string().yellow());
                Ok(Step::Continue)
            }
            // Turn failures were already shown as a notice.
            Err(err) if err.is_recoverable() => Ok(Step::Continue),
            Err(err) => Err(err.into()),
        }
    }

    /// Abandons the session.
    pub async fn leave(&self) -> Ending {
        self.conversation.abandon().await;
        println!("{}", "Assessment abandoned.".bright_black());
        Ending::Abandoned
    }

    /// How the session ended, if it no longer takes input.
    async fn closed_ending(&self) -> Option<Ending> {
        if self.conversation.accepts_input().await {
            return None;
        }
        Some(match self.conversation.status().await {
            SessionStatus::Completed => Ending::Completed,
            _ => Ending::Abandoned,
        })
    }
}

/// Awaits `fut` while rendering events as they arrive, then flushes whatever
/// is left so output is complete before the next prompt.
async fn drive<F: Future>(
    events: &mut broadcast::Receiver<ConversationEvent>,
    renderer: &mut Renderer,
    fut: F,
) -> F::Output {
    tokio::pin!(fut);
    loop {
        tokio::select! {
            output = &mut fut => {
                flush(events, renderer);
                return output;
            }
            received = events.recv() => match received {
                Ok(event) => renderer.render(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event stream lagged; some output was not shown");
                }
                Err(RecvError::Closed) => return fut.await,
            },
        }
    }
}

fn flush(events: &mut broadcast::Receiver<ConversationEvent>, renderer: &mut Renderer) {
    loop {
        match events.try_recv() {
            Ok(event) => renderer.render(&event),
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event stream lagged; some output was not shown");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}
