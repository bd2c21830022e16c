//! Terminal rendering of conversation events.

use colored::{ColoredString, Colorize};
use parley_application::ConversationEvent;
use parley_core::persona::PersonaSlot;
use parley_core::session::{Author, SessionStatus};

/// Prints events to stdout, remembering persona names for labels.
#[derive(Debug, Default)]
pub struct Renderer {
    names: [Option<String>; 2],
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label_for(&self, slot: PersonaSlot) -> String {
        self.names[slot.index()]
            .clone()
            .unwrap_or_else(|| slot.to_string())
    }

    pub fn render(&mut self, event: &ConversationEvent) {
        match event {
            ConversationEvent::PersonaBound { slot, name } => {
                self.names[slot.index()] = Some(name.clone());
            }
            ConversationEvent::MessageAppended(message) => {
                // The user's own line is already on screen.
                if let Author::Persona(slot) = message.author {
                    println!("{}", paint_label(slot, &format!("[{}]", self.label_for(slot))));
                    for line in message.text.lines() {
                        println!("{}", paint_text(slot, line));
                    }
                    println!();
                }
            }
            ConversationEvent::Notice(text) => {
                println!("{}", format!("Notice: {text}. You can send your message again.").yellow());
            }
            ConversationEvent::StatusChanged { to: SessionStatus::Failed, .. } => {
                println!("{}", "The session could not continue.".red());
            }
            ConversationEvent::StatusChanged { from, to } => {
                tracing::debug!(?from, ?to, "status");
            }
            ConversationEvent::Completed(_) => {
                println!("{}", "Assessment complete.".bright_green().bold());
            }
        }
    }
}

fn paint_label(slot: PersonaSlot, text: &str) -> ColoredString {
    match slot {
        PersonaSlot::Primary => text.bright_magenta().bold(),
        PersonaSlot::Secondary => text.bright_cyan().bold(),
    }
}

fn paint_text(slot: PersonaSlot, text: &str) -> ColoredString {
    match slot {
        PersonaSlot::Primary => text.bright_blue(),
        PersonaSlot::Secondary => text.cyan(),
    }
}
