//! Persona domain module.
//!
//! Interviewer personas are discovered from the backend's character names and
//! pinned to stable logical slots for the lifetime of a session.

mod model;
mod resolver;

pub use model::{PersonaSlot, PersonaSlots};
pub use resolver::{Resolution, resolve};
