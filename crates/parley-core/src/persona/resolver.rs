//! Persona resolution.
//!
//! Maps backend character names onto the session's two persona slots. The
//! resolver is a pure function of the existing slots and the incoming names.

use super::model::{PersonaSlot, PersonaSlots};

/// Outcome of resolving one batch of character names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Slot bindings after this batch.
    pub slots: PersonaSlots,
    /// Slot for each incoming name, in input order.
    pub assignments: Vec<PersonaSlot>,
    /// Slots bound for the first time by this batch.
    pub newly_bound: Vec<(PersonaSlot, String)>,
    /// Distinct names that matched no slot once both were bound. Their
    /// messages were attributed to the least recently used slot.
    pub unrecognized: Vec<String>,
}

/// Resolves `names` against `existing` slot bindings.
///
/// - A name that exactly matches a bound slot maps to that slot.
/// - An unknown name binds the next free slot (first appearance order).
/// - An unknown name with both slots bound is unrecognized; its message is
///   attributed to the least recently used slot and no binding changes.
/// - A blank name never binds; it falls back like an unrecognized one, or to
///   `Primary` when nothing is bound yet.
pub fn resolve<'a, I>(existing: &PersonaSlots, names: I) -> Resolution
where
    I: IntoIterator<Item = &'a str>,
{
    let mut slots = existing.clone();
    let mut assignments = Vec::new();
    let mut newly_bound = Vec::new();
    let mut unrecognized: Vec<String> = Vec::new();

    for raw in names {
        let name = raw.trim();

        let slot = if name.is_empty() {
            slots.least_recently_used().unwrap_or(PersonaSlot::Primary)
        } else if let Some(slot) = slots.slot_of(name) {
            slot
        } else if let Some(slot) = slots.bind_next(name) {
            newly_bound.push((slot, name.to_string()));
            slot
        } else {
            if !unrecognized.iter().any(|n| n == name) {
                unrecognized.push(name.to_string());
            }
            slots
                .least_recently_used()
                .unwrap_or(PersonaSlot::Primary)
        };

        slots.touch(slot);
        assignments.push(slot);
    }

    Resolution {
        slots,
        assignments,
        newly_bound,
        unrecognized,
    }
}
