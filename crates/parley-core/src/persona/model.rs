//! Persona slot model.
//!
//! A session has at most two interviewer personas. Each is addressed by a
//! logical slot that stays stable for the whole session, independent of the
//! order in which the backend happens to list speakers.

use serde::{Deserialize, Serialize};

/// Logical position of an interviewer persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaSlot {
    Primary,
    Secondary,
}

impl PersonaSlot {
    /// Slots in binding order.
    pub const ALL: [PersonaSlot; 2] = [PersonaSlot::Primary, PersonaSlot::Secondary];

    pub fn index(self) -> usize {
        match self {
            PersonaSlot::Primary => 0,
            PersonaSlot::Secondary => 1,
        }
    }
}

impl std::fmt::Display for PersonaSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersonaSlot::Primary => write!(f, "primary"),
            PersonaSlot::Secondary => write!(f, "secondary"),
        }
    }
}

/// Name bindings for the two persona slots, plus usage order for fallback
/// attribution.
///
/// Once a slot is bound its name never changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaSlots {
    names: [Option<String>; 2],
    /// Logical clock value of each slot's most recent message (0 = never).
    last_used: [u64; 2],
    clock: u64,
}

impl PersonaSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Display name bound to `slot`, if any.
    pub fn name_of(&self, slot: PersonaSlot) -> Option<&str> {
        self.names[slot.index()].as_deref()
    }

    /// Exact-match lookup of the slot bound to `name`.
    pub fn slot_of(&self, name: &str) -> Option<PersonaSlot> {
        PersonaSlot::ALL
            .into_iter()
            .find(|slot| self.names[slot.index()].as_deref() == Some(name))
    }

    /// Bound slots with their names, in slot order.
    pub fn bound(&self) -> impl Iterator<Item = (PersonaSlot, &str)> {
        PersonaSlot::ALL
            .into_iter()
            .filter_map(|slot| self.name_of(slot).map(|name| (slot, name)))
    }

    /// Binds `name` to the first free slot. Returns `None` when both are taken.
    pub(crate) fn bind_next(&mut self, name: &str) -> Option<PersonaSlot> {
        let slot = PersonaSlot::ALL
            .into_iter()
            .find(|slot| self.names[slot.index()].is_none())?;
        self.names[slot.index()] = Some(name.to_string());
        Some(slot)
    }

    /// Records that `slot` just spoke.
    pub(crate) fn touch(&mut self, slot: PersonaSlot) {
        self.clock += 1;
        self.last_used[slot.index()] = self.clock;
    }

    /// The bound slot that spoke least recently. Ties go to the earlier slot.
    pub fn least_recently_used(&self) -> Option<PersonaSlot> {
        self.bound()
            .map(|(slot, _)| slot)
            .min_by_key(|slot| self.last_used[slot.index()])
    }

    /// Combines a newer resolver result with these bindings. Names already
    /// bound here always survive.
    pub(crate) fn merged_with(&self, newer: PersonaSlots) -> PersonaSlots {
        let mut merged = newer;
        for slot in PersonaSlot::ALL {
            if let Some(name) = &self.names[slot.index()] {
                merged.names[slot.index()] = Some(name.clone());
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_in_slot_order_and_stops_at_two() {
        let mut slots = PersonaSlots::new();
        assert_eq!(slots.bind_next("Sara"), Some(PersonaSlot::Primary));
        assert_eq!(slots.bind_next("Ali"), Some(PersonaSlot::Secondary));
        assert_eq!(slots.bind_next("Reza"), None);
        assert_eq!(slots.bound().count(), 2);
        assert_eq!(slots.slot_of("Ali"), Some(PersonaSlot::Secondary));
    }

    #[test]
    fn lookup_is_exact() {
        let mut slots = PersonaSlots::new();
        slots.bind_next("Sara");
        assert_eq!(slots.slot_of("Sara - Coach"), None);
        assert_eq!(slots.slot_of("sara"), None);
    }

    #[test]
    fn least_recently_used_tracks_touches() {
        let mut slots = PersonaSlots::new();
        slots.bind_next("Sara");
        slots.bind_next("Ali");
        assert_eq!(slots.least_recently_used(), Some(PersonaSlot::Primary));

        slots.touch(PersonaSlot::Primary);
        assert_eq!(slots.least_recently_used(), Some(PersonaSlot::Secondary));
        slots.touch(PersonaSlot::Secondary);
        assert_eq!(slots.least_recently_used(), Some(PersonaSlot::Primary));
    }

    #[test]
    fn merge_never_overwrites_bound_names() {
        let mut original = PersonaSlots::new();
        original.bind_next("Sara");

        let mut newer = PersonaSlots::new();
        newer.bind_next("Someone else");
        newer.bind_next("Ali");

        let merged = original.merged_with(newer);
        assert_eq!(merged.name_of(PersonaSlot::Primary), Some("Sara"));
        assert_eq!(merged.name_of(PersonaSlot::Secondary), Some("Ali"));
    }
}
