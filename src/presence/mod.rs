//! Presence hub: connection lifecycle, sessions, rooms and typing fan-out.

mod hub;

pub use hub::{EventOutcome, PresenceHub};
