//! Room roster
//!
//! Participants are keyed by their stable user id. Roster events from the room
//! channel are untrusted: malformed entries are dropped instead of failing the
//! whole update, and repeated joins (reconnects, duplicate sockets) collapse
//! into a single entry.

mod participant;
mod registry;

pub use participant::{Participant, UserType};
pub use registry::ParticipantRegistry;
