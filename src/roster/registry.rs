use super::participant::{Participant, PartialParticipant};
use serde_json::Value;
use tracing::debug;

/// De-duplicated roster of the parties connected to a room
///
/// Every mutation is total: malformed entries are skipped, never reported as
/// errors, so one bad entry cannot blank the roster.
#[derive(Debug, Default, Clone)]
pub struct ParticipantRegistry {
    entries: Vec<Participant>,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// De-duplicate a raw roster by user id
    ///
    /// The first occurrence of a user keeps its position and its fields; later
    /// duplicates only fill in fields the first one lacked. Entries without a
    /// user id or with an unknown role are dropped.
    pub fn upsert(raw: &[Value]) -> Vec<Participant> {
        let mut partials: Vec<PartialParticipant> = Vec::with_capacity(raw.len());

        for value in raw {
            let Some(entry) = PartialParticipant::from_value(value) else {
                debug!("Dropping roster entry without identity: {}", value);
                continue;
            };

            match partials.iter_mut().find(|p| p.user_id == entry.user_id) {
                Some(existing) => existing.complete_from(entry),
                None => partials.push(entry),
            }
        }

        partials
            .into_iter()
            .filter_map(PartialParticipant::finish)
            .collect()
    }

    /// Overwrite the roster with an authoritative snapshot
    pub fn replace(&mut self, raw: &[Value]) -> usize {
        self.entries = Self::upsert(raw);
        self.entries.len()
    }

    /// Merge one participant, last write wins on name, role and join time
    ///
    /// Returns `true` when the user was not in the roster before.
    pub fn add(&mut self, participant: Participant) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|p| p.user_id == participant.user_id)
        {
            Some(existing) => {
                existing.user_name = participant.user_name;
                existing.user_type = participant.user_type;
                if participant.joined_at.is_some() {
                    existing.joined_at = participant.joined_at;
                }
                false
            }
            None => {
                self.entries.push(participant);
                true
            }
        }
    }

    /// Merge one raw entry from a delta event; malformed entries are ignored
    pub fn add_raw(&mut self, raw: &Value) -> bool {
        match Participant::from_value(raw) {
            Some(participant) => self.add(participant),
            None => {
                debug!("Ignoring malformed join delta: {}", raw);
                false
            }
        }
    }

    pub fn remove(&mut self, user_id: &str) -> Option<Participant> {
        let pos = self.entries.iter().position(|p| p.user_id == user_id)?;
        Some(self.entries.remove(pos))
    }

    pub fn get(&self, user_id: &str) -> Option<&Participant> {
        self.entries.iter().find(|p| p.user_id == user_id)
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.get(user_id).is_some()
    }

    pub fn list(&self) -> &[Participant] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
