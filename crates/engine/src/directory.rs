//! Participant directory port.
//!
//! The directory (friends, group members) is owned by another service; the
//! engine only needs to resolve ids to display names and to search by name.

use serde::{Deserialize, Serialize};

use crate::{
    ParticipantId,
    util::{normalize_display, normalize_key},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub id: ParticipantId,
    pub display_name: String,
}

pub trait Directory: Send + Sync {
    fn lookup(&self, id: ParticipantId) -> Option<DirectoryEntry>;

    /// Entries whose name contains `term`, accent and case insensitive.
    fn search(&self, term: &str) -> Vec<DirectoryEntry>;
}

/// In-memory directory, mostly for tests and the command-line driver.
#[derive(Clone, Debug, Default)]
pub struct MemoryDirectory {
    entries: Vec<(DirectoryEntry, String)>,
}

impl MemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or renames an entry. Blank names are ignored.
    pub fn insert(&mut self, id: ParticipantId, display_name: &str) {
        let Some(display_name) = normalize_display(display_name) else {
            return;
        };
        let key = normalize_key(&display_name).unwrap_or_default();
        let entry = DirectoryEntry { id, display_name };
        match self.entries.iter_mut().find(|(e, _)| e.id == id) {
            Some(slot) => *slot = (entry, key),
            None => self.entries.push((entry, key)),
        }
    }
}

impl Directory for MemoryDirectory {
    fn lookup(&self, id: ParticipantId) -> Option<DirectoryEntry> {
        self.entries
            .iter()
            .find(|(entry, _)| entry.id == id)
            .map(|(entry, _)| entry.clone())
    }

    fn search(&self, term: &str) -> Vec<DirectoryEntry> {
        let Some(needle) = normalize_key(term) else {
            return Vec::new();
        };
        self.entries
            .iter()
            .filter(|(_, key)| key.contains(&needle))
            .map(|(entry, _)| entry.clone())
            .collect()
    }
}
