// src/services/revision_locks.rs
use crate::errors::ShotlistError;
use log::debug;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Tracks which cards have a revision in flight. The pipeline itself is
/// stateless, so the HTTP layer holds this and rejects a second revision
/// of the same card until the first one finishes.
#[derive(Default)]
pub struct RevisionLocks {
    in_flight: Mutex<HashSet<String>>,
}

impl RevisionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, HashSet<String>> {
        self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn try_acquire(self: &Arc<Self>, card_id: &str) -> Result<RevisionPermit, ShotlistError> {
        if !self.guard().insert(card_id.to_string()) {
            return Err(ShotlistError::RevisionInFlight(card_id.to_string()));
        }
        debug!("Revision lock taken for card {}", card_id);
        Ok(RevisionPermit {
            locks: Arc::clone(self),
            card_id: card_id.to_string(),
        })
    }

    pub fn is_locked(&self, card_id: &str) -> bool {
        self.guard().contains(card_id)
    }
}

/// Held for the duration of one revision; releases the card on drop.
pub struct RevisionPermit {
    locks: Arc<RevisionLocks>,
    card_id: String,
}

impl Drop for RevisionPermit {
    fn drop(&mut self) {
        self.locks.guard().remove(&self.card_id);
        debug!("Revision lock released for card {}", self.card_id);
    }
}
