//! Identity store

use crate::id::SoneId;
use crate::identity::Identity;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Upsert-only mapping from identity id to the latest identity record.
#[derive(Debug, Default)]
pub struct IdentityStore {
    identities: RwLock<HashMap<SoneId, Identity>>,
}

impl IdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current record for `id`
    pub fn get(&self, id: &SoneId) -> Option<Identity> {
        self.identities.read().get(id).cloned()
    }

    /// Insert or replace the record for `identity.id` (last write wins).
    ///
    /// Returns the record that was replaced, if any.
    pub fn store(&self, identity: Identity) -> Option<Identity> {
        tracing::debug!(id = %identity.id, "Storing identity");
        self.identities.write().insert(identity.id.clone(), identity)
    }

    pub fn contains(&self, id: &SoneId) -> bool {
        self.identities.read().contains_key(id)
    }

    /// All identities, ordered by id
    pub fn all(&self) -> Vec<Identity> {
        let mut identities: Vec<Identity> = self.identities.read().values().cloned().collect();
        identities.sort_by(|a, b| a.id.cmp(&b.id));
        identities
    }

    pub fn len(&self) -> usize {
        self.identities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.read().is_empty()
    }
}
