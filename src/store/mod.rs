//! Store Layer - independently synchronized in-memory stores
//!
//! Each store owns one `RwLock` around its primary map and secondary
//! indices:
//! - identities(id → identity)
//! - posts(id → post), owner → post ids, recipient → post ids, likes
//! - replies(id → reply), post → (time, reply id), owner → reply ids, likes
//!
//! Operations on different stores never block each other. Every mutating
//! operation takes the write guard once and leaves the indices consistent
//! before releasing it, so readers never see a partial update.

pub mod identity;
pub mod posts;
pub mod replies;

pub use identity::IdentityStore;
pub use posts::PostStore;
pub use replies::PostReplyStore;

use crate::id::SoneId;
use crate::{EntityKind, Error};

/// Outcome of replacing an owner's content set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceSummary {
    /// Ids that were not stored before
    pub added: usize,
    /// Ids that were kept and refreshed
    pub updated: usize,
    /// Ids that were dropped
    pub removed: usize,
}

impl std::fmt::Display for ReplaceSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "+{} ~{} -{}", self.added, self.updated, self.removed)
    }
}

pub(crate) fn ownership_conflict(
    kind: EntityKind,
    id: impl ToString,
    owner: &SoneId,
    claimed_by: &SoneId,
) -> Error {
    let id = id.to_string();
    tracing::warn!(%kind, %id, %owner, %claimed_by, "Rejected ownership conflict");
    Error::OwnershipConflict {
        kind,
        id,
        owner: owner.clone(),
        claimed_by: claimed_by.clone(),
    }
}
