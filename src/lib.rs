//! # Sonedb - Content database for the Sone social network
//!
//! In-process system of record for the entities a Sone node works with.
//!
//! Sonedb provides:
//! - Identity records keyed by opaque identifiers
//! - Posts and post replies, each owned by exactly one Sone
//! - Like relations between Sones and posts/replies
//! - Monotonic "known" flags for content the local user has seen
//! - Atomic bulk replacement of one Sone's content set that keeps
//!   likes and known flags of surviving ids
//! - A facade composing the stores with read-only derived views

pub mod id;
pub mod identity;
pub mod post;
pub mod reply;
pub mod relation;
pub mod store;
pub mod database;
pub mod seed;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use id::{PostId, ReplyId, SoneId};
pub use identity::Identity;
pub use post::{Post, PostBuilder};
pub use reply::{PostReply, PostReplyBuilder};
pub use relation::LikeIndex;
pub use store::{IdentityStore, PostReplyStore, PostStore, ReplaceSummary};
pub use database::{AuditReport, ContentDatabase, DatabaseStats, KnownIds, Thread};

/// Result type alias for Sonedb operations
pub type Result<T> = std::result::Result<T, Error>;

/// The kind of entity an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Identity,
    Post,
    Reply,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Identity => write!(f, "identity"),
            EntityKind::Post => write!(f, "post"),
            EntityKind::Reply => write!(f, "reply"),
        }
    }
}

/// Error types for Sonedb operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("Ownership conflict: {kind} {id} belongs to {owner}, not {claimed_by}")]
    OwnershipConflict {
        kind: EntityKind,
        id: String,
        owner: SoneId,
        claimed_by: SoneId,
    },

    #[error("Invalid content: {0}")]
    InvalidContent(String),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Seed error: {0}")]
    Seed(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn post_not_found(id: &PostId) -> Self {
        Error::NotFound { kind: EntityKind::Post, id: id.to_string() }
    }

    pub(crate) fn reply_not_found(id: &ReplyId) -> Self {
        Error::NotFound { kind: EntityKind::Reply, id: id.to_string() }
    }

    /// Whether this error signals an ownership conflict
    pub fn is_ownership_conflict(&self) -> bool {
        matches!(self, Error::OwnershipConflict { .. })
    }
}
