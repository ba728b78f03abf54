//! Seed files - populate a database from JSON
//!
//! A seed describes identities, each Sone's full content set, likes and
//! known ids. Applying it goes through the same operations a sync layer
//! uses: one `replace_owner_set` per Sone for posts and then replies.

use crate::database::{ContentDatabase, KnownIds};
use crate::id::{PostId, ReplyId, SoneId};
use crate::identity::Identity;
use crate::post::Post;
use crate::reply::PostReply;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Content set of one Sone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoneContent {
    pub id: SoneId,
    #[serde(default)]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub replies: Vec<PostReply>,
}

/// A (liked item, liking Sone) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like<I> {
    pub item: I,
    pub sone: SoneId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub identities: Vec<Identity>,
    #[serde(default)]
    pub sones: Vec<SoneContent>,
    #[serde(default)]
    pub post_likes: Vec<Like<PostId>>,
    #[serde(default)]
    pub reply_likes: Vec<Like<ReplyId>>,
    #[serde(default)]
    pub known: KnownIds,
}

/// What applying a seed did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub identities: usize,
    pub posts: usize,
    pub replies: usize,
    pub likes: usize,
    pub known: usize,
}

impl Seed {
    /// Read a seed from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Apply the seed to `db`.
    ///
    /// Stops at the first error. Earlier steps stay applied; each step is
    /// atomic on its own.
    pub fn apply(&self, db: &ContentDatabase) -> Result<SeedSummary> {
        let mut summary = SeedSummary::default();

        for identity in &self.identities {
            db.store_identity(identity.clone());
            summary.identities += 1;
        }

        for content in &self.sones {
            let posts = db.posts().replace_owner_set(&content.id, content.posts.iter().cloned())?;
            let replies = db.replies().replace_owner_set(&content.id, content.replies.iter().cloned())?;
            summary.posts += posts.added + posts.updated;
            summary.replies += replies.added + replies.updated;
        }

        for like in &self.post_likes {
            if db.posts().like(&like.item, &like.sone)? {
                summary.likes += 1;
            }
        }
        for like in &self.reply_likes {
            if db.replies().like(&like.item, &like.sone)? {
                summary.likes += 1;
            }
        }

        summary.known = db.restore_known(&self.known);

        tracing::info!(
            identities = summary.identities,
            posts = summary.posts,
            replies = summary.replies,
            likes = summary.likes,
            known = summary.known,
            "Applied seed"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::io::Write;

    const SEED: &str = r#"{
        "identities": [{ "id": "alice", "nickname": "Alice" }],
        "sones": [
            {
                "id": "alice",
                "posts": [{ "id": "p1", "owner": "alice", "time": 1, "text": "hello" }],
                "replies": []
            },
            {
                "id": "bob",
                "posts": [],
                "replies": [{ "id": "r1", "post_id": "p1", "owner": "bob", "time": 2, "text": "hi" }]
            }
        ],
        "post_likes": [{ "item": "p1", "sone": "bob" }],
        "reply_likes": [{ "item": "r1", "sone": "alice" }],
        "known": { "posts": ["p1"], "replies": ["gone"] }
    }"#;

    #[test]
    fn test_apply_seed() {
        let db = ContentDatabase::new();
        let seed = Seed::from_json(SEED).unwrap();
        let summary = seed.apply(&db).unwrap();

        assert_eq!(summary, SeedSummary { identities: 1, posts: 1, replies: 1, likes: 2, known: 2 });
        assert!(db.posts().is_liked(&PostId::new("p1"), &SoneId::new("bob")));
        assert!(db.posts().is_known(&PostId::new("p1")));
        assert!(db.replies().is_known(&ReplyId::new("gone")));
        assert_eq!(db.thread(&PostId::new("p1")).unwrap().replies.len(), 1);
        assert!(db.audit().is_clean());
    }

    #[test]
    fn test_seed_with_foreign_post_fails() {
        let json = r#"{ "sones": [{ "id": "alice", "posts": [{ "id": "p1", "owner": "bob", "time": 1, "text": "x" }] }] }"#;
        let db = ContentDatabase::new();
        let err = Seed::from_json(json).unwrap().apply(&db).unwrap_err();
        assert!(err.is_ownership_conflict());
        assert!(db.posts().is_empty());
    }

    #[test]
    fn test_like_on_missing_post_fails() {
        let json = r#"{ "post_likes": [{ "item": "nope", "sone": "bob" }] }"#;
        let err = Seed::from_json(json).unwrap().apply(&ContentDatabase::new()).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SEED.as_bytes()).unwrap();

        let seed = Seed::load(file.path()).unwrap();
        assert_eq!(seed.sones.len(), 2);
        assert!(Seed::from_json("{ not json").is_err());
    }
}
