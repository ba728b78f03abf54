//! Content Database - facade over the identity, post and reply stores
//!
//! The facade owns the three stores and adds read-only views derived from
//! them on demand. It holds no state of its own, so the views introduce no
//! invariants beyond those the stores already keep.
//!
//! Operations that span two stores (removing a Sone's content, cascading a
//! post delete) run as separate atomic steps per store. A reader may see
//! the posts gone while the replies are still present; replies only refer
//! back to posts by id, so that intermediate state is valid.

use crate::id::{PostId, ReplyId, SoneId};
use crate::identity::Identity;
use crate::post::Post;
use crate::reply::PostReply;
use crate::store::{IdentityStore, PostReplyStore, PostStore};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

/// The content database: identities, posts, replies, likes and known flags.
///
/// Share it between threads with an `Arc`; every store synchronizes itself.
#[derive(Debug, Default)]
pub struct ContentDatabase {
    identities: IdentityStore,
    posts: PostStore,
    replies: PostReplyStore,
}

/// A post together with its replies in display order
#[derive(Debug, Clone, Serialize)]
pub struct Thread {
    pub post: Post,
    pub replies: Vec<PostReply>,
}

/// Ids of all content the local user has seen.
///
/// Callers checkpoint this however they like and feed it back through
/// [`ContentDatabase::restore_known`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownIds {
    #[serde(default)]
    pub posts: BTreeSet<PostId>,
    #[serde(default)]
    pub replies: BTreeSet<ReplyId>,
}

impl KnownIds {
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty() && self.replies.is_empty()
    }

    /// Read a JSON checkpoint
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write a JSON checkpoint, replacing any existing file
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Problems found by [`ContentDatabase::audit`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditReport {
    pub posts: Vec<String>,
    pub replies: Vec<String>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.posts.is_empty() && self.replies.is_empty()
    }
}

impl std::fmt::Display for AuditReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_clean() {
            return writeln!(f, "No problems found.");
        }
        for problem in self.posts.iter().chain(&self.replies) {
            writeln!(f, "  - {}", problem)?;
        }
        Ok(())
    }
}

impl ContentDatabase {
    /// Create an empty database
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identities(&self) -> &IdentityStore {
        &self.identities
    }

    pub fn posts(&self) -> &PostStore {
        &self.posts
    }

    pub fn replies(&self) -> &PostReplyStore {
        &self.replies
    }

    // ========== Identity Operations ==========

    pub fn identity(&self, id: &SoneId) -> Option<Identity> {
        self.identities.get(id)
    }

    pub fn store_identity(&self, identity: Identity) {
        self.identities.store(identity);
    }

    // ========== Composite Mutations ==========

    /// Remove a post. With `cascade`, its replies are removed afterwards.
    ///
    /// Returns the removed post and the number of removed replies.
    pub fn remove_post(&self, id: &PostId, cascade: bool) -> Option<(Post, usize)> {
        let post = self.posts.remove(id)?;
        let replies = if cascade { self.replies.remove_for_post(id) } else { 0 };
        Some((post, replies))
    }

    /// Remove every post and reply owned by `sone`.
    ///
    /// Returns (removed posts, removed replies).
    pub fn remove_sone_content(&self, sone: &SoneId) -> (usize, usize) {
        let posts = self.posts.remove_owner(sone);
        let replies = self.replies.remove_owner(sone);
        tracing::info!(%sone, posts, replies, "Removed content of Sone");
        (posts, replies)
    }

    // ========== Derived Views ==========

    /// A post with its ordered replies
    pub fn thread(&self, post_id: &PostId) -> Option<Thread> {
        let post = self.posts.get(post_id)?;
        let replies = self.replies.replies_for_post(post_id);
        Some(Thread { post, replies })
    }

    /// All replies to posts owned by `sone`, ordered by time then id
    pub fn replies_to_posts_of(&self, sone: &SoneId) -> Vec<PostReply> {
        let mut replies: Vec<PostReply> = self
            .posts
            .post_ids_by_owner(sone)
            .iter()
            .flat_map(|post_id| self.replies.replies_for_post(post_id))
            .collect();
        replies.sort_by_key(PostReply::sort_key);
        replies
    }

    /// Replies to posts owned by `sone` that the local user has not seen
    pub fn unknown_replies_to_posts_of(&self, sone: &SoneId) -> Vec<PostReply> {
        self.replies_to_posts_of(sone)
            .into_iter()
            .filter(|reply| !self.replies.is_known(&reply.id))
            .collect()
    }

    /// Posts visible to `sone`: its own, those of the Sones it follows, and
    /// those addressed to it. Newest first, ties by id.
    pub fn post_feed(&self, sone: &SoneId, followed: &[SoneId]) -> Vec<Post> {
        let mut seen = HashSet::new();
        let mut feed: Vec<Post> = std::iter::once(sone)
            .chain(followed)
            .flat_map(|owner| self.posts.posts_by_owner(owner))
            .chain(self.posts.posts_by_recipient(sone))
            .filter(|post| seen.insert(post.id.clone()))
            .collect();
        feed.sort_by(|a, b| b.time.cmp(&a.time).then_with(|| a.id.cmp(&b.id)));
        feed
    }

    // ========== Known Checkpoint ==========

    /// Ids of all posts and replies ever marked known
    pub fn known_ids(&self) -> KnownIds {
        KnownIds {
            posts: self.posts.known_ids(),
            replies: self.replies.known_ids(),
        }
    }

    /// Mark every id from `known` as known.
    ///
    /// Ids whose content is not stored yet are kept too, so a checkpoint can
    /// be restored before any content arrives. Returns how many ids were
    /// newly marked.
    pub fn restore_known(&self, known: &KnownIds) -> usize {
        let posts = self.posts.restore_known(&known.posts);
        let replies = self.replies.restore_known(&known.replies);
        tracing::debug!(posts, replies, "Restored known ids");
        posts + replies
    }

    /// Mark all replies to posts of `sone` as known
    pub fn mark_replies_known_for(&self, sone: &SoneId) -> Result<usize> {
        let mut marked = 0;
        for reply in self.unknown_replies_to_posts_of(sone) {
            if self.replies.mark_known(&reply.id)? {
                marked += 1;
            }
        }
        Ok(marked)
    }

    // ========== Inspection ==========

    /// Get statistics about the database
    pub fn stats(&self) -> DatabaseStats {
        DatabaseStats {
            identities: self.identities.len(),
            posts: self.posts.len(),
            replies: self.replies.len(),
            post_owners: self.posts.owner_count(),
            reply_owners: self.replies.owner_count(),
            post_likes: self.posts.like_count(),
            reply_likes: self.replies.like_count(),
            known_posts: self.posts.known_count(),
            known_replies: self.replies.known_count(),
        }
    }

    /// Re-derive every secondary index and report discrepancies.
    pub fn audit(&self) -> AuditReport {
        AuditReport {
            posts: self.posts.audit(),
            replies: self.replies.audit(),
        }
    }
}

/// Statistics about a content database
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatabaseStats {
    pub identities: usize,
    pub posts: usize,
    pub replies: usize,
    pub post_owners: usize,
    pub reply_owners: usize,
    pub post_likes: usize,
    pub reply_likes: usize,
    pub known_posts: usize,
    pub known_replies: usize,
}

impl DatabaseStats {
    /// Label/value rows for tabular output
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Identities", self.identities.to_string()),
            ("Posts", format!("{} ({} owners)", self.posts, self.post_owners)),
            ("Replies", format!("{} ({} owners)", self.replies, self.reply_owners)),
            ("Post likes", self.post_likes.to_string()),
            ("Reply likes", self.reply_likes.to_string()),
            ("Known posts", self.known_posts.to_string()),
            ("Known replies", self.known_replies.to_string()),
        ]
    }
}

impl std::fmt::Display for DatabaseStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Content Database Statistics:")?;
        writeln!(f, "  Identities: {}", self.identities)?;
        writeln!(f, "  Posts: {} (owners: {}, known: {}, likes: {})",
            self.posts, self.post_owners, self.known_posts, self.post_likes)?;
        writeln!(f, "  Replies: {} (owners: {}, known: {}, likes: {})",
            self.replies, self.reply_owners, self.known_replies, self.reply_likes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: &str, owner: &str, time: u64) -> Post {
        Post::builder(owner).id(id).time(time).text("post").build().unwrap()
    }

    fn directed(id: &str, owner: &str, recipient: &str, time: u64) -> Post {
        Post::builder(owner)
            .id(id)
            .time(time)
            .text("for you")
            .to(Some(SoneId::new(recipient)))
            .build()
            .unwrap()
    }

    fn reply(id: &str, post: &str, owner: &str, time: u64) -> PostReply {
        PostReply::builder(owner, post).id(id).time(time).text("reply").build().unwrap()
    }

    fn sone(id: &str) -> SoneId {
        SoneId::new(id)
    }

    fn sample() -> ContentDatabase {
        let db = ContentDatabase::new();
        db.store_identity(Identity::new("alice", "Alice"));
        db.store_identity(Identity::new("bob", "Bob"));
        db.posts().store(post("a1", "alice", 10)).unwrap();
        db.posts().store(post("a2", "alice", 20)).unwrap();
        db.posts().store(post("b1", "bob", 15)).unwrap();
        db.posts().store(directed("c1", "carol", "alice", 30)).unwrap();
        db.replies().store(reply("r1", "a1", "bob", 12)).unwrap();
        db.replies().store(reply("r2", "a2", "carol", 21)).unwrap();
        db.replies().store(reply("r3", "b1", "alice", 16)).unwrap();
        db
    }

    fn post_ids(posts: &[Post]) -> Vec<&str> {
        posts.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_thread() {
        let db = sample();
        let thread = db.thread(&PostId::new("a1")).unwrap();
        assert_eq!(thread.post.owner, sone("alice"));
        assert_eq!(thread.replies.len(), 1);
        assert!(db.thread(&PostId::new("nope")).is_none());
    }

    #[test]
    fn test_replies_to_posts_of() {
        let db = sample();
        let replies: Vec<_> = db.replies_to_posts_of(&sone("alice")).into_iter().map(|r| r.id).collect();
        assert_eq!(replies, vec![ReplyId::new("r1"), ReplyId::new("r2")]);

        db.replies().mark_known(&ReplyId::new("r1")).unwrap();
        let unknown = db.unknown_replies_to_posts_of(&sone("alice"));
        assert_eq!(unknown.len(), 1);
        assert_eq!(unknown[0].id, ReplyId::new("r2"));

        assert_eq!(db.mark_replies_known_for(&sone("alice")).unwrap(), 1);
        assert!(db.unknown_replies_to_posts_of(&sone("alice")).is_empty());
    }

    #[test]
    fn test_post_feed() {
        let db = sample();

        let own = db.post_feed(&sone("alice"), &[]);
        assert_eq!(post_ids(&own), vec!["c1", "a2", "a1"]);

        let with_bob = db.post_feed(&sone("alice"), &[sone("bob"), sone("alice")]);
        assert_eq!(post_ids(&with_bob), vec!["c1", "a2", "b1", "a1"]);
    }

    #[test]
    fn test_remove_post_without_cascade_keeps_replies() {
        let db = sample();
        let (removed, replies) = db.remove_post(&PostId::new("a1"), false).unwrap();
        assert_eq!(removed.id, PostId::new("a1"));
        assert_eq!(replies, 0);
        assert_eq!(db.replies().replies_for_post(&PostId::new("a1")).len(), 1);
        assert!(db.audit().is_clean());
    }

    #[test]
    fn test_remove_post_with_cascade() {
        let db = sample();
        let (_, replies) = db.remove_post(&PostId::new("a1"), true).unwrap();
        assert_eq!(replies, 1);
        assert!(db.replies().get(&ReplyId::new("r1")).is_none());
        assert!(db.remove_post(&PostId::new("a1"), true).is_none());
    }

    #[test]
    fn test_remove_sone_content() {
        let db = sample();
        assert_eq!(db.remove_sone_content(&sone("alice")), (2, 1));
        assert!(db.posts().posts_by_owner(&sone("alice")).is_empty());
        assert!(db.replies().replies_by_owner(&sone("alice")).is_empty());
        // Identities are never removed here.
        assert!(db.identity(&sone("alice")).is_some());
    }

    #[test]
    fn test_known_checkpoint_roundtrip() {
        let db = sample();
        db.posts().mark_known(&PostId::new("a1")).unwrap();
        db.replies().mark_known(&ReplyId::new("r2")).unwrap();
        let known = db.known_ids();

        let fresh = sample();
        assert_eq!(fresh.restore_known(&known), 2);
        assert_eq!(fresh.known_ids(), known);
        assert_eq!(fresh.restore_known(&known), 0);
    }

    #[test]
    fn test_restore_known_before_content_arrives() {
        let db = ContentDatabase::new();
        let mut known = KnownIds::default();
        known.posts.insert(PostId::new("a1"));
        known.replies.insert(ReplyId::new("r1"));
        assert_eq!(db.restore_known(&known), 2);

        db.posts().replace_owner_set(&sone("alice"), vec![post("a1", "alice", 10)]).unwrap();
        db.replies().replace_owner_set(&sone("bob"), vec![reply("r1", "a1", "bob", 12)]).unwrap();

        assert!(db.posts().is_known(&PostId::new("a1")));
        assert!(db.replies().is_known(&ReplyId::new("r1")));
        assert!(db.unknown_replies_to_posts_of(&sone("alice")).is_empty());
        assert!(db.audit().is_clean());
    }

    #[test]
    fn test_known_survives_removal_and_refetch() {
        let db = sample();
        db.replies().mark_known(&ReplyId::new("r1")).unwrap();
        db.posts().mark_known(&PostId::new("a1")).unwrap();

        assert_eq!(db.remove_sone_content(&sone("bob")), (1, 1));
        db.remove_post(&PostId::new("a1"), true);
        assert!(db.replies().get(&ReplyId::new("r1")).is_none());

        db.posts().replace_owner_set(&sone("alice"), vec![post("a1", "alice", 10), post("a2", "alice", 20)]).unwrap();
        db.replies().replace_owner_set(&sone("bob"), vec![reply("r1", "a1", "bob", 12)]).unwrap();

        assert!(db.posts().is_known(&PostId::new("a1")));
        assert!(db.replies().is_known(&ReplyId::new("r1")));
        let unknown: Vec<_> = db.unknown_replies_to_posts_of(&sone("alice")).into_iter().map(|r| r.id).collect();
        assert_eq!(unknown, vec![ReplyId::new("r2")]);
    }

    #[test]
    fn test_known_checkpoint_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known.json");

        let db = sample();
        db.mark_replies_known_for(&sone("alice")).unwrap();
        db.known_ids().save(&path).unwrap();

        let restored = ContentDatabase::new();
        assert_eq!(restored.restore_known(&KnownIds::load(&path).unwrap()), 2);
        assert!(restored.replies().is_known(&ReplyId::new("r1")));
        assert!(restored.replies().is_known(&ReplyId::new("r2")));
        assert!(!restored.replies().is_known(&ReplyId::new("r3")));

        assert!(KnownIds::load(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_stats() {
        let db = sample();
        db.posts().like(&PostId::new("a1"), &sone("bob")).unwrap();
        let stats = db.stats();
        assert_eq!(stats.identities, 2);
        assert_eq!(stats.posts, 4);
        assert_eq!(stats.post_owners, 3);
        assert_eq!(stats.replies, 3);
        assert_eq!(stats.post_likes, 1);
        assert!(stats.to_string().contains("Posts: 4"));
    }
}
