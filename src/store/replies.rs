//! Post reply store
//!
//! Replies are indexed by owner and by parent post. The per-post index is a
//! `BTreeSet<(time, id)>`, so `replies_for_post` walks it in creation order
//! with the id as a deterministic tie-breaker.
//!
//! Known reply ids live in their own set, outside the records. Deleting or
//! replacing a reply never clears it, and ids restored before their reply
//! arrives take effect once it is stored.

use super::{ReplaceSummary, ownership_conflict};
use crate::id::{PostId, ReplyId, SoneId};
use crate::relation::LikeIndex;
use crate::reply::PostReply;
use crate::{EntityKind, Error, Result};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Debug, Default)]
struct ReplyIndex {
    replies: HashMap<ReplyId, PostReply>,
    by_post: HashMap<PostId, BTreeSet<(u64, ReplyId)>>,
    by_owner: HashMap<SoneId, HashSet<ReplyId>>,
    likes: LikeIndex<ReplyId>,
    known: HashSet<ReplyId>,
}

impl ReplyIndex {
    fn check_owner(&self, reply: &PostReply) -> Result<()> {
        match self.replies.get(&reply.id) {
            Some(existing) if existing.owner != reply.owner => Err(ownership_conflict(
                EntityKind::Reply,
                &reply.id,
                &existing.owner,
                &reply.owner,
            )),
            _ => Ok(()),
        }
    }

    /// Insert or refresh a reply whose ownership was already checked.
    /// Returns `true` if the id was new.
    fn put(&mut self, reply: PostReply) -> bool {
        let id = reply.id.clone();

        if let Some(existing) = self.replies.get_mut(&id) {
            if existing.post_id != reply.post_id || existing.time != reply.time {
                unlink_post(&mut self.by_post, existing);
                self.by_post.entry(reply.post_id.clone()).or_default().insert(reply.sort_key());
            }
            *existing = reply;
            return false;
        }

        self.by_post.entry(reply.post_id.clone()).or_default().insert(reply.sort_key());
        self.by_owner.entry(reply.owner.clone()).or_default().insert(id.clone());
        self.replies.insert(id, reply);
        true
    }

    fn delete(&mut self, id: &ReplyId) -> Option<PostReply> {
        let reply = self.replies.remove(id)?;
        unlink_post(&mut self.by_post, &reply);
        if let Some(ids) = self.by_owner.get_mut(&reply.owner) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_owner.remove(&reply.owner);
            }
        }
        self.likes.drop_item(id);
        Some(reply)
    }

    fn replace_owner_set(&mut self, owner: &SoneId, replies: Vec<PostReply>) -> Result<ReplaceSummary> {
        let mut incoming: HashMap<ReplyId, PostReply> = HashMap::with_capacity(replies.len());
        for reply in replies {
            if &reply.owner != owner {
                return Err(ownership_conflict(EntityKind::Reply, &reply.id, &reply.owner, owner));
            }
            self.check_owner(&reply)?;
            incoming.insert(reply.id.clone(), reply);
        }

        let current = self.by_owner.get(owner).cloned().unwrap_or_default();
        let mut summary = ReplaceSummary::default();

        for id in current.iter().filter(|id| !incoming.contains_key(*id)) {
            if self.delete(id).is_some() {
                summary.removed += 1;
            }
        }
        for reply in incoming.into_values() {
            if self.put(reply) {
                summary.added += 1;
            } else {
                summary.updated += 1;
            }
        }

        Ok(summary)
    }

    fn ordered<'a>(&self, keys: impl Iterator<Item = &'a (u64, ReplyId)>) -> Vec<PostReply> {
        keys.filter_map(|(_, id)| self.replies.get(id))
            .cloned()
            .collect()
    }

    fn audit(&self, problems: &mut Vec<String>) {
        for (id, reply) in &self.replies {
            if &reply.id != id {
                problems.push(format!("reply {} stored under key {}", reply.id, id));
            }
            if !self.by_post.get(&reply.post_id).is_some_and(|keys| keys.contains(&reply.sort_key())) {
                problems.push(format!("reply {} missing from post index of {}", id, reply.post_id));
            }
            if !self.by_owner.get(&reply.owner).is_some_and(|ids| ids.contains(id)) {
                problems.push(format!("reply {} missing from owner index of {}", id, reply.owner));
            }
        }
        for (post_id, keys) in &self.by_post {
            for (time, id) in keys {
                match self.replies.get(id) {
                    Some(reply) if &reply.post_id == post_id && reply.time == *time => {}
                    _ => problems.push(format!("post index of {} has stale entry for reply {}", post_id, id)),
                }
            }
        }
        for (owner, ids) in &self.by_owner {
            for id in ids {
                if !self.replies.get(id).is_some_and(|reply| &reply.owner == owner) {
                    problems.push(format!("owner index of {} has stale entry for reply {}", owner, id));
                }
            }
        }
        for id in self.likes.items() {
            if !self.replies.contains_key(id) {
                problems.push(format!("like relation references absent reply {}", id));
            }
        }
        if !self.likes.is_symmetric() {
            problems.push("reply like relation is not symmetric".to_string());
        }
    }
}

fn unlink_post(by_post: &mut HashMap<PostId, BTreeSet<(u64, ReplyId)>>, reply: &PostReply) {
    if let Some(keys) = by_post.get_mut(&reply.post_id) {
        keys.remove(&(reply.time, reply.id.clone()));
        if keys.is_empty() {
            by_post.remove(&reply.post_id);
        }
    }
}

/// Thread-safe store of post replies with per-post ordering, per-owner
/// grouping, likes and known flags.
#[derive(Debug, Default)]
pub struct PostReplyStore {
    index: RwLock<ReplyIndex>,
}

impl PostReplyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a reply by id
    pub fn get(&self, id: &ReplyId) -> Option<PostReply> {
        self.index.read().replies.get(id).cloned()
    }

    pub fn contains(&self, id: &ReplyId) -> bool {
        self.index.read().replies.contains_key(id)
    }

    /// Replies to `post_id`, ascending by time, ties broken by id
    pub fn replies_for_post(&self, post_id: &PostId) -> Vec<PostReply> {
        let index = self.index.read();
        match index.by_post.get(post_id) {
            Some(keys) => index.ordered(keys.iter()),
            None => Vec::new(),
        }
    }

    /// Replies owned by `owner`, ascending by time, ties broken by id
    pub fn replies_by_owner(&self, owner: &SoneId) -> Vec<PostReply> {
        let index = self.index.read();
        let Some(ids) = index.by_owner.get(owner) else {
            return Vec::new();
        };
        let mut replies: Vec<PostReply> = ids
            .iter()
            .filter_map(|id| index.replies.get(id))
            .cloned()
            .collect();
        replies.sort_by_key(PostReply::sort_key);
        replies
    }

    /// Number of replies to `post_id`
    pub fn reply_count(&self, post_id: &PostId) -> usize {
        self.index.read().by_post.get(post_id).map_or(0, BTreeSet::len)
    }

    /// Insert or overwrite a reply.
    ///
    /// Fails with [`Error::OwnershipConflict`] if the id is already stored
    /// under a different owner.
    pub fn store(&self, reply: PostReply) -> Result<()> {
        let mut index = self.index.write();
        index.check_owner(&reply)?;
        tracing::debug!(id = %reply.id, owner = %reply.owner, post = %reply.post_id, "Storing reply");
        index.put(reply);
        Ok(())
    }

    /// Delete a reply and every like referencing it
    pub fn remove(&self, id: &ReplyId) -> Option<PostReply> {
        let removed = self.index.write().delete(id);
        if removed.is_some() {
            tracing::debug!(%id, "Removed reply");
        }
        removed
    }

    /// Delete every reply owned by `owner`. Returns how many were removed.
    pub fn remove_owner(&self, owner: &SoneId) -> usize {
        let mut index = self.index.write();
        let ids = index.by_owner.get(owner).cloned().unwrap_or_default();
        let removed = ids.iter().filter(|id| index.delete(id).is_some()).count();
        tracing::debug!(%owner, removed, "Removed all replies of owner");
        removed
    }

    /// Delete every reply to `post_id`. Returns how many were removed.
    pub fn remove_for_post(&self, post_id: &PostId) -> usize {
        let mut index = self.index.write();
        let keys = index.by_post.get(post_id).cloned().unwrap_or_default();
        let removed = keys.iter().filter(|(_, id)| index.delete(id).is_some()).count();
        tracing::debug!(post = %post_id, removed, "Removed replies of post");
        removed
    }

    /// Replace the complete reply set of `owner` in one atomic step.
    ///
    /// Same contract as [`PostStore::replace_owner_set`](super::PostStore::replace_owner_set):
    /// surviving ids keep their likes and their known flag.
    pub fn replace_owner_set(
        &self,
        owner: &SoneId,
        replies: impl IntoIterator<Item = PostReply>,
    ) -> Result<ReplaceSummary> {
        let replies: Vec<PostReply> = replies.into_iter().collect();
        let summary = self.index.write().replace_owner_set(owner, replies)?;
        tracing::info!(%owner, added = summary.added, updated = summary.updated, removed = summary.removed, "Replaced reply set");
        Ok(summary)
    }

    /// Record that `sone` likes the reply. Returns `false` if it already did.
    pub fn like(&self, id: &ReplyId, sone: &SoneId) -> Result<bool> {
        let mut index = self.index.write();
        if !index.replies.contains_key(id) {
            return Err(Error::reply_not_found(id));
        }
        Ok(index.likes.like(id, sone))
    }

    pub fn unlike(&self, id: &ReplyId, sone: &SoneId) -> bool {
        self.index.write().likes.unlike(id, sone)
    }

    pub fn is_liked(&self, id: &ReplyId, sone: &SoneId) -> bool {
        self.index.read().likes.is_liked(id, sone)
    }

    pub fn likers(&self, id: &ReplyId) -> HashSet<SoneId> {
        self.index.read().likes.likers(id)
    }

    pub fn liked_by(&self, sone: &SoneId) -> HashSet<ReplyId> {
        self.index.read().likes.liked_by(sone)
    }

    pub fn is_known(&self, id: &ReplyId) -> bool {
        self.index.read().known.contains(id)
    }

    /// Mark a stored reply as known. Returns `false` if it already was.
    pub fn mark_known(&self, id: &ReplyId) -> Result<bool> {
        let mut index = self.index.write();
        if !index.replies.contains_key(id) {
            return Err(Error::reply_not_found(id));
        }
        Ok(index.known.insert(id.clone()))
    }

    /// Mark ids as known whether or not a reply is stored for them yet.
    /// Returns how many ids were newly marked.
    pub fn restore_known<'a>(&self, ids: impl IntoIterator<Item = &'a ReplyId>) -> usize {
        let mut index = self.index.write();
        ids.into_iter().filter(|id| index.known.insert((*id).clone())).count()
    }

    pub fn known_ids(&self) -> BTreeSet<ReplyId> {
        self.index.read().known.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.index.read().replies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().replies.is_empty()
    }

    pub fn owner_count(&self) -> usize {
        self.index.read().by_owner.len()
    }

    pub fn like_count(&self) -> usize {
        self.index.read().likes.len()
    }

    pub fn known_count(&self) -> usize {
        self.index.read().known.len()
    }

    pub fn audit(&self) -> Vec<String> {
        let mut problems = Vec::new();
        self.index.read().audit(&mut problems);
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(id: &str, post: &str, owner: &str, time: u64) -> PostReply {
        PostReply::builder(owner, post).id(id).time(time).text("reply").build().unwrap()
    }

    fn rid(id: &str) -> ReplyId {
        ReplyId::new(id)
    }

    fn ids(replies: Vec<PostReply>) -> Vec<ReplyId> {
        replies.into_iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_replies_ordered_by_time() {
        let store = PostReplyStore::new();
        store.store(reply("r3", "p1", "alice", 3)).unwrap();
        store.store(reply("r1", "p1", "bob", 1)).unwrap();
        store.store(reply("r2", "p1", "carol", 2)).unwrap();

        let times: Vec<u64> = store.replies_for_post(&PostId::new("p1")).iter().map(|r| r.time).collect();
        assert_eq!(times, vec![1, 2, 3]);
    }

    #[test]
    fn test_equal_times_ordered_by_id() {
        let store = PostReplyStore::new();
        store.store(reply("b", "p1", "alice", 5)).unwrap();
        store.store(reply("a", "p1", "bob", 5)).unwrap();

        assert_eq!(ids(store.replies_for_post(&PostId::new("p1"))), vec![rid("a"), rid("b")]);
    }

    #[test]
    fn test_overwrite_reorders() {
        let store = PostReplyStore::new();
        store.store(reply("r1", "p1", "alice", 1)).unwrap();
        store.store(reply("r2", "p1", "alice", 2)).unwrap();
        store.store(reply("r1", "p1", "alice", 3)).unwrap();

        assert_eq!(ids(store.replies_for_post(&PostId::new("p1"))), vec![rid("r2"), rid("r1")]);
        assert_eq!(store.reply_count(&PostId::new("p1")), 2);
        assert!(store.audit().is_empty());
    }

    #[test]
    fn test_store_rejects_owner_migration() {
        let store = PostReplyStore::new();
        store.store(reply("r1", "p1", "alice", 1)).unwrap();
        let err = store.store(reply("r1", "p1", "bob", 1)).unwrap_err();
        assert!(err.is_ownership_conflict());
        assert_eq!(store.get(&rid("r1")).unwrap().owner, SoneId::new("alice"));
    }

    #[test]
    fn test_known_is_monotonic() {
        let store = PostReplyStore::new();
        store.store(reply("r1", "p1", "alice", 1)).unwrap();
        assert!(!store.is_known(&rid("r1")));

        assert!(store.mark_known(&rid("r1")).unwrap());
        assert!(store.is_known(&rid("r1")));
        assert!(!store.mark_known(&rid("r1")).unwrap());
        assert!(store.is_known(&rid("r1")));
    }

    #[test]
    fn test_mark_known_missing_is_not_found() {
        let store = PostReplyStore::new();
        let err = store.mark_known(&rid("ghost")).unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: EntityKind::Reply, .. }));
    }

    #[test]
    fn test_replace_preserves_known_and_likes() {
        let store = PostReplyStore::new();
        let alice = SoneId::new("alice");
        store.store(reply("r1", "p1", "alice", 1)).unwrap();
        store.store(reply("r2", "p1", "alice", 2)).unwrap();
        store.mark_known(&rid("r1")).unwrap();
        store.like(&rid("r1"), &SoneId::new("bob")).unwrap();
        store.like(&rid("r2"), &SoneId::new("bob")).unwrap();

        let summary = store
            .replace_owner_set(&alice, vec![reply("r1", "p1", "alice", 1), reply("r3", "p2", "alice", 4)])
            .unwrap();

        assert_eq!(summary, ReplaceSummary { added: 1, updated: 1, removed: 1 });
        assert!(store.is_known(&rid("r1")));
        assert!(store.is_liked(&rid("r1"), &SoneId::new("bob")));
        assert!(!store.is_liked(&rid("r2"), &SoneId::new("bob")));
        assert!(!store.is_known(&rid("r3")));
        assert_eq!(ids(store.replies_by_owner(&alice)), vec![rid("r1"), rid("r3")]);
        assert!(store.audit().is_empty());
    }

    #[test]
    fn test_replace_rejects_foreign_reply() {
        let store = PostReplyStore::new();
        store.store(reply("r1", "p1", "alice", 1)).unwrap();

        let err = store
            .replace_owner_set(&SoneId::new("alice"), vec![reply("r2", "p1", "bob", 2)])
            .unwrap_err();
        assert!(err.is_ownership_conflict());
        assert!(store.get(&rid("r1")).is_some());
        assert!(store.get(&rid("r2")).is_none());
    }

    #[test]
    fn test_replace_rejects_id_owned_elsewhere() {
        let store = PostReplyStore::new();
        store.store(reply("r1", "p1", "bob", 1)).unwrap();
        store.store(reply("r2", "p1", "alice", 2)).unwrap();
        store.like(&rid("r2"), &SoneId::new("carol")).unwrap();

        let err = store
            .replace_owner_set(&SoneId::new("alice"), vec![reply("r1", "p1", "alice", 3)])
            .unwrap_err();
        assert!(matches!(err, Error::OwnershipConflict { ref owner, .. } if owner == &SoneId::new("bob")));

        assert_eq!(store.get(&rid("r1")).unwrap().owner, SoneId::new("bob"));
        assert!(store.get(&rid("r2")).is_some());
        assert!(store.is_liked(&rid("r2"), &SoneId::new("carol")));
        assert_eq!(ids(store.replies_for_post(&PostId::new("p1"))), vec![rid("r1"), rid("r2")]);
    }

    #[test]
    fn test_known_outlives_removed_reply() {
        let store = PostReplyStore::new();
        let bob = SoneId::new("bob");
        store.store(reply("r1", "p1", "bob", 1)).unwrap();
        store.mark_known(&rid("r1")).unwrap();

        assert_eq!(store.remove_owner(&bob), 1);
        assert!(store.is_known(&rid("r1")));

        store.replace_owner_set(&bob, vec![reply("r1", "p1", "bob", 1)]).unwrap();
        assert!(store.is_known(&rid("r1")));
        assert_eq!(store.known_ids(), BTreeSet::from([rid("r1")]));
    }

    #[test]
    fn test_remove_for_post() {
        let store = PostReplyStore::new();
        store.store(reply("r1", "p1", "alice", 1)).unwrap();
        store.store(reply("r2", "p1", "bob", 2)).unwrap();
        store.store(reply("r3", "p2", "bob", 3)).unwrap();
        store.like(&rid("r1"), &SoneId::new("carol")).unwrap();

        assert_eq!(store.remove_for_post(&PostId::new("p1")), 2);
        assert!(store.replies_for_post(&PostId::new("p1")).is_empty());
        assert_eq!(store.len(), 1);
        assert_eq!(store.like_count(), 0);
        assert!(store.audit().is_empty());
    }

    #[test]
    fn test_replies_survive_without_post() {
        let store = PostReplyStore::new();
        store.store(reply("r1", "missing-post", "alice", 1)).unwrap();
        assert_eq!(store.replies_for_post(&PostId::new("missing-post")).len(), 1);
    }
}
