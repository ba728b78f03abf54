//! Post store
//!
//! Primary map `posts` plus two secondary indices kept in sync by every
//! mutation:
//! - `by_owner`: owner → ids of the posts it owns
//! - `by_recipient`: recipient → ids of the posts addressed to it
//!
//! Likes are keyed by post id. They survive a bulk replacement as long as
//! the id survives it, and are dropped together with the record when the id
//! is deleted.
//!
//! Known ids are a separate set that only ever grows. Deleting a record
//! leaves its id known, so content that is dropped and fetched again is not
//! reported as new.

use super::{ReplaceSummary, ownership_conflict};
use crate::id::{PostId, SoneId};
use crate::post::Post;
use crate::relation::LikeIndex;
use crate::{EntityKind, Error, Result};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Debug, Default)]
struct PostIndex {
    posts: HashMap<PostId, Post>,
    by_owner: HashMap<SoneId, HashSet<PostId>>,
    by_recipient: HashMap<SoneId, HashSet<PostId>>,
    likes: LikeIndex<PostId>,
    known: HashSet<PostId>,
}

impl PostIndex {
    /// Fail if `post.id` is already owned by another Sone
    fn check_owner(&self, post: &Post) -> Result<()> {
        match self.posts.get(&post.id) {
            Some(existing) if existing.owner != post.owner => Err(ownership_conflict(
                EntityKind::Post,
                &post.id,
                &existing.owner,
                &post.owner,
            )),
            _ => Ok(()),
        }
    }

    /// Insert or refresh a post whose ownership was already checked.
    /// Returns `true` if the id was new.
    fn put(&mut self, post: Post) -> bool {
        let id = post.id.clone();

        if let Some(existing) = self.posts.get_mut(&id) {
            if existing.recipient != post.recipient {
                if let Some(old) = existing.recipient.take() {
                    unlink(&mut self.by_recipient, &old, &id);
                }
                if let Some(new) = &post.recipient {
                    self.by_recipient.entry(new.clone()).or_default().insert(id.clone());
                }
            }
            *existing = post;
            return false;
        }

        self.by_owner.entry(post.owner.clone()).or_default().insert(id.clone());
        if let Some(recipient) = &post.recipient {
            self.by_recipient.entry(recipient.clone()).or_default().insert(id.clone());
        }
        self.posts.insert(id, post);
        true
    }

    /// Delete a post and its likes. The known flag is kept.
    fn delete(&mut self, id: &PostId) -> Option<Post> {
        let post = self.posts.remove(id)?;
        unlink(&mut self.by_owner, &post.owner, id);
        if let Some(recipient) = &post.recipient {
            unlink(&mut self.by_recipient, recipient, id);
        }
        self.likes.drop_item(id);
        Some(post)
    }

    fn collect(&self, ids: Option<&HashSet<PostId>>) -> Vec<Post> {
        let mut posts: Vec<Post> = ids
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.posts.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        posts.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.id.cmp(&b.id)));
        posts
    }

    fn replace_owner_set(&mut self, owner: &SoneId, posts: Vec<Post>) -> Result<ReplaceSummary> {
        // Validate the whole batch before touching anything.
        let mut incoming: HashMap<PostId, Post> = HashMap::with_capacity(posts.len());
        for post in posts {
            if &post.owner != owner {
                return Err(ownership_conflict(EntityKind::Post, &post.id, &post.owner, owner));
            }
            self.check_owner(&post)?;
            incoming.insert(post.id.clone(), post);
        }

        let current = self.by_owner.get(owner).cloned().unwrap_or_default();
        let mut summary = ReplaceSummary::default();

        for id in current.iter().filter(|id| !incoming.contains_key(*id)) {
            if self.delete(id).is_some() {
                summary.removed += 1;
            }
        }
        for post in incoming.into_values() {
            if self.put(post) {
                summary.added += 1;
            } else {
                summary.updated += 1;
            }
        }

        Ok(summary)
    }

    fn audit(&self, problems: &mut Vec<String>) {
        for (id, post) in &self.posts {
            if &post.id != id {
                problems.push(format!("post {} stored under key {}", post.id, id));
            }
            if !self.by_owner.get(&post.owner).is_some_and(|ids| ids.contains(id)) {
                problems.push(format!("post {} missing from owner index of {}", id, post.owner));
            }
            if let Some(recipient) = &post.recipient {
                if !self.by_recipient.get(recipient).is_some_and(|ids| ids.contains(id)) {
                    problems.push(format!("post {} missing from recipient index of {}", id, recipient));
                }
            }
        }
        for (owner, ids) in &self.by_owner {
            for id in ids {
                match self.posts.get(id) {
                    Some(post) if &post.owner == owner => {}
                    Some(post) => problems.push(format!(
                        "post {} indexed under {} but owned by {}",
                        id, owner, post.owner
                    )),
                    None => problems.push(format!("owner index of {} references absent post {}", owner, id)),
                }
            }
        }
        for (recipient, ids) in &self.by_recipient {
            for id in ids {
                if !self.posts.get(id).is_some_and(|post| post.is_directed_to(recipient)) {
                    problems.push(format!("recipient index of {} references post {} not addressed to it", recipient, id));
                }
            }
        }
        for id in self.likes.items() {
            if !self.posts.contains_key(id) {
                problems.push(format!("like relation references absent post {}", id));
            }
        }
        if !self.likes.is_symmetric() {
            problems.push("post like relation is not symmetric".to_string());
        }
    }
}

fn unlink(index: &mut HashMap<SoneId, HashSet<PostId>>, key: &SoneId, id: &PostId) {
    if let Some(ids) = index.get_mut(key) {
        ids.remove(id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}

/// Thread-safe store of posts, their owner/recipient indices, likes and
/// known flags.
#[derive(Debug, Default)]
pub struct PostStore {
    index: RwLock<PostIndex>,
}

impl PostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a post by id
    pub fn get(&self, id: &PostId) -> Option<Post> {
        self.index.read().posts.get(id).cloned()
    }

    pub fn contains(&self, id: &PostId) -> bool {
        self.index.read().posts.contains_key(id)
    }

    /// All posts owned by `owner`, ordered by time then id
    pub fn posts_by_owner(&self, owner: &SoneId) -> Vec<Post> {
        let index = self.index.read();
        index.collect(index.by_owner.get(owner))
    }

    /// All posts addressed to `recipient`, ordered by time then id
    pub fn posts_by_recipient(&self, recipient: &SoneId) -> Vec<Post> {
        let index = self.index.read();
        index.collect(index.by_recipient.get(recipient))
    }

    /// Ids of the posts currently owned by `owner`
    pub fn post_ids_by_owner(&self, owner: &SoneId) -> HashSet<PostId> {
        self.index.read().by_owner.get(owner).cloned().unwrap_or_default()
    }

    /// Insert or overwrite a post.
    ///
    /// Fails with [`Error::OwnershipConflict`] if the id is already stored
    /// under a different owner.
    pub fn store(&self, post: Post) -> Result<()> {
        let mut index = self.index.write();
        index.check_owner(&post)?;
        tracing::debug!(id = %post.id, owner = %post.owner, "Storing post");
        index.put(post);
        Ok(())
    }

    /// Delete a post and every like referencing it. Replies are untouched.
    pub fn remove(&self, id: &PostId) -> Option<Post> {
        let removed = self.index.write().delete(id);
        if removed.is_some() {
            tracing::debug!(%id, "Removed post");
        }
        removed
    }

    /// Delete every post owned by `owner`. Returns how many were removed.
    pub fn remove_owner(&self, owner: &SoneId) -> usize {
        let mut index = self.index.write();
        let ids = index.by_owner.get(owner).cloned().unwrap_or_default();
        let removed = ids.iter().filter(|id| index.delete(id).is_some()).count();
        tracing::debug!(%owner, removed, "Removed all posts of owner");
        removed
    }

    /// Replace the complete post set of `owner` in one atomic step.
    ///
    /// Every post must be owned by `owner` and no id may belong to another
    /// Sone; otherwise nothing changes. Ids missing from `posts` are
    /// deleted, new ids are inserted, and surviving ids are refreshed while
    /// keeping their likes and known flag.
    pub fn replace_owner_set(
        &self,
        owner: &SoneId,
        posts: impl IntoIterator<Item = Post>,
    ) -> Result<ReplaceSummary> {
        let posts: Vec<Post> = posts.into_iter().collect();
        let summary = self.index.write().replace_owner_set(owner, posts)?;
        tracing::info!(%owner, added = summary.added, updated = summary.updated, removed = summary.removed, "Replaced post set");
        Ok(summary)
    }

    /// Record that `sone` likes the post. Returns `false` if it already did.
    pub fn like(&self, id: &PostId, sone: &SoneId) -> Result<bool> {
        let mut index = self.index.write();
        if !index.posts.contains_key(id) {
            return Err(Error::post_not_found(id));
        }
        Ok(index.likes.like(id, sone))
    }

    /// Remove a like. Returns `false` if there was none.
    pub fn unlike(&self, id: &PostId, sone: &SoneId) -> bool {
        self.index.write().likes.unlike(id, sone)
    }

    pub fn is_liked(&self, id: &PostId, sone: &SoneId) -> bool {
        self.index.read().likes.is_liked(id, sone)
    }

    /// Sones liking the post
    pub fn likers(&self, id: &PostId) -> HashSet<SoneId> {
        self.index.read().likes.likers(id)
    }

    /// Posts liked by `sone`
    pub fn liked_by(&self, sone: &SoneId) -> HashSet<PostId> {
        self.index.read().likes.liked_by(sone)
    }

    pub fn is_known(&self, id: &PostId) -> bool {
        self.index.read().known.contains(id)
    }

    /// Mark a stored post as known. Returns `false` if it already was.
    pub fn mark_known(&self, id: &PostId) -> Result<bool> {
        let mut index = self.index.write();
        if !index.posts.contains_key(id) {
            return Err(Error::post_not_found(id));
        }
        Ok(index.known.insert(id.clone()))
    }

    /// Mark ids as known whether or not a post is stored for them yet.
    /// Returns how many ids were newly marked.
    pub fn restore_known<'a>(&self, ids: impl IntoIterator<Item = &'a PostId>) -> usize {
        let mut index = self.index.write();
        ids.into_iter().filter(|id| index.known.insert((*id).clone())).count()
    }

    /// Ids of all known posts, stored or not
    pub fn known_ids(&self) -> BTreeSet<PostId> {
        self.index.read().known.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.index.read().posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().posts.is_empty()
    }

    /// Number of Sones owning at least one post
    pub fn owner_count(&self) -> usize {
        self.index.read().by_owner.len()
    }

    /// Number of (liker, post) pairs
    pub fn like_count(&self) -> usize {
        self.index.read().likes.len()
    }

    pub fn known_count(&self) -> usize {
        self.index.read().known.len()
    }

    /// Re-check every secondary index against the primary map
    pub fn audit(&self) -> Vec<String> {
        let mut problems = Vec::new();
        self.index.read().audit(&mut problems);
        problems
    }
}
