//! Relation Index - many-to-many like tracking
//!
//! Stores (liker, item) pairs indexed in both directions, the same way the
//! graph keeps outgoing and incoming edges:
//! - `likers_by_item`: item → Sones liking it
//! - `items_by_liker`: Sone → items it likes
//!
//! The index is not synchronized itself; each store embeds one inside its
//! locked state so that dropping an item and removing its record happen
//! under the same guard.

use crate::id::SoneId;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Bidirectional like relation between Sones and items of type `I`.
#[derive(Debug, Clone)]
pub struct LikeIndex<I> {
    likers_by_item: HashMap<I, HashSet<SoneId>>,
    items_by_liker: HashMap<SoneId, HashSet<I>>,
}

impl<I> Default for LikeIndex<I> {
    fn default() -> Self {
        Self {
            likers_by_item: HashMap::new(),
            items_by_liker: HashMap::new(),
        }
    }
}

impl<I: Clone + Eq + Hash> LikeIndex<I> {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `sone` likes `item`. Returns `false` if it already did.
    pub fn like(&mut self, item: &I, sone: &SoneId) -> bool {
        let added = self
            .likers_by_item
            .entry(item.clone())
            .or_default()
            .insert(sone.clone());
        if added {
            self.items_by_liker
                .entry(sone.clone())
                .or_default()
                .insert(item.clone());
        }
        added
    }

    /// Remove the like of `sone` on `item`. Returns `false` if there was none.
    pub fn unlike(&mut self, item: &I, sone: &SoneId) -> bool {
        let removed = remove_pair(&mut self.likers_by_item, item, sone);
        if removed {
            remove_pair(&mut self.items_by_liker, sone, item);
        }
        removed
    }

    pub fn is_liked(&self, item: &I, sone: &SoneId) -> bool {
        self.likers_by_item
            .get(item)
            .is_some_and(|likers| likers.contains(sone))
    }

    /// All Sones liking `item`
    pub fn likers(&self, item: &I) -> HashSet<SoneId> {
        self.likers_by_item.get(item).cloned().unwrap_or_default()
    }

    /// All items liked by `sone`
    pub fn liked_by(&self, sone: &SoneId) -> HashSet<I> {
        self.items_by_liker.get(sone).cloned().unwrap_or_default()
    }

    /// Remove every pair referencing `item`. Returns the number of pairs dropped.
    pub fn drop_item(&mut self, item: &I) -> usize {
        let Some(likers) = self.likers_by_item.remove(item) else {
            return 0;
        };
        for sone in &likers {
            remove_pair(&mut self.items_by_liker, sone, item);
        }
        likers.len()
    }

    /// Number of (liker, item) pairs
    pub fn len(&self) -> usize {
        self.likers_by_item.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.likers_by_item.is_empty()
    }

    /// Iterate over all liked items
    pub fn items(&self) -> impl Iterator<Item = &I> {
        self.likers_by_item.keys()
    }

    /// Check that both directions describe the same set of pairs
    pub fn is_symmetric(&self) -> bool {
        let forward = self.likers_by_item.iter().all(|(item, likers)| {
            likers.iter().all(|sone| {
                self.items_by_liker
                    .get(sone)
                    .is_some_and(|items| items.contains(item))
            })
        });
        let reverse: usize = self.items_by_liker.values().map(HashSet::len).sum();
        forward && reverse == self.len()
    }
}

/// Remove `value` from the set under `key`, dropping the set once empty
fn remove_pair<K, V>(map: &mut HashMap<K, HashSet<V>>, key: &K, value: &V) -> bool
where
    K: Eq + Hash,
    V: Eq + Hash,
{
    let Some(values) = map.get_mut(key) else {
        return false;
    };
    let removed = values.remove(value);
    if values.is_empty() {
        map.remove(key);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::PostId;

    fn sone(id: &str) -> SoneId {
        SoneId::new(id)
    }

    #[test]
    fn test_like_is_idempotent() {
        let mut index = LikeIndex::new();
        let post = PostId::new("p1");

        assert!(index.like(&post, &sone("s1")));
        assert!(!index.like(&post, &sone("s1")));

        assert_eq!(index.likers(&post), HashSet::from([sone("s1")]));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_unlike_missing_pair_is_noop() {
        let mut index: LikeIndex<PostId> = LikeIndex::new();
        assert!(!index.unlike(&PostId::new("p1"), &sone("s1")));
        assert!(index.is_empty());
    }

    #[test]
    fn test_both_directions() {
        let mut index = LikeIndex::new();
        let p1 = PostId::new("p1");
        let p2 = PostId::new("p2");
        index.like(&p1, &sone("s1"));
        index.like(&p2, &sone("s1"));
        index.like(&p1, &sone("s2"));

        assert_eq!(index.liked_by(&sone("s1")), HashSet::from([p1.clone(), p2.clone()]));
        assert_eq!(index.likers(&p1).len(), 2);

        index.unlike(&p1, &sone("s1"));
        assert!(!index.is_liked(&p1, &sone("s1")));
        assert_eq!(index.liked_by(&sone("s1")), HashSet::from([p2]));
        assert!(index.is_symmetric());
    }

    #[test]
    fn test_drop_item_removes_all_edges() {
        let mut index = LikeIndex::new();
        let p1 = PostId::new("p1");
        index.like(&p1, &sone("s1"));
        index.like(&p1, &sone("s2"));

        assert_eq!(index.drop_item(&p1), 2);
        assert!(index.likers(&p1).is_empty());
        assert!(index.liked_by(&sone("s1")).is_empty());
        assert!(index.is_empty());
        assert!(index.is_symmetric());
        assert_eq!(index.drop_item(&p1), 0);
    }
}
