//! Post reply types - threaded replies to posts
//!
//! A reply refers to its post by id only. The reference is a back-pointer,
//! not ownership: a reply may outlive its post.

use crate::id::{PostId, ReplyId, SoneId};
use crate::post::now_millis;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// A reply to a post, owned by exactly one Sone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostReply {
    /// Globally unique id
    pub id: ReplyId,
    /// Post this reply belongs to
    pub post_id: PostId,
    /// Owning Sone
    pub owner: SoneId,
    /// Creation time in milliseconds since the Unix epoch
    pub time: u64,
    /// Body text
    pub text: String,
}

impl PostReply {
    /// Start building a reply to `post_id` for the given owner
    pub fn builder(owner: impl Into<SoneId>, post_id: impl Into<PostId>) -> PostReplyBuilder {
        PostReplyBuilder::new(owner, post_id)
    }

    /// Key used for ordering replies: time first, id for ties
    pub fn sort_key(&self) -> (u64, ReplyId) {
        (self.time, self.id.clone())
    }
}

/// Builder for [`PostReply`] that validates the result.
#[derive(Debug, Clone)]
pub struct PostReplyBuilder {
    owner: SoneId,
    post_id: PostId,
    id: Option<ReplyId>,
    time: Option<u64>,
    text: String,
}

impl PostReplyBuilder {
    pub fn new(owner: impl Into<SoneId>, post_id: impl Into<PostId>) -> Self {
        Self {
            owner: owner.into(),
            post_id: post_id.into(),
            id: None,
            time: None,
            text: String::new(),
        }
    }

    pub fn id(mut self, id: impl Into<ReplyId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn time(mut self, time: u64) -> Self {
        self.time = Some(time);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn build(self) -> Result<PostReply> {
        if self.text.trim().is_empty() {
            return Err(Error::InvalidContent("reply text must not be empty".to_string()));
        }

        Ok(PostReply {
            id: self.id.unwrap_or_else(ReplyId::random),
            post_id: self.post_id,
            owner: self.owner,
            time: self.time.unwrap_or_else(now_millis),
            text: self.text,
        })
    }
}
