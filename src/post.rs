//! Post types - root content units of the social graph

use crate::id::{PostId, SoneId};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A post owned by exactly one Sone.
///
/// A post may be addressed to another Sone (its recipient). Ownership is
/// fixed at creation; the store rejects any attempt to move an id to a
/// different owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Globally unique id
    pub id: PostId,
    /// Owning Sone
    pub owner: SoneId,
    /// Addressed Sone, if this is a directed post
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<SoneId>,
    /// Creation time in milliseconds since the Unix epoch
    pub time: u64,
    /// Body text
    pub text: String,
}

impl Post {
    /// Start building a post for the given owner
    pub fn builder(owner: impl Into<SoneId>) -> PostBuilder {
        PostBuilder::new(owner)
    }

    /// Whether this post is addressed to the given Sone
    pub fn is_directed_to(&self, sone: &SoneId) -> bool {
        self.recipient.as_ref() == Some(sone)
    }
}

/// Builder for [`Post`] that validates the result.
#[derive(Debug, Clone)]
pub struct PostBuilder {
    owner: SoneId,
    id: Option<PostId>,
    time: Option<u64>,
    text: String,
    recipient: Option<SoneId>,
}

impl PostBuilder {
    pub fn new(owner: impl Into<SoneId>) -> Self {
        Self {
            owner: owner.into(),
            id: None,
            time: None,
            text: String::new(),
            recipient: None,
        }
    }

    pub fn id(mut self, id: impl Into<PostId>) -> Self {
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

    /// Address the post to another Sone
    pub fn to(mut self, recipient: Option<SoneId>) -> Self {
        self.recipient = recipient;
        self
    }

    /// Build the post. Missing id and time default to a random id and now.
    pub fn build(self) -> Result<Post> {
        if self.text.trim().is_empty() {
            return Err(Error::InvalidContent("post text must not be empty".to_string()));
        }
        if self.recipient.as_ref() == Some(&self.owner) {
            return Err(Error::InvalidContent(format!(
                "post owner and recipient must differ ({})",
                self.owner
            )));
        }

        Ok(Post {
            id: self.id.unwrap_or_else(PostId::random),
            owner: self.owner,
            recipient: self.recipient,
            time: self.time.unwrap_or_else(now_millis),
            text: self.text,
        })
    }
}

/// Current time in milliseconds since the Unix epoch
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
