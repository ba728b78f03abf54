//! Identifiers - opaque, printable, totally ordered string ids
//!
//! Sone, post and reply ids share one representation but are distinct
//! types so a post id can never be used where a reply id is expected.
//! The store imposes no structure beyond equality and ordering; the
//! ordering is the byte-wise string order used for reply tie-breaking.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an id without validation
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a fresh random id (UUID v4)
            pub fn random() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Parse and validate an id: non-empty and printable
            pub fn parse(id: &str) -> Result<Self> {
                validate(id)?;
                Ok(Self(id.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::parse(s)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a Sone (and of the identity backing it)
    SoneId
);

string_id!(
    /// Globally unique identifier of a post
    PostId
);

string_id!(
    /// Globally unique identifier of a post reply
    ReplyId
);

fn validate(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::InvalidId("identifier must not be empty".to_string()));
    }
    if id.chars().any(char::is_control) {
        return Err(Error::InvalidId(format!("identifier contains control characters: {:?}", id)));
    }
    Ok(())
}
