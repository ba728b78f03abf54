//! Identity records sourced from the trust network

use crate::id::SoneId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A public identity as published by the trust-network layer.
///
/// Only `id` has meaning to the store; everything else is opaque profile
/// data carried along for callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable public identifier
    pub id: SoneId,
    /// Self-chosen display name
    #[serde(default)]
    pub nickname: String,
    /// Request URI the identity is published under
    #[serde(default)]
    pub request_uri: String,
    /// Contexts (applications) the identity participates in
    #[serde(default)]
    pub contexts: BTreeSet<String>,
    /// Free-form key/value properties
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Identity {
    /// Create an identity with the given id and nickname
    pub fn new(id: impl Into<SoneId>, nickname: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nickname: nickname.into(),
            request_uri: String::new(),
            contexts: BTreeSet::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Set the request URI
    pub fn with_request_uri(mut self, request_uri: impl Into<String>) -> Self {
        self.request_uri = request_uri.into();
        self
    }

    /// Add a context
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.contexts.insert(context.into());
        self
    }

    /// Set a property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn has_context(&self, context: &str) -> bool {
        self.contexts.contains(context)
    }
}
