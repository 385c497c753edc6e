//! Channel topics derived from collection slugs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of a logical channel on the socket, e.g. `collection:boredapeyachtclub`.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Prefix shared by every collection topic.
    pub const COLLECTION_PREFIX: &'static str = "collection:";

    /// Slug that subscribes to events of every collection.
    pub const ALL_COLLECTIONS: &'static str = "*";

    /// Topic for a single collection.
    pub fn collection(slug: &str) -> Self {
        Self(format!("{}{}", Self::COLLECTION_PREFIX, slug))
    }

    /// Topic receiving events for every collection.
    pub fn all_collections() -> Self {
        Self::collection(Self::ALL_COLLECTIONS)
    }

    /// Wrap an already formed topic name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The collection slug, if this is a collection topic.
    pub fn collection_slug(&self) -> Option<&str> {
        self.0.strip_prefix(Self::COLLECTION_PREFIX)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_collection_topic() {
        let topic = Topic::collection("bored-ape");
        assert_eq!(topic.as_str(), "collection:bored-ape");
        assert_eq!(topic.collection_slug(), Some("bored-ape"));
        assert_eq!(topic.to_string(), "collection:bored-ape");
    }

    #[test]
    fn test_all_collections() {
        assert_eq!(Topic::all_collections().as_str(), "collection:*");
    }

    #[test]
    fn test_non_collection_topic() {
        assert_eq!(Topic::new("phoenix").collection_slug(), None);
    }

    proptest! {
        #[test]
        fn prop_topic_is_deterministic(slug in "[a-z0-9-]{1,40}") {
            let a = Topic::collection(&slug);
            let b = Topic::collection(&slug);
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(a.collection_slug(), Some(slug.as_str()));
        }
    }
}
