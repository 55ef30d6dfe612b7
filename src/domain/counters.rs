//! Counter aggregates and batch request identity.

use serde::{Deserialize, Serialize};

/// Aggregate rating state for one post. `average_rating` and
/// `total_ratings` are recomputed from the full per-client rating map on
/// every write; `user_rating` is the requesting client's own entry, when it
/// has one.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RatingSummary {
    pub average_rating: f64,
    pub total_ratings: u64,
    pub user_rating: Option<f64>,
}

/// Identity of one batched counter fetch: the requested slugs, sorted,
/// deduplicated, and comma-joined. Equality is value equality, so two post
/// lists holding the same slugs in different order (or in differently
/// allocated arrays) produce the same key and must not trigger a second
/// fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RequestSetKey(String);

impl RequestSetKey {
    pub fn from_slugs<I, S>(slugs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut slugs: Vec<String> = slugs
            .into_iter()
            .map(|slug| slug.as_ref().to_string())
            .filter(|slug| !slug.is_empty())
            .collect();
        slugs.sort_unstable();
        slugs.dedup();
        Self(slugs.join(","))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn slugs(&self) -> impl Iterator<Item = &str> {
        self.0.split(',').filter(|slug| !slug.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_order_insensitive() {
        let forward = RequestSetKey::from_slugs(["a", "b", "c"]);
        let reversed = RequestSetKey::from_slugs(["c", "b", "a"]);
        assert_eq!(forward, reversed);
        assert_eq!(forward.as_str(), "a,b,c");
    }

    #[test]
    fn key_drops_duplicates_and_empties() {
        let key = RequestSetKey::from_slugs(["b", "", "a", "b"]);
        assert_eq!(key.as_str(), "a,b");
        assert_eq!(key.slugs().count(), 2);
    }

    #[test]
    fn empty_key_yields_no_slugs() {
        let key = RequestSetKey::from_slugs(Vec::<String>::new());
        assert!(key.is_empty());
        assert_eq!(key.slugs().count(), 0);
        assert_eq!(key, RequestSetKey::default());
    }
}
