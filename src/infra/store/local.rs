//! Local fallback counter store.
//!
//! Used when the managed store is unconfigured. Counters live in process
//! memory and are optionally persisted to a JSON snapshot so a restart
//! keeps the locally-accumulated numbers. Persistence is best-effort: a
//! failed write is logged and the in-memory state stays authoritative.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::counters::RatingSummary;
use crate::domain::identity::ClientId;

use super::{CounterStore, StoreError};

pub struct LocalCounterStore {
    views: DashMap<String, u64>,
    // slug -> client id -> that client's rating
    ratings: DashMap<String, HashMap<String, f64>>,
    snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    views: HashMap<String, u64>,
    ratings: HashMap<String, HashMap<String, f64>>,
}

impl LocalCounterStore {
    pub fn new(snapshot_path: Option<PathBuf>) -> Self {
        Self {
            views: DashMap::new(),
            ratings: DashMap::new(),
            snapshot_path,
        }
    }

    /// Construct from a previously persisted snapshot, if one exists.
    pub async fn restore(snapshot_path: PathBuf) -> Self {
        let store = Self::new(Some(snapshot_path.clone()));
        if let Ok(raw) = tokio::fs::read_to_string(&snapshot_path).await {
            match serde_json::from_str::<Snapshot>(&raw) {
                Ok(snapshot) => {
                    for (slug, count) in snapshot.views {
                        store.views.insert(slug, count);
                    }
                    for (slug, map) in snapshot.ratings {
                        store.ratings.insert(slug, map);
                    }
                }
                Err(err) => {
                    warn!(path = %snapshot_path.display(), error = %err, "ignoring corrupt counter snapshot");
                }
            }
        }
        store
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            views: self
                .views
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect(),
            ratings: self
                .ratings
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
        }
    }

    async fn persist(&self) {
        let Some(path) = self.snapshot_path.as_ref() else {
            return;
        };

        let snapshot = self.snapshot();
        let encoded = match serde_json::to_vec_pretty(&snapshot) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(error = %err, "failed to encode counter snapshot");
                return;
            }
        };

        if let Some(parent) = path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        if let Err(err) = tokio::fs::write(path, encoded).await {
            warn!(path = %path.display(), error = %err, "failed to persist counter snapshot");
        }
    }

    fn summarize(map: &HashMap<String, f64>, client: &ClientId) -> RatingSummary {
        let total = map.len() as u64;
        let average = if map.is_empty() {
            0.0
        } else {
            map.values().sum::<f64>() / map.len() as f64
        };
        RatingSummary {
            average_rating: average,
            total_ratings: total,
            user_rating: map.get(client.as_str()).copied(),
        }
    }
}

#[async_trait]
impl CounterStore for LocalCounterStore {
    async fn increment_view(&self, slug: &str) -> Result<bool, StoreError> {
        *self.views.entry(slug.to_string()).or_insert(0) += 1;
        self.persist().await;
        Ok(true)
    }

    async fn view_count(&self, slug: &str) -> Result<u64, StoreError> {
        Ok(self.views.get(slug).map(|count| *count).unwrap_or(0))
    }

    async fn bulk_view_counts(&self, slugs: &[String]) -> Result<HashMap<String, u64>, StoreError> {
        Ok(slugs
            .iter()
            .map(|slug| {
                let count = self.views.get(slug).map(|count| *count).unwrap_or(0);
                (slug.clone(), count)
            })
            .collect())
    }

    async fn save_rating(
        &self,
        slug: &str,
        client: &ClientId,
        rating: u8,
    ) -> Result<RatingSummary, StoreError> {
        // The entry guard holds the per-document lock across the whole
        // read-map/upsert/recompute cycle, matching the atomicity the
        // managed store provides per document.
        let summary = {
            let mut entry = self.ratings.entry(slug.to_string()).or_default();
            entry.insert(client.as_str().to_string(), f64::from(rating));
            Self::summarize(entry.value(), client)
        };
        self.persist().await;
        Ok(summary)
    }

    async fn rating(&self, slug: &str, client: &ClientId) -> Result<RatingSummary, StoreError> {
        Ok(self
            .ratings
            .get(slug)
            .map(|entry| Self::summarize(entry.value(), client))
            .unwrap_or_default())
    }

    async fn bulk_ratings(
        &self,
        slugs: &[String],
        client: &ClientId,
    ) -> Result<HashMap<String, RatingSummary>, StoreError> {
        Ok(slugs
            .iter()
            .map(|slug| {
                let summary = self
                    .ratings
                    .get(slug)
                    .map(|entry| Self::summarize(entry.value(), client))
                    .unwrap_or_default();
                (slug.clone(), summary)
            })
            .collect())
    }

    fn is_configured(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn increment_creates_and_advances_counters() {
        let store = LocalCounterStore::new(None);

        assert_eq!(store.view_count("a").await.expect("count"), 0);
        assert!(store.increment_view("a").await.expect("increment"));
        assert!(store.increment_view("a").await.expect("increment"));
        assert_eq!(store.view_count("a").await.expect("count"), 2);
    }

    #[tokio::test]
    async fn rating_upsert_replaces_not_appends() {
        let store = LocalCounterStore::new(None);
        let client = ClientId::generate();

        let first = store.save_rating("a", &client, 3).await.expect("rating");
        assert_eq!(first.total_ratings, 1);
        assert!((first.average_rating - 3.0).abs() < f64::EPSILON);

        let second = store.save_rating("a", &client, 5).await.expect("rating");
        assert_eq!(second.total_ratings, 1);
        assert!((second.average_rating - 5.0).abs() < f64::EPSILON);
        assert_eq!(second.user_rating, Some(5.0));
    }

    #[tokio::test]
    async fn average_recomputes_from_full_map() {
        let store = LocalCounterStore::new(None);
        let first = ClientId::generate();
        let second = ClientId::generate();

        store.save_rating("a", &first, 4).await.expect("rating");
        let summary = store.save_rating("a", &second, 2).await.expect("rating");

        assert_eq!(summary.total_ratings, 2);
        assert!((summary.average_rating - 3.0).abs() < f64::EPSILON);
        assert_eq!(summary.user_rating, Some(2.0));

        let other_view = store.rating("a", &first).await.expect("rating");
        assert_eq!(other_view.user_rating, Some(4.0));
    }

    #[tokio::test]
    async fn snapshot_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("counters.json");

        {
            let store = LocalCounterStore::new(Some(path.clone()));
            store.increment_view("a").await.expect("increment");
            store
                .save_rating("a", &ClientId::parse("reader-1").expect("id"), 4)
                .await
                .expect("rating");
        }

        let restored = LocalCounterStore::restore(path).await;
        assert_eq!(restored.view_count("a").await.expect("count"), 1);
        let summary = restored
            .rating("a", &ClientId::parse("reader-1").expect("id"))
            .await
            .expect("rating");
        assert_eq!(summary.total_ratings, 1);
        assert_eq!(summary.user_rating, Some(4.0));
    }
}
