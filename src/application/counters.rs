//! Bulk counter aggregation with request-set caching.
//!
//! One aggregator instance serves one counter family (views, ratings, or
//! comment counts) for whatever post collection the presentation layer is
//! currently showing. The cache is keyed by the request-set key of the
//! collection, so re-handing the aggregator a rebuilt array with the same
//! slugs costs nothing; only a key whose *value* changed triggers a fetch.
//!
//! Fetches are generation-tagged: when the request set changes while a
//! fetch is still in flight, the late response is discarded instead of
//! clobbering the newer key's result.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use metrics::counter;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::warn;

use crate::domain::counters::{RatingSummary, RequestSetKey};
use crate::domain::identity::ClientId;
use crate::domain::posts::{Post, PostCollection};
use crate::infra::store::CounterStore;

#[derive(Debug, Error)]
#[error("bulk counter fetch failed: {0}")]
pub struct BulkFetchError(String);

impl BulkFetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Batched fetcher backing one aggregator instance. Implementations return
/// whatever entries they know about; the aggregator fills the gaps with the
/// zero value so every requested slug resolves.
#[async_trait]
pub trait BulkSource<V>: Send + Sync {
    async fn fetch(&self, slugs: &[String]) -> Result<HashMap<String, V>, BulkFetchError>;
}

struct AggregatorState<V> {
    key: RequestSetKey,
    counts: HashMap<String, V>,
    loading: bool,
    error: Option<String>,
}

pub struct CounterAggregator<V> {
    source: Arc<dyn BulkSource<V>>,
    kind: &'static str,
    generation: AtomicU64,
    state: RwLock<AggregatorState<V>>,
}

impl<V> CounterAggregator<V>
where
    V: Clone + Default + Send + Sync + 'static,
{
    pub fn new(source: Arc<dyn BulkSource<V>>, kind: &'static str) -> Self {
        Self {
            source,
            kind,
            generation: AtomicU64::new(0),
            state: RwLock::new(AggregatorState {
                key: RequestSetKey::default(),
                counts: HashMap::new(),
                loading: false,
                error: None,
            }),
        }
    }

    /// Bring the cache in line with `posts`. A collection whose slug set
    /// matches the current key, settled or in flight, is a no-op.
    pub async fn sync(&self, posts: &PostCollection) {
        let key = RequestSetKey::from_slugs(posts.slugs());

        let generation = {
            let mut state = self.state.write().await;
            if state.key == key {
                counter!("taccuino_counter_batch_skip_total", "kind" => self.kind).increment(1);
                return;
            }
            state.key = key.clone();
            state.loading = true;
            state.error = None;
            // Generation only advances under the state lock, so the check
            // in `fetch_into` is race-free.
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        self.fetch_into(key, generation).await;
    }

    /// Refetch the current request set regardless of cache state. Used
    /// after a known write (a posted comment, a saved rating) to pull
    /// fresh numbers.
    pub async fn refresh(&self) {
        let (key, generation) = {
            let mut state = self.state.write().await;
            state.loading = true;
            (
                state.key.clone(),
                self.generation.fetch_add(1, Ordering::SeqCst) + 1,
            )
        };

        self.fetch_into(key, generation).await;
    }

    async fn fetch_into(&self, key: RequestSetKey, generation: u64) {
        let slugs: Vec<String> = key.slugs().map(str::to_string).collect();

        counter!("taccuino_counter_batch_total", "kind" => self.kind).increment(1);
        let outcome = if slugs.is_empty() {
            Ok(HashMap::new())
        } else {
            self.source.fetch(&slugs).await
        };

        let mut state = self.state.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            // A newer request set owns the cache; this response is stale.
            counter!("taccuino_counter_batch_stale_drop_total", "kind" => self.kind).increment(1);
            return;
        }

        match outcome {
            Ok(mut fetched) => {
                state.counts = slugs
                    .iter()
                    .map(|slug| (slug.clone(), fetched.remove(slug).unwrap_or_default()))
                    .collect();
                state.error = None;
            }
            Err(err) => {
                warn!(kind = self.kind, error = %err, "bulk counter fetch failed; zero-filling");
                counter!("taccuino_counter_batch_fail_total", "kind" => self.kind).increment(1);
                state.counts = slugs
                    .iter()
                    .map(|slug| (slug.clone(), V::default()))
                    .collect();
                state.error = Some(err.to_string());
            }
        }
        state.loading = false;
    }

    /// The settled value for `slug`, or the zero value for anything outside
    /// the last-resolved request set. Never errors.
    pub async fn count(&self, slug: &str) -> V {
        self.state
            .read()
            .await
            .counts
            .get(slug)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn counts(&self) -> HashMap<String, V> {
        self.state.read().await.counts.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    pub async fn error(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    /// Posts annotated with their current counter value and sorted
    /// descending by it, per `compare`'s ascending order. Ties keep the
    /// collection's date order (the sort is stable). Recomputed only when
    /// called; callers hold on to the result until the collection or the
    /// counter map changes.
    pub async fn ranked_by<F>(&self, posts: &PostCollection, mut compare: F) -> Vec<(Post, V)>
    where
        F: FnMut(&V, &V) -> std::cmp::Ordering,
    {
        let mut annotated: Vec<(Post, V)> = {
            let state = self.state.read().await;
            posts
                .iter()
                .map(|post| {
                    let value = state.counts.get(&post.slug).cloned().unwrap_or_default();
                    (post.clone(), value)
                })
                .collect()
        };
        annotated.sort_by(|a, b| compare(&b.1, &a.1));
        annotated
    }

    pub async fn ranked(&self, posts: &PostCollection) -> Vec<(Post, V)>
    where
        V: Ord,
    {
        self.ranked_by(posts, V::cmp).await
    }
}

/// Sync several aggregators against the same collection concurrently. The
/// families are independent and may settle in any order.
pub async fn sync_all(
    views: &CounterAggregator<u64>,
    ratings: &CounterAggregator<RatingSummary>,
    comments: &CounterAggregator<u32>,
    posts: &PostCollection,
) {
    futures::join!(views.sync(posts), ratings.sync(posts), comments.sync(posts));
}

struct StoreViewSource {
    store: Arc<dyn CounterStore>,
}

#[async_trait]
impl BulkSource<u64> for StoreViewSource {
    async fn fetch(&self, slugs: &[String]) -> Result<HashMap<String, u64>, BulkFetchError> {
        self.store
            .bulk_view_counts(slugs)
            .await
            .map_err(|err| BulkFetchError::new(err.to_string()))
    }
}

struct StoreRatingSource {
    store: Arc<dyn CounterStore>,
    client: ClientId,
}

#[async_trait]
impl BulkSource<RatingSummary> for StoreRatingSource {
    async fn fetch(
        &self,
        slugs: &[String],
    ) -> Result<HashMap<String, RatingSummary>, BulkFetchError> {
        self.store
            .bulk_ratings(slugs, &self.client)
            .await
            .map_err(|err| BulkFetchError::new(err.to_string()))
    }
}

/// Bulk view counts backed by the counter store.
pub fn view_counts(store: Arc<dyn CounterStore>) -> CounterAggregator<u64> {
    CounterAggregator::new(Arc::new(StoreViewSource { store }), "views")
}

/// Bulk rating summaries backed by the counter store, scoped to one client
/// so each summary carries that client's own rating.
pub fn ratings(store: Arc<dyn CounterStore>, client: ClientId) -> CounterAggregator<RatingSummary> {
    CounterAggregator::new(Arc::new(StoreRatingSource { store, client }), "ratings")
}

/// Bulk comment counts backed by whatever adapter fronts the discussion
/// widget (see `infra::comments`).
pub fn comment_counts(source: Arc<dyn BulkSource<u32>>) -> CounterAggregator<u32> {
    CounterAggregator::new(source, "comments")
}
