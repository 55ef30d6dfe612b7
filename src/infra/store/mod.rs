//! Remote counter store boundary.
//!
//! The store holds one document per slug with a monotonic view counter and
//! a per-client rating map. All writes must be applied atomically at
//! per-document granularity on the store side; this library does not layer
//! its own optimistic-concurrency retry on top.

mod local;
mod rest;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

pub use local::LocalCounterStore;
pub use rest::RestCounterStore;

use crate::config::StoreSettings;
use crate::domain::counters::RatingSummary;
use crate::domain::identity::ClientId;
use crate::infra::error::InfraError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("counter store request failed: {0}")]
    Request(String),
    #[error("counter store payload could not be decoded: {0}")]
    Decode(String),
    #[error("counter store rejected the write: {0}")]
    Rejected(String),
    #[error("counter store is not configured")]
    Unconfigured,
}

impl StoreError {
    pub fn request(err: impl std::fmt::Display) -> Self {
        Self::Request(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically add 1 to the slug's view counter, creating the document
    /// if absent. Returns whether the store acknowledged the write.
    async fn increment_view(&self, slug: &str) -> Result<bool, StoreError>;

    /// Current view count; 0 when the document is absent.
    async fn view_count(&self, slug: &str) -> Result<u64, StoreError>;

    /// Batched view counts. The result carries an entry (possibly 0) for
    /// every requested slug.
    async fn bulk_view_counts(&self, slugs: &[String]) -> Result<HashMap<String, u64>, StoreError>;

    /// Upsert this client's rating (overwrite, never append) and recompute
    /// the aggregate from the full per-client map.
    async fn save_rating(
        &self,
        slug: &str,
        client: &ClientId,
        rating: u8,
    ) -> Result<RatingSummary, StoreError>;

    async fn rating(&self, slug: &str, client: &ClientId) -> Result<RatingSummary, StoreError>;

    /// Batched rating summaries, each including the requesting client's own
    /// rating. An entry (possibly zeroed) is present for every requested
    /// slug.
    async fn bulk_ratings(
        &self,
        slugs: &[String],
        client: &ClientId,
    ) -> Result<HashMap<String, RatingSummary>, StoreError>;

    /// Whether this store talks to the real backend. Unconfigured stores
    /// serve locally-held counters instead of erroring.
    fn is_configured(&self) -> bool;
}

/// Pick the store implementation for the current configuration: the REST
/// client when an endpoint is present, the local fallback otherwise.
pub fn connect(settings: &StoreSettings) -> Result<Arc<dyn CounterStore>, InfraError> {
    match settings.endpoint.as_ref() {
        Some(endpoint) => Ok(Arc::new(RestCounterStore::new(
            endpoint.clone(),
            settings.api_key.clone(),
            settings.timeout,
        )?)),
        None => {
            info!("counter store unconfigured; serving counters from the local fallback");
            Ok(Arc::new(LocalCounterStore::new(
                settings.fallback_path.clone(),
            )))
        }
    }
}
