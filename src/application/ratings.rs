//! Rating reads and the validated write path.

use std::sync::Arc;

use crate::application::error::AppError;
use crate::domain::counters::RatingSummary;
use crate::domain::error::DomainError;
use crate::domain::identity::ClientId;
use crate::infra::store::CounterStore;

/// Rating operations scoped to one persistent client identity. The store
/// upserts (never appends) this client's entry and recomputes the aggregate
/// from the full per-client map; see the trait contract in
/// [`crate::infra::store::CounterStore`].
pub struct RatingService {
    store: Arc<dyn CounterStore>,
    client: ClientId,
}

impl RatingService {
    pub fn new(store: Arc<dyn CounterStore>, client: ClientId) -> Self {
        Self { store, client }
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client
    }

    pub async fn save_rating(&self, slug: &str, rating: u8) -> Result<RatingSummary, AppError> {
        if !(1..=5).contains(&rating) {
            return Err(DomainError::RatingOutOfRange { value: rating }.into());
        }
        if slug.is_empty() {
            return Err(DomainError::validation("rating slug must not be empty").into());
        }

        Ok(self.store.save_rating(slug, &self.client, rating).await?)
    }

    pub async fn rating_for(&self, slug: &str) -> Result<RatingSummary, AppError> {
        Ok(self.store.rating(slug, &self.client).await?)
    }
}
