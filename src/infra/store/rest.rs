//! REST client for the managed counter store.
//!
//! Documents are addressed by slug under `views/` and `ratings/`. The rating
//! upsert is delegated to the store, which applies the
//! read-map/recompute/write cycle inside a per-document transaction; see the
//! trait contract in [`super::CounterStore`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::counters::RatingSummary;
use crate::domain::identity::ClientId;
use crate::infra::error::InfraError;

use super::{CounterStore, StoreError};

pub struct RestCounterStore {
    http: reqwest::Client,
    base: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ViewDocument {
    views: u64,
}

#[derive(Debug, Serialize)]
struct BulkViewRequest<'a> {
    slugs: &'a [String],
}

#[derive(Debug, Deserialize)]
struct BulkViewResponse {
    counts: HashMap<String, u64>,
}

#[derive(Debug, Serialize)]
struct SaveRatingRequest<'a> {
    client_id: &'a str,
    rating: u8,
}

#[derive(Debug, Deserialize)]
struct RatingDocument {
    average_rating: f64,
    total_ratings: u64,
    user_rating: Option<f64>,
}

#[derive(Debug, Serialize)]
struct BulkRatingRequest<'a> {
    slugs: &'a [String],
    client_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct BulkRatingResponse {
    ratings: HashMap<String, RatingDocument>,
}

impl From<RatingDocument> for RatingSummary {
    fn from(doc: RatingDocument) -> Self {
        Self {
            average_rating: doc.average_rating,
            total_ratings: doc.total_ratings,
            user_rating: doc.user_rating,
        }
    }
}

impl RestCounterStore {
    pub fn new(
        endpoint: Url,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, InfraError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http(format!("failed to build store client: {err}")))?;

        Ok(Self {
            http,
            base: endpoint.as_str().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key.as_deref() {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl CounterStore for RestCounterStore {
    async fn increment_view(&self, slug: &str) -> Result<bool, StoreError> {
        let response = self
            .request(self.http.post(self.endpoint(&format!("views/{slug}/increment"))))
            .send()
            .await
            .map_err(StoreError::request)?;

        Ok(response.status().is_success())
    }

    async fn view_count(&self, slug: &str) -> Result<u64, StoreError> {
        let response = self
            .request(self.http.get(self.endpoint(&format!("views/{slug}"))))
            .send()
            .await
            .map_err(StoreError::request)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(0);
        }

        let document: ViewDocument = response
            .error_for_status()
            .map_err(StoreError::request)?
            .json()
            .await
            .map_err(StoreError::decode)?;
        Ok(document.views)
    }

    async fn bulk_view_counts(&self, slugs: &[String]) -> Result<HashMap<String, u64>, StoreError> {
        if slugs.is_empty() {
            return Ok(HashMap::new());
        }

        let response: BulkViewResponse = self
            .request(self.http.post(self.endpoint("views/batch")))
            .json(&BulkViewRequest { slugs })
            .send()
            .await
            .map_err(StoreError::request)?
            .error_for_status()
            .map_err(StoreError::request)?
            .json()
            .await
            .map_err(StoreError::decode)?;

        // The store promises an entry per requested slug; fill any gap so
        // the promise holds for callers regardless.
        let mut counts = response.counts;
        for slug in slugs {
            counts.entry(slug.clone()).or_insert(0);
        }
        Ok(counts)
    }

    async fn save_rating(
        &self,
        slug: &str,
        client: &ClientId,
        rating: u8,
    ) -> Result<RatingSummary, StoreError> {
        let response = self
            .request(self.http.put(self.endpoint(&format!("ratings/{slug}"))))
            .json(&SaveRatingRequest {
                client_id: client.as_str(),
                rating,
            })
            .send()
            .await
            .map_err(StoreError::request)?;

        if !response.status().is_success() {
            return Err(StoreError::Rejected(format!(
                "rating write for `{slug}` returned {}",
                response.status()
            )));
        }

        let document: RatingDocument = response.json().await.map_err(StoreError::decode)?;
        Ok(document.into())
    }

    async fn rating(&self, slug: &str, client: &ClientId) -> Result<RatingSummary, StoreError> {
        let response = self
            .request(
                self.http
                    .get(self.endpoint(&format!("ratings/{slug}")))
                    .query(&[("client_id", client.as_str())]),
            )
            .send()
            .await
            .map_err(StoreError::request)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(RatingSummary::default());
        }

        let document: RatingDocument = response
            .error_for_status()
            .map_err(StoreError::request)?
            .json()
            .await
            .map_err(StoreError::decode)?;
        Ok(document.into())
    }

    async fn bulk_ratings(
        &self,
        slugs: &[String],
        client: &ClientId,
    ) -> Result<HashMap<String, RatingSummary>, StoreError> {
        if slugs.is_empty() {
            return Ok(HashMap::new());
        }

        let response: BulkRatingResponse = self
            .request(self.http.post(self.endpoint("ratings/batch")))
            .json(&BulkRatingRequest {
                slugs,
                client_id: client.as_str(),
            })
            .send()
            .await
            .map_err(StoreError::request)?
            .error_for_status()
            .map_err(StoreError::request)?
            .json()
            .await
            .map_err(StoreError::decode)?;

        let mut ratings: HashMap<String, RatingSummary> = response
            .ratings
            .into_iter()
            .map(|(slug, doc)| (slug, doc.into()))
            .collect();
        for slug in slugs {
            ratings.entry(slug.clone()).or_default();
        }
        Ok(ratings)
    }

    fn is_configured(&self) -> bool {
        true
    }
}
