//! CMS content source client and normalization.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use slug::slugify;
use tracing::warn;
use url::Url;

use crate::application::content::{CmsError, CmsSource};
use crate::domain::posts::{Post, PostSource, parse_post_date};
use crate::infra::error::InfraError;

/// A post as the CMS serializes it. Field names vary across CMS exports;
/// the aliases below cover the shapes this blog has actually seen.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCmsPost {
    pub id: Option<String>,
    pub slug: Option<String>,
    pub title: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(alias = "publishedAt", alias = "published_at")]
    pub date: Option<String>,
    #[serde(alias = "readTime")]
    pub read_time: Option<u16>,
    #[serde(alias = "categoryId", alias = "category")]
    pub category_id: Option<String>,
    #[serde(alias = "authorId", alias = "author")]
    pub author_id: Option<String>,
    #[serde(alias = "featuredImage")]
    pub featured_image: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Normalize a raw CMS post into the canonical model. A missing slug is
/// derived from the title; a post with no usable slug or date is dropped
/// (with a warning) rather than poisoning the merged collection.
pub fn to_canonical_post(raw: RawCmsPost) -> Option<Post> {
    let slug = raw
        .slug
        .filter(|slug| !slug.trim().is_empty())
        .unwrap_or_else(|| slugify(&raw.title));
    if slug.is_empty() {
        warn!(title = %raw.title, "dropping cms post without a usable slug");
        return None;
    }

    let Some(date_raw) = raw.date.as_deref() else {
        warn!(slug = %slug, "dropping cms post without a date");
        return None;
    };
    let date = match parse_post_date(date_raw) {
        Ok(date) => date,
        Err(err) => {
            warn!(slug = %slug, error = %err, "dropping cms post with unparseable date");
            return None;
        }
    };

    Some(Post {
        id: raw.id.unwrap_or_else(|| slug.clone()),
        title: raw.title,
        excerpt: raw.excerpt.unwrap_or_default(),
        date,
        read_time: raw.read_time.unwrap_or(1),
        category_id: raw.category_id.unwrap_or_default(),
        author_id: raw.author_id.unwrap_or_default(),
        featured_image: raw.featured_image,
        tags: raw.tags,
        source: PostSource::Cms,
        slug,
    })
}

/// HTTP client for the headless CMS. The load timeout is owned by the
/// caller ([`crate::application::content::ContentService`]), so requests
/// here only carry a transport-level ceiling.
pub struct RestCmsClient {
    http: reqwest::Client,
    base: String,
    api_key: Option<String>,
}

impl RestCmsClient {
    pub fn new(
        endpoint: Url,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, InfraError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http(format!("failed to build cms client: {err}")))?;

        Ok(Self {
            http,
            base: endpoint.as_str().trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl CmsSource for RestCmsClient {
    async fn fetch_posts(&self) -> Result<Vec<Post>, CmsError> {
        let mut request = self.http.get(format!("{}/posts", self.base));
        if let Some(key) = self.api_key.as_deref() {
            request = request.bearer_auth(key);
        }

        let raw: Vec<RawCmsPost> = request
            .send()
            .await
            .map_err(|err| CmsError::Request(err.to_string()))?
            .error_for_status()
            .map_err(|err| CmsError::Request(err.to_string()))?
            .json()
            .await
            .map_err(|err| CmsError::Decode(err.to_string()))?;

        Ok(raw.into_iter().filter_map(to_canonical_post).collect())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    fn raw(title: &str) -> RawCmsPost {
        RawCmsPost {
            id: Some("cms-1".to_string()),
            slug: Some("hello".to_string()),
            title: title.to_string(),
            excerpt: Some("An excerpt".to_string()),
            date: Some("2024-05-01".to_string()),
            read_time: Some(6),
            category_id: Some("engineering".to_string()),
            author_id: Some("me".to_string()),
            featured_image: None,
            tags: vec!["rust".to_string()],
        }
    }

    #[test]
    fn converts_a_complete_post() {
        let post = to_canonical_post(raw("Hello")).expect("post");
        assert_eq!(post.slug, "hello");
        assert_eq!(post.date, date!(2024 - 05 - 01));
        assert_eq!(post.source, PostSource::Cms);
        assert_eq!(post.read_time, 6);
    }

    #[test]
    fn derives_slug_from_title_when_missing() {
        let mut input = raw("Borrow Checker War Stories");
        input.slug = None;
        let post = to_canonical_post(input).expect("post");
        assert_eq!(post.slug, "borrow-checker-war-stories");
    }

    #[test]
    fn drops_post_with_unparseable_date() {
        let mut input = raw("Hello");
        input.date = Some("yesterday".to_string());
        assert!(to_canonical_post(input).is_none());
    }

    #[test]
    fn drops_post_without_date() {
        let mut input = raw("Hello");
        input.date = None;
        assert!(to_canonical_post(input).is_none());
    }

    #[test]
    fn accepts_datetime_date_strings() {
        let mut input = raw("Hello");
        input.date = Some("2024-05-01T09:30:00Z".to_string());
        let post = to_canonical_post(input).expect("post");
        assert_eq!(post.date, date!(2024 - 05 - 01));
    }

    #[test]
    fn decodes_aliased_field_names() {
        let json = r#"{
            "id": "c-9",
            "title": "Aliased",
            "publishedAt": "2024-02-02",
            "readTime": 3,
            "categoryId": "notes",
            "authorId": "me",
            "tags": []
        }"#;
        let raw: RawCmsPost = serde_json::from_str(json).expect("raw post");
        let post = to_canonical_post(raw).expect("post");
        assert_eq!(post.slug, "aliased");
        assert_eq!(post.read_time, 3);
        assert_eq!(post.category_id, "notes");
    }
}
