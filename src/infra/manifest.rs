//! Statically bundled content manifest.
//!
//! The manifest is baked into the deployed bundle at build time and carries
//! the baseline post list plus the reference data (authors, categories,
//! navigation) that never leaves the repository. It is the fallback content
//! source when the CMS is unreachable.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::domain::posts::{Post, PostSource, parse_post_date};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest could not be read: {0}")]
    Io(#[from] std::io::Error),
    #[error("manifest did not decode: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct StaticManifest {
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub navigation: Vec<NavigationItem>,
    #[serde(default)]
    pub posts: Vec<ManifestPost>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NavigationItem {
    pub label: String,
    pub href: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestPost {
    pub id: String,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    pub date: String,
    #[serde(default)]
    pub read_time: Option<u16>,
    #[serde(default)]
    pub category_id: String,
    #[serde(default)]
    pub author_id: String,
    #[serde(default)]
    pub featured_image: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl StaticManifest {
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(json)?)
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_json(&raw)
    }

    /// The bundled baseline posts in canonical form. A manifest entry with
    /// an unparseable date is an authoring error in the bundle; it is
    /// skipped with a warning instead of failing the whole load.
    pub fn bundled_posts(&self) -> Vec<Post> {
        self.posts
            .iter()
            .filter_map(|entry| {
                let date = match parse_post_date(&entry.date) {
                    Ok(date) => date,
                    Err(err) => {
                        warn!(slug = %entry.slug, error = %err, "skipping bundled post with bad date");
                        return None;
                    }
                };
                Some(Post {
                    id: entry.id.clone(),
                    slug: entry.slug.clone(),
                    title: entry.title.clone(),
                    excerpt: entry.excerpt.clone(),
                    date,
                    read_time: entry.read_time.unwrap_or(1),
                    category_id: entry.category_id.clone(),
                    author_id: entry.author_id.clone(),
                    featured_image: entry.featured_image.clone(),
                    tags: entry.tags.clone(),
                    source: PostSource::Bundled,
                })
            })
            .collect()
    }

    pub fn author(&self, id: &str) -> Option<&Author> {
        self.authors.iter().find(|author| author.id == id)
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|category| category.id == id)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    const SAMPLE: &str = r#"{
        "authors": [{"id": "me", "name": "The Author"}],
        "categories": [{"id": "engineering", "name": "Engineering"}],
        "navigation": [{"label": "Home", "href": "/"}],
        "posts": [
            {
                "id": "s-1",
                "slug": "first-post",
                "title": "First Post",
                "excerpt": "Where it started.",
                "date": "2023-11-20",
                "read_time": 5,
                "category_id": "engineering",
                "author_id": "me",
                "tags": ["meta"]
            },
            {
                "id": "s-2",
                "slug": "broken-date",
                "title": "Broken",
                "date": "???"
            }
        ]
    }"#;

    #[test]
    fn decodes_and_converts_posts() {
        let manifest = StaticManifest::from_json(SAMPLE).expect("manifest");
        let posts = manifest.bundled_posts();

        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].slug, "first-post");
        assert_eq!(posts[0].date, date!(2023 - 11 - 20));
        assert_eq!(posts[0].source, PostSource::Bundled);
    }

    #[test]
    fn reference_lookups_resolve() {
        let manifest = StaticManifest::from_json(SAMPLE).expect("manifest");
        assert_eq!(manifest.author("me").map(|a| a.name.as_str()), Some("The Author"));
        assert!(manifest.category("missing").is_none());
        assert_eq!(manifest.navigation.len(), 1);
    }
}
