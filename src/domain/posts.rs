//! Post model, the hybrid merge resolver, and collection accessors.
//!
//! Posts arrive from two sources: the CMS (fetched at runtime) and the
//! bundled manifest (baked in at build time). `merge_posts` reconciles the
//! two into one canonical collection: precedence is decided by an explicit
//! keyed dedup pass (CMS always wins on a slug collision, whatever the
//! relative dates say), and ordering by a separate date sort. Keeping the
//! two steps apart is what makes the precedence rule hold even when a
//! bundled post carries a later date than its CMS counterpart.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::{Date, format_description::FormatItem, macros::format_description};

use crate::domain::error::DomainError;

pub const POST_DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
pub const HUMAN_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[month repr:long] [day padding:none], [year]");

/// Which source produced a post at merge time. Exactly one; there is no
/// field-level blending across sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostSource {
    Cms,
    Bundled,
}

/// A content item. `slug` is the identity used for merging and as the
/// counter key; `id` is source-local and not unique across sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub date: Date,
    pub read_time: u16,
    pub category_id: String,
    pub author_id: String,
    pub featured_image: Option<String>,
    pub tags: Vec<String>,
    pub source: PostSource,
}

/// Parse a source-provided date string. Datetime strings are accepted by
/// truncating at the calendar-date prefix.
pub fn parse_post_date(value: &str) -> Result<Date, DomainError> {
    let calendar = value.get(..10).unwrap_or(value);
    Date::parse(calendar, POST_DATE_FORMAT)
        .map_err(|err| DomainError::validation(format!("unparseable post date `{value}`: {err}")))
}

pub fn format_human_date(date: Date) -> String {
    date.format(HUMAN_DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

/// Merge CMS and bundled posts into one slug-unique list, sorted by date
/// descending. Bundled posts are inserted first and CMS posts overwrite
/// them, so a CMS post always survives a slug collision. Date ties break by
/// slug ascending to keep the order total.
pub fn merge_posts(cms: Vec<Post>, bundled: Vec<Post>) -> Vec<Post> {
    let mut by_slug: HashMap<String, Post> = HashMap::with_capacity(cms.len() + bundled.len());
    for post in bundled {
        by_slug.insert(post.slug.clone(), post);
    }
    for post in cms {
        by_slug.insert(post.slug.clone(), post);
    }

    let mut merged: Vec<Post> = by_slug.into_values().collect();
    sort_by_date_desc(&mut merged);
    merged
}

pub fn sort_by_date_desc(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.slug.cmp(&b.slug)));
}

/// The canonical post collection: slug-unique, date-sorted, shared by
/// reference so unchanged content keeps its identity across consumers.
#[derive(Debug, Clone)]
pub struct PostCollection {
    posts: Arc<[Post]>,
}

impl PostCollection {
    /// Wrap an already-merged list. Callers holding raw source lists should
    /// prefer [`PostCollection::merged`].
    pub fn new(posts: Vec<Post>) -> Self {
        Self {
            posts: posts.into(),
        }
    }

    pub fn merged(cms: Vec<Post>, bundled: Vec<Post>) -> Self {
        Self::new(merge_posts(cms, bundled))
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn as_slice(&self) -> &[Post] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Post> {
        self.posts.iter()
    }

    pub fn slugs(&self) -> impl Iterator<Item = &str> {
        self.posts.iter().map(|post| post.slug.as_str())
    }

    /// Lookup by slug. Source precedence is already baked in by the merge.
    pub fn find_by_slug(&self, slug: &str) -> Option<&Post> {
        self.posts.iter().find(|post| post.slug == slug)
    }

    pub fn in_category(&self, category_id: &str) -> Vec<&Post> {
        self.posts
            .iter()
            .filter(|post| post.category_id == category_id)
            .collect()
    }

    pub fn by_author(&self, author_id: &str) -> Vec<&Post> {
        self.posts
            .iter()
            .filter(|post| post.author_id == author_id)
            .collect()
    }

    /// Case-insensitive exact match against any of a post's tags.
    pub fn with_tag(&self, tag: &str) -> Vec<&Post> {
        self.posts
            .iter()
            .filter(|post| post.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
            .collect()
    }

    /// Case-insensitive substring search over title and excerpt.
    pub fn search(&self, query: &str) -> Vec<&Post> {
        let needle = query.to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.posts
            .iter()
            .filter(|post| {
                post.title.to_lowercase().contains(&needle)
                    || post.excerpt.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Prefix of the date-sorted collection.
    pub fn recent(&self, n: usize) -> &[Post] {
        &self.posts[..n.min(self.posts.len())]
    }

    /// True when both collections share the same backing allocation.
    pub fn same_identity(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.posts, &other.posts)
    }
}
