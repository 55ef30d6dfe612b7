//! Hybrid content loading: CMS posts merged over the bundled manifest.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::domain::posts::{Post, PostCollection, merge_posts};

#[derive(Debug, Error)]
pub enum CmsError {
    #[error("cms request failed: {0}")]
    Request(String),
    #[error("cms payload could not be decoded: {0}")]
    Decode(String),
}

/// The dynamically fetched, authoritative content source.
#[async_trait]
pub trait CmsSource: Send + Sync {
    async fn fetch_posts(&self) -> Result<Vec<Post>, CmsError>;
}

/// Lifecycle of the CMS load. `Failed` is a fully usable state: the
/// snapshot degrades to bundled-only content, it never surfaces an error
/// to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentState {
    Idle,
    Loading,
    Loaded,
    Failed,
}

#[derive(Debug, Clone)]
pub struct ContentSnapshot {
    pub posts: PostCollection,
    pub state: ContentState,
    /// True when the CMS load failed or timed out and the collection is
    /// bundled-only.
    pub cms_degraded: bool,
}

struct Inner {
    state: ContentState,
    posts: PostCollection,
    cms_degraded: bool,
}

/// Owns the canonical post collection for one application session.
///
/// Construct once at startup and share; the snapshot is `Arc`-backed, so
/// consumers holding an unchanged snapshot keep referential identity and
/// can memoize against it.
pub struct ContentService {
    cms: Option<Arc<dyn CmsSource>>,
    bundled: Vec<Post>,
    bundled_only: PostCollection,
    timeout: Duration,
    inner: RwLock<Inner>,
}

impl ContentService {
    pub fn new(cms: Arc<dyn CmsSource>, bundled: Vec<Post>, timeout: Duration) -> Self {
        let bundled_only = PostCollection::merged(Vec::new(), bundled.clone());
        Self {
            cms: Some(cms),
            bundled,
            bundled_only: bundled_only.clone(),
            timeout,
            inner: RwLock::new(Inner {
                state: ContentState::Idle,
                posts: bundled_only,
                cms_degraded: false,
            }),
        }
    }

    /// For deployments without a CMS endpoint: permanently bundled-only,
    /// immediately `Loaded`.
    pub fn bundled_only(bundled: Vec<Post>) -> Self {
        let bundled_only = PostCollection::merged(Vec::new(), bundled.clone());
        Self {
            cms: None,
            bundled,
            bundled_only: bundled_only.clone(),
            timeout: Duration::ZERO,
            inner: RwLock::new(Inner {
                state: ContentState::Loaded,
                posts: bundled_only,
                cms_degraded: false,
            }),
        }
    }

    /// First load. A no-op unless the service is still `Idle`; use
    /// [`ContentService::reload`] to refresh after that.
    pub async fn load(&self) {
        {
            let mut inner = self.inner.write().await;
            if inner.state != ContentState::Idle {
                return;
            }
            inner.state = ContentState::Loading;
        }
        self.run_fetch().await;
    }

    /// Re-run the CMS fetch and swap the snapshot on completion. Skipped
    /// while another load is in flight.
    pub async fn reload(&self) {
        {
            let mut inner = self.inner.write().await;
            if inner.state == ContentState::Loading {
                return;
            }
            inner.state = ContentState::Loading;
        }
        self.run_fetch().await;
    }

    async fn run_fetch(&self) {
        let Some(cms) = self.cms.as_ref() else {
            let mut inner = self.inner.write().await;
            inner.state = ContentState::Loaded;
            inner.cms_degraded = false;
            inner.posts = self.bundled_only.clone();
            return;
        };

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, cms.fetch_posts()).await;
        histogram!("taccuino_cms_load_ms").record(started.elapsed().as_secs_f64() * 1000.0);

        let mut inner = self.inner.write().await;
        match outcome {
            Ok(Ok(cms_posts)) => {
                info!(count = cms_posts.len(), "cms load complete");
                let merged = merge_posts(cms_posts, self.bundled.clone());
                // Unchanged content keeps the existing allocation, so
                // consumers memoizing on snapshot identity see no churn.
                if inner.posts.as_slice() != merged.as_slice() {
                    inner.posts = PostCollection::new(merged);
                }
                inner.state = ContentState::Loaded;
                inner.cms_degraded = false;
            }
            Ok(Err(err)) => {
                warn!(error = %err, "cms load failed; serving bundled content");
                Self::apply_degraded(&mut inner, &self.bundled_only);
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "cms load timed out; serving bundled content"
                );
                Self::apply_degraded(&mut inner, &self.bundled_only);
            }
        }
    }

    fn apply_degraded(inner: &mut Inner, bundled_only: &PostCollection) {
        counter!("taccuino_cms_load_fail_total").increment(1);
        // Shares the prebuilt Arc, so repeated failures keep snapshot
        // identity stable.
        inner.posts = bundled_only.clone();
        inner.state = ContentState::Failed;
        inner.cms_degraded = true;
    }

    pub async fn snapshot(&self) -> ContentSnapshot {
        let inner = self.inner.read().await;
        ContentSnapshot {
            posts: inner.posts.clone(),
            state: inner.state,
            cms_degraded: inner.cms_degraded,
        }
    }

    pub async fn state(&self) -> ContentState {
        self.inner.read().await.state
    }
}
