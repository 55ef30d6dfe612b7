//! Optimistic view tracking for single-post reads.
//!
//! One [`ViewSession`] covers one rendered post view. In `Record` mode the
//! session fetches the current count, waits a short fixed delay so the
//! fetch establishes a baseline, then sends exactly one increment and bumps
//! the local count by 1 on acknowledgment; it never re-fetches to confirm.
//! The remote store stays the source of truth; the local number is
//! deliberately eventually consistent and is not reconciled against
//! concurrent writers (acceptable for a single-reader blog; it is never
//! rolled back, to avoid visible flicker).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::counter;
use tokio::sync::RwLock;
use tracing::warn;

use crate::infra::store::CounterStore;

/// Whether a session is allowed to record a view. Grid and list renders
/// must use `Observe`: they fetch counts for display but never increment,
/// so impressions cannot inflate the numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Record,
    Observe,
}

pub struct ViewTracker {
    store: Arc<dyn CounterStore>,
    increment_delay: Duration,
}

impl ViewTracker {
    pub fn new(store: Arc<dyn CounterStore>, increment_delay: Duration) -> Self {
        Self {
            store,
            increment_delay,
        }
    }

    pub fn open(&self, slug: impl Into<String>, mode: ViewMode) -> ViewSession {
        ViewSession {
            slug: slug.into(),
            mode,
            store: Arc::clone(&self.store),
            increment_delay: self.increment_delay,
            state: RwLock::new(ViewState {
                count: 0,
                loading: false,
                error: None,
            }),
            incremented: AtomicBool::new(false),
            retry_spent: AtomicBool::new(false),
        }
    }
}

struct ViewState {
    count: u64,
    loading: bool,
    error: Option<String>,
}

pub struct ViewSession {
    slug: String,
    mode: ViewMode,
    store: Arc<dyn CounterStore>,
    increment_delay: Duration,
    state: RwLock<ViewState>,
    incremented: AtomicBool,
    retry_spent: AtomicBool,
}

impl ViewSession {
    /// Fetch the baseline count and, in `Record` mode, auto-increment once
    /// after the configured delay. Safe to run again (a re-rendered mount):
    /// the guard keeps the increment at most-once, with a single retry
    /// after a failed attempt.
    pub async fn start(&self) {
        if self.slug.is_empty() {
            return;
        }

        self.refresh_count().await;

        if self.mode == ViewMode::Record {
            tokio::time::sleep(self.increment_delay).await;
            self.auto_increment().await;
        }
    }

    async fn auto_increment(&self) {
        if self.incremented.swap(true, Ordering::SeqCst) {
            return;
        }

        match self.store.increment_view(&self.slug).await {
            Ok(true) => {
                self.bump().await;
                counter!("taccuino_view_increment_total").increment(1);
            }
            Ok(false) => self.note_increment_failure("store declined the increment"),
            Err(err) => self.note_increment_failure(err.to_string()),
        }
    }

    fn note_increment_failure(&self, reason: impl std::fmt::Display) {
        warn!(slug = %self.slug, %reason, "view increment failed");
        counter!("taccuino_view_increment_fail_total").increment(1);
        // One retry on the next opportunity, not an unbounded loop.
        if !self.retry_spent.swap(true, Ordering::SeqCst) {
            self.incremented.store(false, Ordering::SeqCst);
        }
    }

    async fn bump(&self) {
        self.state.write().await.count += 1;
    }

    /// Manual increment, independent of the mount-time guard. Returns
    /// whether the store acknowledged the write.
    pub async fn increment(&self) -> bool {
        match self.store.increment_view(&self.slug).await {
            Ok(true) => {
                self.bump().await;
                counter!("taccuino_view_increment_total").increment(1);
                true
            }
            Ok(false) => {
                warn!(slug = %self.slug, "store declined the manual increment");
                counter!("taccuino_view_increment_fail_total").increment(1);
                false
            }
            Err(err) => {
                warn!(slug = %self.slug, error = %err, "manual view increment failed");
                counter!("taccuino_view_increment_fail_total").increment(1);
                false
            }
        }
    }

    /// Re-fetch the count from the store, replacing the local number. On
    /// failure the previous count stays and only the error field changes.
    pub async fn refresh_count(&self) {
        self.state.write().await.loading = true;

        match self.store.view_count(&self.slug).await {
            Ok(count) => {
                let mut state = self.state.write().await;
                state.count = count;
                state.error = None;
                state.loading = false;
            }
            Err(err) => {
                warn!(slug = %self.slug, error = %err, "view count fetch failed");
                let mut state = self.state.write().await;
                state.error = Some(err.to_string());
                state.loading = false;
            }
        }
    }

    pub async fn view_count(&self) -> u64 {
        self.state.read().await.count
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    pub async fn error(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }
}
