//! Counter and content paths emit the expected metric keys.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics_util::debugging::DebuggingRecorder;
use time::macros::date;

use taccuino::application::content::{CmsError, CmsSource, ContentService};
use taccuino::application::counters::{BulkFetchError, BulkSource, CounterAggregator};
use taccuino::application::view_tracker::{ViewMode, ViewTracker};
use taccuino::domain::posts::{Post, PostCollection, PostSource};
use taccuino::infra::store::LocalCounterStore;

struct OkSource;

#[async_trait]
impl BulkSource<u64> for OkSource {
    async fn fetch(&self, slugs: &[String]) -> Result<HashMap<String, u64>, BulkFetchError> {
        Ok(slugs.iter().map(|slug| (slug.clone(), 1)).collect())
    }
}

struct FailingSource;

#[async_trait]
impl BulkSource<u64> for FailingSource {
    async fn fetch(&self, _slugs: &[String]) -> Result<HashMap<String, u64>, BulkFetchError> {
        Err(BulkFetchError::new("backend unavailable"))
    }
}

struct FailingCms;

#[async_trait]
impl CmsSource for FailingCms {
    async fn fetch_posts(&self) -> Result<Vec<Post>, CmsError> {
        Err(CmsError::Request("upstream unavailable".to_string()))
    }
}

fn sample_posts() -> PostCollection {
    PostCollection::new(vec![Post {
        id: "id-a".to_string(),
        slug: "a".to_string(),
        title: "A".to_string(),
        excerpt: String::new(),
        date: date!(2024 - 01 - 01),
        read_time: 3,
        category_id: "engineering".to_string(),
        author_id: "me".to_string(),
        featured_image: None,
        tags: Vec::new(),
        source: PostSource::Bundled,
    }])
}

#[tokio::test]
async fn counter_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let posts = sample_posts();

    // Batch fetch, unchanged-key skip.
    let aggregator: CounterAggregator<u64> = CounterAggregator::new(Arc::new(OkSource), "views");
    aggregator.sync(&posts).await;
    aggregator.sync(&posts).await;

    // Failed batch, zero-filled.
    let failing: CounterAggregator<u64> = CounterAggregator::new(Arc::new(FailingSource), "views");
    failing.sync(&posts).await;

    // Acknowledged view increment against the local fallback store.
    let tracker = ViewTracker::new(Arc::new(LocalCounterStore::new(None)), Duration::ZERO);
    let session = tracker.open("a", ViewMode::Record);
    session.start().await;

    // CMS failure path.
    let content = ContentService::new(
        Arc::new(FailingCms),
        Vec::new(),
        Duration::from_millis(250),
    );
    content.load().await;

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "taccuino_counter_batch_total",
        "taccuino_counter_batch_skip_total",
        "taccuino_counter_batch_fail_total",
        "taccuino_view_increment_total",
        "taccuino_cms_load_fail_total",
        "taccuino_cms_load_ms",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
