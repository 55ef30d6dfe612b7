use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "taccuino_counter_batch_total",
            Unit::Count,
            "Total number of batched counter fetches issued."
        );
        describe_counter!(
            "taccuino_counter_batch_skip_total",
            Unit::Count,
            "Total number of counter syncs skipped because the request-set key was unchanged."
        );
        describe_counter!(
            "taccuino_counter_batch_fail_total",
            Unit::Count,
            "Total number of batched counter fetches that failed and were zero-filled."
        );
        describe_counter!(
            "taccuino_counter_batch_stale_drop_total",
            Unit::Count,
            "Total number of in-flight counter responses discarded for a superseded request set."
        );
        describe_counter!(
            "taccuino_view_increment_total",
            Unit::Count,
            "Total number of acknowledged view increments."
        );
        describe_counter!(
            "taccuino_view_increment_fail_total",
            Unit::Count,
            "Total number of view increments the store rejected or failed."
        );
        describe_counter!(
            "taccuino_cms_load_fail_total",
            Unit::Count,
            "Total number of CMS loads that failed or timed out and fell back to bundled content."
        );
        describe_histogram!(
            "taccuino_cms_load_ms",
            Unit::Milliseconds,
            "CMS load latency in milliseconds."
        );
    });
}
