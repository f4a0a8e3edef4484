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
            "hotboard_events_applied_total",
            Unit::Count,
            "Total number of change events applied to the cache."
        );
        describe_counter!(
            "hotboard_events_dropped_total",
            Unit::Count,
            "Total number of change events dropped as malformed or unappliable."
        );
        describe_counter!(
            "hotboard_read_fallback_total",
            Unit::Count,
            "Total number of hot-board reads that fell back to the database."
        );
        describe_counter!(
            "hotboard_read_served_total",
            Unit::Count,
            "Total number of hot-board pages served, labeled by source."
        );
        describe_counter!(
            "hotboard_resync_rows_total",
            Unit::Count,
            "Total number of rows written to the ranking by batch resyncs."
        );
        describe_histogram!(
            "hotboard_resync_ms",
            Unit::Milliseconds,
            "Batch resync latency in milliseconds."
        );
    });
}
