use std::sync::Once;

use metrics::{Unit, describe_counter};
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
            "timetable_cache_hit_total",
            Unit::Count,
            "Lookups answered from the key-value store."
        );
        describe_counter!(
            "timetable_cache_miss_total",
            Unit::Count,
            "Lookups that ran the producer and repopulated the store."
        );
        describe_counter!(
            "timetable_cache_bypass_total",
            Unit::Count,
            "Lookups that skipped the store because it was down or the read failed."
        );
        describe_counter!(
            "timetable_cache_write_failed_total",
            Unit::Count,
            "Background cache writes that failed and were dropped."
        );
        describe_counter!(
            "timetable_honeypot_lockout_total",
            Unit::Count,
            "Client identities locked out of the purge endpoint."
        );
        describe_counter!(
            "timetable_purge_total",
            Unit::Count,
            "Purge attempts by outcome."
        );
    });
}
