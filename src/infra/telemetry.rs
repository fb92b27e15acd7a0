use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install the global tracing subscriber and describe pipeline metrics.
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

/// Register descriptions for the certificate pipeline, scanner and registration metrics.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "eventhub_certificates_sent_total",
            Unit::Count,
            "Certificates rendered, mailed and recorded."
        );
        describe_counter!(
            "eventhub_certificates_failed_total",
            Unit::Count,
            "Certificate deliveries that failed at render, dispatch or persistence."
        );
        describe_histogram!(
            "eventhub_certificate_render_ms",
            Unit::Milliseconds,
            "Certificate PDF render latency in milliseconds."
        );
        describe_counter!(
            "eventhub_scheduler_ticks_total",
            Unit::Count,
            "Completion scanner ticks."
        );
        describe_counter!(
            "eventhub_scheduler_event_failures_total",
            Unit::Count,
            "Completed events whose issuance run returned an error."
        );
        describe_histogram!(
            "eventhub_scheduler_tick_ms",
            Unit::Milliseconds,
            "Wall time of one completion scan, including every issuance run."
        );
        describe_counter!(
            "eventhub_registrations_total",
            Unit::Count,
            "Participants registered through a public share link."
        );
        describe_counter!(
            "eventhub_registration_throttled_total",
            Unit::Count,
            "Registration attempts rejected by the per-client rate limit."
        );
        describe_gauge!(
            "eventhub_rate_limit_buckets",
            Unit::Count,
            "Client buckets tracked by the registration rate limiter after the last sweep."
        );
    });
}
