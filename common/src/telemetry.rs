// Telemetry module for structured logging, metrics, and tracing

use crate::pipeline::Stage;
use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    trace::{RandomIdGenerator, Sampler, TracerProvider},
    Resource,
};
use std::net::SocketAddr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const SERVICE_NAME: &str = "feed-dispatch-worker";

/// Initialize structured logging with JSON formatting and trace context
///
/// This function sets up the tracing subscriber with:
/// - JSON formatting for structured logs
/// - Trace context (dispatch span fields) in all log entries
/// - Log levels from `RUST_LOG` or the configured level
/// - Optional OpenTelemetry integration
pub fn init_logging(log_level: &str, tracing_endpoint: Option<&str>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(env_filter);

    let registry = tracing_subscriber::registry().with(json_layer);

    if let Some(endpoint) = tracing_endpoint {
        let tracer = init_tracer(endpoint)?;
        let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);
        registry
            .with(telemetry_layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    } else {
        registry
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    }

    tracing::info!(
        log_level = log_level,
        tracing_endpoint = tracing_endpoint,
        "Structured logging initialized with JSON formatting"
    );

    Ok(())
}

/// Initialize OpenTelemetry tracer with OTLP exporter
fn init_tracer(endpoint: &str) -> Result<opentelemetry_sdk::trace::Tracer> {
    use opentelemetry_sdk::runtime::Tokio;

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint)
        .build_span_exporter()
        .map_err(|e| anyhow::anyhow!("Failed to build span exporter: {}", e))?;

    let tracer_provider = TracerProvider::builder()
        .with_batch_exporter(exporter, Tokio)
        .with_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(Sampler::AlwaysOn)
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(Resource::new(vec![
                    KeyValue::new("service.name", SERVICE_NAME),
                    KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                ])),
        )
        .build();

    global::set_tracer_provider(tracer_provider.clone());

    let tracer = tracer_provider.tracer(SERVICE_NAME);

    tracing::info!(
        endpoint = endpoint,
        "OpenTelemetry tracer initialized with OTLP exporter"
    );

    Ok(tracer)
}

/// Flush remaining spans; call on shutdown
pub fn shutdown_tracer() {
    global::shutdown_tracer_provider();
}

/// Initialize Prometheus metrics exporter
///
/// Registers:
/// - dispatch_success_total
/// - dispatch_failed_total (labelled by stage)
/// - channel_publish_failed_total
/// - feed_refill_total
/// - feed_queue_remaining
pub fn init_metrics(metrics_port: u16) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", metrics_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid metrics port: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    describe_counter!("dispatch_success_total", "Total number of successful dispatches");
    describe_counter!(
        "dispatch_failed_total",
        "Total number of failed dispatches by stage"
    );
    describe_counter!(
        "channel_publish_failed_total",
        "Total number of best-effort channel posts that failed"
    );
    describe_counter!(
        "feed_refill_total",
        "Total number of snapshot copies into the active queue"
    );
    describe_gauge!(
        "feed_queue_remaining",
        "Items left in the active queue after the last dispatch"
    );

    tracing::info!(
        metrics_port = metrics_port,
        metrics_endpoint = format!("http://0.0.0.0:{}/metrics", metrics_port),
        "Prometheus metrics exporter initialized"
    );

    Ok(())
}

#[inline]
pub fn record_dispatch_success() {
    counter!("dispatch_success_total").increment(1);
}

#[inline]
pub fn record_dispatch_failure(stage: Stage) {
    counter!("dispatch_failed_total", "stage" => stage.as_str()).increment(1);
}

#[inline]
pub fn record_channel_failure() {
    counter!("channel_publish_failed_total").increment(1);
}

#[inline]
pub fn record_feed_refill() {
    counter!("feed_refill_total").increment(1);
}

#[inline]
pub fn update_queue_remaining(remaining: usize) {
    gauge!("feed_queue_remaining").set(remaining as f64);
}
