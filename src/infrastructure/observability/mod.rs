use crate::config::Config;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

const DEFAULT_LOG_FILTER: &str = "deskqueue=debug,tower_http=debug";

/// Flushes buffered spans when dropped, if an OTLP exporter was installed.
pub struct ObservabilityGuard {
    otlp: bool,
}

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        if self.otlp {
            opentelemetry::global::shutdown_tracer_provider();
        }
    }
}

/// Installs the log subscriber (plus OTLP spans when an endpoint is
/// configured) and the Prometheus exporter.
pub fn init(config: &Config) -> Result<ObservabilityGuard, Box<dyn std::error::Error>> {
    let tracer = match &config.otel_exporter_endpoint {
        Some(endpoint) => Some(otlp_tracer(endpoint, &config.service_name)?),
        None => None,
    };
    let otlp = tracer.is_some();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    Registry::default()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(tracer.map(|t| tracing_opentelemetry::layer().with_tracer(t)))
        .init();

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.metrics_port))
        .install()?;
    describe_metrics();
    tracing::info!("Prometheus exporter listening on port {}", config.metrics_port);

    Ok(ObservabilityGuard { otlp })
}

fn otlp_tracer(
    endpoint: &str,
    service_name: &str,
) -> Result<sdktrace::Tracer, opentelemetry::trace::TraceError> {
    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
            KeyValue::new("service.name", service_name.to_string()),
        ])))
        .install_batch(runtime::Tokio)
}

fn describe_metrics() {
    metrics::describe_counter!(
        "deskqueue_assignments_total",
        "Conversations assigned, labelled by path (auto or manual)"
    );
    metrics::describe_counter!(
        "deskqueue_assignment_rejections_total",
        "Assignment attempts rejected by the store, labelled by reason"
    );
    metrics::describe_counter!(
        "deskqueue_distribution_passes_skipped_total",
        "Distribution passes skipped because another pass was running"
    );
    metrics::describe_gauge!(
        "deskqueue_queue_depth",
        "Pending conversations waiting for an agent"
    );
    metrics::describe_histogram!(
        "deskqueue_distribution_pass_seconds",
        metrics::Unit::Seconds,
        "Duration of one distribution pass"
    );
    metrics::describe_counter!(
        "deskqueue_fanout_dropped_total",
        "Client events dropped because a client channel was full or closed"
    );
}
