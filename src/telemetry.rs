use std::path::Path;
use std::sync::OnceLock;

use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{MetricExporter, SpanExporter};
use opentelemetry_sdk::{Resource, metrics::SdkMeterProvider, trace::SdkTracerProvider};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_opentelemetry::MetricsLayer;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::Layer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _};

const SERVICE_NAME: &str = "sitekb";

/// Exporters are only installed when this is set
const OTLP_ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

fn get_resource() -> Resource {
    static RESOURCE: OnceLock<Resource> = OnceLock::new();
    RESOURCE
        .get_or_init(|| Resource::builder().with_service_name(SERVICE_NAME).build())
        .clone()
}

fn init_traces() -> anyhow::Result<SdkTracerProvider> {
    let exporter = SpanExporter::builder().with_http().build()?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(get_resource())
        .build())
}

fn init_metrics() -> anyhow::Result<SdkMeterProvider> {
    let exporter = MetricExporter::builder().with_http().build()?;

    Ok(SdkMeterProvider::builder()
        .with_periodic_exporter(exporter)
        .with_resource(get_resource())
        .build())
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

// Initialize tracing-subscriber and return OtelGuard for opentelemetry-related termination processing
pub fn init_tracing_subscriber(log_file: Option<&Path>) -> anyhow::Result<OtelGuard> {
    let (tracer_provider, meter_provider) = if std::env::var_os(OTLP_ENDPOINT_VAR).is_some() {
        (Some(init_traces()?), Some(init_metrics()?))
    } else {
        (None, None)
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(env_filter("warn"));

    let file_layer = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir)?;
            let file_name = path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "sitekb.log".into());

            let appender = RollingFileAppender::new(Rotation::NEVER, dir, file_name);
            Some(
                fmt::layer()
                    .with_writer(appender)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_filter(env_filter("info")),
            )
        }
        None => None,
    };

    let metrics_layer = meter_provider
        .as_ref()
        .map(|provider| MetricsLayer::new(provider.clone()));
    let trace_layer = tracer_provider
        .as_ref()
        .map(|provider| OpenTelemetryLayer::new(provider.tracer(SERVICE_NAME)));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .with(metrics_layer)
        .with(trace_layer)
        .try_init()?;

    Ok(OtelGuard {
        tracer_provider,
        meter_provider,
    })
}

pub struct OtelGuard {
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

impl Drop for OtelGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take() {
            if let Err(err) = provider.shutdown() {
                eprintln!("{err:?}");
            }
        }
        if let Some(provider) = self.meter_provider.take() {
            if let Err(err) = provider.shutdown() {
                eprintln!("{err:?}");
            }
        }
    }
}
