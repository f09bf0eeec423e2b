//! Process-wide tracing setup shared by the discount binaries.
//!
//! [`init`] installs a `tracing` subscriber with an [`EnvFilter`], a pretty or
//! JSON formatter and, when an OTLP endpoint is configured, an OpenTelemetry
//! layer exporting spans over gRPC. Records emitted through the `log` facade
//! (sqlx, for instance) are forwarded into `tracing`.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use thiserror::Error;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::{EnvFilter, Registry};
use typed_builder::TypedBuilder;

pub const DEFAULT_LOG_DIRECTIVES: &str = "info,h2=warn,hyper=warn,tower=warn,tonic=warn,sqlx=warn";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to build OTLP exporter: {0}")]
    OtlpExporter(#[from] opentelemetry_otlp::ExporterBuildError),
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
    #[error("failed to install log bridge: {0}")]
    LogBridge(#[from] tracing_log::log::SetLoggerError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human-readable output.
    #[default]
    Pretty,
    /// One JSON object per event, including the current span.
    Json,
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct TelemetryConfig {
    #[builder(setter(into))]
    pub service_name: String,
    #[builder(default)]
    pub log_format: LogFormat,
    /// Filter used when `RUST_LOG` is unset.
    #[builder(default = DEFAULT_LOG_DIRECTIVES.to_string(), setter(into))]
    pub default_directives: String,
    /// OTLP gRPC endpoint; span export is disabled when unset.
    #[builder(default)]
    pub otlp_endpoint: Option<String>,
}

/// Keeps the tracer provider alive and flushes pending spans on drop.
#[derive(Debug)]
pub struct TelemetryGuard {
    tracer_provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take() {
            if let Err(err) = provider.shutdown() {
                eprintln!("failed to shut down tracer provider: {err}");
            }
        }
    }
}

/// Installs the global subscriber. Must be called once, from within a Tokio
/// runtime when OTLP export is enabled.
pub fn init(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let tracer_provider = config
        .otlp_endpoint
        .as_deref()
        .map(|endpoint| build_tracer_provider(&config.service_name, endpoint))
        .transpose()?;

    match config.log_format {
        LogFormat::Pretty => install(
            config,
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_target(true),
            tracer_provider.as_ref(),
        )?,
        LogFormat::Json => install(
            config,
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .with_target(true),
            tracer_provider.as_ref(),
        )?,
    }

    tracing_log::LogTracer::init()?;

    Ok(TelemetryGuard { tracer_provider })
}

fn build_tracer_provider(
    service_name: &str,
    endpoint: &str,
) -> Result<SdkTracerProvider, TelemetryError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build())
}

fn env_filter(config: &TelemetryConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_directives))
}

fn install<L>(
    config: &TelemetryConfig,
    fmt_layer: L,
    tracer_provider: Option<&SdkTracerProvider>,
) -> Result<(), TelemetryError>
where
    L: Layer<Registry> + Send + Sync + 'static,
{
    let otel_layer = tracer_provider.map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(config.service_name.clone()))
    });

    let subscriber = tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter(config))
        .with(otel_layer);

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_to_pretty_without_export() {
        let config = TelemetryConfig::builder()
            .service_name("discount-grpc")
            .build();

        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.default_directives, DEFAULT_LOG_DIRECTIVES);
        assert!(config.otlp_endpoint.is_none());
    }

    #[test]
    fn builder_accepts_endpoint() {
        let config = TelemetryConfig::builder()
            .service_name("discount-grpc")
            .log_format(LogFormat::Json)
            .otlp_endpoint(Some("http://localhost:4317".to_string()))
            .build();

        assert_eq!(config.otlp_endpoint.as_deref(), Some("http://localhost:4317"));
    }

    #[test]
    fn guard_without_provider_drops_cleanly() {
        drop(TelemetryGuard {
            tracer_provider: None,
        });
    }
}
