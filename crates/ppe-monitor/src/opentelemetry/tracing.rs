use std::time::Duration;

use opentelemetry::{KeyValue, global, trace::TracerProvider};
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::{
    Resource,
    trace::{RandomIdGenerator, Sampler, SdkTracer, SdkTracerProvider},
};

use crate::{
    Error, Result,
    config::{Config, TempoConfig},
};

const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");

/// Identifies which kiosk a span came from: the deployment area, the cameras
/// of its "all" view and the violation rules it applies.
pub fn monitor_resource(config: &Config) -> Resource {
    let cameras = config
        .monitor
        .all_cameras
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",");

    Resource::builder()
        .with_attributes([
            KeyValue::new("service.name", SERVICE_NAME),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            KeyValue::new(
                "ppe.area",
                config.api.area.clone().unwrap_or_else(|| "default".to_string()),
            ),
            KeyValue::new("ppe.cameras", cameras),
            KeyValue::new("ppe.violation_preset", config.violations.preset.as_str()),
        ])
        .build()
}

/// OTLP/gRPC exporter towards Tempo. The provider is installed globally so
/// that it is flushed with the rest of the telemetry on shutdown.
pub fn tracer(tempo: &TempoConfig, resource: Resource) -> Result<SdkTracer> {
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(format!("{}:{}", tempo.url, tempo.port))
        .with_timeout(Duration::from_secs(3))
        .with_protocol(opentelemetry_otlp::Protocol::Grpc)
        .build()
        .map_err(|e| Error::Tracing(format!("Failed to create OTLP exporter: {e}")))?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_max_events_per_span(16)
        .with_max_attributes_per_span(16)
        .with_resource(resource)
        .build();

    global::set_tracer_provider(provider.clone());

    Ok(provider.tracer(SERVICE_NAME))
}
