use opentelemetry::global;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use tokio::task::JoinHandle;
use ::tracing::warn;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    config::Config,
    opentelemetry::{
        logging::loki_layer,
        tracing::{monitor_resource, tracer},
    },
};

pub mod logging;
pub mod tracing;

pub const DEFAULT_FILTER: &str = "info,reqwest=warn,hyper=warn,hyper_util=warn";

/// Installs the global subscriber: console output, plus Loki and Tempo when
/// configured. Returns the Loki background task, which the caller must drive.
pub fn init(config: &Config) -> Option<JoinHandle<()>> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let mut layers: Vec<Box<dyn Layer<_> + Send + Sync>> = vec![
        tracing_subscriber::fmt::layer().with_ansi(true).boxed(),
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
            .boxed(),
    ];

    let mut loki_task = None;
    let mut failures = Vec::new();

    if let Some(loki_config) = config.logging.as_ref().and_then(|c| c.loki.clone()) {
        match loki_layer(loki_config) {
            Ok((layer, task)) => {
                layers.push(Box::new(layer));
                loki_task = Some(task);
            }
            Err(err) => failures.push(err),
        }
    }

    if let Some(tempo_config) = config.tracing.as_ref().and_then(|c| c.tempo.clone()) {
        match tracer(&tempo_config, monitor_resource(config)) {
            Ok(tracer) => layers.push(Box::new(
                tracing_opentelemetry::layer()
                    .with_tracer(tracer)
                    .with_filter(tracing_core::metadata::LevelFilter::INFO),
            )),
            Err(err) => failures.push(err),
        }
    }

    tracing_subscriber::registry().with(layers).init();

    for err in failures {
        warn!(err = ?err, "Telemetry export disabled");
    }

    loki_task.map(tokio::spawn)
}
