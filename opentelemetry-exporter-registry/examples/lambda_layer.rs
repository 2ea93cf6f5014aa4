//! Startup of a Lambda layer that adds the `otlpstdout` exporter.
//!
//! Run with `OTEL_TRACES_EXPORTER=otlpstdout` to get one OTLP JSON line per
//! batch on stdout, or with `console` to print spans in human readable form.

use opentelemetry::trace::{Span, Tracer, TracerProvider};
use opentelemetry::KeyValue;
use opentelemetry_exporter_registry::{register_otlp_stdout, Configurator};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

fn init_internal_logs() {
    // Internal logs of the SDK and the exporters, on stderr so they never mix
    // with OTLP lines on stdout.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive("reqwest=off".parse().unwrap());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_thread_names(true);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    init_internal_logs();

    let providers = Configurator::new()
        .with_exporter_hook(register_otlp_stdout)
        .configure_telemetry_from_env()?;

    if let Some(tracer_provider) = providers.traces_provider() {
        let tracer = tracer_provider.tracer("lambda-layer-example");
        tracer.in_span("handler", |_cx| {
            let mut span = tracer.start("fetch-order");
            span.set_attribute(KeyValue::new("order.id", 42));
            span.end();
        });
    }

    // Spans buffered by the batch processor must be written before the
    // invocation returns.
    providers.force_flush()?;
    providers.shutdown()?;
    Ok(())
}
