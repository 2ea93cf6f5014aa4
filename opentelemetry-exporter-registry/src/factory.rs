use opentelemetry_sdk::trace::SpanExporter;

use crate::{BoxError, BoxedSpanExporter};

/// Creates span exporters on demand.
///
/// Implemented for every `Fn() -> Result<E, BoxError>` closure whose exporter
/// type `E` implements [`SpanExporter`], so most factories are registered as
/// plain closures:
///
/// ```
/// use opentelemetry_exporter_registry::ExporterRegistry;
///
/// let mut registry = ExporterRegistry::new();
/// registry
///     .register("console", || Ok(opentelemetry_stdout::SpanExporter::default()))
///     .unwrap();
/// ```
pub trait SpanExporterFactory: Send + Sync {
    /// Builds a new exporter. Called once per instantiation.
    fn create_span_exporter(&self) -> Result<BoxedSpanExporter, BoxError>;
}

impl<F, E> SpanExporterFactory for F
where
    F: Fn() -> Result<E, BoxError> + Send + Sync,
    E: SpanExporter + 'static,
{
    fn create_span_exporter(&self) -> Result<BoxedSpanExporter, BoxError> {
        self().map(BoxedSpanExporter::new)
    }
}
