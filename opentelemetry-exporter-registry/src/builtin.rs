//! # Built-in exporters
//!
//! Factories for the exporters shipped with this crate, and the hook that
//! extends a registry with the OTLP stdout exporter.

use opentelemetry_otlp_stdout::OtlpStdoutSpanExporter;

use crate::{ExporterRegistry, RegistryError};

/// OTLP over HTTP/protobuf, configured through the `OTEL_EXPORTER_OTLP_*` variables.
pub const OTLP_EXPORTER: &str = "otlp";
/// Human readable spans on stdout.
pub const CONSOLE_EXPORTER: &str = "console";
/// OTLP payloads on stdout, for log based forwarding.
pub const OTLP_STDOUT_EXPORTER: &str = "otlpstdout";

/// Registers the `otlp` and `console` exporters.
///
/// [`Configurator::new`](crate::Configurator::new) runs this before any user hook.
pub fn register_builtin_exporters(registry: &mut ExporterRegistry) -> Result<(), RegistryError> {
    registry.register(OTLP_EXPORTER, || {
        Ok(opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .build()?)
    })?;
    registry.register(CONSOLE_EXPORTER, || {
        Ok(opentelemetry_stdout::SpanExporter::default())
    })?;
    Ok(())
}

/// Registers the OTLP stdout exporter under `otlpstdout`.
///
/// Use as a configuration hook:
///
/// ```no_run
/// use opentelemetry_exporter_registry::{register_otlp_stdout, Configurator};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let providers = Configurator::new()
///     .with_exporter_hook(register_otlp_stdout)
///     .configure_telemetry_from_env()?;
/// # providers.shutdown()?;
/// # Ok(())
/// # }
/// ```
pub fn register_otlp_stdout(registry: &mut ExporterRegistry) -> Result<(), RegistryError> {
    registry.register(OTLP_STDOUT_EXPORTER, || {
        Ok(OtlpStdoutSpanExporter::from_env()?)
    })
}
