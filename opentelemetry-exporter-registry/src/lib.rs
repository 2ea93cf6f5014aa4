//! # OpenTelemetry exporter registry
//!
//! A keyed registry of span exporter factories and the startup routine that
//! fills it, selects exporters by name and builds the tracer provider.
//!
//! Extensions add exporters through configuration hooks, which receive the
//! registry by mutable reference exactly once, before any span is exported:
//!
//! ```no_run
//! use opentelemetry_exporter_registry::{Configurator, ExporterRegistry, RegistryError};
//!
//! fn register_console_alias(registry: &mut ExporterRegistry) -> Result<(), RegistryError> {
//!     registry.register("debug", || Ok(opentelemetry_stdout::SpanExporter::default()))
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // OTEL_TRACES_EXPORTER=debug
//! let providers = Configurator::new()
//!     .with_exporter_hook(register_console_alias)
//!     .configure_telemetry_from_env()?;
//! providers.shutdown()?;
//! # Ok(())
//! # }
//! ```

pub mod builtin;
mod error;
mod exporter;
mod factory;
mod registry;
pub mod telemetry_config;

use std::collections::HashMap;
use std::sync::Arc;

use opentelemetry::{global, otel_debug, otel_info};
use opentelemetry_sdk::{error::OTelSdkResult, trace::SdkTracerProvider};

pub use builtin::{register_builtin_exporters, register_otlp_stdout};
pub use error::{BoxError, ConfigError, RegistryError};
pub use exporter::BoxedSpanExporter;
pub use factory::SpanExporterFactory;
pub use registry::ExporterRegistry;

use crate::telemetry_config::{ProcessorKind, TelemetryConfig, TracesConfig};

type ExporterHook = Box<dyn FnOnce(&mut ExporterRegistry) -> Result<(), RegistryError>>;

/// Startup routine owning the [`ExporterRegistry`].
///
/// Hooks run in the order they were added, each exactly once, when one of the
/// `configure_*` or [`build_registry`](Configurator::build_registry) methods
/// consumes the configurator. The registry is read-only from then on.
pub struct Configurator {
    registry: ExporterRegistry,
    hooks: Vec<ExporterHook>,
}

impl Configurator {
    /// Creates a configurator whose registry starts with the built-in exporters.
    pub fn new() -> Self {
        Self::with_registry(ExporterRegistry::new()).with_exporter_hook(register_builtin_exporters)
    }

    /// Creates a configurator around `registry`, without adding built-ins.
    pub fn with_registry(registry: ExporterRegistry) -> Self {
        Configurator {
            registry,
            hooks: Vec::new(),
        }
    }

    /// Adds a hook that may register or overwrite exporter factories.
    pub fn with_exporter_hook<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&mut ExporterRegistry) -> Result<(), RegistryError> + 'static,
    {
        self.hooks.push(Box::new(hook));
        self
    }

    /// Runs the hooks and returns the now read-only registry.
    pub fn build_registry(self) -> Result<Arc<ExporterRegistry>, ConfigError> {
        let Configurator {
            mut registry,
            hooks,
        } = self;

        for (index, hook) in hooks.into_iter().enumerate() {
            hook(&mut registry)?;
            otel_debug!(name: "Configurator.HookApplied", index = index);
        }

        otel_info!(
            name: "Configurator.RegistryReady",
            exporters = registry.keys().join(",")
        );
        Ok(Arc::new(registry))
    }

    /// Configures telemetry from `OTEL_TRACES_EXPORTER`.
    pub fn configure_telemetry_from_env(self) -> Result<TelemetryProviders, ConfigError> {
        self.configure_telemetry(TelemetryConfig::from_env())
    }

    pub fn configure_telemetry_from_yaml(
        self,
        telemetry_config_str: String,
    ) -> Result<TelemetryProviders, ConfigError> {
        let config = TelemetryConfig::from_yaml(&telemetry_config_str)?;
        self.configure_telemetry(config)
    }

    pub fn configure_telemetry_from_yaml_file(
        self,
        file_path: &str,
    ) -> Result<TelemetryProviders, ConfigError> {
        let config = TelemetryConfig::from_yaml_file(file_path)?;
        self.configure_telemetry(config)
    }

    /// Runs the hooks, then instantiates the selected exporters.
    ///
    /// Any unknown key or failing factory aborts configuration.
    pub fn configure_telemetry(
        self,
        telemetry_config: TelemetryConfig,
    ) -> Result<TelemetryProviders, ConfigError> {
        let registry = self.build_registry()?;
        let mut configured_telemetry_providers = TelemetryProviders::new(registry.clone());

        if let Some(traces_config) = telemetry_config.traces {
            let resource = Self::as_resource(telemetry_config.resource);
            if let Some(provider) =
                Self::build_traces_sdk_provider(&registry, traces_config, resource)?
            {
                configured_telemetry_providers =
                    configured_telemetry_providers.with_traces_provider(provider);
            }
        }

        Ok(configured_telemetry_providers)
    }

    fn build_traces_sdk_provider(
        registry: &ExporterRegistry,
        traces_config: TracesConfig,
        resource: opentelemetry_sdk::Resource,
    ) -> Result<Option<SdkTracerProvider>, ConfigError> {
        let selected = traces_config.selected_exporters()?;
        if selected.is_empty() {
            otel_info!(name: "Configurator.TracesDisabled");
            return Ok(None);
        }

        // Instantiate everything before building so a failure leaves nothing running.
        let exporters = selected
            .iter()
            .map(|key| registry.instantiate(key))
            .collect::<Result<Vec<_>, _>>()?;

        let mut provider_builder = SdkTracerProvider::builder().with_resource(resource);
        for exporter in exporters {
            provider_builder = match traces_config.processor {
                ProcessorKind::Batch => provider_builder.with_batch_exporter(exporter),
                ProcessorKind::Simple => provider_builder.with_simple_exporter(exporter),
            };
        }

        let provider = provider_builder.build();
        if traces_config.set_global {
            global::set_tracer_provider(provider.clone());
        }

        otel_info!(
            name: "Configurator.TracesConfigured",
            exporters = selected.join(",")
        );
        Ok(Some(provider))
    }

    fn as_resource(resource_attributes: HashMap<String, String>) -> opentelemetry_sdk::Resource {
        let mut resource_builder = opentelemetry_sdk::Resource::builder();
        for (key, value) in resource_attributes {
            resource_builder =
                resource_builder.with_attribute(opentelemetry::KeyValue::new(key, value));
        }
        resource_builder.build()
    }
}

impl Default for Configurator {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds the configured telemetry providers
pub struct TelemetryProviders {
    registry: Arc<ExporterRegistry>,
    traces_provider: Option<SdkTracerProvider>,
}

impl TelemetryProviders {
    pub fn new(registry: Arc<ExporterRegistry>) -> Self {
        TelemetryProviders {
            registry,
            traces_provider: None,
        }
    }

    pub fn with_traces_provider(mut self, traces_provider: SdkTracerProvider) -> Self {
        self.traces_provider = Some(traces_provider);
        self
    }

    pub fn traces_provider(&self) -> Option<&SdkTracerProvider> {
        self.traces_provider.as_ref()
    }

    /// The registry the providers were built from.
    pub fn registry(&self) -> &Arc<ExporterRegistry> {
        &self.registry
    }

    /// Exports any buffered spans. Call before a Lambda invocation returns.
    pub fn force_flush(&self) -> OTelSdkResult {
        if let Some(traces_provider) = &self.traces_provider {
            traces_provider.force_flush()?;
        }
        Ok(())
    }

    pub fn shutdown(self) -> OTelSdkResult {
        if let Some(traces_provider) = self.traces_provider {
            traces_provider.shutdown()?;
        }
        Ok(())
    }
}
