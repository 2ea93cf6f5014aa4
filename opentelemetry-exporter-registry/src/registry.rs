//! # Exporter registry
//!
//! Maps exporter keys such as `otlp` or `otlpstdout` to the factories that
//! build them. The registry is filled during startup and only read afterwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use opentelemetry::{otel_debug, otel_warn};
use opentelemetry_sdk::trace::SpanExporter;

use crate::{BoxError, BoxedSpanExporter, RegistryError, SpanExporterFactory};

/// Keyed collection of span exporter factories.
///
/// Keys are case-sensitive. Registering a key that already exists replaces
/// the previous factory and emits an `ExporterRegistry.DuplicateKey` warning.
#[derive(Default)]
pub struct ExporterRegistry {
    factories: HashMap<String, Arc<dyn SpanExporterFactory>>,
}

impl ExporterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        ExporterRegistry {
            factories: HashMap::new(),
        }
    }

    /// Registers a closure that builds an exporter under `key`.
    pub fn register<F, E>(&mut self, key: impl Into<String>, factory: F) -> Result<(), RegistryError>
    where
        F: Fn() -> Result<E, BoxError> + Send + Sync + 'static,
        E: SpanExporter + 'static,
    {
        self.register_factory(key, Arc::new(factory))
    }

    /// Registers `factory` under `key`, replacing any previous entry.
    pub fn register_factory(
        &mut self,
        key: impl Into<String>,
        factory: Arc<dyn SpanExporterFactory>,
    ) -> Result<(), RegistryError> {
        let key = key.into();
        if key.is_empty() {
            return Err(RegistryError::EmptyKey);
        }

        if self.factories.insert(key.clone(), factory).is_some() {
            otel_warn!(
                name: "ExporterRegistry.DuplicateKey",
                key = key.as_str(),
                message = "Span exporter factory replaced by a later registration"
            );
        } else {
            otel_debug!(name: "ExporterRegistry.Registered", key = key.as_str());
        }
        Ok(())
    }

    /// Returns the factory registered under `key` without invoking it.
    pub fn resolve(&self, key: &str) -> Result<Arc<dyn SpanExporterFactory>, RegistryError> {
        self.factories
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                key: key.to_string(),
                available: self.keys(),
            })
    }

    /// Resolves `key` and invokes its factory once.
    ///
    /// A factory failure is returned as [`RegistryError::ExporterConstruction`];
    /// the registry itself is not modified.
    pub fn instantiate(&self, key: &str) -> Result<BoxedSpanExporter, RegistryError> {
        let factory = self.resolve(key)?;
        match factory.create_span_exporter() {
            Ok(exporter) => {
                otel_debug!(name: "ExporterRegistry.ExporterCreated", key = key);
                Ok(exporter)
            }
            Err(source) => Err(RegistryError::ExporterConstruction {
                key: key.to_string(),
                source,
            }),
        }
    }

    /// Whether a factory is registered under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.factories.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of registered factories.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for ExporterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExporterRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}
