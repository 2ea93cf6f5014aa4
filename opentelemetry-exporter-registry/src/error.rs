//! # Error module
//!
//! Errors raised while populating the exporter registry and assembling the
//! telemetry providers at startup. All of them are meant to abort startup.

use thiserror::Error;

/// Boxed error returned by exporter factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the [`ExporterRegistry`](crate::ExporterRegistry).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RegistryError {
    /// Exporter keys must contain at least one character.
    #[error("exporter key must not be empty")]
    EmptyKey,

    /// No factory was registered under the requested key.
    #[error("no span exporter registered under '{key}' (registered: {})", .available.join(", "))]
    NotFound {
        /// The requested key.
        key: String,
        /// The keys that are registered, sorted.
        available: Vec<String>,
    },

    /// The factory for `key` failed to build its exporter.
    #[error("failed to construct span exporter '{key}'")]
    ExporterConstruction {
        /// The key whose factory failed.
        key: String,
        /// The error returned by the factory.
        #[source]
        source: BoxError,
    },
}

/// Errors raised by the [`Configurator`](crate::Configurator).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// Registration, lookup or construction of an exporter failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The exporter selection was present but named no exporter.
    #[error("no trace exporter selected; use 'none' to disable trace export")]
    EmptySelection,

    /// The YAML configuration could not be parsed.
    #[error("invalid telemetry configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The configuration file could not be read.
    #[error("failed to read telemetry configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Flushing or shutting down a provider failed.
    #[error("telemetry provider error: {0}")]
    Sdk(#[from] opentelemetry_sdk::error::OTelSdkError),
}
