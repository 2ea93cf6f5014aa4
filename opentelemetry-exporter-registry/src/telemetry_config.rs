//! # Telemetry Configuration module
//!
//! This module defines the configuration structures that select which
//! registered exporters back the tracer provider.

use std::collections::HashMap;

use opentelemetry::otel_warn;
use serde::{Deserialize, Deserializer};

use crate::ConfigError;

/// Comma-separated list of exporter keys to enable for traces.
pub const OTEL_TRACES_EXPORTER: &str = "OTEL_TRACES_EXPORTER";
/// Exporter used when [`OTEL_TRACES_EXPORTER`] is not set.
pub const OTEL_TRACES_EXPORTER_DEFAULT: &str = "otlp";
/// Selection value that disables trace export.
pub const NONE_EXPORTER: &str = "none";

/// Configuration for Telemetry
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Traces telemetry configuration
    pub traces: Option<TracesConfig>,

    /// Resource attributes to be associated with all telemetry data
    #[serde(default)]
    pub resource: HashMap<String, String>,
}

impl TelemetryConfig {
    pub fn new() -> Self {
        TelemetryConfig {
            traces: None,
            resource: HashMap::new(),
        }
    }

    /// Creates a TelemetryConfig from a YAML string
    pub fn from_yaml(yaml_str: &str) -> Result<Self, ConfigError> {
        let config: TelemetryConfig = serde_yaml::from_str(yaml_str)?;
        Ok(config)
    }

    /// Creates a TelemetryConfig from a YAML file
    pub fn from_yaml_file(file_path: &str) -> Result<Self, ConfigError> {
        let yaml_str = std::fs::read_to_string(file_path)?;
        Self::from_yaml(&yaml_str)
    }

    /// Creates a TelemetryConfig from [`OTEL_TRACES_EXPORTER`].
    ///
    /// Resource attributes are left to the SDK, which reads `OTEL_SERVICE_NAME`
    /// and `OTEL_RESOURCE_ATTRIBUTES` itself.
    pub fn from_env() -> Self {
        let selection = std::env::var(OTEL_TRACES_EXPORTER)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| OTEL_TRACES_EXPORTER_DEFAULT.to_string());

        TelemetryConfig {
            traces: Some(TracesConfig {
                exporters: parse_exporter_list(&selection),
                ..TracesConfig::default()
            }),
            resource: HashMap::new(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// How exporters are attached to the tracer provider.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorKind {
    /// Spans are queued and exported in batches on a background thread.
    #[default]
    Batch,
    /// Each span is exported synchronously when it ends.
    Simple,
}

/// Configuration for Traces telemetry
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TracesConfig {
    /// Registry keys of the exporters to instantiate, either a YAML sequence
    /// or a comma-separated string.
    #[serde(
        default = "default_exporters",
        deserialize_with = "deserialize_exporters"
    )]
    pub exporters: Vec<String>,

    /// Span processor wrapping each exporter.
    #[serde(default)]
    pub processor: ProcessorKind,

    /// Install the provider as the global tracer provider.
    #[serde(default)]
    pub set_global: bool,
}

impl TracesConfig {
    /// Normalized selection: duplicates removed, `none` handled.
    /// Empty only when trace export is disabled with `none`; a selection that
    /// names nothing at all is [`ConfigError::EmptySelection`].
    pub fn selected_exporters(&self) -> Result<Vec<String>, ConfigError> {
        normalize_selection(self.exporters.iter().map(String::as_str))
    }
}

impl Default for TracesConfig {
    fn default() -> Self {
        TracesConfig {
            exporters: default_exporters(),
            processor: ProcessorKind::default(),
            set_global: false,
        }
    }
}

fn default_exporters() -> Vec<String> {
    vec![OTEL_TRACES_EXPORTER_DEFAULT.to_string()]
}

fn deserialize_exporters<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ExporterNames {
        List(Vec<String>),
        Csv(String),
    }

    Ok(match ExporterNames::deserialize(deserializer)? {
        ExporterNames::List(names) => names,
        ExporterNames::Csv(value) => parse_exporter_list(&value),
    })
}

/// Splits a comma-separated selection such as `otlpstdout, console`.
pub fn parse_exporter_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Drops duplicates keeping the first occurrence. `none` on its own disables
/// export; mixed with other keys it is ignored.
fn normalize_selection<'a>(
    names: impl Iterator<Item = &'a str>,
) -> Result<Vec<String>, ConfigError> {
    let mut selected: Vec<String> = Vec::new();
    let mut saw_none = false;
    for name in names.map(str::trim).filter(|name| !name.is_empty()) {
        if name == NONE_EXPORTER {
            saw_none = true;
        } else if !selected.iter().any(|existing| existing == name) {
            selected.push(name.to_string());
        }
    }

    if selected.is_empty() && !saw_none {
        return Err(ConfigError::EmptySelection);
    }
    if saw_none && !selected.is_empty() {
        otel_warn!(
            name: "TelemetryConfig.NoneIgnored",
            message = "'none' combined with other trace exporters is ignored"
        );
    }
    Ok(selected)
}
