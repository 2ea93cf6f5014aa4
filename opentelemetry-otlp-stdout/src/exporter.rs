use core::fmt;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::write::GzEncoder;
use opentelemetry::{otel_debug, otel_warn};
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::transform::common::tonic::ResourceAttributesWithSchema;
use opentelemetry_proto::transform::trace::tonic::group_spans_by_resource_and_scope;
use opentelemetry_sdk::error::{OTelSdkError, OTelSdkResult};
use opentelemetry_sdk::trace::{SpanData, SpanExporter};
use opentelemetry_sdk::Resource;
use prost::Message;
use serde::Serialize;

use crate::config::{
    resolve_compression, resolve_endpoint, resolve_headers, resolve_protocol, resolve_source,
    Compression, Protocol, DEFAULT_COMPRESSION_LEVEL,
};
use crate::OtlpStdoutError;

/// Value of the `__otel_otlp_stdout` marker field, identifying the producer.
pub const EXPORTER_VERSION: &str = concat!(env!("CARGO_PKG_NAME"), "@", env!("CARGO_PKG_VERSION"));

const DEFAULT_SOURCE: &str = "unknown-service";
const SERVICE_NAME_KEY: &str = "service.name";
// Placeholder the SDK puts in `service.name` when nothing was configured.
const SDK_UNKNOWN_SERVICE: &str = "unknown_service";

/// One line of output. A log forwarder reads these from stdout and replays
/// `payload` against `endpoint`.
#[derive(Serialize)]
struct OtlpStdoutRecord<'a> {
    #[serde(rename = "__otel_otlp_stdout")]
    version: &'static str,
    source: &'a str,
    endpoint: &'a str,
    method: &'static str,
    #[serde(rename = "content-type")]
    content_type: &'static str,
    #[serde(rename = "content-encoding", skip_serializing_if = "Option::is_none")]
    content_encoding: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    headers: Option<&'a BTreeMap<String, String>>,
    payload: String,
    base64: bool,
}

/// Builder for [`OtlpStdoutSpanExporter`].
///
/// Unset options are read from the environment when [`build`] is called. See
/// the [`config`](crate::config) module for the variables involved.
///
/// [`build`]: OtlpStdoutSpanExporterBuilder::build
#[derive(Default)]
pub struct OtlpStdoutSpanExporterBuilder {
    source: Option<String>,
    endpoint: Option<String>,
    protocol: Option<Protocol>,
    compression: Option<Compression>,
    compression_level: Option<u32>,
    headers: BTreeMap<String, String>,
    writer: Option<Box<dyn Write + Send>>,
}

impl fmt::Debug for OtlpStdoutSpanExporterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtlpStdoutSpanExporterBuilder")
            .field("source", &self.source)
            .field("endpoint", &self.endpoint)
            .field("protocol", &self.protocol)
            .field("compression", &self.compression)
            .field("compression_level", &self.compression_level)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl OtlpStdoutSpanExporterBuilder {
    /// Name reported as the `source` of each line.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Endpoint the forwarder should post the payload to.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Payload encoding.
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    /// Payload compression.
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Gzip level between 0 and 9, defaults to 6.
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = Some(level);
        self
    }

    /// Extra headers, merged over the ones from the environment.
    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Sink for the output lines. Defaults to stdout.
    pub fn with_writer<W: Write + Send + 'static>(mut self, writer: W) -> Self {
        self.writer = Some(Box::new(writer));
        self
    }

    /// Resolves the remaining settings from the environment and creates the exporter.
    pub fn build(self) -> Result<OtlpStdoutSpanExporter, OtlpStdoutError> {
        let compression_level = self.compression_level.unwrap_or(DEFAULT_COMPRESSION_LEVEL);
        if compression_level > 9 {
            return Err(OtlpStdoutError::InvalidCompressionLevel(compression_level));
        }

        let exporter = OtlpStdoutSpanExporter {
            source: resolve_source(self.source),
            resource_source: None,
            endpoint: resolve_endpoint(self.endpoint),
            protocol: resolve_protocol(self.protocol),
            compression: resolve_compression(self.compression),
            compression_level,
            headers: resolve_headers(self.headers),
            resource: ResourceAttributesWithSchema::default(),
            writer: Mutex::new(
                self.writer
                    .unwrap_or_else(|| Box::new(io::stdout()) as Box<dyn Write + Send>),
            ),
            is_shutdown: AtomicBool::new(false),
        };

        otel_debug!(
            name: "OtlpStdoutSpanExporter.Built",
            endpoint = exporter.endpoint.as_str(),
            protocol = exporter.protocol.to_string(),
            compression = exporter.compression.to_string()
        );

        Ok(exporter)
    }
}

/// A [`SpanExporter`] that serializes each batch as an OTLP export request and
/// writes it, wrapped in a single JSON line, to stdout.
///
/// Meant for environments such as AWS Lambda where a log subscription forwards
/// stdout to a collector, so no network call is made on the request path.
pub struct OtlpStdoutSpanExporter {
    source: Option<String>,
    resource_source: Option<String>,
    endpoint: String,
    protocol: Protocol,
    compression: Compression,
    compression_level: u32,
    headers: BTreeMap<String, String>,
    resource: ResourceAttributesWithSchema,
    writer: Mutex<Box<dyn Write + Send>>,
    is_shutdown: AtomicBool,
}

impl fmt::Debug for OtlpStdoutSpanExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtlpStdoutSpanExporter")
            .field("source", &self.source())
            .field("endpoint", &self.endpoint)
            .field("protocol", &self.protocol)
            .field("compression", &self.compression)
            .finish()
    }
}

impl OtlpStdoutSpanExporter {
    /// Creates a builder.
    pub fn builder() -> OtlpStdoutSpanExporterBuilder {
        OtlpStdoutSpanExporterBuilder::default()
    }

    /// Creates an exporter configured entirely from the environment.
    pub fn from_env() -> Result<Self, OtlpStdoutError> {
        Self::builder().build()
    }

    /// The `source` written on each line.
    pub fn source(&self) -> &str {
        self.source
            .as_deref()
            .or(self.resource_source.as_deref())
            .unwrap_or(DEFAULT_SOURCE)
    }

    /// The endpoint written on each line.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Encodes a batch into one output line, without the trailing newline.
    fn encode_batch(&self, batch: Vec<SpanData>) -> Result<Vec<u8>, OtlpStdoutError> {
        let request = ExportTraceServiceRequest {
            resource_spans: group_spans_by_resource_and_scope(batch, &self.resource),
        };

        let body = match self.protocol {
            Protocol::HttpProtobuf => request.encode_to_vec(),
            Protocol::HttpJson => serde_json::to_vec(&request)?,
        };

        let (payload, content_encoding, base64) = match self.compression {
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(
                    Vec::with_capacity(body.len() / 2),
                    flate2::Compression::new(self.compression_level),
                );
                encoder.write_all(&body)?;
                (STANDARD.encode(encoder.finish()?), Some("gzip"), true)
            }
            Compression::None => match self.protocol {
                Protocol::HttpProtobuf => (STANDARD.encode(&body), None, true),
                // serde_json only produces UTF-8.
                Protocol::HttpJson => (String::from_utf8_lossy(&body).into_owned(), None, false),
            },
        };

        let record = OtlpStdoutRecord {
            version: EXPORTER_VERSION,
            source: self.source(),
            endpoint: &self.endpoint,
            method: "POST",
            content_type: self.protocol.content_type(),
            content_encoding,
            headers: (!self.headers.is_empty()).then_some(&self.headers),
            payload,
            base64,
        };

        Ok(serde_json::to_vec(&record)?)
    }

    fn write_line(&self, mut line: Vec<u8>) -> Result<(), OtlpStdoutError> {
        line.push(b'\n');
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| OtlpStdoutError::WriterPoisoned)?;
        writer.write_all(&line)?;
        writer.flush()?;
        Ok(())
    }

    fn flush_writer(&self) -> OTelSdkResult {
        self.writer
            .lock()
            .map_err(|_| OTelSdkError::InternalFailure(OtlpStdoutError::WriterPoisoned.to_string()))?
            .flush()
            .map_err(|e| OTelSdkError::InternalFailure(e.to_string()))
    }
}

impl SpanExporter for OtlpStdoutSpanExporter {
    async fn export(&self, batch: Vec<SpanData>) -> OTelSdkResult {
        if self.is_shutdown.load(Ordering::SeqCst) {
            return Err(OTelSdkError::AlreadyShutdown);
        }
        if batch.is_empty() {
            return Ok(());
        }

        let span_count = batch.len();
        let result = self
            .encode_batch(batch)
            .and_then(|line| self.write_line(line));

        match result {
            Ok(()) => {
                otel_debug!(name: "OtlpStdoutSpanExporter.ExportSucceeded", span_count = span_count);
                Ok(())
            }
            Err(e) => {
                otel_warn!(name: "OtlpStdoutSpanExporter.ExportFailed", error = e.to_string());
                Err(OTelSdkError::InternalFailure(e.to_string()))
            }
        }
    }

    fn shutdown_with_timeout(&mut self, _timeout: Duration) -> OTelSdkResult {
        if self.is_shutdown.swap(true, Ordering::SeqCst) {
            return Err(OTelSdkError::AlreadyShutdown);
        }
        self.flush_writer()
    }

    fn force_flush(&mut self) -> OTelSdkResult {
        self.flush_writer()
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.resource_source = resource
            .iter()
            .find(|(key, _)| key.as_str() == SERVICE_NAME_KEY)
            .map(|(_, value)| value.to_string())
            .filter(|name| !is_sdk_placeholder(name));
        self.resource = resource.into();
    }
}

fn is_sdk_placeholder(service_name: &str) -> bool {
    service_name == SDK_UNKNOWN_SERVICE
        || service_name
            .strip_prefix(SDK_UNKNOWN_SERVICE)
            .is_some_and(|rest| rest.starts_with(':'))
}
