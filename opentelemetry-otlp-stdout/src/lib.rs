//! Export spans as OTLP payloads written to stdout.
//!
//! Each exported batch becomes one JSON line carrying the encoded
//! `ExportTraceServiceRequest` together with the metadata a log forwarder
//! needs to replay it against an OTLP/HTTP collector. This keeps exporting off
//! the network in short lived environments such as AWS Lambda.
//!
//! # Examples
//!
//! ```no_run
//! use opentelemetry::trace::{Tracer, TracerProvider as _};
//! use opentelemetry_otlp_stdout::OtlpStdoutSpanExporter;
//! use opentelemetry_sdk::trace::SdkTracerProvider;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let exporter = OtlpStdoutSpanExporter::from_env()?;
//! let provider = SdkTracerProvider::builder()
//!     .with_simple_exporter(exporter)
//!     .build();
//!
//! provider.tracer("handler").in_span("invoke", |_cx| {});
//!
//! // {"__otel_otlp_stdout":"opentelemetry-otlp-stdout@0.1.0","source":"my-function",...}
//! provider.shutdown()?;
//! # Ok(())
//! # }
//! ```
#![warn(missing_debug_implementations, missing_docs)]

pub mod config;
mod error;
mod exporter;

pub use config::{Compression, Protocol};
pub use error::OtlpStdoutError;
pub use exporter::{OtlpStdoutSpanExporter, OtlpStdoutSpanExporterBuilder, EXPORTER_VERSION};
