use thiserror::Error;

/// Errors that can occur while building or running an [`OtlpStdoutSpanExporter`].
///
/// [`OtlpStdoutSpanExporter`]: crate::OtlpStdoutSpanExporter
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum OtlpStdoutError {
    /// Gzip levels run from 0 (store) to 9 (best).
    #[error("invalid gzip compression level {0}, expected a value between 0 and 9")]
    InvalidCompressionLevel(u32),

    /// Only the HTTP flavours of OTLP can be written to stdout.
    #[error("unsupported protocol '{0}', expected 'http/protobuf' or 'http/json'")]
    UnsupportedProtocol(String),

    /// Unsupported compression algorithm.
    #[error("unsupported compression algorithm '{0}', expected 'gzip' or 'none'")]
    UnsupportedCompression(String),

    /// The export request or the output record could not be serialized.
    #[error("failed to serialize OTLP payload: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Writing to the output sink failed.
    #[error("failed to write OTLP payload: {0}")]
    Io(#[from] std::io::Error),

    /// The output sink lock was poisoned by a panicking writer.
    #[error("output writer lock poisoned")]
    WriterPoisoned,
}
