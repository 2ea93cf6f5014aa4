//! Environment driven settings for the OTLP stdout exporter.
//!
//! Resolution order for every setting is: value provided through the builder,
//! then the traces-specific environment variable, then the generic
//! `OTEL_EXPORTER_OTLP_*` variable, then the default.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use opentelemetry::otel_warn;
use percent_encoding::percent_decode_str;

use crate::OtlpStdoutError;

/// Target to which the forwarder should eventually send the payload.
pub const OTEL_EXPORTER_OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
/// Traces-specific target, used verbatim without appending a signal path.
pub const OTEL_EXPORTER_OTLP_TRACES_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_TRACES_ENDPOINT";
/// Default traces endpoint recorded in each output line.
pub const OTEL_EXPORTER_OTLP_TRACES_ENDPOINT_DEFAULT: &str = "http://localhost:4318/v1/traces";
/// Protocol used to encode the payload. Either `http/protobuf` or `http/json`.
pub const OTEL_EXPORTER_OTLP_PROTOCOL: &str = "OTEL_EXPORTER_OTLP_PROTOCOL";
/// Traces-specific protocol.
pub const OTEL_EXPORTER_OTLP_TRACES_PROTOCOL: &str = "OTEL_EXPORTER_OTLP_TRACES_PROTOCOL";
/// Compression applied to the payload. Either `gzip` or `none`.
pub const OTEL_EXPORTER_OTLP_COMPRESSION: &str = "OTEL_EXPORTER_OTLP_COMPRESSION";
/// Traces-specific compression.
pub const OTEL_EXPORTER_OTLP_TRACES_COMPRESSION: &str = "OTEL_EXPORTER_OTLP_TRACES_COMPRESSION";
/// Key-value pairs forwarded as headers. Example: `k1=v1,k2=v2`
pub const OTEL_EXPORTER_OTLP_HEADERS: &str = "OTEL_EXPORTER_OTLP_HEADERS";
/// Traces-specific headers, merged over [`OTEL_EXPORTER_OTLP_HEADERS`].
pub const OTEL_EXPORTER_OTLP_TRACES_HEADERS: &str = "OTEL_EXPORTER_OTLP_TRACES_HEADERS";
/// Logical service name, used as the `source` of each output line.
pub const OTEL_SERVICE_NAME: &str = "OTEL_SERVICE_NAME";
/// Set by the Lambda runtime; fallback for the `source` of each output line.
pub const AWS_LAMBDA_FUNCTION_NAME: &str = "AWS_LAMBDA_FUNCTION_NAME";

/// Default gzip level.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

const TRACES_PATH: &str = "/v1/traces";

/// Encoding of the OTLP export request.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Protocol {
    /// Binary protobuf, `application/x-protobuf`.
    #[default]
    HttpProtobuf,
    /// OTLP/JSON, `application/json`.
    HttpJson,
}

impl Protocol {
    pub(crate) fn content_type(self) -> &'static str {
        match self {
            Protocol::HttpProtobuf => "application/x-protobuf",
            Protocol::HttpJson => "application/json",
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::HttpProtobuf => write!(f, "http/protobuf"),
            Protocol::HttpJson => write!(f, "http/json"),
        }
    }
}

impl FromStr for Protocol {
    type Err = OtlpStdoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "http/protobuf" => Ok(Protocol::HttpProtobuf),
            "http/json" => Ok(Protocol::HttpJson),
            other => Err(OtlpStdoutError::UnsupportedProtocol(other.to_string())),
        }
    }
}

/// Compression applied to the encoded request before it is written.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Compression {
    /// Gzip, then base64.
    #[default]
    Gzip,
    /// No compression.
    None,
}

impl Display for Compression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::Gzip => write!(f, "gzip"),
            Compression::None => write!(f, "none"),
        }
    }
}

impl FromStr for Compression {
    type Err = OtlpStdoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "gzip" => Ok(Compression::Gzip),
            "none" => Ok(Compression::None),
            other => Err(OtlpStdoutError::UnsupportedCompression(other.to_string())),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Reads `T` from the first set variable. An unparsable value is reported and
/// the default is used instead, so a setting meant for another OTLP exporter
/// (e.g. `grpc`) does not abort startup.
fn resolve_from_env<T>(signal_env_var: &str, generic_env_var: &str) -> T
where
    T: FromStr<Err = OtlpStdoutError> + Default,
{
    let Some((var, value)) = [signal_env_var, generic_env_var]
        .into_iter()
        .find_map(|var| non_empty_var(var).map(|value| (var, value)))
    else {
        return T::default();
    };

    match value.parse::<T>() {
        Ok(parsed) => parsed,
        Err(err) => {
            otel_warn!(
                name: "OtlpStdoutSpanExporter.InvalidEnvValue",
                variable = var,
                error = err.to_string()
            );
            T::default()
        }
    }
}

pub(crate) fn resolve_protocol(provided: Option<Protocol>) -> Protocol {
    provided.unwrap_or_else(|| {
        resolve_from_env(OTEL_EXPORTER_OTLP_TRACES_PROTOCOL, OTEL_EXPORTER_OTLP_PROTOCOL)
    })
}

pub(crate) fn resolve_compression(provided: Option<Compression>) -> Compression {
    provided.unwrap_or_else(|| {
        resolve_from_env(
            OTEL_EXPORTER_OTLP_TRACES_COMPRESSION,
            OTEL_EXPORTER_OTLP_COMPRESSION,
        )
    })
}

pub(crate) fn resolve_endpoint(provided: Option<String>) -> String {
    if let Some(endpoint) = provided {
        return endpoint;
    }
    if let Some(endpoint) = non_empty_var(OTEL_EXPORTER_OTLP_TRACES_ENDPOINT) {
        return endpoint;
    }
    match non_empty_var(OTEL_EXPORTER_OTLP_ENDPOINT) {
        Some(base) => format!("{}{}", base.trim_end_matches('/'), TRACES_PATH),
        None => OTEL_EXPORTER_OTLP_TRACES_ENDPOINT_DEFAULT.to_string(),
    }
}

/// Service name from the environment, `None` when neither variable is set.
pub(crate) fn resolve_source(provided: Option<String>) -> Option<String> {
    provided
        .or_else(|| non_empty_var(OTEL_SERVICE_NAME))
        .or_else(|| non_empty_var(AWS_LAMBDA_FUNCTION_NAME))
}

pub(crate) fn resolve_headers(provided: BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    for var in [OTEL_EXPORTER_OTLP_HEADERS, OTEL_EXPORTER_OTLP_TRACES_HEADERS] {
        if let Some(value) = non_empty_var(var) {
            headers.extend(parse_header_string(&value));
        }
    }
    headers.extend(
        provided
            .into_iter()
            .map(|(key, value)| (key.trim().to_ascii_lowercase(), value)),
    );
    headers.retain(|key, _| !is_reserved_header(key));
    headers
}

// Set per line by the exporter itself.
fn is_reserved_header(key: &str) -> bool {
    key == "content-type" || key == "content-encoding"
}

fn parse_header_string(value: &str) -> impl Iterator<Item = (String, String)> + '_ {
    value
        .split_terminator(',')
        .map(str::trim)
        .filter_map(parse_header_key_value_string)
}

fn parse_header_key_value_string(key_value_string: &str) -> Option<(String, String)> {
    let (key, value) = key_value_string.split_once('=')?;
    let key = key.trim().to_ascii_lowercase();
    let value = value.trim();
    let value = percent_decode_str(value)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| value.to_string());
    (!key.is_empty() && !value.is_empty()).then_some((key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn run_env_test<T, F>(env_vars: T, f: F)
    where
        F: FnOnce(),
        T: Into<Vec<(&'static str, &'static str)>>,
    {
        temp_env::with_vars(
            env_vars
                .into()
                .iter()
                .map(|&(k, v)| (k, Some(v)))
                .collect::<Vec<(&'static str, Option<&'static str>)>>(),
            f,
        )
    }

    const ALL_VARS: [&str; 10] = [
        OTEL_EXPORTER_OTLP_ENDPOINT,
        OTEL_EXPORTER_OTLP_TRACES_ENDPOINT,
        OTEL_EXPORTER_OTLP_PROTOCOL,
        OTEL_EXPORTER_OTLP_TRACES_PROTOCOL,
        OTEL_EXPORTER_OTLP_COMPRESSION,
        OTEL_EXPORTER_OTLP_TRACES_COMPRESSION,
        OTEL_EXPORTER_OTLP_HEADERS,
        OTEL_EXPORTER_OTLP_TRACES_HEADERS,
        OTEL_SERVICE_NAME,
        AWS_LAMBDA_FUNCTION_NAME,
    ];

    #[test]
    fn test_protocol_from_str() {
        assert_eq!("http/protobuf".parse::<Protocol>().unwrap(), Protocol::HttpProtobuf);
        assert_eq!(" http/json ".parse::<Protocol>().unwrap(), Protocol::HttpJson);
        assert!(matches!(
            "grpc".parse::<Protocol>(),
            Err(OtlpStdoutError::UnsupportedProtocol(p)) if p == "grpc"
        ));
    }

    #[test]
    fn test_compression_from_str() {
        assert_eq!("gzip".parse::<Compression>().unwrap(), Compression::Gzip);
        assert_eq!("none".parse::<Compression>().unwrap(), Compression::None);
        assert!("zstd".parse::<Compression>().is_err());
    }

    #[test]
    fn test_defaults_without_env() {
        temp_env::with_vars_unset(ALL_VARS, || {
            assert_eq!(resolve_protocol(None), Protocol::HttpProtobuf);
            assert_eq!(resolve_compression(None), Compression::Gzip);
            assert_eq!(
                resolve_endpoint(None),
                OTEL_EXPORTER_OTLP_TRACES_ENDPOINT_DEFAULT
            );
            assert_eq!(resolve_source(None), None);
            assert!(resolve_headers(BTreeMap::new()).is_empty());
        });
    }

    #[test]
    fn test_signal_specific_env_wins() {
        run_env_test(
            vec![
                (OTEL_EXPORTER_OTLP_PROTOCOL, "http/protobuf"),
                (OTEL_EXPORTER_OTLP_TRACES_PROTOCOL, "http/json"),
                (OTEL_EXPORTER_OTLP_COMPRESSION, "gzip"),
                (OTEL_EXPORTER_OTLP_TRACES_COMPRESSION, "none"),
            ],
            || {
                assert_eq!(resolve_protocol(None), Protocol::HttpJson);
                assert_eq!(resolve_compression(None), Compression::None);
            },
        );
    }

    #[test]
    fn test_provided_value_wins_over_env() {
        run_env_test(vec![(OTEL_EXPORTER_OTLP_PROTOCOL, "http/json")], || {
            assert_eq!(
                resolve_protocol(Some(Protocol::HttpProtobuf)),
                Protocol::HttpProtobuf
            );
        });
    }

    #[test]
    fn test_invalid_env_falls_back_to_default() {
        run_env_test(
            vec![
                (OTEL_EXPORTER_OTLP_PROTOCOL, "grpc"),
                (OTEL_EXPORTER_OTLP_COMPRESSION, "zstd"),
            ],
            || {
                assert_eq!(resolve_protocol(None), Protocol::HttpProtobuf);
                assert_eq!(resolve_compression(None), Compression::Gzip);
            },
        );
    }

    #[test]
    fn test_append_signal_path_to_generic_endpoint() {
        temp_env::with_var_unset(OTEL_EXPORTER_OTLP_TRACES_ENDPOINT, || {
            run_env_test(
                vec![(OTEL_EXPORTER_OTLP_ENDPOINT, "https://collector:4318/")],
                || {
                    assert_eq!(
                        resolve_endpoint(None),
                        "https://collector:4318/v1/traces"
                    );
                },
            );
        });
    }

    #[test]
    fn test_traces_endpoint_used_verbatim() {
        run_env_test(
            vec![
                (OTEL_EXPORTER_OTLP_ENDPOINT, "https://generic:4318"),
                (OTEL_EXPORTER_OTLP_TRACES_ENDPOINT, "https://traces/custom"),
            ],
            || {
                assert_eq!(resolve_endpoint(None), "https://traces/custom");
            },
        );
    }

    #[test]
    fn test_source_prefers_service_name() {
        run_env_test(
            vec![
                (OTEL_SERVICE_NAME, "checkout"),
                (AWS_LAMBDA_FUNCTION_NAME, "checkout-fn"),
            ],
            || {
                assert_eq!(resolve_source(None).as_deref(), Some("checkout"));
            },
        );
        temp_env::with_var_unset(OTEL_SERVICE_NAME, || {
            run_env_test(vec![(AWS_LAMBDA_FUNCTION_NAME, "checkout-fn")], || {
                assert_eq!(resolve_source(None).as_deref(), Some("checkout-fn"));
            });
        });
    }

    #[test]
    fn test_headers_merge_and_filter() {
        run_env_test(
            vec![
                (
                    OTEL_EXPORTER_OTLP_HEADERS,
                    "Authorization=Basic%20abc, x-team=core, content-type=text/plain",
                ),
                (OTEL_EXPORTER_OTLP_TRACES_HEADERS, "x-team=traces,broken"),
            ],
            || {
                let headers = resolve_headers(BTreeMap::new());
                assert_eq!(headers.len(), 2);
                assert_eq!(headers["authorization"], "Basic abc");
                assert_eq!(headers["x-team"], "traces");
            },
        );
    }

    #[test]
    fn test_parse_header_key_value_string() {
        assert_eq!(
            parse_header_key_value_string("Key = Value"),
            Some(("key".to_string(), "Value".to_string()))
        );
        assert_eq!(parse_header_key_value_string("=value"), None);
        assert_eq!(parse_header_key_value_string("key="), None);
        assert_eq!(parse_header_key_value_string("novalue"), None);
        assert_eq!(
            parse_header_key_value_string("k=v%XX1"),
            Some(("k".to_string(), "v%XX1".to_string()))
        );
    }
}
