use opentelemetry_exporter_registry::telemetry_config::{ProcessorKind, TelemetryConfig};

#[test]
fn test_telemetry_config_from_yaml_sample1() {
    let config = TelemetryConfig::from_yaml_file("tests/sample1.yaml").unwrap();

    // Validate resource attributes
    let resource = &config.resource;
    if let Some(service_name) = resource.get("service.name") {
        assert_eq!(service_name, "sample-service");
    } else {
        panic!("service.name not found in resource attributes");
    }

    if let Some(service_version) = resource.get("service.version") {
        assert_eq!(service_version, "1.0.0");
    } else {
        panic!("service.version not found in resource attributes");
    }

    // Validate traces configuration
    let traces_config = config.traces.expect("traces configuration");
    assert_eq!(traces_config.exporters, vec!["console"]);
    assert_eq!(traces_config.processor, ProcessorKind::Batch);
    assert!(!traces_config.set_global);
}

#[test]
fn test_telemetry_config_from_empty_yaml() {
    let yaml_str = r#""#;
    let config = TelemetryConfig::from_yaml(yaml_str).unwrap();

    assert!(config.traces.is_none());
    assert!(config.resource.is_empty());
}

#[test]
fn test_telemetry_config_missing_file() {
    let result = TelemetryConfig::from_yaml_file("tests/does_not_exist.yaml");
    assert!(result
        .unwrap_err()
        .to_string()
        .starts_with("failed to read telemetry configuration"));
}
