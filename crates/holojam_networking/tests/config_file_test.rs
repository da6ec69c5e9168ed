//! Configuration files on disk.

use std::io::Write;
use std::time::Duration;

use holojam_networking::{ConfigError, TelemetryConfig, TelemetryOrchestrator, Worker};

#[test]
fn test_load_file_and_build_node() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
staleness_timeout_ms = 250

[send]
collector = "127.0.0.1:17615"
source = "stage-left"
low_water = 5

[[receive]]
name = "props"
port = 17611

[[receive]]
name = "phones"
port = 17612
low_water = 10
"#
    )
    .unwrap();

    let config = TelemetryConfig::from_file(file.path()).unwrap();
    assert_eq!(config.staleness_timeout(), Duration::from_millis(250));
    assert_eq!(config.send.source, "stage-left");

    let node = TelemetryOrchestrator::new(config);
    let names: Vec<&str> = node.receivers().iter().map(|r| r.name()).collect();
    assert_eq!(names, ["props", "phones"]);
    assert_eq!(node.receivers()[1].channel().low_water, 10);
    assert_eq!(node.sender().collector().port(), 17615);
}

#[test]
fn test_missing_file_is_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = TelemetryConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn test_invalid_file_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[[receive]]\nname = \"a\"\nport = 0").unwrap();
    let err = TelemetryConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}
