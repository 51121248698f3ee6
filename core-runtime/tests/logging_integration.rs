//! Integration tests for logging and configuration

use core_runtime::config::FileApiOptions;
use core_runtime::logging::{init_logging, LogFormat, LogLevel, LoggingConfig};

#[test]
fn test_logging_initialization_once() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug);

    // Only the first subscriber in a process can become the global default.
    assert!(init_logging(config.clone()).is_ok());
    assert!(init_logging(config).is_err());

    tracing::debug!(target: "core_fileapi", "logging is live");
}

#[test]
fn test_options_round_trip_through_json() {
    let options = FileApiOptions::builder()
        .base_path("./wwwroot/")
        .script_path("lib/fileapi.js")
        .build()
        .unwrap();

    let json = serde_json::to_string(&options).unwrap();
    assert!(json.contains("\"basePath\""));

    let parsed = FileApiOptions::from_json(&json).unwrap();
    assert_eq!(parsed, options);
    assert_eq!(parsed.full_script_path(), "./wwwroot/lib/fileapi.js");
}
