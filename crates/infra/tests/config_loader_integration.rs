//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use std::io::Write;

use flaggate_domain::FlagError;
use flaggate_infra::config;
use tempfile::NamedTempFile;

fn write_config(content: &str, extension: &str) -> (NamedTempFile, std::path::PathBuf) {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file.write_all(content.as_bytes()).expect("Failed to write to temp file");

    let path = temp_file.path().with_extension(extension);
    std::fs::copy(temp_file.path(), &path).expect("Failed to copy file");
    (temp_file, path)
}

#[test]
fn test_load_config_from_json_file() {
    let json_content = r#"{
        "cache": {
            "ttl_seconds": 60,
            "store_timeout_ms": 500
        },
        "refresh": {
            "enabled": false,
            "timeout_seconds": 10
        },
        "database": {
            "path": "/tmp/flaggate_integration.db",
            "pool_size": 8
        }
    }"#;
    let (_temp, path) = write_config(json_content, "json");

    let config = config::load_from_file(Some(path.clone())).expect("valid JSON config");

    assert_eq!(config.cache.ttl_seconds, 60);
    assert_eq!(config.cache.store_timeout_ms, 500);
    assert!(!config.refresh.enabled);
    assert_eq!(config.refresh.timeout_seconds, 10);
    assert_eq!(config.database.path.as_deref(), Some("/tmp/flaggate_integration.db"));
    assert_eq!(config.database.pool_size, 8);

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_from_toml_file_with_defaults() {
    let toml_content = r#"
[cache]
ttl_seconds = 30
"#;
    let (_temp, path) = write_config(toml_content, "toml");

    let config = config::load_from_file(Some(path.clone())).expect("valid TOML config");

    assert_eq!(config.cache.ttl_seconds, 30);
    assert_eq!(config.cache.store_timeout_ms, 2_000);
    assert!(config.refresh.enabled);
    assert!(config.database.path.is_none());
    assert_eq!(config.database.pool_size, 4);

    std::fs::remove_file(path).ok();
}

#[test]
fn test_zero_ttl_in_file_is_rejected() {
    let (_temp, path) = write_config(r#"{ "cache": { "ttl_seconds": 0 } }"#, "json");

    let result = config::load_from_file(Some(path.clone()));
    assert!(matches!(result, Err(FlagError::Config(_))));

    std::fs::remove_file(path).ok();
}

#[test]
fn test_invalid_json_is_rejected() {
    let (_temp, path) = write_config(r#"{ "cache": "#, "json");

    let result = config::load_from_file(Some(path.clone()));
    assert!(matches!(result, Err(FlagError::Config(_))));

    std::fs::remove_file(path).ok();
}

#[test]
fn test_wrong_field_type_is_rejected() {
    let (_temp, path) = write_config("[refresh]\nenabled = \"sometimes\"\n", "toml");

    let result = config::load_from_file(Some(path.clone()));
    assert!(matches!(result, Err(FlagError::Config(_))));

    std::fs::remove_file(path).ok();
}
