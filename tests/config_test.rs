//! Comprehensive unit tests for config.rs module

use std::fs;

use semi_atlas::config::{AppConfig, BackendConfig, DatabaseConfig, ExportConfig, PaginationConfig};
use semi_atlas::models::OutputFormat;
use tempfile::tempdir;

#[test]
fn test_default_config_values() {
    let config = AppConfig::default();

    assert_eq!(config.database.url, "sqlite:data/semi-atlas.db");
    assert_eq!(config.database.max_connections, 10);
    assert_eq!(config.database.connection_timeout_secs, 30);
    assert_eq!(config.database.busy_timeout_ms, 5000);
}

#[test]
fn test_default_logging_config() {
    let config = AppConfig::default();

    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.file_path, None);
    assert_eq!(config.logging.format, "text");
}

#[test]
fn test_default_export_and_pagination() {
    let config = AppConfig::default();

    assert_eq!(config.export.default_format, "csv");
    assert_eq!(config.export.output_directory, "./output");
    assert_eq!(config.export_format().unwrap(), OutputFormat::Csv);
    assert_eq!(config.pagination.default_page_size, 10);
    assert_eq!(config.pagination.max_page_size, 100);
}

#[test]
fn test_default_backend_is_sqlite() {
    let config = AppConfig::default();

    assert_eq!(config.backend.kind, "sqlite");
    assert!(!config.uses_rest_backend());
    assert_eq!(
        config.preferences_path().to_string_lossy(),
        "data/semiconductor-platform-storage.json"
    );
}

#[test]
fn test_validate_rejects_empty_database_url() {
    let config = AppConfig {
        database: DatabaseConfig {
            url: "  ".to_string(),
            ..DatabaseConfig::default()
        },
        ..AppConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_unknown_backend() {
    let config = AppConfig {
        backend: BackendConfig {
            kind: "mysql".to_string(),
            ..BackendConfig::default()
        },
        ..AppConfig::default()
    };
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("Invalid backend kind"));
}

#[test]
fn test_validate_rejects_non_http_rest_url() {
    let config = AppConfig {
        backend: BackendConfig {
            kind: "rest".to_string(),
            rest_url: Some("ftp://example.com".to_string()),
            api_key: Some("anon".to_string()),
            ..BackendConfig::default()
        },
        ..AppConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_bad_log_level_and_format() {
    let mut config = AppConfig::default();
    config.logging.level = "verbose".to_string();
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.logging.format = "xml".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_bad_export_format() {
    let config = AppConfig {
        export: ExportConfig {
            default_format: "txt".to_string(),
            ..ExportConfig::default()
        },
        ..AppConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_page_sizes() {
    let too_big_default = AppConfig {
        pagination: PaginationConfig {
            default_page_size: 200,
            max_page_size: 100,
        },
        ..AppConfig::default()
    };
    assert!(too_big_default.validate().is_err());

    let zero = AppConfig {
        pagination: PaginationConfig {
            default_page_size: 0,
            max_page_size: 100,
        },
        ..AppConfig::default()
    };
    assert!(zero.validate().is_err());
}

#[test]
fn test_load_from_layers_explicit_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("atlas.yaml");
    fs::write(
        &path,
        "database:\n  url: sqlite:/tmp/custom.db\npagination:\n  default_page_size: 25\nexport:\n  default_format: json\n",
    )
    .unwrap();

    let config = AppConfig::load_from(Some(&path)).unwrap();
    assert_eq!(config.database.url, "sqlite:/tmp/custom.db");
    assert_eq!(config.pagination.default_page_size, 25);
    assert_eq!(config.pagination.max_page_size, 100);
    assert_eq!(config.export_format().unwrap(), OutputFormat::Json);
}

#[test]
fn test_load_from_rejects_invalid_file_values() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("atlas.yaml");
    fs::write(&path, "logging:\n  level: loud\n").unwrap();

    assert!(AppConfig::load_from(Some(&path)).is_err());
}

#[test]
fn test_load_from_missing_explicit_file_fails() {
    let dir = tempdir().unwrap();
    assert!(AppConfig::load_from(Some(&dir.path().join("absent.yaml"))).is_err());
}

#[test]
fn test_yaml_rendering_contains_sections() {
    let yaml = AppConfig::default().to_yaml().unwrap();
    for section in ["database:", "backend:", "logging:", "export:", "pagination:", "ui:"] {
        assert!(yaml.contains(section), "missing {section}");
    }
}
