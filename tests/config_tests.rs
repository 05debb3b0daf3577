// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use qr_reader::Config;
use qr_reader::backends::camera::LensFacing;
use qr_reader::errors::AppError;
use qr_reader::permission::PermissionBackend;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.lens_facing, LensFacing::Front, "Front lens by default");
    assert_eq!(config.permission, PermissionBackend::Portal);
    assert!(config.device.is_none());
    assert!(config.max_decode_dimension > 0);
}

#[test]
fn test_missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_partial_file_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "lens_facing": "back", "device": "USB" }"#).unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.lens_facing, LensFacing::Back);
    assert_eq!(config.device.as_deref(), Some("USB"));
    assert_eq!(
        config.max_decode_dimension,
        Config::default().max_decode_dimension
    );
}

#[test]
fn test_malformed_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(matches!(Config::load_from(&path), Err(AppError::Config(_))));
}

#[test]
fn test_save_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");
    let config = Config {
        permission: PermissionBackend::Device,
        max_decode_dimension: 0,
        ..Config::default()
    };

    config.save_to(&path).unwrap();
    assert_eq!(Config::load_from(&path).unwrap(), config);
}
