// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use fill_light::Config;
use fill_light::backends::camera::{CameraBackendType, SessionPreset};
use fill_light::session::SessionOptions;

#[test]
fn test_config_default() {
    // Test that default config can be created
    let config = Config::default();

    // Check sensible defaults
    assert!(
        config.mirror_preview,
        "Mirror preview should be enabled by default"
    );
    assert_eq!(config.backend, CameraBackendType::V4l2);
    assert_eq!(config.session_preset, SessionPreset::High);
    assert_eq!(config.photo_directory, None);
}

#[test]
fn test_partial_file_keeps_defaults() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("config.json");
    std::fs::write(
        &path,
        r#"{ "backend": "synthetic", "photo_directory": "/tmp/shots" }"#,
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.backend, CameraBackendType::Synthetic);
    assert_eq!(config.photo_directory(), std::path::PathBuf::from("/tmp/shots"));
    assert!(config.mirror_preview, "missing keys fall back to defaults");
    assert_eq!(config.jpeg_quality, Config::default().jpeg_quality);
}

#[test]
fn test_invalid_file_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(Config::load_from(&path).is_err());
    assert!(Config::load_from(&temp.path().join("missing.json")).is_err());
}

#[test]
fn test_session_options_from_config() {
    let config = Config {
        session_preset: SessionPreset::Photo,
        jpeg_quality: 0,
        ..Config::default()
    };

    let options = SessionOptions::from(&config);
    assert_eq!(options.preset, SessionPreset::Photo);
    assert_eq!(options.jpeg_quality, 1, "quality is clamped");
}

#[test]
fn test_default_photo_directory_is_app_specific() {
    let config = Config::default();
    assert!(config.photo_directory().ends_with("fill-light"));
}
