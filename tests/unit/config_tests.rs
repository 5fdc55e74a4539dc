// Configuration module unit tests

use super::support::*;
use pagemark::config::WatermarkConfig;
use pagemark::pdf::EmbeddedImageBackend;
use pagemark::service::WatermarkService;
use std::io::Write;
use std::sync::Arc;

fn write_config(yaml: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(yaml.as_bytes())
        .expect("Failed to write config");
    file
}

#[test]
fn test_can_load_config_from_file() {
    let file = write_config(
        r#"
render:
  dpi: 200
  jpeg_quality: 75
style:
  opacity: 0.3
  margin: 20
  tile_spacing: 50
execution:
  parallel: true
  workers: 2
"#,
    );

    let config = WatermarkConfig::from_file(file.path()).expect("Failed to load config");
    assert_eq!(config.render.dpi, 200.0);
    assert_eq!(config.render.jpeg_quality, 75);
    assert_eq!(config.style.opacity, 0.3);
    assert_eq!(config.style.margin, 20.0);
    assert_eq!(config.style.tile_spacing, 50.0);
    assert_eq!(config.execution.workers, 2);
    config.validate().expect("valid config");
}

#[test]
fn test_missing_config_file_is_config_error() {
    let err = WatermarkConfig::from_file("/nonexistent/pagemark.yaml").unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_malformed_yaml_is_config_error() {
    let file = write_config("render: [not, a, map]");
    let err = WatermarkConfig::from_file(file.path()).unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_service_from_parallel_config() {
    let file = write_config(
        r#"
render:
  dpi: 150
execution:
  workers: 2
"#,
    );
    let config = WatermarkConfig::from_file(file.path()).expect("Failed to load config");

    let service = WatermarkService::from_config(
        &config,
        Arc::new(BlockPainter),
        Arc::new(EmbeddedImageBackend::new()),
    )
    .expect("Failed to build service");

    assert!(service.is_parallel());
    assert_eq!(service.dpi(), 150.0);
    let raster = service.image_watermarker().expect("image watermarker");
    assert_eq!(raster.opacity(), 0.5);
}

#[test]
fn test_service_from_sequential_config() {
    let config = WatermarkConfig::from_yaml_with_env("execution:\n  parallel: false\n")
        .expect("Failed to parse config");

    let service = WatermarkService::from_config(
        &config,
        Arc::new(BlockPainter),
        Arc::new(ShadedBackend::default()),
    )
    .expect("Failed to build service");
    assert!(!service.is_parallel());
}

#[test]
fn test_service_rejects_invalid_config() {
    let mut config = WatermarkConfig::default();
    config.render.dpi = 10_000.0;

    let err = WatermarkService::from_config(
        &config,
        Arc::new(BlockPainter),
        Arc::new(ShadedBackend::default()),
    )
    .unwrap_err();
    assert!(err.is_configuration());
}
