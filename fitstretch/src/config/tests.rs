use super::*;
use crate::range_values::{Algorithm, BoundKind};

#[test]
fn test_empty_document_gives_defaults() {
    let config = EngineConfig::from_yaml_str("{}").unwrap();
    assert_eq!(config, EngineConfig::default());
    assert_eq!(config.tile_size, DEFAULT_TILE_SIZE);
    assert_eq!(config.log_level, "info");
}

#[test]
fn test_full_document() {
    let yaml = r#"
tile_size: 512
decimation: half_full
flip_vertical: true
default_stretch: "91,1.0,91,1.0,NaN,2.0,45,25,600,120,0,NaN,1.0"
log_level: debug
"#;
    let config = EngineConfig::from_yaml_str(yaml).unwrap();
    assert_eq!(config.tile_size, 512);
    assert_eq!(config.decimation, Decimation::HalfFull);
    assert!(config.flip_vertical);
    assert_eq!(config.default_stretch, StretchSpec::zscale(Algorithm::Log));
    assert_eq!(config.log_level, "debug");

    let options = config.tile_options();
    assert_eq!(options.tile_size, 512);
    assert!(options.flip_vertical);
}

#[test]
fn test_yaml_round_trip() {
    let config = EngineConfig {
        tile_size: 256,
        decimation: Decimation::QuarterHalf,
        default_stretch: StretchSpec::new(
            BoundKind::Sigma,
            -2.0,
            BoundKind::Sigma,
            10.0,
            Algorithm::Sqrt,
        )
        .with_bias_contrast(0.4, 1.5),
        ..EngineConfig::default()
    };
    let yaml = config.to_yaml_string().unwrap();
    assert_eq!(EngineConfig::from_yaml_str(&yaml).unwrap(), config);
}

#[test]
fn test_zero_tile_size_rejected() {
    assert!(matches!(
        EngineConfig::from_yaml_str("tile_size: 0"),
        Err(Error::Config(_))
    ));
}

#[test]
fn test_bad_stretch_text_rejected() {
    assert!(matches!(
        EngineConfig::from_yaml_str("default_stretch: \"88,1.0\""),
        Err(Error::Config(_))
    ));
}

#[test]
fn test_spec_or_default() {
    let config = EngineConfig {
        default_stretch: StretchSpec::zscale(Algorithm::Linear),
        ..EngineConfig::default()
    };
    assert_eq!(
        config.spec_or_default(None),
        StretchSpec::zscale(Algorithm::Linear)
    );
    let explicit = StretchSpec::default();
    assert_eq!(config.spec_or_default(Some(&explicit)), explicit);
}

#[test]
fn test_load_missing_file() {
    assert!(matches!(
        EngineConfig::load("/nonexistent/fitstretch.yaml"),
        Err(Error::Io(_))
    ));
}
