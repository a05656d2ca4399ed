use strum::IntoEnumIterator;

use super::*;

// ---------------------------------------------------------------------------
// Text form
// ---------------------------------------------------------------------------

#[test]
fn test_default_serializes_to_canonical_text() {
    assert_eq!(
        StretchSpec::default().serialize(),
        "88,1.0,88,99.0,NaN,2.0,44,25,600,120,0,NaN,1.0"
    );
}

#[test]
fn test_round_trip_every_field() {
    let spec = StretchSpec::new(
        BoundKind::Sigma,
        -2.0,
        BoundKind::Absolute,
        1234.5678,
        Algorithm::PowerLawGamma,
    )
    .with_gamma(2.2)
    .with_asinh_q(Some(8.5))
    .with_zscale(40, 1000, 200)
    .with_asinh_stretch(Some(0.00025))
    .with_scaling_k(3.75e-9);

    let parsed = StretchSpec::parse(&spec.serialize()).unwrap();
    assert_eq!(parsed, spec);
}

#[test]
fn test_round_trip_unset_fields() {
    let spec = StretchSpec::zscale(Algorithm::Asinh);
    let text = spec.serialize();
    assert!(text.contains(",NaN,"));
    let parsed = StretchSpec::parse(&text).unwrap();
    assert_eq!(parsed.asinh_q(), None);
    assert_eq!(parsed.asinh_stretch(), None);
    assert_eq!(parsed, spec);
}

#[test]
fn test_round_trip_bias_contrast() {
    let spec = StretchSpec::default().with_bias_contrast(0.3, 1.5);
    let text = spec.serialize();
    assert_eq!(text.split(',').count(), 15);
    assert_eq!(StretchSpec::parse(&text), Some(spec));
}

#[test]
fn test_round_trip_all_enums() {
    for algorithm in Algorithm::iter() {
        for kind in BoundKind::iter() {
            let spec = StretchSpec::new(kind, 5.0, kind, 95.0, algorithm);
            assert_eq!(StretchSpec::parse(&spec.serialize()), Some(spec));
        }
    }
}

#[test]
fn test_parse_legacy_form() {
    let spec = StretchSpec::parse("91,1.0,91,1.0,NaN,2.0,50,25,600,120").unwrap();
    assert_eq!(spec.lower_kind(), BoundKind::Zscale);
    assert_eq!(spec.algorithm(), Algorithm::Asinh);
    assert!(!spec.preserve_hue());
    assert_eq!(spec.asinh_stretch(), None);
    assert_eq!(spec.scaling_k(), 1.0);
}

#[test]
fn test_parse_trims_whitespace() {
    let spec = StretchSpec::parse(" 90, 0.0 ,90,200.0,NaN,2.0,44,25,600,120,0,NaN,1.0 ").unwrap();
    assert_eq!(spec.lower_kind(), BoundKind::Absolute);
    assert_eq!(spec.upper_value(), 200.0);
}

#[test]
fn test_parse_failures_yield_none() {
    assert_eq!(StretchSpec::parse(""), None);
    assert_eq!(StretchSpec::parse("88,1.0,88"), None);
    // Unknown bound kind.
    assert_eq!(
        StretchSpec::parse("87,1.0,88,99.0,NaN,2.0,44,25,600,120,0,NaN,1.0"),
        None
    );
    // Unknown algorithm.
    assert_eq!(
        StretchSpec::parse("88,1.0,88,99.0,NaN,2.0,99,25,600,120,0,NaN,1.0"),
        None
    );
    // Non-numeric token.
    assert_eq!(
        StretchSpec::parse("88,abc,88,99.0,NaN,2.0,44,25,600,120,0,NaN,1.0"),
        None
    );
    assert!(matches!(
        "garbage".parse::<StretchSpec>(),
        Err(Error::InvalidSpecText(_))
    ));
}

#[test]
fn test_parse_forces_asinh_for_hue() {
    let spec = StretchSpec::parse("88,1.0,88,99.0,NaN,2.0,44,25,600,120,1,NaN,1.0").unwrap();
    assert!(spec.preserve_hue());
    assert_eq!(spec.algorithm(), Algorithm::Asinh);
}

#[test]
fn test_java_double_format() {
    assert_eq!(format_double(1.0), "1.0");
    assert_eq!(format_double(-2.5), "-2.5");
    assert_eq!(format_double(0.001), "0.001");
    assert_eq!(format_double(1.0e-4), "1.0E-4");
    assert_eq!(format_double(2.5e-7), "2.5E-7");
    assert_eq!(format_double(1.0e7), "1.0E7");
    assert_eq!(format_double(1234567.0), "1234567.0");
    assert_eq!(format_double(f64::NAN), "NaN");
    assert_eq!(format_double(0.0), "0.0");
}

// ---------------------------------------------------------------------------
// Invariants and validation
// ---------------------------------------------------------------------------

#[test]
fn test_hue_preservation_forces_asinh() {
    let spec = StretchSpec::default()
        .with_preserve_hue(true)
        .with_algorithm(Algorithm::Log);
    assert_eq!(spec.algorithm(), Algorithm::Asinh);
    let spec = spec.with_preserve_hue(false).with_algorithm(Algorithm::Log);
    assert_eq!(spec.algorithm(), Algorithm::Log);
}

#[test]
fn test_zscale_params_use_percent_contrast() {
    let params = StretchSpec::default().with_zscale(50, 800, 100).zscale_params();
    assert_eq!(params.contrast, 0.5);
    assert_eq!(params.sample_size, 800);
    assert_eq!(params.samples_per_line, 100);
}

#[test]
fn test_validate_rejects_bad_gamma() {
    let spec = StretchSpec::default()
        .with_algorithm(Algorithm::PowerLawGamma)
        .with_gamma(f64::INFINITY);
    assert!(matches!(
        spec.validate(),
        Err(Error::InvalidParameter { name: "gamma", .. })
    ));
    // Gamma only matters to the gamma stretch.
    let spec = StretchSpec::default().with_gamma(f64::NAN);
    assert!(spec.validate().is_ok());
}

#[test]
fn test_validate_rejects_infinite_q() {
    let spec = StretchSpec::default()
        .with_algorithm(Algorithm::Asinh)
        .with_asinh_q(Some(f64::INFINITY));
    assert!(matches!(
        spec.validate(),
        Err(Error::InvalidParameter { name: "asinh Q", .. })
    ));
}

#[test]
fn test_validate_rejects_empty_zscale_sample() {
    let spec = StretchSpec::zscale(Algorithm::Linear).with_zscale(25, 0, 120);
    assert!(spec.validate().is_err());
}

#[test]
fn test_enum_names() {
    assert_eq!(Algorithm::PowerLawGamma.to_string(), "power_law_gamma");
    assert_eq!("log_log".parse::<Algorithm>().unwrap(), Algorithm::LogLog);
    assert_eq!(BoundKind::Zscale.to_string(), "zscale");
}
