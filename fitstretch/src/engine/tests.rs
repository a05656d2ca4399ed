use super::*;
use crate::error::Error;
use crate::range_values::BoundKind;

fn band_of(width: usize, height: usize, pixels: Vec<f32>) -> ImageBand {
    let pixels = PixelBuffer::new(width, height, pixels).unwrap();
    ImageBand::new(pixels, HeaderFacts::default())
}

fn ramp(width: usize, height: usize) -> ImageBand {
    band_of(width, height, (0..width * height).map(|i| i as f32).collect())
}

fn absolute(low: f64, high: f64, algorithm: Algorithm) -> StretchSpec {
    StretchSpec::new(BoundKind::Absolute, low, BoundKind::Absolute, high, algorithm)
}

fn stretch_all(image: &ImageBand, spec: &StretchSpec, blank: u8) -> (Vec<u8>, StretchSpec) {
    let region = image.pixels.full_region();
    let mut out = vec![0u8; region.len()];
    let resolved = stretch(&image.band(), &region, spec, blank, &mut out).unwrap();
    (out, resolved)
}

// ----------------------------------------------------------------------------
// Linear
// ----------------------------------------------------------------------------

#[test]
fn test_uniform_image_maps_to_mid_level() {
    let image = band_of(4, 4, vec![100.0; 16]);
    let (out, _) = stretch_all(
        &image,
        &absolute(0.0, 200.0, Algorithm::Linear),
        BLANK_SINGLE_BAND,
    );
    assert!(out.iter().all(|&v| v == 127), "{:?}", out);
}

#[test]
fn test_linear_monotone_with_endpoints() {
    let image = ramp(10, 10);
    let (out, _) = stretch_all(
        &image,
        &absolute(0.0, 99.0, Algorithm::Linear),
        BLANK_SINGLE_BAND,
    );
    assert_eq!(out[0], 0);
    assert_eq!(out[99], 254);
    assert!(out.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_linear_clamps_outside_bounds() {
    let image = band_of(3, 1, vec![-50.0, 25.0, 500.0]);
    let (out, _) = stretch_all(
        &image,
        &absolute(0.0, 100.0, Algorithm::Linear),
        BLANK_SINGLE_BAND,
    );
    assert_eq!(out, vec![0, 64, 254]);
}

#[test]
fn test_percentile_default_covers_full_range() {
    let image = ramp(100, 100);
    let (out, resolved) = stretch_all(&image, &StretchSpec::default(), BLANK_SINGLE_BAND);
    assert_eq!(out[0], 0);
    assert_eq!(out[9999], 254);
    assert_eq!(resolved, StretchSpec::default());
}

#[test]
fn test_blank_sentinel_does_not_skew_percentiles() {
    // 50 data samples 0..49 interleaved with 50 blanks far below them.
    let pixels: Vec<f32> = (0..100)
        .map(|i| if i % 2 == 0 { (i / 2) as f32 } else { -1000.0 })
        .collect();
    let pixels = PixelBuffer::new(10, 10, pixels).unwrap();
    let image = ImageBand::new(pixels, HeaderFacts::default().with_blank(-1000.0));
    let spec = StretchSpec::new(
        BoundKind::Percentage,
        1.0,
        BoundKind::Percentage,
        99.0,
        Algorithm::Linear,
    );

    let bounds = resolve_bounds(&image.band(), &spec).unwrap();
    assert!(bounds.low >= 0.0, "low {}", bounds.low);

    let (out, _) = stretch_all(&image, &spec, BLANK_SINGLE_BAND);
    assert_eq!(out[1], BLANK_SINGLE_BAND);
    assert!(out[0] < 10, "first data level {}", out[0]);
    assert!(out[98] > 240, "last data level {}", out[98]);
}

#[test]
fn test_absolute_bounds_use_scaling() {
    let pixels = PixelBuffer::new(2, 1, vec![0.0, 10.0]).unwrap();
    let header = HeaderFacts::default().with_scaling(2.0, 100.0);
    let image = ImageBand::new(pixels, header);
    // Physical 100..120 is stored 0..10.
    let (out, _) = stretch_all(
        &image,
        &absolute(100.0, 120.0, Algorithm::Linear),
        BLANK_SINGLE_BAND,
    );
    assert_eq!(out, vec![0, 254]);
}

// ----------------------------------------------------------------------------
// Blanks and validation
// ----------------------------------------------------------------------------

#[test]
fn test_blank_pixels_get_sentinel() {
    let pixels = PixelBuffer::new(4, 1, vec![f32::NAN, -999.0, 10.0, 20.0]).unwrap();
    let header = HeaderFacts::default().with_blank(-999.0);
    let image = ImageBand::new(pixels, header);
    let spec = absolute(0.0, 20.0, Algorithm::Linear);

    let (out, _) = stretch_all(&image, &spec, BLANK_SINGLE_BAND);
    assert_eq!(out, vec![255, 255, 127, 254]);

    let (out, _) = stretch_all(&image, &spec, BLANK_THREE_COLOR);
    assert_eq!(&out[..2], &[0, 0]);
}

#[test]
fn test_output_size_mismatch_leaves_output_untouched() {
    let image = ramp(4, 4);
    let mut out = vec![7u8; 15];
    let result = stretch(
        &image.band(),
        &image.pixels.full_region(),
        &StretchSpec::default(),
        BLANK_SINGLE_BAND,
        &mut out,
    );
    assert!(matches!(
        result,
        Err(Error::OutputSizeMismatch {
            expected: 16,
            actual: 15
        })
    ));
    assert!(out.iter().all(|&v| v == 7));
}

#[test]
fn test_invalid_gamma_rejected_before_write() {
    let image = ramp(4, 4);
    let spec = absolute(0.0, 15.0, Algorithm::PowerLawGamma).with_gamma(0.0);
    let mut out = vec![7u8; 16];
    let result = stretch(
        &image.band(),
        &image.pixels.full_region(),
        &spec,
        BLANK_SINGLE_BAND,
        &mut out,
    );
    assert!(matches!(
        result,
        Err(Error::InvalidParameter { name: "gamma", .. })
    ));
    assert!(out.iter().all(|&v| v == 7));
}

#[test]
fn test_region_out_of_bounds() {
    let image = ramp(4, 4);
    let region = Region::new(2, 2, 3, 2);
    let mut out = vec![0u8; region.len()];
    let result = stretch(
        &image.band(),
        &region,
        &StretchSpec::default(),
        BLANK_SINGLE_BAND,
        &mut out,
    );
    assert!(matches!(result, Err(Error::RegionOutOfBounds { .. })));
}

#[test]
fn test_sub_region_matches_full_stretch() {
    let image = ramp(8, 6);
    let spec = absolute(0.0, 47.0, Algorithm::Sqrt);
    let (full, _) = stretch_all(&image, &spec, BLANK_SINGLE_BAND);

    let region = Region::new(3, 2, 4, 3);
    let mut out = vec![0u8; region.len()];
    stretch(&image.band(), &region, &spec, BLANK_SINGLE_BAND, &mut out).unwrap();
    for row in 0..3 {
        for col in 0..4 {
            let expected = full[(row + 2) * 8 + col + 3];
            assert_eq!(out[row * 4 + col], expected);
        }
    }
}

// ----------------------------------------------------------------------------
// Non-linear algorithms
// ----------------------------------------------------------------------------

#[test]
fn test_every_algorithm_is_monotone_and_in_range() {
    let image = ramp(32, 32);
    for algorithm in [
        Algorithm::Linear,
        Algorithm::Log,
        Algorithm::LogLog,
        Algorithm::Equalize,
        Algorithm::Squared,
        Algorithm::Sqrt,
        Algorithm::Asinh,
        Algorithm::PowerLawGamma,
    ] {
        let spec = absolute(0.0, 1023.0, algorithm);
        let (out, _) = stretch_all(&image, &spec, BLANK_SINGLE_BAND);
        assert!(
            out.windows(2).all(|w| w[0] <= w[1]),
            "{} not monotone",
            algorithm
        );
        assert!(out.iter().all(|&v| v <= 254), "{} out of range", algorithm);
        assert_eq!(out[0], 0, "{} low end", algorithm);
        assert!(out[1023] >= 250, "{} high end {}", algorithm, out[1023]);
    }
}

#[test]
fn test_log_and_sqrt_brighten_low_values() {
    let image = ramp(10, 10);
    let (linear, _) = stretch_all(
        &image,
        &absolute(0.0, 99.0, Algorithm::Linear),
        BLANK_SINGLE_BAND,
    );
    let (log, _) = stretch_all(
        &image,
        &absolute(0.0, 99.0, Algorithm::Log),
        BLANK_SINGLE_BAND,
    );
    let (sqrt, _) = stretch_all(
        &image,
        &absolute(0.0, 99.0, Algorithm::Sqrt),
        BLANK_SINGLE_BAND,
    );
    let (squared, _) = stretch_all(
        &image,
        &absolute(0.0, 99.0, Algorithm::Squared),
        BLANK_SINGLE_BAND,
    );
    assert!(log[10] > linear[10]);
    assert!(sqrt[10] > linear[10]);
    assert!(squared[10] < linear[10]);
}

#[test]
fn test_power_law_gamma_one_is_truncated_linear() {
    let image = band_of(3, 1, vec![0.0, 50.0, 100.0]);
    let spec = absolute(0.0, 100.0, Algorithm::PowerLawGamma).with_gamma(1.0);
    let (out, _) = stretch_all(&image, &spec, BLANK_SINGLE_BAND);
    assert_eq!(out, vec![0, 127, 254]);
}

#[test]
fn test_reversed_bounds_invert_linear() {
    let image = band_of(3, 1, vec![0.0, 50.0, 100.0]);
    let (out, _) = stretch_all(
        &image,
        &absolute(100.0, 0.0, Algorithm::Linear),
        BLANK_SINGLE_BAND,
    );
    assert_eq!(out, vec![254, 127, 0]);
}

#[test]
fn test_equal_bounds_do_not_divide_by_zero() {
    let image = band_of(3, 1, vec![4.0, 5.0, 6.0]);
    let (out, _) = stretch_all(
        &image,
        &absolute(5.0, 5.0, Algorithm::Linear),
        BLANK_SINGLE_BAND,
    );
    assert_eq!(out, vec![0, 0, 254]);
}

// ----------------------------------------------------------------------------
// Asinh and resolved specs
// ----------------------------------------------------------------------------

#[test]
fn test_asinh_resolves_q() {
    let image = ramp(16, 16);
    let spec = absolute(0.0, 255.0, Algorithm::Asinh);
    assert_eq!(spec.asinh_q(), None);
    let (_, resolved) = stretch_all(&image, &spec, BLANK_SINGLE_BAND);
    let q = resolved.asinh_q().unwrap();
    assert!((0.1..=12.0).contains(&q));
}

#[test]
fn test_explicit_q_is_kept() {
    let image = ramp(16, 16);
    let spec = absolute(0.0, 255.0, Algorithm::Asinh).with_asinh_q(Some(4.0));
    let (_, resolved) = stretch_all(&image, &spec, BLANK_SINGLE_BAND);
    assert_eq!(resolved.asinh_q(), Some(4.0));
}

#[test]
fn test_explicit_q_outside_clamp_is_reported_as_given() {
    let image = ramp(16, 16);
    for q in [1e-12, 1e12] {
        let spec = absolute(0.0, 255.0, Algorithm::Asinh).with_asinh_q(Some(q));
        let (first, resolved) = stretch_all(&image, &spec, BLANK_SINGLE_BAND);
        assert_eq!(resolved.asinh_q(), Some(q));
        let (second, _) = stretch_all(&image, &resolved, BLANK_SINGLE_BAND);
        assert_eq!(first, second);
    }
}

#[test]
fn test_stretch_is_idempotent() {
    let image = ramp(16, 16);
    for spec in [
        StretchSpec::default(),
        absolute(0.0, 255.0, Algorithm::Asinh),
        StretchSpec::zscale(Algorithm::Log),
    ] {
        let (first, resolved) = stretch_all(&image, &spec, BLANK_SINGLE_BAND);
        let (second, resolved_again) = stretch_all(&image, &resolved, BLANK_SINGLE_BAND);
        assert_eq!(first, second);
        assert_eq!(resolved, resolved_again);
    }
}

// ----------------------------------------------------------------------------
// Zscale bounds
// ----------------------------------------------------------------------------

#[test]
fn test_zscale_single_row_falls_back_to_extremes() {
    let image = ramp(10, 1);
    let (out, _) = stretch_all(
        &image,
        &StretchSpec::zscale(Algorithm::Linear),
        BLANK_SINGLE_BAND,
    );
    assert_eq!(out[0], 0);
    assert_eq!(out[9], 254);
}

#[test]
fn test_zscale_bounds_lie_within_data() {
    let image = ramp(20, 20);
    let bounds = resolve_bounds(&image.band(), &StretchSpec::zscale(Algorithm::Linear)).unwrap();
    assert!(bounds.low >= 0.0);
    assert!(bounds.high <= 399.0);
    assert!(bounds.low <= bounds.high);
}

#[test]
fn test_lower_bound_matches_resolved_low() {
    let image = ramp(20, 20);
    let spec = StretchSpec::new(
        BoundKind::Sigma,
        -2.0,
        BoundKind::Percentage,
        95.0,
        Algorithm::Linear,
    );
    let bounds = resolve_bounds(&image.band(), &spec).unwrap();
    assert_eq!(lower_bound(&image.band(), &spec).unwrap(), bounds.low);
}

// ----------------------------------------------------------------------------
// Bias and contrast
// ----------------------------------------------------------------------------

#[test]
fn test_zero_contrast_flattens_to_mid_level() {
    let image = ramp(10, 10);
    let spec = absolute(0.0, 99.0, Algorithm::Linear).with_bias_contrast(0.5, 0.0);
    let (out, _) = stretch_all(&image, &spec, BLANK_SINGLE_BAND);
    assert!(out.iter().all(|&v| v == 127));
}

#[test]
fn test_low_bias_brightens() {
    let image = ramp(10, 10);
    let spec = absolute(0.0, 99.0, Algorithm::Linear).with_bias_contrast(0.0, 1.0);
    let (out, _) = stretch_all(&image, &spec, BLANK_SINGLE_BAND);
    assert!(out.iter().all(|&v| v == 254));
}

#[test]
fn test_bias_contrast_keeps_blank_sentinel() {
    let image = band_of(2, 1, vec![f32::NAN, 5.0]);
    let spec = absolute(0.0, 10.0, Algorithm::Linear).with_bias_contrast(0.3, 2.0);
    let (out, _) = stretch_all(&image, &spec, BLANK_SINGLE_BAND);
    assert_eq!(out[0], BLANK_SINGLE_BAND);
}

// ----------------------------------------------------------------------------
// Histogram colors
// ----------------------------------------------------------------------------

#[test]
fn test_hist_colors_linear() {
    let image = ramp(64, 64);
    let spec = absolute(0.0, 4095.0, Algorithm::Linear);
    let colors = hist_colors(&image.band(), &spec).unwrap();
    assert_eq!(colors.len(), HIST_SIZE);
    assert_eq!(colors[0], 0);
    assert!(colors.windows(2).all(|w| w[0] <= w[1]));
    assert!(colors[HIST_SIZE - 1] >= 253);
}

// ----------------------------------------------------------------------------
// Masks
// ----------------------------------------------------------------------------

#[test]
fn test_mask_first_matching_bit() {
    let pixels = PixelBuffer::new(4, 1, vec![1.0, 2.0, 4.0, f32::NAN]).unwrap();
    let masks = ImageMask::from_bits(0b111, [255, 0, 0]);
    let mut out = vec![0u8; 4];
    let counts = stretch_mask(&pixels, &pixels.full_region(), &masks, 255, &mut out).unwrap();
    assert_eq!(out, vec![0, 1, 2, 255]);
    assert_eq!(counts, vec![1, 1, 1, 0]);
}

#[test]
fn test_mask_code_without_listed_bit_gets_no_match_index() {
    let pixels = PixelBuffer::new(3, 1, vec![1.0, 2.0, 4.0]).unwrap();
    let masks = vec![
        ImageMask::new(0, [255, 0, 0]).unwrap(),
        ImageMask::new(1, [0, 255, 0]).unwrap(),
    ];
    let mut out = vec![0u8; 3];
    let counts = stretch_mask(&pixels, &pixels.full_region(), &masks, 255, &mut out).unwrap();
    assert_eq!(out, vec![0, 1, 2]);
    assert_eq!(counts, vec![1, 1, 1]);
}

#[test]
fn test_mask_unmatched_is_transparent() {
    let pixels = PixelBuffer::new(3, 1, vec![0.0, 8.0, 3.9]).unwrap();
    let masks = vec![
        ImageMask::new(1, [0, 255, 0]).unwrap(),
        ImageMask::new(0, [0, 0, 255]).unwrap(),
    ];
    let mut out = vec![0u8; 3];
    stretch_mask(&pixels, &pixels.full_region(), &masks, 255, &mut out).unwrap();
    // 3.9 truncates to 3: bit 1 is listed first.
    assert_eq!(out, vec![2, 2, 0]);
}

#[test]
fn test_mask_limits() {
    assert!(matches!(ImageMask::new(64, [0; 3]), Err(Error::InvalidMaskBit(64))));

    let pixels = PixelBuffer::new(1, 1, vec![1.0]).unwrap();
    let masks = vec![ImageMask::new(0, [0; 3]).unwrap(); 256];
    let mut out = vec![0u8; 1];
    let result = stretch_mask(&pixels, &pixels.full_region(), &masks, 255, &mut out);
    assert!(matches!(result, Err(Error::TooManyMasks(256))));
}
