//! Tests for phase correlation module.

use super::*;
use crate::testing::{gaussian_spots, random_positions, shift_image};

fn spot_field(width: usize, height: usize, seed: u64) -> Buffer2<f32> {
    let centers = random_positions(width, height, 12, 10.0, 6.0, seed);
    gaussian_spots(width, height, &centers, 100.0, 1.5)
}

fn unwindowed() -> PhaseCorrelationConfig {
    PhaseCorrelationConfig {
        use_windowing: false,
        ..Default::default()
    }
}

#[test]
fn test_correlate_identical_images() {
    let reference = spot_field(64, 64, 1);
    let correlator = PhaseCorrelator::new(64, 64, PhaseCorrelationConfig::default());

    let result = correlator.correlate(&reference, &reference).unwrap();

    assert!(result.translation.length() < 1e-3, "{}", result.translation);
    assert!(result.peak_value > 0.5, "peak = {}", result.peak_value);
    assert!(result.confidence > 0.5, "confidence = {}", result.confidence);
}

#[test]
fn test_correlate_integer_shift_sign() {
    let reference = spot_field(64, 64, 2);
    // target(p + d) = reference(p)
    let target = shift_image(&reference, 3, -2);
    let correlator = PhaseCorrelator::new(64, 64, unwindowed());

    let result = correlator.correlate(&reference, &target).unwrap();

    assert!(
        result.translation.distance(DVec2::new(3.0, -2.0)) < 0.1,
        "got {}",
        result.translation
    );
}

#[test]
fn test_correlate_negative_shift_with_window() {
    let reference = spot_field(64, 64, 3);
    let target = shift_image(&reference, -4, 5);
    let correlator = PhaseCorrelator::new(64, 64, PhaseCorrelationConfig::default());

    let result = correlator.correlate(&reference, &target).unwrap();

    assert!(
        result.translation.distance(DVec2::new(-4.0, 5.0)) < 0.5,
        "got {}",
        result.translation
    );
}

#[test]
fn test_correlate_non_square_padded() {
    let reference = spot_field(80, 48, 4);
    let target = shift_image(&reference, 2, 1);
    let correlator = PhaseCorrelator::new(80, 48, unwindowed());
    assert_eq!(correlator.fft_size(), 128);

    let result = correlator.correlate(&reference, &target).unwrap();

    assert!(
        result.translation.distance(DVec2::new(2.0, 1.0)) < 0.1,
        "got {}",
        result.translation
    );
}

#[test]
fn test_reused_reference_spectrum() {
    let reference = spot_field(64, 64, 5);
    let correlator = PhaseCorrelator::new(64, 64, unwindowed());
    let spectrum = correlator.spectrum(&reference);

    for (dx, dy) in [(1, 0), (0, -3), (-2, 2)] {
        let target = shift_image(&reference, dx, dy);
        let result = correlator.correlate_with(&spectrum, &target).unwrap();
        assert!(
            result
                .translation
                .distance(DVec2::new(dx as f64, dy as f64))
                < 0.1,
            "({dx}, {dy}) -> {}",
            result.translation
        );
    }
}

#[test]
fn test_correlate_blank_image_has_no_peak() {
    let blank = Buffer2::new_default(32, 32);
    let correlator = PhaseCorrelator::new(32, 32, PhaseCorrelationConfig::default());
    assert!(correlator.correlate(&blank, &blank).is_none());
}

#[test]
#[should_panic(expected = "image size does not match correlator")]
fn test_correlate_size_mismatch() {
    let correlator = PhaseCorrelator::new(32, 32, PhaseCorrelationConfig::default());
    let image = Buffer2::new_default(16, 16);
    correlator.correlate(&image, &image);
}

#[test]
fn test_subpixel_methods_on_identical_images() {
    let reference = spot_field(64, 64, 6);
    for method in [
        SubpixelMethod::None,
        SubpixelMethod::Parabolic,
        SubpixelMethod::Gaussian,
        SubpixelMethod::Centroid,
    ] {
        let config = PhaseCorrelationConfig {
            subpixel_method: method,
            ..Default::default()
        };
        let correlator = PhaseCorrelator::new(64, 64, config);
        let result = correlator.correlate(&reference, &reference).unwrap();
        assert!(
            result.translation.length() < 0.05,
            "{method}: {}",
            result.translation
        );
    }
}

#[test]
fn test_parabolic_vertex() {
    assert_eq!(parabolic_vertex(1.0, 2.0, 1.0), 0.0);
    // samples of -(x - 0.25)^2 at -1, 0, 1
    let v = parabolic_vertex(-1.5625, -0.0625, -0.5625);
    assert!((v - 0.25).abs() < 1e-6);
    assert_eq!(parabolic_vertex(1.0, 1.0, 1.0), 0.0);
}

#[test]
fn test_hann_window() {
    let window = hann_window(8);
    assert_eq!(window.len(), 8);
    assert!(window[0].abs() < 1e-7);
    assert!((window[4] - 1.0).abs() < 1e-6);
    assert!((window[2] - window[6]).abs() < 1e-6);
}

#[test]
fn test_transpose_inplace() {
    let mut data: Vec<Complex<f32>> = (0..9).map(|i| Complex::new(i as f32, 0.0)).collect();
    transpose_inplace(&mut data, 3);
    let re: Vec<f32> = data.iter().map(|c| c.re).collect();
    assert_eq!(re, vec![0.0, 3.0, 6.0, 1.0, 4.0, 7.0, 2.0, 5.0, 8.0]);
}

// ============================================================================
// Rotation and scale
// ============================================================================

#[test]
fn test_log_polar_identical_images() {
    let reference = spot_field(128, 128, 7);
    let correlator = LogPolarCorrelator::new(128, 128, PhaseCorrelationConfig::default());

    let result = correlator.estimate(&reference, &reference).unwrap();

    assert!(result.rotation.abs() < 0.01, "rotation = {}", result.rotation);
    assert!((result.scale - 1.0).abs() < 0.01, "scale = {}", result.scale);
}

#[test]
fn test_log_polar_scale_estimation() {
    let center = DVec2::new(64.0, 64.0);
    let centers = random_positions(128, 128, 40, 16.0, 8.0, 13);
    let scaled: Vec<DVec2> = centers.iter().map(|&c| center + (c - center) * 1.05).collect();
    let reference = gaussian_spots(128, 128, &centers, 100.0, 1.2);
    let target = gaussian_spots(128, 128, &scaled, 100.0, 1.2);

    let correlator = LogPolarCorrelator::new(128, 128, PhaseCorrelationConfig::default());
    let result = correlator.estimate(&reference, &target).unwrap();

    assert!(
        (result.scale - 1.05).abs() < 0.02,
        "Expected scale ~1.05, got {}",
        result.scale
    );
    assert!(result.rotation.abs() < 0.02, "rotation = {}", result.rotation);
}
