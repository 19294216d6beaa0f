//! Phase correlation for cycle-to-reference alignment.
//!
//! Translation is found by:
//! 1. Computing the 2D FFT of both (windowed, zero-padded) images
//! 2. Normalizing the cross-power spectrum to unit magnitude
//! 3. Locating the peak of its inverse FFT
//! 4. Optionally refining the peak to sub-pixel accuracy
//!
//! Rotation and scale are found the same way on log-polar resampled
//! magnitude spectra, where both become translations.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use common::Buffer2;
use glam::DVec2;
use rayon::prelude::*;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::interpolation::bilinear_or;
use crate::registration::config::{RegistrationConfig, SubpixelMethod};

/// Configuration for phase correlation.
#[derive(Debug, Clone)]
pub struct PhaseCorrelationConfig {
    /// Apply Hann window to reduce edge effects.
    pub use_windowing: bool,
    pub subpixel_method: SubpixelMethod,
    /// Minimum correlation peak value to accept.
    pub min_peak_value: f32,
}

impl Default for PhaseCorrelationConfig {
    fn default() -> Self {
        Self {
            use_windowing: true,
            subpixel_method: SubpixelMethod::Parabolic,
            min_peak_value: 0.05,
        }
    }
}

impl From<&RegistrationConfig> for PhaseCorrelationConfig {
    fn from(config: &RegistrationConfig) -> Self {
        Self {
            use_windowing: config.use_windowing,
            subpixel_method: config.subpixel,
            min_peak_value: config.min_peak_value,
        }
    }
}

/// Result of phase correlation.
#[derive(Debug, Clone)]
pub struct PhaseCorrelationResult {
    /// Displacement `d` such that `target(p + d) ≈ reference(p)`.
    pub translation: DVec2,
    /// Peak correlation value (0.0 - 1.0).
    pub peak_value: f64,
    /// Peak-to-sidelobe ratio mapped to [0, 1].
    pub confidence: f64,
}

/// Forward spectrum of a prepared image, reusable across many correlations.
pub struct Spectrum {
    data: Vec<Complex<f32>>,
}

/// Phase correlator for translation estimation between same-sized images.
pub struct PhaseCorrelator {
    config: PhaseCorrelationConfig,
    width: usize,
    height: usize,
    /// Square FFT side, power of two.
    fft_size: usize,
    forward_fft: Arc<dyn Fft<f32>>,
    inverse_fft: Arc<dyn Fft<f32>>,
    /// 1D Hann window, applied separably.
    window: Vec<f32>,
}

impl PhaseCorrelator {
    pub fn new(width: usize, height: usize, config: PhaseCorrelationConfig) -> Self {
        let fft_size = width.max(height).max(2).next_power_of_two();

        let mut planner = FftPlanner::new();
        let forward_fft = planner.plan_fft_forward(fft_size);
        let inverse_fft = planner.plan_fft_inverse(fft_size);

        let window = if config.use_windowing {
            hann_window(fft_size)
        } else {
            vec![1.0; fft_size]
        };

        Self {
            config,
            width,
            height,
            fft_size,
            forward_fft,
            inverse_fft,
            window,
        }
    }

    #[inline]
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Window, pad and transform `image`.
    pub fn spectrum(&self, image: &Buffer2<f32>) -> Spectrum {
        assert_eq!(
            image.dimensions(),
            (self.width, self.height),
            "image size does not match correlator"
        );
        let mut data = self.prepare_image(image);
        fft_2d(&self.forward_fft, &mut data, self.fft_size);
        Spectrum { data }
    }

    /// Estimate the translation of `target` relative to `reference`.
    ///
    /// Returns `None` when no correlation peak reaches `min_peak_value`
    /// (blank or unrelated images).
    pub fn correlate(
        &self,
        reference: &Buffer2<f32>,
        target: &Buffer2<f32>,
    ) -> Option<PhaseCorrelationResult> {
        let reference = self.spectrum(reference);
        self.correlate_with(&reference, target)
    }

    /// Like [`correlate`](Self::correlate) with a precomputed reference spectrum.
    pub fn correlate_with(
        &self,
        reference: &Spectrum,
        target: &Buffer2<f32>,
    ) -> Option<PhaseCorrelationResult> {
        let target = self.spectrum(target);
        let mut cross_power = cross_power_spectrum(&reference.data, &target.data);

        fft_2d(&self.inverse_fft, &mut cross_power, self.fft_size);
        let norm = 1.0 / (self.fft_size * self.fft_size) as f32;
        let correlation: Vec<f32> = cross_power.iter().map(|c| c.re * norm).collect();

        let (peak_x, peak_y, peak_val) = self.find_peak(&correlation);
        if peak_val.is_nan() || peak_val < self.config.min_peak_value as f64 {
            return None;
        }

        let n = self.fft_size as f64;
        let unwrap = |v: usize| {
            if v > self.fft_size / 2 {
                v as f64 - n
            } else {
                v as f64
            }
        };
        let coarse = DVec2::new(unwrap(peak_x), unwrap(peak_y));
        let refinement = self.subpixel_offset(&correlation, peak_x, peak_y);
        let confidence = self.compute_confidence(&correlation, peak_x, peak_y, peak_val);

        Some(PhaseCorrelationResult {
            translation: coarse + refinement,
            peak_value: peak_val,
            confidence,
        })
    }

    /// Pad to FFT size (content centred) and apply the window.
    fn prepare_image(&self, image: &Buffer2<f32>) -> Vec<Complex<f32>> {
        let n = self.fft_size;
        let mut padded = vec![Complex::new(0.0f32, 0.0); n * n];

        let offset_x = (n - self.width) / 2;
        let offset_y = (n - self.height) / 2;

        for y in 0..self.height {
            let wy = self.window[y + offset_y];
            let dst_row = &mut padded[(y + offset_y) * n..(y + offset_y + 1) * n];
            for (x, &v) in image.row(y).iter().enumerate() {
                let wx = self.window[x + offset_x];
                dst_row[x + offset_x] = Complex::new(v * wx * wy, 0.0);
            }
        }

        padded
    }

    fn find_peak(&self, correlation: &[f32]) -> (usize, usize, f64) {
        let n = self.fft_size;
        let (idx, &max_val) = correlation
            .iter()
            .enumerate()
            .fold((0, &f32::NEG_INFINITY), |best, cur| {
                if cur.1 > best.1 {
                    cur
                } else {
                    best
                }
            });
        (idx % n, idx / n, max_val as f64)
    }

    /// Sub-pixel correction to add to the integer peak position.
    fn subpixel_offset(&self, correlation: &[f32], peak_x: usize, peak_y: usize) -> DVec2 {
        let n = self.fft_size as isize;
        let at = |x: isize, y: isize| -> f32 {
            let xx = x.rem_euclid(n) as usize;
            let yy = y.rem_euclid(n) as usize;
            correlation[yy * n as usize + xx]
        };
        let px = peak_x as isize;
        let py = peak_y as isize;

        match self.config.subpixel_method {
            SubpixelMethod::None => DVec2::ZERO,
            SubpixelMethod::Parabolic => {
                let c = at(px, py);
                DVec2::new(
                    parabolic_vertex(at(px - 1, py), c, at(px + 1, py)),
                    parabolic_vertex(at(px, py - 1), c, at(px, py + 1)),
                )
            }
            SubpixelMethod::Gaussian => {
                let ln_at = |x, y| at(x, y).max(1e-10).ln();
                let c = ln_at(px, py);
                DVec2::new(
                    parabolic_vertex(ln_at(px - 1, py), c, ln_at(px + 1, py)),
                    parabolic_vertex(ln_at(px, py - 1), c, ln_at(px, py + 1)),
                )
            }
            SubpixelMethod::Centroid => {
                const RADIUS: isize = 2;
                let mut sum = DVec2::ZERO;
                let mut sum_w = 0.0f64;
                for oy in -RADIUS..=RADIUS {
                    for ox in -RADIUS..=RADIUS {
                        let w = at(px + ox, py + oy).max(0.0) as f64;
                        sum += DVec2::new(ox as f64, oy as f64) * w;
                        sum_w += w;
                    }
                }
                if sum_w > 1e-10 {
                    sum / sum_w
                } else {
                    DVec2::ZERO
                }
            }
        }
    }

    /// Ratio of the primary peak to the highest value at least `n / 8` away.
    fn compute_confidence(
        &self,
        correlation: &[f32],
        peak_x: usize,
        peak_y: usize,
        peak_val: f64,
    ) -> f64 {
        let n = self.fft_size;
        let min_dist = (n / 8).max(1);

        let mut second_peak = 0.0f32;
        for y in 0..n {
            let dy = peak_y.abs_diff(y);
            let dy = dy.min(n - dy);
            for x in 0..n {
                let dx = peak_x.abs_diff(x);
                let dx = dx.min(n - dx);
                if dx >= min_dist || dy >= min_dist {
                    second_peak = second_peak.max(correlation[y * n + x]);
                }
            }
        }

        if second_peak > 1e-10 {
            ((peak_val as f32 / second_peak).min(10.0) / 10.0) as f64
        } else {
            1.0
        }
    }
}

/// Vertex offset of the parabola through `(-1, l)`, `(0, c)`, `(1, r)`.
#[inline]
fn parabolic_vertex(l: f32, c: f32, r: f32) -> f64 {
    let denom = 2.0 * (l + r - 2.0 * c);
    if denom.abs() > 1e-10 {
        ((l - r) / denom) as f64
    } else {
        0.0
    }
}

/// Normalized cross-power spectrum `T * conj(R) / |T * conj(R)|`.
///
/// With this ordering the inverse transform peaks at `+d` when
/// `target(p + d) = reference(p)`.
fn cross_power_spectrum(
    reference: &[Complex<f32>],
    target: &[Complex<f32>],
) -> Vec<Complex<f32>> {
    reference
        .par_iter()
        .zip(target.par_iter())
        .map(|(&r, &t)| {
            let product = t * r.conj();
            let magnitude = product.norm();
            if magnitude > 1e-10 {
                product / magnitude
            } else {
                Complex::new(0.0, 0.0)
            }
        })
        .collect()
}

/// In-place 2D FFT by row-column decomposition.
fn fft_2d(fft: &Arc<dyn Fft<f32>>, data: &mut [Complex<f32>], n: usize) {
    data.par_chunks_mut(n).for_each(|row| fft.process(row));
    transpose_inplace(data, n);
    data.par_chunks_mut(n).for_each(|row| fft.process(row));
    transpose_inplace(data, n);
}

/// Compute 1D Hann window.
pub fn hann_window(size: usize) -> Vec<f32> {
    use std::f32::consts::PI;
    (0..size)
        .map(|i| {
            let x = i as f32 / size as f32;
            0.5 * (1.0 - (2.0 * PI * x).cos())
        })
        .collect()
}

/// In-place square matrix transpose.
pub fn transpose_inplace(data: &mut [Complex<f32>], n: usize) {
    for i in 0..n {
        for j in (i + 1)..n {
            data.swap(i * n + j, j * n + i);
        }
    }
}

// ============================================================================
// Rotation and scale
// ============================================================================

/// Rotation and scale of a target relative to a reference.
#[derive(Debug, Clone)]
pub struct RotationScale {
    /// Radians. Target content is the reference rotated by this angle.
    pub rotation: f64,
    /// Target content is the reference magnified by this factor.
    pub scale: f64,
    pub confidence: f64,
}

/// Log-polar phase correlation on magnitude spectra.
///
/// The magnitude spectrum ignores translation. In log-polar coordinates a
/// rotation becomes a shift along the angle axis (rows) and a scale change a
/// shift along the log-radius axis (columns).
pub struct LogPolarCorrelator {
    /// Side of the square log-polar image.
    size: usize,
    log_base: f64,
    min_radius: f64,
    max_radius: f64,
    spectrum_size: usize,
    spectrum_fft: Arc<dyn Fft<f32>>,
    spectrum_window: Vec<f32>,
    width: usize,
    height: usize,
    correlator: PhaseCorrelator,
}

impl LogPolarCorrelator {
    /// Correlator for `width x height` images.
    pub fn new(width: usize, height: usize, config: PhaseCorrelationConfig) -> Self {
        let spectrum_size = width.max(height).max(2).next_power_of_two();
        let size = spectrum_size.min(256);
        // Skip the DC neighbourhood
        let min_radius = 4.0f64.min(spectrum_size as f64 / 8.0).max(1.0);
        let max_radius = spectrum_size as f64 / 2.0;
        let log_base = (max_radius / min_radius).ln();

        let mut planner = FftPlanner::new();
        let spectrum_fft = planner.plan_fft_forward(spectrum_size);

        Self {
            size,
            log_base,
            min_radius,
            max_radius,
            spectrum_size,
            spectrum_fft,
            spectrum_window: hann_window(spectrum_size),
            width,
            height,
            correlator: PhaseCorrelator::new(size, size, config),
        }
    }

    pub fn estimate(
        &self,
        reference: &Buffer2<f32>,
        target: &Buffer2<f32>,
    ) -> Option<RotationScale> {
        let ref_lp = self.to_log_polar(&self.magnitude_spectrum(reference));
        let tar_lp = self.to_log_polar(&self.magnitude_spectrum(target));

        let result = self.correlator.correlate(&ref_lp, &tar_lp)?;
        let shift = result.translation;

        let rotation = shift.y * 2.0 * std::f64::consts::PI / self.size as f64;
        let scale = (-shift.x * self.log_base / self.size as f64)
            .exp()
            .clamp(0.5, 2.0);

        Some(RotationScale {
            rotation,
            scale,
            confidence: result.confidence,
        })
    }

    /// Log-compressed, centred magnitude spectrum.
    fn magnitude_spectrum(&self, image: &Buffer2<f32>) -> Buffer2<f32> {
        assert_eq!(image.dimensions(), (self.width, self.height));
        let n = self.spectrum_size;
        let offset_x = (n - self.width) / 2;
        let offset_y = (n - self.height) / 2;

        let mut data = vec![Complex::new(0.0f32, 0.0); n * n];
        for y in 0..self.height {
            let wy = self.spectrum_window[y + offset_y];
            for (x, &v) in image.row(y).iter().enumerate() {
                let wx = self.spectrum_window[x + offset_x];
                data[(y + offset_y) * n + x + offset_x] = Complex::new(v * wx * wy, 0.0);
            }
        }
        fft_2d(&self.spectrum_fft, &mut data, n);

        let mut magnitude = Buffer2::new_default(n, n);
        for y in 0..n {
            for x in 0..n {
                let sx = (x + n / 2) % n;
                let sy = (y + n / 2) % n;
                magnitude[(sx, sy)] = (1.0 + data[y * n + x].norm()).ln();
            }
        }
        magnitude
    }

    /// Resample a centred spectrum: rows are angles over `[0, 2π)`,
    /// columns are log-spaced radii.
    fn to_log_polar(&self, magnitude: &Buffer2<f32>) -> Buffer2<f32> {
        let center = DVec2::splat(self.spectrum_size as f64 / 2.0);
        let mut log_polar = Buffer2::new_default(self.size, self.size);

        for theta_idx in 0..self.size {
            let theta = theta_idx as f64 * 2.0 * std::f64::consts::PI / self.size as f64;
            let direction = DVec2::new(theta.cos(), theta.sin());
            for rho_idx in 0..self.size {
                let t = rho_idx as f64 / self.size as f64;
                let radius = self.min_radius * (t * self.log_base).exp();
                if radius <= self.max_radius {
                    log_polar[(rho_idx, theta_idx)] =
                        bilinear_or(magnitude, center + direction * radius, 0.0);
                }
            }
        }

        log_polar
    }
}
