//! Spot detection on the reference-frame detection composite.
//!
//! Pipeline:
//! 1. A box mean estimates local background, which is subtracted
//! 2. Gaussian smoothing of the residual suppresses pixel noise; the residual
//!    is zero-padded so spots touching the border stay centred
//! 3. The MAD of the smoothed residual gives the noise sigma
//! 4. Pixels above `threshold_sigma * noise` that are not exceeded by any
//!    8-neighbour become candidates
//! 5. Greedy non-maximum suppression keeps the brightest candidate within
//!    `min_separation`, equal intensities resolved in scan order
//! 6. Survivors are refined to sub-pixel positions and returned in scan order

pub mod config;


use common::Buffer2;
use glam::DVec2;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::filter::{box_mean, gaussian_blur_with, Edges};
use crate::math::{mad_to_sigma, median_and_mad_f32_mut};

pub use config::DetectionConfig;

/// A candidate basecalling site in the reference frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spot {
    /// Sub-pixel position.
    pub position: DVec2,
    /// Integer peak pixel.
    pub peak: (usize, usize),
    /// Smoothed background-subtracted intensity at the peak.
    pub strength: f32,
    /// `strength` in units of the image noise sigma. 0 on noise-free images.
    pub snr: f32,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    x: usize,
    y: usize,
    /// Smoothed residual.
    value: f32,
    background: f32,
}

/// Finds spots on a single image.
#[derive(Debug, Clone)]
pub struct SpotDetector {
    config: DetectionConfig,
}

impl SpotDetector {
    pub fn new(config: DetectionConfig) -> Self {
        config.validate();
        Self { config }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Detect spots. An image without signal yields an empty vector.
    pub fn detect(&self, image: &Buffer2<f32>) -> Vec<Spot> {
        if image.is_empty() {
            return Vec::new();
        }

        let background = box_mean(image, self.config.background_radius);
        let residual = Buffer2::new(
            image.width(),
            image.height(),
            image
                .pixels()
                .iter()
                .zip(background.pixels())
                .map(|(&v, &b)| v - b)
                .collect(),
        );
        let smoothed = gaussian_blur_with(&residual, self.config.smoothing_sigma, Edges::Zero);
        drop(residual);
        let noise = noise_sigma(&smoothed);
        debug!("Detection noise sigma {noise:.4}");

        let candidates = self.find_candidates(&smoothed, &background, noise);
        let candidate_count = candidates.len();
        let mut accepted = self.suppress(candidates, smoothed.width(), smoothed.height());

        // Scan order of the peak pixel
        accepted.sort_by_key(|c| (c.y, c.x));

        let spots: Vec<Spot> = accepted
            .iter()
            .map(|c| {
                let position = if self.config.refine_centroid {
                    refine_centroid(image, c)
                } else {
                    DVec2::new(c.x as f64, c.y as f64)
                };
                Spot {
                    position,
                    peak: (c.x, c.y),
                    strength: c.value,
                    snr: if noise > 0.0 { c.value / noise } else { 0.0 },
                }
            })
            .collect();

        info!(
            "Detected {} spots ({} candidates before suppression)",
            spots.len(),
            candidate_count
        );
        spots
    }

    /// Thresholded 8-connected local maxima, in scan order.
    fn find_candidates(
        &self,
        smoothed: &Buffer2<f32>,
        background: &Buffer2<f32>,
        noise: f32,
    ) -> Vec<Candidate> {
        let (width, height) = smoothed.dimensions();
        let margin = self.config.edge_margin;
        if width <= 2 * margin || height <= 2 * margin {
            return Vec::new();
        }
        let k_sigma = self.config.threshold_sigma * noise;
        let min_intensity = self.config.min_intensity;

        (margin..height - margin)
            .into_par_iter()
            .flat_map_iter(|y| {
                (margin..width - margin).filter_map(move |x| {
                    let value = smoothed[(x, y)];
                    let bg = background[(x, y)];
                    if value <= k_sigma || value + bg <= min_intensity {
                        return None;
                    }
                    is_local_maximum(smoothed, x, y, value).then_some(Candidate {
                        x,
                        y,
                        value,
                        background: bg,
                    })
                })
            })
            .collect()
    }

    /// Greedy non-maximum suppression.
    ///
    /// Candidates are visited brightest first; the stable sort keeps scan
    /// order among equal values. Each accepted spot masks a disk of radius
    /// `min_separation` around itself.
    fn suppress(&self, mut candidates: Vec<Candidate>, width: usize, height: usize) -> Vec<Candidate> {
        candidates.sort_by(|a, b| b.value.total_cmp(&a.value));

        let radius = self.config.min_separation;
        let reach = radius.floor() as isize;
        let radius_sq = radius * radius;
        let mut suppressed = Buffer2::new_filled(width, height, false);
        let mut accepted = Vec::new();

        for candidate in candidates {
            if suppressed[(candidate.x, candidate.y)] {
                continue;
            }
            for dy in -reach..=reach {
                for dx in -reach..=reach {
                    if (dx * dx + dy * dy) as f32 > radius_sq {
                        continue;
                    }
                    let x = candidate.x as isize + dx;
                    let y = candidate.y as isize + dy;
                    if x >= 0 && y >= 0 && (x as usize) < width && (y as usize) < height {
                        suppressed[(x as usize, y as usize)] = true;
                    }
                }
            }
            accepted.push(candidate);
        }

        accepted
    }
}

/// True if no 8-neighbour exceeds `value`.
#[inline]
fn is_local_maximum(image: &Buffer2<f32>, x: usize, y: usize, value: f32) -> bool {
    for dy in -1isize..=1 {
        for dx in -1isize..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            if let Some(&n) = image.try_get(x as isize + dx, y as isize + dy) {
                if n > value {
                    return false;
                }
            }
        }
    }
    true
}

/// Robust noise estimate: MAD of the smoothed residual, as sigma.
fn noise_sigma(smoothed: &Buffer2<f32>) -> f32 {
    let mut scratch = smoothed.pixels().to_vec();
    let (_, mad) = median_and_mad_f32_mut(&mut scratch);
    mad_to_sigma(mad)
}

/// Intensity-weighted centroid of the raw 3x3 neighbourhood.
///
/// Every pixel is weighted against the same background level, the one at the
/// peak, so a flat patch cut by the border stays centred on its peak.
fn refine_centroid(image: &Buffer2<f32>, c: &Candidate) -> DVec2 {
    let mut sum = DVec2::ZERO;
    let mut weight = 0.0f64;
    for dy in -1isize..=1 {
        for dx in -1isize..=1 {
            let x = c.x as isize + dx;
            let y = c.y as isize + dy;
            let Some(&v) = image.try_get(x, y) else {
                continue;
            };
            let w = (v - c.background).max(0.0) as f64;
            sum += DVec2::new(x as f64, y as f64) * w;
            weight += w;
        }
    }
    if weight > 0.0 {
        sum / weight
    } else {
        DVec2::new(c.x as f64, c.y as f64)
    }
}
