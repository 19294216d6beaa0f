//! Cross-cycle registration.
//!
//! Every cycle is reduced to one representative image, optionally smoothed,
//! and phase-correlated against the reference cycle's representative. The
//! result is one [`CycleRegistration`] per cycle holding the transform that
//! relates the cycle's pixel frame to the reference frame. Images are never
//! resampled in place.
//!
//! A cycle whose correlation is weak, ambiguous or implausible keeps the
//! identity transform and is marked [`RegistrationStatus::Fallback`]; the run
//! continues.

pub mod config;
pub mod phase_correlation;
pub mod result;
pub mod transform;


use common::Buffer2;
use glam::DVec2;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::cycle::{Cycle, CycleStack};
use crate::filter::gaussian_blur;
use crate::interpolation::warp;
use crate::layout::ChannelScheme;

pub use config::{RegistrationConfig, Representative, SubpixelMethod, TransformModel};
pub use phase_correlation::{
    LogPolarCorrelator, PhaseCorrelationConfig, PhaseCorrelationResult, PhaseCorrelator,
    RotationScale, Spectrum,
};
pub use result::{CycleRegistration, FallbackReason, RegistrationStatus};
pub use transform::Transform;

/// Aligns every cycle of a stack to the reference cycle.
#[derive(Debug, Clone)]
pub struct Registrar {
    config: RegistrationConfig,
}

impl Registrar {
    pub fn new(config: RegistrationConfig) -> Self {
        config.validate();
        Self { config }
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// One registration per cycle, in cycle order.
    pub fn register(&self, stack: &CycleStack) -> Vec<CycleRegistration> {
        let cycle_count = stack.cycle_count();
        if !self.config.enabled {
            info!("Registration disabled, using identity for {cycle_count} cycles");
            return (0..cycle_count).map(CycleRegistration::skipped).collect();
        }

        let reference_idx = if self.config.reference_cycle < cycle_count {
            self.config.reference_cycle
        } else {
            warn!(
                "Reference cycle {} out of range for {cycle_count} cycles, using cycle 0",
                self.config.reference_cycle
            );
            0
        };

        let representative = self.config.representative_for(stack.layout());
        debug!("Registering on {representative:?} images, reference cycle {reference_idx}");

        let representatives: Vec<Buffer2<f32>> = stack
            .cycles()
            .par_iter()
            .map(|cycle| {
                let image = representative_image(cycle, stack.scheme(), representative);
                gaussian_blur(&image, self.config.smoothing_sigma)
            })
            .collect();

        let aligner = Aligner::new(&self.config, &representatives[reference_idx]);

        let registrations: Vec<CycleRegistration> = representatives
            .par_iter()
            .enumerate()
            .map(|(cycle, image)| {
                if cycle == reference_idx {
                    CycleRegistration::reference(cycle)
                } else {
                    aligner.align(cycle, image)
                }
            })
            .collect();

        // Fallbacks reach the user as run warnings; only trace them here
        for registration in &registrations {
            match registration.fallback_reason {
                Some(reason) => debug!(
                    "Cycle {} fell back to identity: {reason}",
                    registration.cycle
                ),
                None => debug!(
                    "Cycle {} {}: {} (confidence {:.3})",
                    registration.cycle,
                    registration.status,
                    registration.transform,
                    registration.confidence
                ),
            }
        }

        registrations
    }
}

/// Per-run alignment state shared by all cycles.
struct Aligner<'a> {
    config: &'a RegistrationConfig,
    reference: &'a Buffer2<f32>,
    correlator: PhaseCorrelator,
    reference_spectrum: Spectrum,
    log_polar: Option<LogPolarCorrelator>,
    center: DVec2,
    corners: [DVec2; 4],
}

impl<'a> Aligner<'a> {
    fn new(config: &'a RegistrationConfig, reference: &'a Buffer2<f32>) -> Self {
        let (width, height) = reference.dimensions();
        let phase_config = PhaseCorrelationConfig::from(config);
        let correlator = PhaseCorrelator::new(width, height, phase_config.clone());
        let reference_spectrum = correlator.spectrum(reference);
        let log_polar = match config.model {
            TransformModel::Translation => None,
            TransformModel::Similarity => {
                Some(LogPolarCorrelator::new(width, height, phase_config))
            }
        };
        let max_x = width.saturating_sub(1) as f64;
        let max_y = height.saturating_sub(1) as f64;

        Self {
            config,
            reference,
            correlator,
            reference_spectrum,
            log_polar,
            center: DVec2::new(width as f64 / 2.0, height as f64 / 2.0),
            corners: [
                DVec2::ZERO,
                DVec2::new(max_x, 0.0),
                DVec2::new(0.0, max_y),
                DVec2::new(max_x, max_y),
            ],
        }
    }

    fn align(&self, cycle: usize, image: &Buffer2<f32>) -> CycleRegistration {
        let estimate = match &self.log_polar {
            None => self
                .correlator
                .correlate_with(&self.reference_spectrum, image)
                .map(|result| (Transform::translation(result.translation), result.confidence)),
            Some(log_polar) => self.align_similarity(log_polar, image),
        };

        let Some((transform, confidence)) = estimate else {
            return CycleRegistration::fallback(cycle, FallbackReason::NoPeak, 0.0);
        };

        if confidence < self.config.min_confidence as f64 {
            return CycleRegistration::fallback(
                cycle,
                FallbackReason::LowConfidence { confidence },
                confidence,
            );
        }

        if let Some(max_shift) = self.config.max_shift {
            let shift = transform.max_displacement(&self.corners);
            if shift > max_shift {
                return CycleRegistration::fallback(
                    cycle,
                    FallbackReason::ShiftTooLarge { shift },
                    confidence,
                );
            }
        }

        CycleRegistration::aligned(cycle, transform, confidence)
    }

    /// Rotation and scale first, then translation of the de-rotated image.
    fn align_similarity(
        &self,
        log_polar: &LogPolarCorrelator,
        image: &Buffer2<f32>,
    ) -> Option<(Transform, f64)> {
        let rs = log_polar.estimate(self.reference, image)?;

        let derotation = Transform::similarity(DVec2::ZERO, rs.rotation, rs.scale, self.center);
        let corrected = warp(image, |p| derotation.from_reference(p), 0.0);

        let result = self
            .correlator
            .correlate_with(&self.reference_spectrum, &corrected)?;

        let transform =
            Transform::similarity(result.translation, rs.rotation, rs.scale, self.center);
        Some((transform, (rs.confidence + result.confidence) / 2.0))
    }
}

/// Reduce a cycle to the single image used for alignment.
pub fn representative_image(
    cycle: &Cycle,
    scheme: &ChannelScheme,
    mode: Representative,
) -> Buffer2<f32> {
    let background = cycle.channel(scheme.background_index());
    let signals = (0..scheme.signal_channels()).map(|c| cycle.channel(c));

    match mode {
        Representative::Background => background.clone(),
        Representative::SignalMax => {
            let mut out = Buffer2::<f32>::new_default(background.width(), background.height());
            for channel in signals {
                for (o, &v) in out.pixels_mut().iter_mut().zip(channel.pixels()) {
                    *o = o.max(v);
                }
            }
            out
        }
        Representative::Blend {
            signal_weight,
            background_weight,
        } => {
            let mut out = background.map(|&v| v * background_weight);
            for channel in signals {
                for (o, &v) in out.pixels_mut().iter_mut().zip(channel.pixels()) {
                    *o += v * signal_weight;
                }
            }
            out
        }
    }
}
