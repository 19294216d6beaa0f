//! Per-spot, per-cycle channel intensities.
//!
//! Each spot's reference coordinate is mapped into the cycle through
//! [`Transform::from_reference`](crate::registration::Transform::from_reference)
//! and every channel is sampled bilinearly there. With a non-zero
//! `search_radius` the integer offsets around that point are tried as well and
//! the one with the lowest distance-adjusted error wins, closer offsets first
//! on ties.

use glam::DVec2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cycle::{Cycle, CycleStack};
use crate::decoding::decoding_margin;
use crate::decoding::quality::adjusted_error;
use crate::detection::Spot;
use crate::interpolation::bilinear;
use crate::registration::CycleRegistration;

/// Channel intensities of one spot in one cycle.
///
/// Informative channels first, background last, in scheme order.
#[derive(Debug, Clone, PartialEq)]
pub struct IntensityVector {
    values: Vec<f32>,
    /// Distance in pixels between the mapped spot position and the sample.
    pub displacement: f64,
}

impl IntensityVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            displacement: 0.0,
        }
    }

    pub fn with_displacement(values: Vec<f32>, displacement: f64) -> Self {
        Self {
            values,
            displacement,
        }
    }

    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

/// Outcome of sampling one spot in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Intensities(IntensityVector),
    /// The spot maps outside this cycle's image.
    OutOfFrame,
}

impl Sample {
    #[inline]
    pub fn displacement(&self) -> f64 {
        match self {
            Sample::Intensities(vector) => vector.displacement,
            Sample::OutOfFrame => 0.0,
        }
    }

    #[inline]
    pub fn is_out_of_frame(&self) -> bool {
        matches!(self, Sample::OutOfFrame)
    }
}

/// Intensity sampling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Half-size of the square of integer offsets searched around each
    /// mapped spot. 0 samples the mapped position only.
    pub search_radius: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self { search_radius: 1 }
    }
}

impl ExtractionConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) {
        assert!(
            self.search_radius <= 8,
            "search_radius must be <= 8, got {}",
            self.search_radius
        );
    }
}

/// Samples every spot in every cycle.
#[derive(Debug, Clone)]
pub struct IntensityExtractor {
    config: ExtractionConfig,
    /// Search offsets sorted by distance, the zero offset first.
    offsets: Vec<DVec2>,
}

impl IntensityExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        config.validate();
        let r = config.search_radius as i32;
        let mut offsets: Vec<(i32, i32)> = (-r..=r)
            .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
            .collect();
        offsets.sort_by_key(|&(dx, dy)| (dx * dx + dy * dy, dy, dx));
        let offsets = offsets
            .into_iter()
            .map(|(dx, dy)| DVec2::new(dx as f64, dy as f64))
            .collect();

        Self { config, offsets }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Samples indexed `[spot][cycle]`.
    pub fn extract(
        &self,
        stack: &CycleStack,
        registrations: &[CycleRegistration],
        spots: &[Spot],
    ) -> Vec<Vec<Sample>> {
        assert_eq!(
            registrations.len(),
            stack.cycle_count(),
            "one registration per cycle required"
        );
        let signal_channels = stack.scheme().signal_channels();

        let samples: Vec<Vec<Sample>> = spots
            .par_iter()
            .map(|spot| {
                stack
                    .cycles()
                    .iter()
                    .zip(registrations)
                    .map(|(cycle, registration)| {
                        let mapped = registration.transform.from_reference(spot.position);
                        self.sample(cycle, mapped, signal_channels)
                    })
                    .collect()
            })
            .collect();

        debug!(
            "Extracted {} samples for {} spots",
            samples.len() * stack.cycle_count(),
            spots.len()
        );
        samples
    }

    fn sample(&self, cycle: &Cycle, position: DVec2, signal_channels: usize) -> Sample {
        let Some(center) = sample_channels(cycle, position) else {
            return Sample::OutOfFrame;
        };
        if self.offsets.len() == 1 {
            return Sample::Intensities(IntensityVector::new(center));
        }

        let mut best = IntensityVector::new(center);
        let mut best_error = adjusted_error(decoding_margin(best.values(), signal_channels), 0.0);
        for &offset in &self.offsets[1..] {
            let Some(values) = sample_channels(cycle, position + offset) else {
                continue;
            };
            let displacement = offset.length();
            let error = adjusted_error(decoding_margin(&values, signal_channels), displacement);
            if error < best_error {
                best_error = error;
                best = IntensityVector::with_displacement(values, displacement);
            }
        }
        Sample::Intensities(best)
    }
}

/// All channels of `cycle` at `position`, `None` outside the image.
fn sample_channels(cycle: &Cycle, position: DVec2) -> Option<Vec<f32>> {
    cycle
        .channels
        .iter()
        .map(|channel| bilinear(&channel.pixels, position))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout;
    use crate::registration::Transform;
    use crate::testing::{blank_cycle, stamp_patch};

    fn spot_at(x: f64, y: f64) -> Spot {
        Spot {
            position: DVec2::new(x, y),
            peak: (x as usize, y as usize),
            strength: 1.0,
            snr: 0.0,
        }
    }

    fn no_search() -> IntensityExtractor {
        IntensityExtractor::new(ExtractionConfig { search_radius: 0 })
    }

    #[test]
    fn test_samples_every_channel_in_scheme_order() {
        let mut cycle = blank_cycle(Layout::Ke, 8, 8);
        for (c, channel) in cycle.channels.iter_mut().enumerate() {
            channel.pixels[(3, 4)] = (c + 1) as f32;
        }
        let stack = CycleStack::new(Layout::Ke, vec![cycle]).unwrap();

        let samples = no_search().extract(
            &stack,
            &[CycleRegistration::reference(0)],
            &[spot_at(3.0, 4.0)],
        );

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].len(), 1);
        let Sample::Intensities(vector) = &samples[0][0] else {
            panic!("expected intensities");
        };
        assert_eq!(vector.values(), &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(vector.displacement, 0.0);
    }

    #[test]
    fn test_bilinear_between_pixels() {
        let mut cycle = blank_cycle(Layout::Eng, 8, 8);
        cycle.channels[0].pixels[(2, 2)] = 10.0;
        cycle.channels[0].pixels[(3, 2)] = 20.0;
        let stack = CycleStack::new(Layout::Eng, vec![cycle]).unwrap();

        let samples = no_search().extract(
            &stack,
            &[CycleRegistration::reference(0)],
            &[spot_at(2.5, 2.0)],
        );

        let Sample::Intensities(vector) = &samples[0][0] else {
            panic!("expected intensities");
        };
        assert!((vector.values()[0] - 15.0).abs() < 1e-5);
    }

    #[test]
    fn test_transform_maps_into_cycle_frame() {
        let reference = blank_cycle(Layout::Ke, 16, 16);
        let mut moved = blank_cycle(Layout::Ke, 16, 16);
        moved.channels[2].pixels[(7, 9)] = 50.0;
        let stack = CycleStack::new(Layout::Ke, vec![reference, moved]).unwrap();
        let registrations = vec![
            CycleRegistration::reference(0),
            CycleRegistration::aligned(1, Transform::translation(DVec2::new(2.0, 3.0)), 1.0),
        ];

        let samples = no_search().extract(&stack, &registrations, &[spot_at(5.0, 6.0)]);

        let Sample::Intensities(vector) = &samples[0][1] else {
            panic!("expected intensities");
        };
        assert_eq!(vector.values()[2], 50.0);
    }

    #[test]
    fn test_out_of_frame_only_affects_that_cycle() {
        let stack = CycleStack::new(
            Layout::Ke,
            vec![blank_cycle(Layout::Ke, 16, 16), blank_cycle(Layout::Ke, 16, 16)],
        )
        .unwrap();
        let registrations = vec![
            CycleRegistration::reference(0),
            CycleRegistration::aligned(1, Transform::translation(DVec2::new(-5.0, 0.0)), 1.0),
        ];

        let samples = IntensityExtractor::new(ExtractionConfig::default()).extract(
            &stack,
            &registrations,
            &[spot_at(3.0, 8.0)],
        );

        assert!(!samples[0][0].is_out_of_frame());
        assert!(samples[0][1].is_out_of_frame());
    }

    #[test]
    fn test_search_recenters_on_cleaner_neighbour() {
        let mut cycle = blank_cycle(Layout::Ke, 16, 16);
        // mapped position sees two channels equally, one pixel right sees only A
        cycle.channels[0].pixels[(8, 8)] = 10.0;
        cycle.channels[1].pixels[(8, 8)] = 10.0;
        cycle.channels[0].pixels[(9, 8)] = 10.0;
        let stack = CycleStack::new(Layout::Ke, vec![cycle]).unwrap();

        let samples = IntensityExtractor::new(ExtractionConfig::default()).extract(
            &stack,
            &[CycleRegistration::reference(0)],
            &[spot_at(8.0, 8.0)],
        );

        let Sample::Intensities(vector) = &samples[0][0] else {
            panic!("expected intensities");
        };
        assert_eq!(vector.displacement, 1.0);
        assert_eq!(vector.values()[0], 10.0);
        assert_eq!(vector.values()[1], 0.0);
    }

    #[test]
    fn test_search_keeps_center_on_tie() {
        let mut cycle = blank_cycle(Layout::Ke, 16, 16);
        stamp_patch(&mut cycle.channels[3].pixels, (8, 8), 1, 7.0);
        let stack = CycleStack::new(Layout::Ke, vec![cycle]).unwrap();

        let samples = IntensityExtractor::new(ExtractionConfig::default()).extract(
            &stack,
            &[CycleRegistration::reference(0)],
            &[spot_at(8.0, 8.0)],
        );

        assert_eq!(samples[0][0].displacement(), 0.0);
    }

    #[test]
    fn test_no_spots_no_samples() {
        let stack = CycleStack::new(Layout::Ke, vec![blank_cycle(Layout::Ke, 4, 4)]).unwrap();
        let samples = no_search().extract(&stack, &[CycleRegistration::reference(0)], &[]);
        assert!(samples.is_empty());
    }
}
