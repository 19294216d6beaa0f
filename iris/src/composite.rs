//! Reference-frame projections of a cycle stack.
//!
//! Every selected channel is resampled into the reference frame through its
//! cycle's transform and folded into one image per pixel. Pixels a cycle does
//! not cover contribute 0.

use common::Buffer2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::cycle::CycleStack;
use crate::interpolation::warp;
use crate::registration::CycleRegistration;

/// Per-pixel fold across the projected images.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Aggregation {
    #[default]
    Max,
    Mean,
}

/// Which channels of each cycle take part in a projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelSelection {
    /// All informative channels.
    Signal,
    /// The background channel only.
    Background,
}

/// Project the selected channels of every cycle into the reference frame.
///
/// `registrations` is indexed by cycle. The result has the stack's dimensions
/// even when nothing else in the run produced output.
pub fn project(
    stack: &CycleStack,
    registrations: &[CycleRegistration],
    selection: ChannelSelection,
    aggregation: Aggregation,
) -> Buffer2<f32> {
    assert_eq!(
        registrations.len(),
        stack.cycle_count(),
        "one registration per cycle required"
    );

    let scheme = stack.scheme();
    let channels: Vec<usize> = match selection {
        ChannelSelection::Signal => (0..scheme.signal_channels()).collect(),
        ChannelSelection::Background => vec![scheme.background_index()],
    };

    let layers: Vec<Buffer2<f32>> = stack
        .cycles()
        .par_iter()
        .zip(registrations.par_iter())
        .flat_map_iter(|(cycle, registration)| {
            let transform = registration.transform;
            channels.iter().map(move |&c| {
                let image = cycle.channel(c);
                if transform.is_identity() {
                    image.clone()
                } else {
                    warp(image, |p| transform.from_reference(p), 0.0)
                }
            })
        })
        .collect();

    let mut out = Buffer2::<f32>::new_default(stack.width(), stack.height());
    for layer in &layers {
        match aggregation {
            Aggregation::Max => {
                for (o, &v) in out.pixels_mut().iter_mut().zip(layer.pixels()) {
                    *o = o.max(v);
                }
            }
            Aggregation::Mean => {
                for (o, &v) in out.pixels_mut().iter_mut().zip(layer.pixels()) {
                    *o += v;
                }
            }
        }
    }
    if aggregation == Aggregation::Mean && !layers.is_empty() {
        let n = layers.len() as f32;
        for o in out.pixels_mut() {
            *o /= n;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use glam::DVec2;

    use super::*;
    use crate::layout::Layout;
    use crate::registration::Transform;
    use crate::testing::{blank_cycle, shift_image, stamp_patch};

    fn identity_registrations(count: usize) -> Vec<CycleRegistration> {
        (0..count).map(CycleRegistration::reference).collect()
    }

    #[test]
    fn test_max_and_mean_of_background() {
        let mut cycles = vec![blank_cycle(Layout::Ke, 8, 8), blank_cycle(Layout::Ke, 8, 8)];
        cycles[0].channels[4].pixels[(2, 3)] = 4.0;
        cycles[1].channels[4].pixels[(2, 3)] = 2.0;
        cycles[1].channels[0].pixels[(5, 5)] = 9.0;
        let stack = CycleStack::new(Layout::Ke, cycles).unwrap();
        let registrations = identity_registrations(2);

        let max = project(&stack, &registrations, ChannelSelection::Background, Aggregation::Max);
        assert_eq!(max[(2, 3)], 4.0);
        assert_eq!(max[(5, 5)], 0.0);

        let mean = project(&stack, &registrations, ChannelSelection::Background, Aggregation::Mean);
        assert_eq!(mean[(2, 3)], 3.0);
    }

    #[test]
    fn test_signal_selection_excludes_background() {
        let mut cycle = blank_cycle(Layout::Eng, 6, 6);
        cycle.channels[1].pixels[(1, 1)] = 5.0;
        cycle.channels[3].pixels[(4, 4)] = 8.0;
        let stack = CycleStack::new(Layout::Eng, vec![cycle]).unwrap();

        let signal = project(
            &stack,
            &identity_registrations(1),
            ChannelSelection::Signal,
            Aggregation::Max,
        );

        assert_eq!(signal[(1, 1)], 5.0);
        assert_eq!(signal[(4, 4)], 0.0);
        assert_eq!(signal.dimensions(), (6, 6));
    }

    #[test]
    fn test_shifted_cycle_lands_in_reference_frame() {
        let mut reference = blank_cycle(Layout::Ke, 16, 16);
        stamp_patch(&mut reference.channels[4].pixels, (6, 6), 0, 10.0);
        let mut moved = reference.clone();
        for channel in &mut moved.channels {
            channel.pixels = shift_image(&channel.pixels, 3, 2);
        }
        let stack = CycleStack::new(Layout::Ke, vec![reference, moved]).unwrap();
        let registrations = vec![
            CycleRegistration::reference(0),
            CycleRegistration::aligned(1, Transform::translation(DVec2::new(3.0, 2.0)), 1.0),
        ];

        let mean = project(&stack, &registrations, ChannelSelection::Background, Aggregation::Mean);

        assert_eq!(mean[(6, 6)], 10.0);
        assert_eq!(mean[(9, 8)], 0.0);
    }
}
