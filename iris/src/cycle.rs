//! In-memory image stack: channel images grouped into cycles.

use common::Buffer2;

use crate::error::{ImageDimensions, LoadError};
use crate::layout::{ChannelLabel, ChannelScheme, Layout};

/// One decoded single-channel image with its pseudo-color label.
#[derive(Debug, Clone)]
pub struct ChannelImage {
    pub label: ChannelLabel,
    pub pixels: Buffer2<f32>,
}

impl ChannelImage {
    pub fn new(label: ChannelLabel, pixels: Buffer2<f32>) -> Self {
        Self { label, pixels }
    }

    #[inline]
    pub fn dimensions(&self) -> ImageDimensions {
        ImageDimensions::new(self.pixels.width(), self.pixels.height())
    }
}

/// All channel images of one acquisition, informative channels first and
/// the background channel last.
#[derive(Debug, Clone)]
pub struct Cycle {
    pub channels: Vec<ChannelImage>,
}

impl Cycle {
    pub fn new(channels: Vec<ChannelImage>) -> Self {
        Self { channels }
    }

    #[inline]
    pub fn channel(&self, index: usize) -> &Buffer2<f32> {
        &self.channels[index].pixels
    }
}

/// Validated stack of cycles sharing one channel scheme and one image size.
///
/// Construction checks every invariant the downstream stages rely on:
/// at least one cycle, identical label sequence in every cycle and identical
/// dimensions across every image.
#[derive(Debug, Clone)]
pub struct CycleStack {
    layout: Layout,
    scheme: ChannelScheme,
    cycles: Vec<Cycle>,
    dimensions: ImageDimensions,
}

impl CycleStack {
    pub fn new(layout: Layout, cycles: Vec<Cycle>) -> Result<Self, LoadError> {
        let scheme = layout.scheme();
        let first = cycles.first().ok_or(LoadError::NoCycles)?;
        let dimensions = first
            .channels
            .first()
            .map(ChannelImage::dimensions)
            .ok_or(LoadError::ChannelCountMismatch {
                cycle: 0,
                layout,
                expected: scheme.channel_count(),
                actual: 0,
            })?;
        if dimensions.pixel_count() == 0 {
            return Err(LoadError::EmptyImage { cycle: 0 });
        }

        let labels = scheme.labels();
        for (cycle_idx, cycle) in cycles.iter().enumerate() {
            if cycle.channels.len() != labels.len() {
                return Err(LoadError::ChannelCountMismatch {
                    cycle: cycle_idx,
                    layout,
                    expected: labels.len(),
                    actual: cycle.channels.len(),
                });
            }
            for (channel_idx, (image, expected)) in cycle.channels.iter().zip(&labels).enumerate()
            {
                if image.label != *expected {
                    return Err(LoadError::LabelMismatch {
                        cycle: cycle_idx,
                        channel: channel_idx,
                        expected: expected.to_string(),
                        actual: image.label.to_string(),
                    });
                }
                if image.dimensions() != dimensions {
                    return Err(LoadError::DimensionMismatch {
                        cycle: cycle_idx,
                        channel: channel_idx,
                        expected: dimensions,
                        actual: image.dimensions(),
                    });
                }
            }
        }

        Ok(Self {
            layout,
            scheme,
            cycles,
            dimensions,
        })
    }

    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    #[inline]
    pub fn scheme(&self) -> &ChannelScheme {
        &self.scheme
    }

    #[inline]
    pub fn cycles(&self) -> &[Cycle] {
        &self.cycles
    }

    #[inline]
    pub fn cycle(&self, index: usize) -> &Cycle {
        &self.cycles[index]
    }

    #[inline]
    pub fn cycle_count(&self) -> usize {
        self.cycles.len()
    }

    #[inline]
    pub fn dimensions(&self) -> ImageDimensions {
        self.dimensions
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.dimensions.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.dimensions.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::blank_cycle;

    #[test]
    fn test_valid_stack() {
        let cycles = (0..3).map(|_| blank_cycle(Layout::Ke, 16, 12)).collect();
        let stack = CycleStack::new(Layout::Ke, cycles).unwrap();
        assert_eq!(stack.cycle_count(), 3);
        assert_eq!(stack.dimensions(), ImageDimensions::new(16, 12));
        assert_eq!(stack.scheme().channel_count(), 5);
    }

    #[test]
    fn test_rejects_empty_stack() {
        let err = CycleStack::new(Layout::Ke, vec![]).unwrap_err();
        assert!(matches!(err, LoadError::NoCycles));
    }

    #[test]
    fn test_rejects_channel_count_mismatch() {
        // Eng cycles carry 4 channels, Ke expects 5
        let cycles = vec![blank_cycle(Layout::Eng, 8, 8)];
        let err = CycleStack::new(Layout::Ke, cycles).unwrap_err();
        assert!(matches!(
            err,
            LoadError::ChannelCountMismatch {
                expected: 5,
                actual: 4,
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_dimension_mismatch() {
        let cycles = vec![blank_cycle(Layout::Eng, 8, 8), blank_cycle(Layout::Eng, 8, 9)];
        let err = CycleStack::new(Layout::Eng, cycles).unwrap_err();
        assert!(matches!(
            err,
            LoadError::DimensionMismatch {
                cycle: 1,
                channel: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_label_mismatch() {
        let mut cycle = blank_cycle(Layout::Ke, 8, 8);
        cycle.channels.swap(0, 1);
        let err = CycleStack::new(Layout::Ke, vec![cycle]).unwrap_err();
        assert!(matches!(
            err,
            LoadError::LabelMismatch { cycle: 0, channel: 0, .. }
        ));
    }

    #[test]
    fn test_rejects_zero_sized_images() {
        let cycles = vec![blank_cycle(Layout::Eng, 0, 0)];
        let err = CycleStack::new(Layout::Eng, cycles).unwrap_err();
        assert!(matches!(err, LoadError::EmptyImage { cycle: 0 }));
    }
}
