//! Configuration types for cross-cycle registration.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::layout::Layout;

/// Geometric model estimated per cycle.
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
pub enum TransformModel {
    /// Translation only (2 DOF).
    #[default]
    Translation,
    /// Rotation + uniform scale from log-polar correlation, then translation (4 DOF).
    Similarity,
}

/// Sub-pixel refinement of the correlation peak.
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
pub enum SubpixelMethod {
    /// Integer peak only.
    None,
    /// Parabola through the peak and its 4-neighbours.
    #[default]
    Parabolic,
    /// Parabola through log values (exact for Gaussian-shaped peaks).
    Gaussian,
    /// Weighted centroid of the 5x5 neighbourhood.
    Centroid,
}

/// How a cycle is reduced to one image before correlation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Representative {
    /// `signal_weight * sum(signal channels) + background_weight * background`.
    Blend {
        signal_weight: f32,
        background_weight: f32,
    },
    /// Per-pixel maximum over the informative channels.
    SignalMax,
    /// The background channel alone.
    Background,
}

impl Representative {
    pub fn for_layout(layout: Layout) -> Self {
        match layout {
            Layout::Ke => Representative::Blend {
                signal_weight: 0.7,
                background_weight: 0.3,
            },
            Layout::Eng => Representative::Background,
        }
    }
}

/// Cross-cycle registration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Skip alignment entirely and give every cycle the identity transform.
    pub enabled: bool,
    /// Index of the cycle whose frame is the common reference.
    pub reference_cycle: usize,
    pub model: TransformModel,
    /// `None` uses the stack layout's default, see [`Representative::for_layout`].
    pub representative: Option<Representative>,
    /// Gaussian sigma applied to representative images before correlation. 0 disables.
    pub smoothing_sigma: f32,
    /// Apply a Hann window before the FFT to suppress edge effects.
    pub use_windowing: bool,
    pub subpixel: SubpixelMethod,
    /// Correlation peaks below this height are treated as no match.
    pub min_peak_value: f32,
    /// Peak-to-sidelobe confidence below this falls back to identity.
    pub min_confidence: f32,
    /// Shifts longer than this (pixels) are rejected as implausible.
    pub max_shift: Option<f64>,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reference_cycle: 0,
            model: TransformModel::default(),
            representative: None,
            smoothing_sigma: 1.0,
            use_windowing: true,
            subpixel: SubpixelMethod::default(),
            min_peak_value: 0.05,
            min_confidence: 0.15,
            max_shift: None,
        }
    }
}

impl RegistrationConfig {
    /// The configured representative, or the default for `layout`.
    pub fn representative_for(&self, layout: Layout) -> Representative {
        self.representative
            .unwrap_or_else(|| Representative::for_layout(layout))
    }

    /// Validate configuration parameters.
    pub fn validate(&self) {
        assert!(
            self.smoothing_sigma >= 0.0 && self.smoothing_sigma.is_finite(),
            "smoothing_sigma must be finite and >= 0, got {}",
            self.smoothing_sigma
        );
        assert!(
            (0.0..=1.0).contains(&self.min_peak_value),
            "min_peak_value must be in [0, 1], got {}",
            self.min_peak_value
        );
        assert!(
            (0.0..=1.0).contains(&self.min_confidence),
            "min_confidence must be in [0, 1], got {}",
            self.min_confidence
        );
        if let Some(max_shift) = self.max_shift {
            assert!(
                max_shift > 0.0,
                "max_shift must be positive, got {}",
                max_shift
            );
        }
        if let Some(Representative::Blend {
            signal_weight,
            background_weight,
        }) = self.representative
        {
            assert!(
                signal_weight >= 0.0 && background_weight >= 0.0,
                "representative blend weights must be non-negative"
            );
            assert!(
                signal_weight + background_weight > 0.0,
                "representative blend weights must not both be zero"
            );
        }
    }
}
