//! Phred-like per-base quality.
//!
//! The score grows linearly with the decoding margin between `min_margin`
//! (score 1) and a perfect margin of 1 (`max_quality`). A call that was
//! re-centred by `D` pixels has its error `1 - margin` inflated by
//! `sqrt(1 + D^2)` first. No-calls always score 0.

use serde::{Deserialize, Serialize};

use crate::decoding::Decision;
use crate::registration::RegistrationStatus;

/// Offset of the ASCII quality encoding.
pub const PHRED_OFFSET: u8 = 33;

/// Encode a quality score as a Phred+33 character.
#[inline]
pub fn phred_char(quality: u8) -> char {
    char::from(PHRED_OFFSET.saturating_add(quality))
}

/// Distance-adjusted error rate, clamped to 1.
#[inline]
pub fn adjusted_error(margin: f32, displacement: f64) -> f64 {
    let error = (1.0 - margin as f64).max(0.0);
    (error * (1.0 + displacement * displacement).sqrt()).min(1.0)
}

/// Quality scale settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Score of a call with margin 1.
    pub max_quality: u8,
    /// Upper bound for calls from cycles whose registration fell back.
    pub degraded_quality_cap: u8,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            max_quality: 40,
            degraded_quality_cap: 10,
        }
    }
}

impl QualityConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) {
        assert!(
            (1..=93).contains(&self.max_quality),
            "max_quality must be in [1, 93], got {}",
            self.max_quality
        );
        assert!(
            self.degraded_quality_cap >= 1 && self.degraded_quality_cap <= self.max_quality,
            "degraded_quality_cap must be in [1, max_quality], got {}",
            self.degraded_quality_cap
        );
    }
}

/// Maps decisions to bounded integer scores.
#[derive(Debug, Clone)]
pub struct QualityScorer {
    config: QualityConfig,
    min_margin: f32,
}

impl QualityScorer {
    /// `min_margin` is the decoder's call threshold, the bottom of the scale.
    pub fn new(config: QualityConfig, min_margin: f32) -> Self {
        config.validate();
        assert!(
            (0.0..1.0).contains(&min_margin),
            "min_margin must be in [0, 1), got {}",
            min_margin
        );
        Self { config, min_margin }
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Score one decision. Calls score at least 1, no-calls exactly 0.
    pub fn score(&self, decision: &Decision, displacement: f64, status: RegistrationStatus) -> u8 {
        let Decision::Call { margin, .. } = decision else {
            return 0;
        };

        let adjusted_margin = 1.0 - adjusted_error(*margin, displacement);
        let floor = self.min_margin as f64;
        let fraction = ((adjusted_margin - floor) / (1.0 - floor)).clamp(0.0, 1.0);
        let mut quality = (fraction * self.config.max_quality as f64).round() as u8;
        quality = quality.max(1);

        if status.is_degraded() {
            quality = quality.min(self.config.degraded_quality_cap);
        }
        quality
    }
}
