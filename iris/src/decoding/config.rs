use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// What to do with calls from a cycle whose registration fell back to identity.
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
pub enum FailedRegistrationPolicy {
    /// Keep the call, cap its quality.
    #[default]
    LowQuality,
    /// Replace every call of the cycle with a no-call.
    NoCall,
}

/// Base decoding thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Minimum `top / sum(all channels)` for a call.
    pub min_margin: f32,
    /// Top two channels closer than `tie_tolerance * top` are ambiguous.
    pub tie_tolerance: f32,
    pub on_failed_registration: FailedRegistrationPolicy,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            min_margin: 0.3,
            tie_tolerance: 0.2,
            on_failed_registration: FailedRegistrationPolicy::LowQuality,
        }
    }
}

impl DecodeConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) {
        assert!(
            (0.0..1.0).contains(&self.min_margin),
            "min_margin must be in [0, 1), got {}",
            self.min_margin
        );
        assert!(
            (0.0..=1.0).contains(&self.tie_tolerance),
            "tie_tolerance must be in [0, 1], got {}",
            self.tie_tolerance
        );
    }
}
