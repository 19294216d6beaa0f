use serde::{Deserialize, Serialize};

/// Spot detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Gaussian sigma for noise suppression before peak finding. 0 disables.
    pub smoothing_sigma: f32,
    /// Half-size of the box used to estimate local background.
    pub background_radius: usize,
    /// Peaks must exceed local background by this many noise sigmas.
    pub threshold_sigma: f32,
    /// Peaks must also exceed this absolute smoothed intensity.
    pub min_intensity: f32,
    /// Accepted spots are farther apart than this (pixels).
    pub min_separation: f32,
    /// Peaks closer than this to the image border are ignored. 0 keeps border pixels.
    pub edge_margin: usize,
    /// Refine positions with a 3x3 intensity-weighted centroid.
    pub refine_centroid: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            smoothing_sigma: 1.0,
            background_radius: 7,
            threshold_sigma: 3.0,
            min_intensity: 0.0,
            min_separation: 3.0,
            edge_margin: 0,
            refine_centroid: true,
        }
    }
}

impl DetectionConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) {
        assert!(
            self.smoothing_sigma >= 0.0 && self.smoothing_sigma.is_finite(),
            "smoothing_sigma must be finite and >= 0, got {}",
            self.smoothing_sigma
        );
        assert!(
            self.background_radius > 0,
            "background_radius must be positive"
        );
        assert!(
            self.threshold_sigma >= 0.0,
            "threshold_sigma must be >= 0, got {}",
            self.threshold_sigma
        );
        assert!(
            self.min_intensity >= 0.0,
            "min_intensity must be >= 0, got {}",
            self.min_intensity
        );
        assert!(
            self.min_separation >= 0.0 && self.min_separation.is_finite(),
            "min_separation must be finite and >= 0, got {}",
            self.min_separation
        );
    }
}
