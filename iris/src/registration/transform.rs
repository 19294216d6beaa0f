//! Per-cycle registration transform.

use glam::DVec2;

use crate::math::Affine2;
use crate::registration::config::TransformModel;

/// Mapping between one cycle's pixel frame and the reference frame.
///
/// Both directions are stored, so neither can fail after construction:
/// - [`to_reference`](Self::to_reference) maps a cycle pixel onto the reference frame
/// - [`from_reference`](Self::from_reference) maps a reference coordinate into the cycle,
///   which is where intensities are sampled
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    to_reference: Affine2,
    from_reference: Affine2,
    offset: DVec2,
    pub model: TransformModel,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::fmt::Display for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let t = self.offset();
        match self.model {
            TransformModel::Translation => {
                write!(f, "Translation(dx={:.2}, dy={:.2})", t.x, t.y)
            }
            TransformModel::Similarity => write!(
                f,
                "Similarity(dx={:.2}, dy={:.2}, rot={:.3}°, scale={:.4})",
                t.x,
                t.y,
                self.rotation_angle().to_degrees(),
                self.scale_factor()
            ),
        }
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            to_reference: Affine2::identity(),
            from_reference: Affine2::identity(),
            offset: DVec2::ZERO,
            model: TransformModel::Translation,
        }
    }

    /// Cycle content displaced by `offset`: cycle pixel `p + offset` shows
    /// what the reference shows at `p`.
    pub fn translation(offset: DVec2) -> Self {
        Self {
            to_reference: Affine2::translation(-offset),
            from_reference: Affine2::translation(offset),
            offset,
            model: TransformModel::Translation,
        }
    }

    /// Cycle content rotated by `angle` and scaled by `scale` about `center`,
    /// then displaced by `offset`:
    /// cycle pixel `center + scale * R(angle) * (p + offset - center)` shows
    /// what the reference shows at `p`.
    pub fn similarity(offset: DVec2, angle: f64, scale: f64, center: DVec2) -> Self {
        assert!(
            scale > 0.0 && scale.is_finite(),
            "scale must be positive and finite, got {}",
            scale
        );
        let from_reference = Affine2::translation(center)
            * Affine2::rotation_scale(angle, scale)
            * Affine2::translation(offset - center);
        let to_reference = Affine2::translation(-offset + center)
            * Affine2::rotation_scale(-angle, 1.0 / scale)
            * Affine2::translation(-center);
        Self {
            to_reference,
            from_reference,
            offset,
            model: TransformModel::Similarity,
        }
    }

    /// Map a cycle pixel coordinate into the reference frame.
    #[inline]
    pub fn to_reference(&self, p: DVec2) -> DVec2 {
        self.to_reference.transform_point(p)
    }

    /// Map a reference-frame coordinate into this cycle's pixel frame.
    #[inline]
    pub fn from_reference(&self, p: DVec2) -> DVec2 {
        self.from_reference.transform_point(p)
    }

    /// Translation estimated after removing rotation and scale.
    ///
    /// For pure translations this is the drift of the cycle content.
    #[inline]
    pub fn offset(&self) -> DVec2 {
        self.offset
    }

    /// Rotation of cycle content relative to the reference, radians.
    pub fn rotation_angle(&self) -> f64 {
        self.from_reference[3].atan2(self.from_reference[0])
    }

    /// Scale of cycle content relative to the reference.
    pub fn scale_factor(&self) -> f64 {
        let a = self.from_reference[0];
        let c = self.from_reference[3];
        (a * a + c * c).sqrt()
    }

    /// Longest displacement this transform applies to any of the given points.
    pub fn max_displacement(&self, points: &[DVec2]) -> f64 {
        points
            .iter()
            .map(|&p| self.from_reference(p).distance(p))
            .fold(0.0, f64::max)
    }

    pub fn deviation_from_identity(&self) -> f64 {
        self.from_reference.deviation_from_identity()
    }

    pub fn is_identity(&self) -> bool {
        self.deviation_from_identity() < 1e-12
    }
}
