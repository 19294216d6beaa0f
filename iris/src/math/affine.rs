//! Row-major 2x3 affine matrix of f64 values.

use glam::DVec2;
use std::ops::{Index, Mul};

/// Row-major 2D affine matrix.
///
/// Memory layout, with the implicit homogeneous row `0 0 1`:
/// ```text
/// | m[0] m[1] m[2] |     | a  b  tx |
/// | m[3] m[4] m[5] |  =  | c  d  ty |
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine2 {
    data: [f64; 6],
}

impl Affine2 {
    #[inline]
    pub const fn identity() -> Self {
        Self {
            data: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        }
    }

    #[inline]
    pub const fn translation(t: DVec2) -> Self {
        Self {
            data: [1.0, 0.0, t.x, 0.0, 1.0, t.y],
        }
    }

    /// Rotation by `angle` radians and uniform `scale` about the origin.
    #[inline]
    pub fn rotation_scale(angle: f64, scale: f64) -> Self {
        let cos_a = angle.cos() * scale;
        let sin_a = angle.sin() * scale;
        Self {
            data: [cos_a, -sin_a, 0.0, sin_a, cos_a, 0.0],
        }
    }

    /// Matrix product `self * rhs`: applies `rhs` first, then `self`.
    #[inline]
    pub fn mul_mat(&self, rhs: &Affine2) -> Affine2 {
        let a = &self.data;
        let b = &rhs.data;
        Affine2 {
            data: [
                a[0] * b[0] + a[1] * b[3],
                a[0] * b[1] + a[1] * b[4],
                a[0] * b[2] + a[1] * b[5] + a[2],
                a[3] * b[0] + a[4] * b[3],
                a[3] * b[1] + a[4] * b[4],
                a[3] * b[2] + a[4] * b[5] + a[5],
            ],
        }
    }

    #[inline]
    pub fn transform_point(&self, p: DVec2) -> DVec2 {
        let d = &self.data;
        DVec2::new(
            d[0] * p.x + d[1] * p.y + d[2],
            d[3] * p.x + d[4] * p.y + d[5],
        )
    }

    /// Frobenius norm of the difference from the identity matrix.
    pub fn deviation_from_identity(&self) -> f64 {
        let d = &self.data;
        let d0 = d[0] - 1.0;
        let d4 = d[4] - 1.0;
        (d0 * d0 + d[1] * d[1] + d[2] * d[2] + d[3] * d[3] + d4 * d4 + d[5] * d[5]).sqrt()
    }
}

impl Index<usize> for Affine2 {
    type Output = f64;
    #[inline]
    fn index(&self, idx: usize) -> &f64 {
        &self.data[idx]
    }
}

impl Mul for Affine2 {
    type Output = Affine2;
    #[inline]
    fn mul(self, rhs: Affine2) -> Affine2 {
        self.mul_mat(&rhs)
    }
}
