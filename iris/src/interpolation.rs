//! Bilinear sampling of [`Buffer2<f32>`] images.

use common::Buffer2;
use glam::DVec2;
use rayon::prelude::*;

/// Bilinear sample at a sub-pixel position.
///
/// Pixel centres sit on integer coordinates, so the valid domain is
/// `[0, width - 1] x [0, height - 1]`. Positions outside it return `None`.
pub fn bilinear(image: &Buffer2<f32>, p: DVec2) -> Option<f32> {
    let max_x = image.width() as f64 - 1.0;
    let max_y = image.height() as f64 - 1.0;
    if !(p.x >= 0.0 && p.y >= 0.0 && p.x <= max_x && p.y <= max_y) {
        return None;
    }

    let x0 = p.x.floor() as usize;
    let y0 = p.y.floor() as usize;
    let x1 = (x0 + 1).min(image.width() - 1);
    let y1 = (y0 + 1).min(image.height() - 1);

    let fx = (p.x - x0 as f64) as f32;
    let fy = (p.y - y0 as f64) as f32;

    let p00 = image[(x0, y0)];
    let p10 = image[(x1, y0)];
    let p01 = image[(x0, y1)];
    let p11 = image[(x1, y1)];

    let top = p00 + fx * (p10 - p00);
    let bottom = p01 + fx * (p11 - p01);

    Some(top + fy * (bottom - top))
}

/// Bilinear sample that treats everything outside the image as `border`.
#[inline]
pub fn bilinear_or(image: &Buffer2<f32>, p: DVec2, border: f32) -> f32 {
    bilinear(image, p).unwrap_or(border)
}

/// Resample `image` so that output pixel `p` takes the value at `map(p)`.
///
/// Positions that fall outside the source become `border`.
pub fn warp<F>(image: &Buffer2<f32>, map: F, border: f32) -> Buffer2<f32>
where
    F: Fn(DVec2) -> DVec2 + Sync,
{
    let (width, height) = image.dimensions();
    let mut output = vec![border; width * height];
    output
        .par_chunks_mut(width.max(1))
        .enumerate()
        .for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                *out = bilinear_or(image, map(DVec2::new(x as f64, y as f64)), border);
            }
        });
    Buffer2::new(width, height, output)
}
