//! Image filters: separable Gaussian smoothing and box-mean local background.
//!
//! Rows are processed in parallel chunks. The box mean truncates its window
//! at the border; the Gaussian blur either replicates edge pixels or treats
//! everything beyond the border as zero.

use common::Buffer2;
use rayon::prelude::*;

const ROWS_PER_CHUNK: usize = 8;

/// Normalized 1D Gaussian kernel of radius `ceil(3 * sigma)`.
pub fn gaussian_kernel_1d(sigma: f32) -> Vec<f32> {
    assert!(sigma > 0.0, "Sigma must be positive");

    let radius = (3.0 * sigma).ceil() as usize;
    let two_sigma_sq = 2.0 * sigma * sigma;

    let mut kernel: Vec<f32> = (0..2 * radius + 1)
        .map(|i| {
            let x = i as f32 - radius as f32;
            (-x * x / two_sigma_sq).exp()
        })
        .collect();

    let sum: f32 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }

    kernel
}

#[inline]
fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}

/// How the blur samples beyond the image border.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edges {
    /// Repeat the nearest edge pixel.
    Replicate,
    /// Outside pixels are zero. Keeps features touching the border symmetric
    /// on zero-mean input.
    Zero,
}

/// Separable Gaussian blur with replicated edges. `sigma <= 0` returns a copy.
pub fn gaussian_blur(image: &Buffer2<f32>, sigma: f32) -> Buffer2<f32> {
    gaussian_blur_with(image, sigma, Edges::Replicate)
}

/// Separable Gaussian blur. `sigma <= 0` returns a copy of the input.
pub fn gaussian_blur_with(image: &Buffer2<f32>, sigma: f32, edges: Edges) -> Buffer2<f32> {
    if sigma <= 0.0 || image.is_empty() {
        return image.clone();
    }

    let (width, height) = image.dimensions();
    let kernel = gaussian_kernel_1d(sigma);
    let radius = (kernel.len() / 2) as isize;
    let source = |i: isize, len: usize| -> Option<usize> {
        match edges {
            Edges::Replicate => Some(clamp_index(i, len)),
            Edges::Zero => (i >= 0 && i < len as isize).then_some(i as usize),
        }
    };

    let mut horizontal = vec![0.0f32; width * height];
    horizontal
        .par_chunks_mut(width * ROWS_PER_CHUNK)
        .enumerate()
        .for_each(|(chunk_idx, out_chunk)| {
            let y_start = chunk_idx * ROWS_PER_CHUNK;
            for (local_y, out_row) in out_chunk.chunks_mut(width).enumerate() {
                let in_row = image.row(y_start + local_y);
                for (x, out) in out_row.iter_mut().enumerate() {
                    *out = kernel
                        .iter()
                        .enumerate()
                        .filter_map(|(k, &w)| {
                            source(x as isize + k as isize - radius, width).map(|sx| in_row[sx] * w)
                        })
                        .sum();
                }
            }
        });

    let mut output = vec![0.0f32; width * height];
    output
        .par_chunks_mut(width * ROWS_PER_CHUNK)
        .enumerate()
        .for_each(|(chunk_idx, out_chunk)| {
            let y_start = chunk_idx * ROWS_PER_CHUNK;
            for (local_y, out_row) in out_chunk.chunks_mut(width).enumerate() {
                let y = y_start + local_y;
                for (k, &w) in kernel.iter().enumerate() {
                    let Some(sy) = source(y as isize + k as isize - radius, height) else {
                        continue;
                    };
                    let in_row = &horizontal[sy * width..(sy + 1) * width];
                    for (out, &v) in out_row.iter_mut().zip(in_row) {
                        *out += v * w;
                    }
                }
            }
        });

    Buffer2::new(width, height, output)
}

/// Summed-area table with a zero first row and column.
///
/// Entry `(x, y)` holds the sum of all pixels strictly above and left of it.
struct IntegralImage {
    sums: Vec<f64>,
    stride: usize,
}

impl IntegralImage {
    fn new(image: &Buffer2<f32>) -> Self {
        let (width, height) = image.dimensions();
        let stride = width + 1;
        let mut sums = vec![0.0f64; stride * (height + 1)];
        for y in 0..height {
            let mut row_sum = 0.0f64;
            for (x, &v) in image.row(y).iter().enumerate() {
                row_sum += v as f64;
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row_sum;
            }
        }
        Self { sums, stride }
    }

    /// Sum over the half-open rectangle `[x0, x1) x [y0, y1)`.
    #[inline]
    fn rect_sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> f64 {
        let s = self.stride;
        self.sums[y1 * s + x1] - self.sums[y0 * s + x1] - self.sums[y1 * s + x0]
            + self.sums[y0 * s + x0]
    }
}

/// Mean over the `(2r + 1)^2` window around every pixel, truncated at the border.
pub fn box_mean(image: &Buffer2<f32>, radius: usize) -> Buffer2<f32> {
    let (width, height) = image.dimensions();
    if image.is_empty() {
        return image.clone();
    }
    let integral = IntegralImage::new(image);

    let mut output = vec![0.0f32; width * height];
    output
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, out_row)| {
            let y0 = y.saturating_sub(radius);
            let y1 = (y + radius + 1).min(height);
            for (x, out) in out_row.iter_mut().enumerate() {
                let x0 = x.saturating_sub(radius);
                let x1 = (x + radius + 1).min(width);
                let area = ((x1 - x0) * (y1 - y0)) as f64;
                *out = (integral.rect_sum(x0, y0, x1, y1) / area) as f32;
            }
        });

    Buffer2::new(width, height, output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_is_normalized_and_symmetric() {
        let kernel = gaussian_kernel_1d(1.5);
        assert_eq!(kernel.len(), 11);
        let sum: f32 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        for i in 0..kernel.len() / 2 {
            assert!((kernel[i] - kernel[kernel.len() - 1 - i]).abs() < 1e-7);
        }
    }

    #[test]
    fn test_blur_preserves_constant_image() {
        let image = Buffer2::new_filled(20, 13, 7.0f32);
        let blurred = gaussian_blur(&image, 2.0);
        assert_eq!(blurred.dimensions(), (20, 13));
        assert!(blurred.pixels().iter().all(|&v| (v - 7.0).abs() < 1e-4));
    }

    #[test]
    fn test_blur_spreads_impulse_and_keeps_peak() {
        let mut image = Buffer2::new_default(15, 15);
        image[(7, 7)] = 1.0f32;
        let blurred = gaussian_blur(&image, 1.0);
        let total: f32 = blurred.pixels().iter().sum();
        assert!((total - 1.0).abs() < 1e-4);
        let peak = blurred[(7, 7)];
        assert!(blurred.pixels().iter().all(|&v| v <= peak));
        assert!((blurred[(6, 7)] - blurred[(8, 7)]).abs() < 1e-7);
    }

    #[test]
    fn test_zero_edges_keep_border_patch_symmetric() {
        let mut image = Buffer2::<f32>::new_default(12, 12);
        for y in 0..3 {
            for x in 0..3 {
                image[(x, y)] = 1.0f32;
            }
        }

        let zero = gaussian_blur_with(&image, 1.0, Edges::Zero);
        assert!(zero[(1, 1)] > zero[(0, 1)]);
        assert!((zero[(0, 1)] - zero[(2, 1)]).abs() < 1e-6);
        assert!((zero[(1, 0)] - zero[(1, 2)]).abs() < 1e-6);

        // Replicated edges pull the maximum onto the corner pixel
        let replicated = gaussian_blur(&image, 1.0);
        assert!(replicated[(0, 0)] > replicated[(1, 1)]);
    }

    #[test]
    fn test_blur_zero_sigma_is_copy() {
        let image = Buffer2::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(gaussian_blur(&image, 0.0), image);
    }

    #[test]
    fn test_box_mean() {
        let image = Buffer2::new(3, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        let mean = box_mean(&image, 1);
        assert!((mean[(1, 1)] - 5.0).abs() < 1e-6);
        // corner window is 2x2: (1 + 2 + 4 + 5) / 4
        assert!((mean[(0, 0)] - 3.0).abs() < 1e-6);
        let unchanged = box_mean(&image, 0);
        assert_eq!(unchanged, image);
    }
}
