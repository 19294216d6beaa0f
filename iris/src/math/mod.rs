//! Numeric helpers shared by the pipeline stages.

mod affine;

pub use affine::Affine2;

/// MAD (Median Absolute Deviation) to standard deviation conversion factor.
///
/// For a normal distribution, σ ≈ 1.4826 × MAD.
pub const MAD_TO_SIGMA: f32 = 1.4826022;

/// Convert MAD to standard deviation (assuming normal distribution).
#[inline]
pub fn mad_to_sigma(mad: f32) -> f32 {
    mad * MAD_TO_SIGMA
}

/// Median of f32 values, computed in place.
///
/// Mutates the input buffer (partial sort via quickselect). Returns 0.0 for
/// an empty slice.
pub fn median_f32_mut(data: &mut [f32]) -> f32 {
    if data.is_empty() {
        return 0.0;
    }

    let len = data.len();
    let mid = len / 2;

    let (left_part, median, _) = data.select_nth_unstable_by(mid, f32::total_cmp);
    let upper = *median;
    if len & 1 == 1 {
        upper
    } else {
        let lower = left_part.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        (lower + upper) * 0.5
    }
}

/// Median and MAD of `data`. Mutates the input buffer.
pub fn median_and_mad_f32_mut(data: &mut [f32]) -> (f32, f32) {
    let median = median_f32_mut(data);
    for v in data.iter_mut() {
        *v = (*v - median).abs();
    }
    let mad = median_f32_mut(data);
    (median, mad)
}
