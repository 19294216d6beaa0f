//! Synthetic image builders for tests.

#![allow(dead_code)]

use common::Buffer2;
use glam::DVec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::cycle::{ChannelImage, Cycle, CycleStack};
use crate::layout::Layout;

/// Initialize tracing subscriber for tests.
/// Safe to call multiple times. Respects RUST_LOG, defaults to "info".
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

#[derive(Clone, Default)]
struct SharedLog(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for SharedLog {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a thread-local subscriber and return the WARN and ERROR
/// lines it logged on this thread.
pub fn capture_warnings<R>(f: impl FnOnce() -> R) -> (R, Vec<String>) {
    let log = SharedLog::default();
    let writer = log.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);

    let bytes = log.0.lock().unwrap().clone();
    let lines = String::from_utf8_lossy(&bytes)
        .lines()
        .map(str::to_owned)
        .collect();
    (result, lines)
}

/// Cycle of all-zero channels in the layout's channel order.
pub fn blank_cycle(layout: Layout, width: usize, height: usize) -> Cycle {
    let channels = layout
        .scheme()
        .labels()
        .into_iter()
        .map(|label| ChannelImage::new(label, Buffer2::new_default(width, height)))
        .collect();
    Cycle::new(channels)
}

/// Square patch of `value` with side `2 * half + 1` centred on `center`.
pub fn stamp_patch(image: &mut Buffer2<f32>, center: (usize, usize), half: usize, value: f32) {
    let (cx, cy) = center;
    for y in cy.saturating_sub(half)..=(cy + half).min(image.height() - 1) {
        for x in cx.saturating_sub(half)..=(cx + half).min(image.width() - 1) {
            image[(x, y)] = value;
        }
    }
}

/// Add a Gaussian spot with the given peak amplitude.
pub fn add_gaussian_spot(image: &mut Buffer2<f32>, center: DVec2, amplitude: f32, sigma: f64) {
    let two_sigma_sq = 2.0 * sigma * sigma;
    let radius = (4.0 * sigma).ceil() as isize;
    let cx = center.x.round() as isize;
    let cy = center.y.round() as isize;
    for y in (cy - radius)..=(cy + radius) {
        for x in (cx - radius)..=(cx + radius) {
            if x < 0 || y < 0 || x as usize >= image.width() || y as usize >= image.height() {
                continue;
            }
            let d = DVec2::new(x as f64, y as f64) - center;
            let v = (-(d.length_squared()) / two_sigma_sq).exp() as f32;
            image[(x as usize, y as usize)] += amplitude * v;
        }
    }
}

/// Image of Gaussian spots on a zero background.
pub fn gaussian_spots(
    width: usize,
    height: usize,
    centers: &[DVec2],
    amplitude: f32,
    sigma: f64,
) -> Buffer2<f32> {
    let mut image = Buffer2::new_default(width, height);
    for &c in centers {
        add_gaussian_spot(&mut image, c, amplitude, sigma);
    }
    image
}

/// Well-separated random spot centres at least `margin` pixels from the border.
pub fn random_positions(
    width: usize,
    height: usize,
    count: usize,
    margin: f64,
    min_separation: f64,
    seed: u64,
) -> Vec<DVec2> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut positions: Vec<DVec2> = Vec::with_capacity(count);
    let mut attempts = 0;
    while positions.len() < count && attempts < count * 1000 {
        attempts += 1;
        let p = DVec2::new(
            rng.random_range(margin..width as f64 - margin).round(),
            rng.random_range(margin..height as f64 - margin).round(),
        );
        if positions.iter().all(|q| q.distance(p) >= min_separation) {
            positions.push(p);
        }
    }
    positions
}

/// Integer shift with zero fill: `out(p + (dx, dy)) = image(p)`.
pub fn shift_image(image: &Buffer2<f32>, dx: isize, dy: isize) -> Buffer2<f32> {
    let (width, height) = image.dimensions();
    let mut out = Buffer2::new_default(width, height);
    for y in 0..height {
        for x in 0..width {
            let sx = x as isize - dx;
            let sy = y as isize - dy;
            if let Some(&v) = image.try_get(sx, sy) {
                out[(x, y)] = v;
            }
        }
    }
    out
}

/// Add zero-mean Gaussian noise (Box-Muller) and clamp at zero.
pub fn add_noise(image: &mut Buffer2<f32>, sigma: f32, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    for v in image.pixels_mut() {
        let u1: f32 = rng.random_range(f32::EPSILON..1.0);
        let u2: f32 = rng.random();
        let n = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos();
        *v = (*v + sigma * n).max(0.0);
    }
}

/// Ke stack where every cycle is blank except a bright square in one channel.
///
/// `channel_per_cycle[i]` is the channel lit in cycle `i`.
pub fn patch_stack(
    layout: Layout,
    width: usize,
    height: usize,
    center: (usize, usize),
    channel_per_cycle: &[usize],
    value: f32,
) -> CycleStack {
    let cycles = channel_per_cycle
        .iter()
        .map(|&channel| {
            let mut cycle = blank_cycle(layout, width, height);
            stamp_patch(&mut cycle.channels[channel].pixels, center, 1, value);
            cycle
        })
        .collect();
    CycleStack::new(layout, cycles).expect("synthetic stack must be valid")
}
