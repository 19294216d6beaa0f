//! TIFF stack loading for the Ke and Eng layouts.
//!
//! - Ke: one directory per cycle holding one single-page grayscale TIFF per
//!   pseudo-color, named by [`LoaderConfig`]
//! - Eng: one multi-page TIFF per round, three color pages then the background
//!
//! Every pixel is converted to `f32`. All structural checks (channel count,
//! dimensions) finish before any pipeline stage sees the data.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use common::Buffer2;
use serde::{Deserialize, Serialize};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::ColorType;
use tracing::{debug, info};

use crate::cycle::{ChannelImage, Cycle, CycleStack};
use crate::error::LoadError;
use crate::layout::Layout;

/// File names of the Ke pseudo-color channels inside a cycle directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub a_file: String,
    pub t_file: String,
    pub c_file: String,
    pub g_file: String,
    pub background_file: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            a_file: "Y5.tif".to_string(),
            t_file: "FAM.tif".to_string(),
            c_file: "TXR.tif".to_string(),
            g_file: "Y3.tif".to_string(),
            background_file: "DAPI.tif".to_string(),
        }
    }
}

impl LoaderConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) {
        for name in self.ke_files() {
            assert!(!name.is_empty(), "Ke channel file names must not be empty");
        }
    }

    /// File names in Ke channel order: A, T, C, G, background.
    pub fn ke_files(&self) -> [&str; 5] {
        [
            self.a_file.as_str(),
            self.t_file.as_str(),
            self.c_file.as_str(),
            self.g_file.as_str(),
            self.background_file.as_str(),
        ]
    }
}

/// Load a Ke run: `cycle_dirs[i]` holds the channel files of cycle `i`.
pub fn load_ke(cycle_dirs: &[PathBuf], config: &LoaderConfig) -> Result<CycleStack, LoadError> {
    config.validate();
    let labels = Layout::Ke.scheme().labels();

    let mut cycles = Vec::with_capacity(cycle_dirs.len());
    for dir in cycle_dirs {
        let mut channels = Vec::with_capacity(labels.len());
        for (&label, name) in labels.iter().zip(config.ke_files()) {
            let path = dir.join(name);
            let mut pages = read_pages(&path)?;
            if pages.len() > 1 {
                debug!("'{}' has {} pages, using the first", path.display(), pages.len());
            }
            channels.push(ChannelImage::new(label, pages.swap_remove(0)));
        }
        cycles.push(Cycle::new(channels));
    }

    let stack = CycleStack::new(Layout::Ke, cycles)?;
    info!(
        "Loaded {} Ke cycles of {}",
        stack.cycle_count(),
        stack.dimensions()
    );
    Ok(stack)
}

/// Load an Eng run: `round_files[i]` is the multi-page TIFF of round `i`.
pub fn load_eng(round_files: &[PathBuf]) -> Result<CycleStack, LoadError> {
    let labels = Layout::Eng.scheme().labels();

    let mut cycles = Vec::with_capacity(round_files.len());
    for (round, path) in round_files.iter().enumerate() {
        let pages = read_pages(path)?;
        if pages.len() != labels.len() {
            return Err(LoadError::ChannelCountMismatch {
                cycle: round,
                layout: Layout::Eng,
                expected: labels.len(),
                actual: pages.len(),
            });
        }
        let channels = labels
            .iter()
            .zip(pages)
            .map(|(&label, pixels)| ChannelImage::new(label, pixels))
            .collect();
        cycles.push(Cycle::new(channels));
    }

    let stack = CycleStack::new(Layout::Eng, cycles)?;
    info!(
        "Loaded {} Eng rounds of {}",
        stack.cycle_count(),
        stack.dimensions()
    );
    Ok(stack)
}

/// Decode every page of a grayscale TIFF.
fn read_pages(path: &Path) -> Result<Vec<Buffer2<f32>>, LoadError> {
    if !path.is_file() {
        return Err(LoadError::MissingFile {
            path: path.to_path_buf(),
        });
    }
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let tiff_error = |source| LoadError::Tiff {
        path: path.to_path_buf(),
        source,
    };

    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(tiff_error)?
        .with_limits(Limits::unlimited());

    let mut pages = vec![read_page(&mut decoder, path)?];
    while decoder.more_images() {
        decoder.next_image().map_err(tiff_error)?;
        pages.push(read_page(&mut decoder, path)?);
    }
    Ok(pages)
}

fn read_page<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    path: &Path,
) -> Result<Buffer2<f32>, LoadError> {
    let tiff_error = |source| LoadError::Tiff {
        path: path.to_path_buf(),
        source,
    };
    let unsupported = |format: String| LoadError::UnsupportedPixelFormat {
        path: path.to_path_buf(),
        format,
    };

    match decoder.colortype().map_err(tiff_error)? {
        ColorType::Gray(_) => {}
        other => return Err(unsupported(format!("{:?}", other))),
    }
    let (width, height) = decoder.dimensions().map_err(tiff_error)?;

    let pixels: Vec<f32> = match decoder.read_image().map_err(tiff_error)? {
        DecodingResult::U8(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::F32(buf) => buf,
        DecodingResult::F64(buf) => buf.into_iter().map(|v| v as f32).collect(),
        _ => return Err(unsupported("signed or 64-bit integer samples".to_string())),
    };

    Ok(Buffer2::new(width as usize, height as usize, pixels))
}
