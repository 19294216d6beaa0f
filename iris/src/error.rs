use std::path::PathBuf;

use thiserror::Error;

use crate::layout::Layout;

/// Width and height of an image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageDimensions {
    pub width: usize,
    pub height: usize,
}

impl ImageDimensions {
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

impl std::fmt::Display for ImageDimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Fatal input errors. Raised before any pipeline stage runs.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("No cycles supplied")]
    NoCycles,

    #[error("Missing input file '{path}'")]
    MissingFile { path: PathBuf },

    #[error("Failed to read file '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to decode TIFF '{path}': {source}")]
    Tiff {
        path: PathBuf,
        source: tiff::TiffError,
    },

    #[error("Unsupported pixel format in '{path}': {format}")]
    UnsupportedPixelFormat { path: PathBuf, format: String },

    #[error(
        "Cycle {cycle} has {actual} channels, {layout} layout expects {expected}"
    )]
    ChannelCountMismatch {
        cycle: usize,
        layout: Layout,
        expected: usize,
        actual: usize,
    },

    #[error("Cycle {cycle} channel {channel} is {actual}, expected {expected}")]
    DimensionMismatch {
        cycle: usize,
        channel: usize,
        expected: ImageDimensions,
        actual: ImageDimensions,
    },

    #[error("Cycle {cycle} channel {channel} is labelled '{actual}', expected '{expected}'")]
    LabelMismatch {
        cycle: usize,
        channel: usize,
        expected: String,
        actual: String,
    },

    #[error("Empty image in cycle {cycle}")]
    EmptyImage { cycle: usize },
}

/// Errors raised while persisting run outputs.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to encode TIFF '{path}': {source}")]
    Tiff {
        path: PathBuf,
        source: tiff::TiffError,
    },
}

/// Errors raised while reading a pipeline config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unrecognized config file '{path}': {source}")]
    Format {
        path: PathBuf,
        source: common::file_format::FileExtensionError,
    },

    #[error("Failed to parse config '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: common::serde_format::SerdeFormatError,
    },
}
