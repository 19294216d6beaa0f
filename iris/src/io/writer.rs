//! Result table and background composite output.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use common::Buffer2;
use tiff::encoder::{colortype, TiffEncoder};
use tracing::info;

use crate::assembly::SequenceRecord;
use crate::error::{ImageDimensions, WriteError};
use crate::io::{BACKGROUND_FILE_NAME, TABLE_FILE_NAME};

const TABLE_HEADER: &str = "spot_id\tx\ty\tsequence\tquality";

/// Where a run's outputs were written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub table: PathBuf,
    pub background: PathBuf,
}

/// Write the tab-separated basecalling table, one row per record.
pub fn write_table(path: &Path, records: &[SequenceRecord]) -> Result<(), WriteError> {
    let io_error = |source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(io_error)?;
    let mut out = BufWriter::new(file);
    writeln!(out, "{TABLE_HEADER}").map_err(io_error)?;
    for record in records {
        writeln!(
            out,
            "{}\t{:.2}\t{:.2}\t{}\t{}",
            record.spot_id,
            record.position.x,
            record.position.y,
            record.sequence,
            record.quality_string()
        )
        .map_err(io_error)?;
    }
    out.flush().map_err(io_error)?;

    info!("Wrote {} records to '{}'", records.len(), path.display());
    Ok(())
}

/// Write the background composite as a 16-bit grayscale TIFF.
///
/// Values are rounded and clamped to the `u16` range, NaN becomes 0.
pub fn write_background(path: &Path, image: &Buffer2<f32>) -> Result<(), WriteError> {
    let pixels: Vec<u16> = image
        .pixels()
        .iter()
        .map(|&v| {
            if v.is_nan() {
                0
            } else {
                v.round().clamp(0.0, u16::MAX as f32) as u16
            }
        })
        .collect();

    let tiff_error = |source| WriteError::Tiff {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::create(path).map_err(|source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut encoder = TiffEncoder::new(&mut file).map_err(tiff_error)?;
    encoder
        .write_image::<colortype::Gray16>(image.width() as u32, image.height() as u32, &pixels)
        .map_err(tiff_error)?;

    info!(
        "Wrote {} background to '{}'",
        ImageDimensions::new(image.width(), image.height()),
        path.display()
    );
    Ok(())
}

/// Write both outputs into `dir` under their default names.
pub fn write_outputs(
    dir: &Path,
    records: &[SequenceRecord],
    background: &Buffer2<f32>,
) -> Result<OutputPaths, WriteError> {
    std::fs::create_dir_all(dir).map_err(|source| WriteError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let paths = OutputPaths {
        table: dir.join(TABLE_FILE_NAME),
        background: dir.join(BACKGROUND_FILE_NAME),
    };
    write_table(&paths.table, records)?;
    write_background(&paths.background, background)?;
    Ok(paths)
}
