//! File adapters around the pipeline: TIFF stack loading and result writing.

pub mod loader;
pub mod writer;

pub use loader::{load_eng, load_ke, LoaderConfig};
pub use writer::{write_background, write_outputs, write_table, OutputPaths};

/// Default name of the basecalling table.
pub const TABLE_FILE_NAME: &str = "basecalling_data.txt";
/// Default name of the background composite image.
pub const BACKGROUND_FILE_NAME: &str = "background.tif";
