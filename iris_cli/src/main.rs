//! `iris` - basecall an in-situ sequencing run from the command line.
//!
//! ```bash
//! iris ke cycle_1 cycle_2 cycle_3 cycle_4
//! iris eng round_1.tif round_2.tif round_3.tif --output-dir results
//! ```

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use common::log_setup::setup_logging;
use iris::{load_eng, load_ke, write_outputs, Layout, Pipeline, PipelineConfig};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "iris")]
#[command(about = "Basecalling for in-situ sequencing image stacks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    options: RunOptions,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ke layout: one directory per cycle with Y5/FAM/TXR/Y3/DAPI images.
    Ke {
        /// Cycle directories in cycle order.
        #[arg(required = true)]
        cycle_dirs: Vec<PathBuf>,
    },
    /// Eng layout: one 4-page TIFF per round for a single position.
    Eng {
        /// Round files in round order.
        #[arg(required = true)]
        round_files: Vec<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct RunOptions {
    /// Pipeline config file (.yaml, .yml or .json). Layout defaults otherwise.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for basecalling_data.txt and background.tif.
    #[arg(long, global = true, default_value = ".")]
    output_dir: PathBuf,

    /// Log filter, overridden by RUST_LOG.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Directory for rolling log files.
    #[arg(long, global = true, default_value = "logs")]
    log_dir: String,

    /// Worker threads. 0 uses all cores.
    #[arg(long, global = true, default_value_t = 0)]
    threads: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.options.log_level, &cli.options.log_dir)?;

    if cli.options.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.options.threads)
            .build_global()
            .context("Failed to configure worker threads")?;
    }

    let layout = match cli.command {
        Command::Ke { .. } => Layout::Ke,
        Command::Eng { .. } => Layout::Eng,
    };
    let config = load_config(cli.options.config.as_deref(), layout)?;

    let start = Instant::now();
    let stack = match &cli.command {
        Command::Ke { cycle_dirs } => load_ke(cycle_dirs, &config.loader),
        Command::Eng { round_files } => load_eng(round_files),
    }
    .context("Failed to load input images")?;

    let run = Pipeline::new(config).run(stack);

    let paths = write_outputs(&cli.options.output_dir, &run.records, &run.background)
        .context("Failed to write outputs")?;

    info!(
        "Wrote {} records to '{}' and background to '{}' in {:.2?}",
        run.records.len(),
        paths.table.display(),
        paths.background.display(),
        start.elapsed()
    );
    Ok(())
}

/// Config file if given, layout defaults otherwise. The subcommand's layout wins.
fn load_config(path: Option<&Path>, layout: Layout) -> Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::for_layout(layout));
    };

    let mut config = PipelineConfig::from_file(path)?;
    if config.layout != layout {
        info!(
            "Config layout {} overridden by subcommand layout {}",
            config.layout, layout
        );
        config.layout = layout;
    }
    info!("Loaded config from '{}'", path.display());
    Ok(config)
}
