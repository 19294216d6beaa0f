//! Iris - basecalling for in-situ sequencing image stacks.
//!
//! Turns multi-cycle fluorescence images into per-spot barcode sequences:
//! - Cross-cycle registration by phase correlation
//! - Spot detection on the registered signal composite
//! - Per-spot intensity extraction and ratio-margin base decoding
//! - Phred-like quality scores and a registered background composite
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use iris::{load_ke, write_outputs, LoaderConfig, Pipeline, PipelineConfig, Layout};
//!
//! let stack = load_ke(&cycle_dirs, &LoaderConfig::default())?;
//! let run = Pipeline::new(PipelineConfig::for_layout(Layout::Ke)).run(stack);
//! write_outputs(Path::new("."), &run.records, &run.background)?;
//!
//! println!("Called {} spots", run.records.len());
//! ```

pub mod assembly;
pub mod composite;
pub mod config;
pub mod cycle;
pub mod decoding;
pub mod detection;
pub mod error;
pub mod extraction;
pub(crate) mod filter;
pub(crate) mod interpolation;
pub mod io;
pub mod layout;
pub(crate) mod math;
pub mod pipeline;
pub mod registration;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Input data
// ============================================================================

pub use cycle::{ChannelImage, Cycle, CycleStack};
pub use error::{ConfigError, ImageDimensions, LoadError, WriteError};
pub use layout::{ChannelLabel, ChannelScheme, Layout, NO_CALL_SYMBOL};

// ============================================================================
// Registration
// ============================================================================

pub use registration::{
    CycleRegistration, FallbackReason, Registrar, RegistrationConfig, RegistrationStatus,
    Representative, SubpixelMethod, Transform, TransformModel,
};

// ============================================================================
// Detection, extraction, decoding
// ============================================================================

pub use composite::{Aggregation, ChannelSelection};
pub use decoding::{
    BaseCall, BaseDecoder, Decision, DecodeConfig, FailedRegistrationPolicy, NoCallReason,
    QualityConfig, QualityScorer,
};
pub use detection::{DetectionConfig, Spot, SpotDetector};
pub use extraction::{ExtractionConfig, IntensityExtractor, IntensityVector, Sample};

// ============================================================================
// Assembly and pipeline
// ============================================================================

pub use assembly::{AssemblyConfig, ResultAssembler, SequenceRecord};
pub use config::PipelineConfig;
pub use pipeline::{BasecallRun, Diagnostics, Pipeline, RunWarning};

// ============================================================================
// File I/O
// ============================================================================

pub use io::{
    load_eng, load_ke, write_background, write_outputs, write_table, LoaderConfig, OutputPaths,
    BACKGROUND_FILE_NAME, TABLE_FILE_NAME,
};
