//! Sequence records and the background composite.

use common::Buffer2;
use glam::DVec2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::composite::{project, Aggregation, ChannelSelection};
use crate::cycle::CycleStack;
use crate::decoding::{phred_char, BaseCall};
use crate::detection::Spot;
use crate::layout::NO_CALL_SYMBOL;
use crate::registration::CycleRegistration;

/// One spot's decoded barcode.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceRecord {
    /// Index of the spot in detection order.
    pub spot_id: usize,
    /// Reference-frame coordinate.
    pub position: DVec2,
    /// One symbol per cycle.
    pub sequence: String,
    /// One score per cycle.
    pub qualities: Vec<u8>,
}

impl SequenceRecord {
    /// Phred+33 encoded quality string, one character per cycle.
    pub fn quality_string(&self) -> String {
        self.qualities.iter().map(|&q| phred_char(q)).collect()
    }

    pub fn no_call_count(&self) -> usize {
        self.sequence.chars().filter(|&c| c == NO_CALL_SYMBOL).count()
    }

    /// Number of cycles, equal for sequence and qualities.
    #[inline]
    pub fn len(&self) -> usize {
        self.qualities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.qualities.is_empty()
    }
}

/// Output assembly settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    /// Per-pixel fold of the registered background channels.
    pub background_aggregation: Aggregation,
    /// Drop records with more no-calls than this. `None` keeps everything.
    pub max_no_calls: Option<usize>,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            background_aggregation: Aggregation::Max,
            max_no_calls: None,
        }
    }
}

/// Joins per-cycle calls into records.
#[derive(Debug, Clone, Default)]
pub struct ResultAssembler {
    config: AssemblyConfig,
}

impl ResultAssembler {
    pub fn new(config: AssemblyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AssemblyConfig {
        &self.config
    }

    /// One record per spot in detection order. `calls` is indexed `[spot][cycle]`.
    pub fn assemble(&self, spots: &[Spot], calls: &[Vec<BaseCall>]) -> Vec<SequenceRecord> {
        assert_eq!(spots.len(), calls.len(), "one call row per spot required");

        let records: Vec<SequenceRecord> = spots
            .iter()
            .zip(calls)
            .enumerate()
            .map(|(spot_id, (spot, row))| SequenceRecord {
                spot_id,
                position: spot.position,
                sequence: row.iter().map(BaseCall::symbol).collect(),
                qualities: row.iter().map(|call| call.quality).collect(),
            })
            .filter(|record| {
                self.config
                    .max_no_calls
                    .map_or(true, |max| record.no_call_count() <= max)
            })
            .collect();

        if records.len() < spots.len() {
            debug!(
                "Dropped {} records over the no-call limit",
                spots.len() - records.len()
            );
        }
        info!("Assembled {} sequence records", records.len());
        records
    }

    /// Composite of every cycle's background channel in the reference frame.
    pub fn background(
        &self,
        stack: &CycleStack,
        registrations: &[CycleRegistration],
    ) -> Buffer2<f32> {
        project(
            stack,
            registrations,
            ChannelSelection::Background,
            self.config.background_aggregation,
        )
    }
}
