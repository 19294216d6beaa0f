//! End-to-end basecalling run.
//!
//! Stages run strictly forward:
//! registration, background composite, detection composite, spot detection,
//! intensity extraction, decoding with quality scoring, record assembly.
//! The image stack is dropped as soon as extraction is done.
//!
//! Nothing after loading is fatal. Weak registrations, empty spot sets and
//! out-of-frame samples become [`RunWarning`]s and show up in the output as
//! low qualities or no-calls.

pub mod diagnostics;


use common::Buffer2;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::assembly::{ResultAssembler, SequenceRecord};
use crate::composite::{project, Aggregation, ChannelSelection};
use crate::config::PipelineConfig;
use crate::cycle::CycleStack;
use crate::decoding::{BaseCall, BaseDecoder, QualityScorer};
use crate::detection::{Spot, SpotDetector};
use crate::extraction::{IntensityExtractor, Sample};
use crate::registration::{CycleRegistration, Registrar, RegistrationStatus};

pub use diagnostics::{Diagnostics, RunWarning};

/// Everything a run produces.
#[derive(Debug)]
pub struct BasecallRun {
    /// One record per kept spot, in detection order.
    pub records: Vec<SequenceRecord>,
    /// Registered background composite, same size as the input images.
    pub background: Buffer2<f32>,
    pub registrations: Vec<CycleRegistration>,
    pub spots: Vec<Spot>,
    pub diagnostics: Diagnostics,
}

/// Configured basecalling pipeline, reusable across stacks.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    registrar: Registrar,
    detector: SpotDetector,
    extractor: IntensityExtractor,
    scorer: QualityScorer,
    assembler: ResultAssembler,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        config.validate();
        Self {
            registrar: Registrar::new(config.registration.clone()),
            detector: SpotDetector::new(config.detection.clone()),
            extractor: IntensityExtractor::new(config.extraction.clone()),
            scorer: QualityScorer::new(config.quality.clone(), config.decode.min_margin),
            assembler: ResultAssembler::new(config.assembly.clone()),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Basecall a loaded stack.
    pub fn run(&self, stack: CycleStack) -> BasecallRun {
        let mut diagnostics = Diagnostics::default();
        let cycle_count = stack.cycle_count();
        info!(
            "Basecalling {} {} cycles of {}",
            cycle_count,
            stack.layout(),
            stack.dimensions()
        );
        if stack.layout() != self.config.layout {
            debug!(
                "Stack layout {} differs from configured {}, using the stack's",
                stack.layout(),
                self.config.layout
            );
        }
        if cycle_count == 1 {
            diagnostics.push(RunWarning::SingleCycle);
        }

        let registrations = self.registrar.register(&stack);
        for registration in &registrations {
            if let Some(reason) = registration.fallback_reason {
                diagnostics.push(RunWarning::LowConfidenceRegistration {
                    cycle: registration.cycle,
                    reason,
                });
            }
        }

        let background = self.assembler.background(&stack, &registrations);
        let detection_image = project(
            &stack,
            &registrations,
            ChannelSelection::Signal,
            Aggregation::Max,
        );
        let spots = self.detector.detect(&detection_image);
        drop(detection_image);
        if spots.is_empty() {
            diagnostics.push(RunWarning::NoSpotsDetected);
        }

        let samples = self.extractor.extract(&stack, &registrations, &spots);
        let decoder = BaseDecoder::new(self.config.decode.clone(), stack.scheme().clone());
        drop(stack);

        for (spot, row) in samples.iter().enumerate() {
            for (cycle, sample) in row.iter().enumerate() {
                if sample.is_out_of_frame() {
                    diagnostics.push(RunWarning::OutOfFrameSample { spot, cycle });
                }
            }
        }

        let statuses: Vec<RegistrationStatus> = registrations.iter().map(|r| r.status).collect();
        let calls: Vec<Vec<BaseCall>> = samples
            .par_iter()
            .map(|row| self.call_row(&decoder, row, &statuses))
            .collect();
        drop(samples);

        let records = self.assembler.assemble(&spots, &calls);
        diagnostics.record_calls(&calls);

        let out_of_frame = diagnostics.out_of_frame_count();
        if out_of_frame > 0 {
            warn!("{out_of_frame} spot/cycle samples fell outside their cycle's image");
        }
        info!(
            "Run finished: {} records, {} calls, {} no-calls, {} warnings",
            records.len(),
            diagnostics.call_count,
            diagnostics.no_call_count,
            diagnostics.warnings.len()
        );

        BasecallRun {
            records,
            background,
            registrations,
            spots,
            diagnostics,
        }
    }

    fn call_row(
        &self,
        decoder: &BaseDecoder,
        samples: &[Sample],
        statuses: &[RegistrationStatus],
    ) -> Vec<BaseCall> {
        samples
            .iter()
            .zip(statuses)
            .map(|(sample, &status)| {
                let decision = decoder.decode_sample(sample, status);
                BaseCall {
                    decision,
                    quality: self.scorer.score(&decision, sample.displacement(), status),
                }
            })
            .collect()
    }
}
