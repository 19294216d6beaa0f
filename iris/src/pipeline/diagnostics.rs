//! Non-fatal run conditions.

use tracing::{debug, warn};

use crate::decoding::BaseCall;
use crate::registration::FallbackReason;

/// Condition that degrades part of a run without stopping it.
#[derive(Debug, Clone, PartialEq)]
pub enum RunWarning {
    /// Only one cycle was supplied; sequences have length 1.
    SingleCycle,
    /// A cycle kept the identity transform; its calls are degraded.
    LowConfidenceRegistration { cycle: usize, reason: FallbackReason },
    /// The detection composite had no spot above threshold.
    NoSpotsDetected,
    /// A spot mapped outside one cycle's image; that call is a no-call.
    OutOfFrameSample { spot: usize, cycle: usize },
}

impl std::fmt::Display for RunWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunWarning::SingleCycle => write!(f, "only one cycle in this run"),
            RunWarning::LowConfidenceRegistration { cycle, reason } => {
                write!(f, "cycle {cycle} registration degraded: {reason}")
            }
            RunWarning::NoSpotsDetected => write!(f, "no spots detected"),
            RunWarning::OutOfFrameSample { spot, cycle } => {
                write!(f, "spot {spot} is out of frame in cycle {cycle}")
            }
        }
    }
}

/// Warnings and call counts collected during a run.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub warnings: Vec<RunWarning>,
    pub call_count: usize,
    pub no_call_count: usize,
}

impl Diagnostics {
    /// Record and log a warning.
    ///
    /// Out-of-frame samples can be numerous, they are logged at debug level
    /// and summarized once by the pipeline.
    pub fn push(&mut self, warning: RunWarning) {
        match warning {
            RunWarning::OutOfFrameSample { .. } => debug!("{warning}"),
            _ => warn!("{warning}"),
        }
        self.warnings.push(warning);
    }

    pub fn record_calls(&mut self, calls: &[Vec<BaseCall>]) {
        for call in calls.iter().flatten() {
            if call.decision.is_call() {
                self.call_count += 1;
            } else {
                self.no_call_count += 1;
            }
        }
    }

    pub fn out_of_frame_count(&self) -> usize {
        self.warnings
            .iter()
            .filter(|w| matches!(w, RunWarning::OutOfFrameSample { .. }))
            .count()
    }

    pub fn has_registration_warnings(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, RunWarning::LowConfidenceRegistration { .. }))
    }
}
