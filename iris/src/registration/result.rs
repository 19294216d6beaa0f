//! Registration outcome per cycle.

use strum_macros::Display;

use crate::registration::transform::Transform;

/// How a cycle's transform was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RegistrationStatus {
    /// The reference cycle itself.
    Reference,
    /// Alignment succeeded with sufficient confidence.
    Aligned,
    /// Alignment failed or was implausible; identity was substituted.
    Fallback,
    /// Registration disabled by configuration.
    Skipped,
}

impl RegistrationStatus {
    /// Whether calls from this cycle must be degraded.
    #[inline]
    pub fn is_degraded(&self) -> bool {
        matches!(self, RegistrationStatus::Fallback)
    }
}

/// Why a cycle fell back to the identity transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FallbackReason {
    /// No correlation peak above `min_peak_value`.
    NoPeak,
    LowConfidence { confidence: f64 },
    ShiftTooLarge { shift: f64 },
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::NoPeak => write!(f, "no correlation peak"),
            FallbackReason::LowConfidence { confidence } => {
                write!(f, "confidence {:.3} below threshold", confidence)
            }
            FallbackReason::ShiftTooLarge { shift } => {
                write!(f, "shift {:.1}px exceeds max_shift", shift)
            }
        }
    }
}

/// Transform and quality of one cycle's alignment to the reference.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleRegistration {
    pub cycle: usize,
    pub transform: Transform,
    pub status: RegistrationStatus,
    /// Peak-to-sidelobe confidence in [0, 1]. 1.0 for the reference cycle.
    pub confidence: f64,
    pub fallback_reason: Option<FallbackReason>,
}

impl CycleRegistration {
    pub fn reference(cycle: usize) -> Self {
        Self {
            cycle,
            transform: Transform::identity(),
            status: RegistrationStatus::Reference,
            confidence: 1.0,
            fallback_reason: None,
        }
    }

    pub fn skipped(cycle: usize) -> Self {
        Self {
            status: RegistrationStatus::Skipped,
            ..Self::reference(cycle)
        }
    }

    pub fn aligned(cycle: usize, transform: Transform, confidence: f64) -> Self {
        Self {
            cycle,
            transform,
            status: RegistrationStatus::Aligned,
            confidence,
            fallback_reason: None,
        }
    }

    pub fn fallback(cycle: usize, reason: FallbackReason, confidence: f64) -> Self {
        Self {
            cycle,
            transform: Transform::identity(),
            status: RegistrationStatus::Fallback,
            confidence,
            fallback_reason: Some(reason),
        }
    }
}
