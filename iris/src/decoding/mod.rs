//! Per-cycle base decoding and quality scoring.
//!
//! A call picks the brightest informative channel. It is withdrawn when the
//! channel does not dominate the whole cycle (`top / sum` including the
//! background below `min_margin`) or when the runner-up is within
//! `tie_tolerance` of it. Both decoder and scorer only see a
//! [`ChannelScheme`], so Ke and Eng runs share the same rule.

pub mod config;
pub mod quality;


use strum_macros::Display;

use crate::extraction::{IntensityVector, Sample};
use crate::layout::{ChannelScheme, NO_CALL_SYMBOL};
use crate::registration::RegistrationStatus;

pub use config::{DecodeConfig, FailedRegistrationPolicy};
pub use quality::{phred_char, QualityConfig, QualityScorer};

/// Sums at or below this are treated as an empty cycle.
const SIGNAL_EPSILON: f32 = 1e-6;

/// Why a (spot, cycle) pair produced no base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum NoCallReason {
    /// The spot maps outside the cycle's image.
    OutOfFrame,
    /// No intensity in any channel.
    NoSignal,
    /// The top channel does not dominate the cycle.
    LowMargin,
    /// The top two channels are too close.
    Ambiguous,
    /// The cycle was not registered and policy forbids calls from it.
    RegistrationFailed,
}

/// Outcome of decoding one (spot, cycle) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Call {
        symbol: char,
        /// Index of the winning channel.
        channel: usize,
        /// `top / sum(all channels)`, in (0, 1].
        margin: f32,
    },
    NoCall(NoCallReason),
}

impl Decision {
    /// The base symbol, or [`NO_CALL_SYMBOL`].
    #[inline]
    pub fn symbol(&self) -> char {
        match self {
            Decision::Call { symbol, .. } => *symbol,
            Decision::NoCall(_) => NO_CALL_SYMBOL,
        }
    }

    #[inline]
    pub fn is_call(&self) -> bool {
        matches!(self, Decision::Call { .. })
    }

    /// Decoding margin, 0 for no-calls.
    #[inline]
    pub fn margin(&self) -> f32 {
        match self {
            Decision::Call { margin, .. } => *margin,
            Decision::NoCall(_) => 0.0,
        }
    }
}

/// Decoded symbol of one (spot, cycle) pair together with its quality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseCall {
    pub decision: Decision,
    pub quality: u8,
}

impl BaseCall {
    #[inline]
    pub fn symbol(&self) -> char {
        self.decision.symbol()
    }
}

/// Brightest informative channel and its runner-up value.
///
/// `values` holds the informative channels followed by the background.
/// Equal values resolve to the lower channel index.
fn top_two(values: &[f32], signal_channels: usize) -> (usize, f32, f32) {
    let mut top = (0, f32::NEG_INFINITY);
    let mut second = 0.0f32;
    for (i, &v) in values[..signal_channels].iter().enumerate() {
        if v > top.1 {
            second = second.max(top.1);
            top = (i, v);
        } else {
            second = second.max(v);
        }
    }
    (top.0, top.1.max(0.0), second)
}

/// `top / sum(all channels)`, or 0 when the cycle carries no signal.
pub fn decoding_margin(values: &[f32], signal_channels: usize) -> f32 {
    let sum: f32 = values.iter().map(|v| v.max(0.0)).sum();
    if sum <= SIGNAL_EPSILON {
        return 0.0;
    }
    let (_, top, _) = top_two(values, signal_channels);
    top / sum
}

/// Turns intensity vectors into base calls.
#[derive(Debug, Clone)]
pub struct BaseDecoder {
    config: DecodeConfig,
    scheme: ChannelScheme,
}

impl BaseDecoder {
    pub fn new(config: DecodeConfig, scheme: ChannelScheme) -> Self {
        config.validate();
        Self { config, scheme }
    }

    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    pub fn scheme(&self) -> &ChannelScheme {
        &self.scheme
    }

    /// Decode one intensity vector.
    pub fn decode(&self, vector: &IntensityVector) -> Decision {
        let values = vector.values();
        let signal_channels = self.scheme.signal_channels();
        assert_eq!(
            values.len(),
            self.scheme.channel_count(),
            "intensity vector does not match channel scheme"
        );

        let sum: f32 = values.iter().map(|v| v.max(0.0)).sum();
        let (channel, top, second) = top_two(values, signal_channels);
        if sum <= SIGNAL_EPSILON || top <= 0.0 {
            return Decision::NoCall(NoCallReason::NoSignal);
        }

        let margin = top / sum;
        if margin < self.config.min_margin {
            return Decision::NoCall(NoCallReason::LowMargin);
        }
        if top - second <= self.config.tie_tolerance * top {
            return Decision::NoCall(NoCallReason::Ambiguous);
        }

        Decision::Call {
            symbol: self.scheme.symbol(channel),
            channel,
            margin,
        }
    }

    /// Decode a sample of a cycle with the given registration status.
    pub fn decode_sample(&self, sample: &Sample, status: RegistrationStatus) -> Decision {
        if status.is_degraded()
            && self.config.on_failed_registration == FailedRegistrationPolicy::NoCall
        {
            return Decision::NoCall(NoCallReason::RegistrationFailed);
        }
        match sample {
            Sample::OutOfFrame => Decision::NoCall(NoCallReason::OutOfFrame),
            Sample::Intensities(vector) => self.decode(vector),
        }
    }
}
