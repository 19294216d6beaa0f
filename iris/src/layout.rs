//! Acquisition layouts and their pseudo-color channel schemes.
//!
//! Two layouts are supported:
//!
//! | Layout | Channels per cycle | Informative symbols | Background |
//! |--------|--------------------|---------------------|------------|
//! | Ke     | 5                  | `A`, `T`, `C`, `G`  | DAPI       |
//! | Eng    | 4 per round        | `1`, `2`, `3`       | all-spot stain |
//!
//! Downstream stages never look at the layout directly. They receive a
//! [`ChannelScheme`], which enumerates the informative symbols and where the
//! background channel sits inside a cycle.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Symbol emitted for a no-call.
pub const NO_CALL_SYMBOL: char = 'N';

/// Acquisition layout of the input images.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Layout {
    /// One directory per cycle, one single-channel file per pseudo-color (Ke et al. 2013).
    #[default]
    Ke,
    /// One multi-page file per round: three color pages followed by the background (Eng et al.).
    Eng,
}

impl Layout {
    pub fn scheme(&self) -> ChannelScheme {
        match self {
            Layout::Ke => ChannelScheme::new(vec!['A', 'T', 'C', 'G']),
            Layout::Eng => ChannelScheme::new(vec!['1', '2', '3']),
        }
    }
}

/// Identity of one channel inside a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelLabel {
    /// Informative pseudo-color standing for `symbol`.
    Signal(char),
    Background,
}

impl std::fmt::Display for ChannelLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelLabel::Signal(symbol) => write!(f, "{}", symbol),
            ChannelLabel::Background => write!(f, "background"),
        }
    }
}

/// Channel ordering shared by every cycle of a run.
///
/// Informative channels come first in symbol order, the background channel
/// is last. Intensity vectors use the same ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelScheme {
    symbols: Vec<char>,
}

impl ChannelScheme {
    pub fn new(symbols: Vec<char>) -> Self {
        assert!(!symbols.is_empty(), "channel scheme needs at least one symbol");
        assert!(
            !symbols.contains(&NO_CALL_SYMBOL),
            "'{}' is reserved for no-calls",
            NO_CALL_SYMBOL
        );
        Self { symbols }
    }

    /// Informative symbols, in channel order.
    #[inline]
    pub fn symbols(&self) -> &[char] {
        &self.symbols
    }

    /// Number of informative (non-background) channels.
    #[inline]
    pub fn signal_channels(&self) -> usize {
        self.symbols.len()
    }

    /// Total channels per cycle, background included.
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.symbols.len() + 1
    }

    #[inline]
    pub fn background_index(&self) -> usize {
        self.symbols.len()
    }

    pub fn labels(&self) -> Vec<ChannelLabel> {
        self.symbols
            .iter()
            .map(|&s| ChannelLabel::Signal(s))
            .chain(std::iter::once(ChannelLabel::Background))
            .collect()
    }

    #[inline]
    pub fn symbol(&self, channel: usize) -> char {
        self.symbols[channel]
    }
}
