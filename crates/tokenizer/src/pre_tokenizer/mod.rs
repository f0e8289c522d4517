//! Pre-tokenization pipeline.
//!
//! This module provides the operations applied before BPE encoding:
//! corpus normalization, special-token splitting and word splitting.

pub mod normalize;
pub mod special;
pub mod split;

pub use normalize::{default_allowed_chars, Normalizer, NormalizerConfig};
pub use special::{Segment, SpecialTokenMatcher};
pub use split::{SplitPattern, Splitter, BYTE_LEVEL_PATTERN};
