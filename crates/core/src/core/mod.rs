//! Core BPE data structures.
//!
//! This module contains the vocabulary, merge rules and the pair queue used
//! by training, independent of how text is split or persisted.

pub mod merges;
pub mod priority;
pub mod vocab;

pub use merges::{MergeMap, MergeRule, MergeRules, Pair};
pub use priority::{MergeCandidate, PairPriorityQueue};
pub use vocab::{SpecialTokens, TokenEntry, TokenKind, Vocab, Vocabulary};
