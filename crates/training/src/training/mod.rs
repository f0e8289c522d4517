//! Training infrastructure for BPE tokenizers.
//!
//! This module provides the training algorithms and utilities for
//! learning BPE merge rules from text data.

pub mod counter;
pub mod trainer;

pub use counter::{add_word, count_words, merge_word_counts, PairCounter, WordCounts};
pub use trainer::{BpeTrainer, StopReason, TrainingConfig, TrainingOutcome};
