//! bpeprep-training - Byte-level BPE vocabulary training
//!
//! This crate learns BPE merge rules from word counts.
//!
//! # Features
//!
//! - Word arena with parallel pair counting and an additive reduction
//! - Exact incremental pair counts after each merge
//! - Deterministic tie-breaking on `(left_id, right_id)`
//! - Cooperative cancellation between merges
//!
//! # Example
//!
//! ```rust
//! use bpeprep_training::{BpeTrainer, TrainingConfig};
//!
//! let trainer = BpeTrainer::new(TrainingConfig {
//!     vocab_size: 100,
//!     min_frequency: 2,
//!     ..Default::default()
//! });
//! let outcome = trainer.train_units(["aaab"])?;
//! assert_eq!(outcome.merges.len(), 1);
//! # Ok::<(), bpeprep_training::TokenizerError>(())
//! ```

pub use bpeprep_core::{MergeRules, Result, TokenKind, TokenizerError, Vocabulary};

pub mod training;
pub use training::{
    add_word, count_words, merge_word_counts, BpeTrainer, PairCounter, StopReason, TrainingConfig,
    TrainingOutcome, WordCounts,
};
