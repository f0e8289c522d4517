//! bpeprep-core - Core byte-level BPE data structures and encoding
//!
//! This crate provides the vocabulary, merge rules and the rank-ordered
//! byte-level encoder, independent of training and of any file format.
//!
//! # Features
//!
//! - Dense, id-ordered vocabulary with `AHashMap` lookup and compact strings
//! - Special tokens as a distinct token kind that never takes part in merges
//! - Merge rules kept in learned order, which is their rank
//! - Lowest-rank-first merge application over an 8-ary heap
//!
//! # Example
//!
//! ```rust
//! use bpeprep_core::{TokenKind, Vocabulary};
//!
//! let mut vocab = Vocabulary::new();
//! vocab.add_special_tokens(&["<pad>", "<unk>"])?;
//! let id = vocab.add_token("a", TokenKind::Base)?;
//! assert_eq!(id, 2);
//! # Ok::<(), bpeprep_core::TokenizerError>(())
//! ```

pub mod error;
pub use error::{Result, TokenizerError};

pub mod core;
pub use crate::core::{
    MergeCandidate, MergeMap, MergeRule, MergeRules, Pair, PairPriorityQueue, SpecialTokens,
    TokenEntry, TokenKind, Vocab, Vocabulary,
};

pub mod encoding;
pub use encoding::{byte_to_char, bytes_to_symbols, char_to_byte, ByteLevelEncoder};
