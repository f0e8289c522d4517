//! bpeprep-tokenizer - High-level tokenizer API and corpus pipeline
//!
//! This crate ties normalization, pre-tokenization, training and byte-level
//! encoding into a single `Tokenizer`, reads and writes its artifacts, and
//! runs the corpus-to-tokens pipeline.
//!
//! # Features
//!
//! - Builder pattern for tokenizer configuration
//! - GPT-2 style byte-level pre-tokenization with special-token splitting
//! - Corpus normalization (NFC, markup stripping, character allow-list)
//! - `vocab.json` / `merges.txt` and single-file `tokenizer.json` artifacts
//! - Parallel batch encoding with truncation
//!
//! # Example
//!
//! ```rust
//! use bpeprep_tokenizer::Tokenizer;
//!
//! let mut tokenizer = Tokenizer::builder()
//!     .vocab_size(300)
//!     .max_length(16)
//!     .build()?;
//! tokenizer.train(&["hello world", "hello there"])?;
//!
//! let encoding = tokenizer.encode("hello world")?;
//! assert_eq!(tokenizer.decode(&encoding.ids, false)?, "hello world");
//! # Ok::<(), bpeprep_tokenizer::TokenizerError>(())
//! ```

// Re-export core types
pub use bpeprep_core::{Result, TokenizerError};
pub use bpeprep_training::StopReason;

// Tokenizer API
pub mod tokenizer;
pub use tokenizer::{Encoding, Tokenizer, TokenizerBuilder, TokenizerConfig};

// IO/Serialization
pub mod io;
pub use io::{TokenizerLoader, TokenizerSaver};

// Pre-tokenization
pub mod pre_tokenizer;
pub use pre_tokenizer::{Normalizer, NormalizerConfig, SplitPattern, Splitter};

// Corpus pipeline
pub mod pipeline;
pub use pipeline::{EncodedLines, PipelineConfig, PipelineReport};
