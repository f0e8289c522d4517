//! Error types for the bpeprep libraries.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type shared by the core, training and tokenizer crates.
#[derive(Error, Debug)]
pub enum TokenizerError {
    /// Training saw no symbols at all
    #[error("Empty corpus: no symbols observed in the training text")]
    EmptyCorpus,

    /// Contradictory or out-of-range configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A symbol has no vocabulary entry and no unknown token is configured
    #[error("Unknown symbol {symbol:?} with no unknown-token fallback")]
    UnknownSymbol { symbol: String },

    /// Encode or decode attempted before training or loading
    #[error("Vocabulary not loaded: train or load a tokenizer first")]
    VocabularyNotLoaded,

    /// A persisted vocabulary or merge file failed validation
    #[error("Corrupt artifact {path}: {reason}")]
    CorruptArtifact { path: PathBuf, reason: String },

    /// Decode got an id outside the vocabulary
    #[error("Unknown token ID: {0}")]
    UnknownTokenId(u32),

    /// The pre-tokenizer pattern failed on an input (e.g. backtrack limit)
    #[error("Pre-tokenization failed: {0}")]
    PreTokenization(String),

    /// I/O error with file context
    #[error("I/O error for {path}: {err}")]
    Io {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TokenizerError {
    /// Wrap an [`std::io::Error`] with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            err,
        }
    }

    /// Build a [`TokenizerError::CorruptArtifact`].
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptArtifact {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for tokenizer operations.
pub type Result<T> = std::result::Result<T, TokenizerError>;
