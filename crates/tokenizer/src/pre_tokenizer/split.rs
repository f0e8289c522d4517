//! Text splitting for pre-tokenization.
//!
//! Merges never cross the boundaries produced here. The byte-level pattern
//! tiles its input exactly, so concatenating the pieces gives back the text
//! and no byte is lost before encoding.

use bpeprep_core::{Result, TokenizerError};
use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// GPT-2 pre-tokenization pattern.
pub const BYTE_LEVEL_PATTERN: &str =
    r"'s|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+";

/// Splitting patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitPattern {
    /// GPT-2 style: contractions, letter runs, digit runs, punctuation runs
    /// and whitespace, with a leading space kept on the following word
    #[default]
    ByteLevel,
    /// Split on whitespace, dropping it
    Whitespace,
    /// No splitting (keep text as-is)
    NoSplit,
}

impl fmt::Display for SplitPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SplitPattern::ByteLevel => "byte_level",
            SplitPattern::Whitespace => "whitespace",
            SplitPattern::NoSplit => "no_split",
        })
    }
}

impl FromStr for SplitPattern {
    type Err = TokenizerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "byte_level" | "byte-level" => Ok(SplitPattern::ByteLevel),
            "whitespace" => Ok(SplitPattern::Whitespace),
            "no_split" | "no-split" | "none" => Ok(SplitPattern::NoSplit),
            other => Err(TokenizerError::InvalidConfig(format!(
                "unknown split pattern {other:?}"
            ))),
        }
    }
}

/// Text splitter for pre-tokenization.
#[derive(Debug, Clone)]
pub struct Splitter {
    pattern: SplitPattern,
    regex: Option<Regex>,
}

impl Splitter {
    /// Create a new splitter.
    pub fn new(pattern: SplitPattern) -> Self {
        let regex = match pattern {
            SplitPattern::ByteLevel => {
                Some(Regex::new(BYTE_LEVEL_PATTERN).expect("byte-level pattern is valid"))
            }
            SplitPattern::Whitespace | SplitPattern::NoSplit => None,
        };
        Self { pattern, regex }
    }

    /// Create a whitespace splitter.
    pub fn whitespace() -> Self {
        Self::new(SplitPattern::Whitespace)
    }

    pub fn pattern(&self) -> SplitPattern {
        self.pattern
    }

    /// Split text into non-empty pieces borrowed from `text`.
    pub fn split<'t>(&self, text: &'t str) -> Result<Vec<&'t str>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }

        match (&self.regex, self.pattern) {
            (Some(regex), _) => {
                let mut pieces = Vec::with_capacity(text.len() / 4 + 1);
                for mat in regex.find_iter(text) {
                    let m = mat.map_err(|e| TokenizerError::PreTokenization(e.to_string()))?;
                    if !m.as_str().is_empty() {
                        pieces.push(m.as_str());
                    }
                }
                Ok(pieces)
            }
            (None, SplitPattern::Whitespace) => Ok(text.split_whitespace().collect()),
            (None, _) => Ok(vec![text]),
        }
    }
}

impl Default for Splitter {
    fn default() -> Self {
        Self::new(SplitPattern::ByteLevel)
    }
}
