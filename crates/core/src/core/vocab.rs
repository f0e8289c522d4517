//! Vocabulary storage and lookup.
//!
//! Tokens live in an id-indexed arena (`entries`) with an `AHashMap` for the
//! reverse lookup. Ids are dense and assigned in insertion order, so the
//! arena order is the id order that downstream models depend on.

use crate::error::{Result, TokenizerError};
use ahash::AHashMap;
use compact_str::CompactString;

/// Forward mapping: token string -> ID
pub type Vocab = AHashMap<CompactString, u32>;

/// What a vocabulary entry is, and therefore whether it may take part in merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Reserved token with a fixed low id; never merged
    Special,
    /// Single byte symbol of the base alphabet
    Base,
    /// Symbol produced by a merge rule
    Merged,
}

impl TokenKind {
    /// Whether entries of this kind can appear on either side of a merge.
    #[inline]
    pub fn is_mergeable(self) -> bool {
        !matches!(self, TokenKind::Special)
    }
}

/// A single vocabulary entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEntry {
    pub token: CompactString,
    pub kind: TokenKind,
}

/// Vocabulary with forward lookup and an id-ordered arena.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    /// Forward mapping: token string -> ID
    vocab: Vocab,
    /// Arena: ID -> entry
    entries: Vec<TokenEntry>,
    /// Special token IDs (cached for fast access)
    special: SpecialTokens,
}

impl Vocabulary {
    /// Create a new empty vocabulary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new vocabulary with capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            vocab: Vocab::with_capacity(capacity),
            entries: Vec::with_capacity(capacity),
            special: SpecialTokens::default(),
        }
    }

    /// Add a token to the vocabulary.
    ///
    /// Returns the ID assigned to the token. Adding a string that is already
    /// present returns the existing ID, which happens when two different
    /// pairs merge into the same string.
    pub fn add_token(&mut self, token: &str, kind: TokenKind) -> Result<u32> {
        if let Some(&id) = self.vocab.get(token) {
            if self.entries[id as usize].kind == TokenKind::Special && kind != TokenKind::Special {
                return Err(TokenizerError::InvalidConfig(format!(
                    "token {token:?} collides with a special token"
                )));
            }
            return Ok(id);
        }

        let id = u32::try_from(self.entries.len()).map_err(|_| {
            TokenizerError::InvalidConfig("vocabulary exceeds u32::MAX entries".to_string())
        })?;
        let token = CompactString::new(token);
        self.vocab.insert(token.clone(), id);
        self.entries.push(TokenEntry { token, kind });

        Ok(id)
    }

    /// Register the ordered special tokens. They take ids `0..n`, so this
    /// must run on an empty vocabulary.
    pub fn add_special_tokens<S: AsRef<str>>(&mut self, tokens: &[S]) -> Result<()> {
        if !self.is_empty() {
            return Err(TokenizerError::InvalidConfig(
                "special tokens must be added before any other token".to_string(),
            ));
        }

        for token in tokens {
            let token = token.as_ref();
            if token.is_empty() {
                return Err(TokenizerError::InvalidConfig(
                    "special tokens must not be empty".to_string(),
                ));
            }
            if self.vocab.contains_key(token) {
                return Err(TokenizerError::InvalidConfig(format!(
                    "duplicate special token {token:?}"
                )));
            }
            let id = self.add_token(token, TokenKind::Special)?;
            self.special.ids.push(id);
        }

        Ok(())
    }

    /// Mark one of the special tokens as the fallback for unencodable symbols.
    pub fn set_unknown_token(&mut self, token: &str) -> Result<()> {
        match self.get_id(token) {
            Some(id) if self.special.is_special(id) => {
                self.special.unk = Some(id);
                Ok(())
            }
            _ => Err(TokenizerError::InvalidConfig(format!(
                "unknown token {token:?} is not one of the special tokens"
            ))),
        }
    }

    /// Get the ID for a token string.
    #[inline]
    pub fn get_id(&self, token: &str) -> Option<u32> {
        self.vocab.get(token).copied()
    }

    /// Get the token string for an ID.
    #[inline]
    pub fn get_token(&self, id: u32) -> Option<&str> {
        self.entries.get(id as usize).map(|e| e.token.as_str())
    }

    /// Get the full entry for an ID.
    #[inline]
    pub fn get_entry(&self, id: u32) -> Option<&TokenEntry> {
        self.entries.get(id as usize)
    }

    /// Kind of the token with this ID.
    #[inline]
    pub fn kind(&self, id: u32) -> Option<TokenKind> {
        self.entries.get(id as usize).map(|e| e.kind)
    }

    /// Get the size of the vocabulary.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the vocabulary is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &TokenEntry)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(id, entry)| (id as u32, entry))
    }

    /// Special token IDs.
    #[inline]
    pub fn special(&self) -> &SpecialTokens {
        &self.special
    }

    /// Number of base alphabet entries.
    pub fn base_len(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.kind == TokenKind::Base)
            .count()
    }
}

/// Special token IDs cached for fast access.
#[derive(Debug, Clone, Default)]
pub struct SpecialTokens {
    /// IDs in configuration order
    ids: Vec<u32>,
    /// Fallback for symbols with no vocabulary entry
    unk: Option<u32>,
}

impl SpecialTokens {
    /// Check if an ID is a special token.
    #[inline]
    pub fn is_special(&self, id: u32) -> bool {
        self.ids.contains(&id)
    }

    /// Unknown token ID, if one is configured.
    #[inline]
    pub fn unk(&self) -> Option<u32> {
        self.unk
    }

    /// IDs in configuration order.
    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
