//! Corpus normalization.
//!
//! Cleans raw text line by line: Unicode NFC, markup and bracketed reference
//! removal, an optional character allow-list, then whitespace collapsing.
//! Every removed span becomes a single space so that words on either side
//! stay apart.

use ahash::AHashSet;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Kazakh letters outside the basic Cyrillic block.
const KAZAKH_LETTERS: &str = "әіңғүұқөһӘІҢҒҮҰҚӨҺ";
const DEFAULT_PUNCTUATION: &str = ".,!?-";

/// Cyrillic, Kazakh and Latin letters plus basic punctuation.
pub fn default_allowed_chars() -> String {
    let mut chars: String = ('а'..='я').chain('А'..='Я').collect();
    chars.push('ё');
    chars.push('Ё');
    chars.extend('a'..='z');
    chars.extend('A'..='Z');
    chars.push_str(KAZAKH_LETTERS);
    chars.push_str(DEFAULT_PUNCTUATION);
    chars
}

/// Normalization settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Characters kept as-is; anything else except whitespace becomes a space.
    /// `None` keeps every character.
    pub allowed_chars: Option<String>,
    /// Replace `<...>` tags with a space
    pub strip_markup: bool,
    /// Replace numeric references such as `[12]` with a space
    pub strip_references: bool,
    /// Apply Unicode NFC before anything else
    pub nfc: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            allowed_chars: Some(default_allowed_chars()),
            strip_markup: true,
            strip_references: true,
            nfc: true,
        }
    }
}

/// Line normalizer.
#[derive(Debug, Clone)]
pub struct Normalizer {
    config: NormalizerConfig,
    markup: Regex,
    references: Regex,
    allowed: Option<AHashSet<char>>,
}

impl Normalizer {
    /// Create a normalizer for the given settings.
    pub fn new(config: NormalizerConfig) -> Self {
        let allowed = config
            .allowed_chars
            .as_ref()
            .map(|chars| chars.chars().collect());

        Self {
            config,
            // Constant patterns, covered by the tests below
            markup: Regex::new(r"<[^>]+>").expect("markup pattern is valid"),
            references: Regex::new(r"\[[0-9]+\]").expect("reference pattern is valid"),
            allowed,
        }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalize one line. The result has no leading, trailing or repeated
    /// whitespace and may be empty.
    pub fn normalize(&self, line: &str) -> String {
        let mut text: String = if self.config.nfc {
            line.nfc().collect()
        } else {
            line.to_string()
        };

        if self.config.strip_markup {
            text = self.markup.replace_all(&text, " ").into_owned();
        }
        if self.config.strip_references {
            text = self.references.replace_all(&text, " ").into_owned();
        }

        let mut out = String::with_capacity(text.len());
        for word in text.split_whitespace() {
            let mut kept = String::with_capacity(word.len());
            for ch in word.chars() {
                match &self.allowed {
                    Some(allowed) if !allowed.contains(&ch) => kept.push(' '),
                    _ => kept.push(ch),
                }
            }
            for piece in kept.split_whitespace() {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(piece);
            }
        }

        out
    }

    /// Normalize a multi-line text, dropping lines that end up empty.
    pub fn normalize_lines<'a>(&'a self, text: &'a str) -> impl Iterator<Item = String> + 'a {
        text.lines()
            .map(|line| self.normalize(line))
            .filter(|line| !line.is_empty())
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(NormalizerConfig::default())
    }
}
