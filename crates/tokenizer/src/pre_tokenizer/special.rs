//! Splitting literal special tokens out of text.

use bpeprep_core::{Result, TokenizerError, Vocabulary};
use fancy_regex::Regex;

/// A piece of input text: either ordinary text or a special token's id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'t> {
    Text(&'t str),
    Special(u32),
}

/// Finds special-token strings in text.
///
/// Alternatives are tried longest first, so `<mask>` beats a shorter
/// special token that is a prefix of it.
#[derive(Debug, Clone)]
pub struct SpecialTokenMatcher {
    regex: Option<Regex>,
    tokens: Vec<(String, u32)>,
}

impl SpecialTokenMatcher {
    /// Build a matcher over the special tokens of `vocab`.
    pub fn new(vocab: &Vocabulary) -> Result<Self> {
        let mut tokens: Vec<(String, u32)> = vocab
            .special()
            .ids()
            .iter()
            .filter_map(|&id| vocab.get_token(id).map(|t| (t.to_string(), id)))
            .collect();
        tokens.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        let regex = if tokens.is_empty() {
            None
        } else {
            let pattern = tokens
                .iter()
                .map(|(token, _)| fancy_regex::escape(token))
                .collect::<Vec<_>>()
                .join("|");
            Some(Regex::new(&pattern).map_err(|e| TokenizerError::InvalidConfig(e.to_string()))?)
        };

        Ok(Self { regex, tokens })
    }

    /// Split `text` into ordinary text and special tokens, in order.
    /// Empty text segments are omitted.
    pub fn split<'t>(&self, text: &'t str) -> Result<Vec<Segment<'t>>> {
        let regex = match &self.regex {
            Some(regex) => regex,
            None if text.is_empty() => return Ok(Vec::new()),
            None => return Ok(vec![Segment::Text(text)]),
        };

        let mut segments = Vec::new();
        let mut start = 0;
        for mat in regex.find_iter(text) {
            let m = mat.map_err(|e| TokenizerError::PreTokenization(e.to_string()))?;
            if m.start() > start {
                segments.push(Segment::Text(&text[start..m.start()]));
            }
            if let Some(id) = self.id_of(m.as_str()) {
                segments.push(Segment::Special(id));
            }
            start = m.end();
        }
        if start < text.len() {
            segments.push(Segment::Text(&text[start..]));
        }

        Ok(segments)
    }

    /// Ordinary text pieces only; special tokens are dropped.
    pub fn text_pieces<'t>(&self, text: &'t str) -> Result<Vec<&'t str>> {
        Ok(self
            .split(text)?
            .into_iter()
            .filter_map(|segment| match segment {
                Segment::Text(piece) => Some(piece),
                Segment::Special(_) => None,
            })
            .collect())
    }

    fn id_of(&self, token: &str) -> Option<u32> {
        self.tokens
            .iter()
            .find(|(t, _)| t == token)
            .map(|&(_, id)| id)
    }
}
