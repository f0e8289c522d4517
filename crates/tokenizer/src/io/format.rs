//! On-disk formats for trained tokenizers.
//!
//! `vocab.json` is a JSON object `token -> id`. Object key order is not
//! meaningful to most JSON readers, so entries are written in id order and
//! read back as an ordered list; duplicate keys are kept so that validation
//! can reject them instead of silently keeping the last one.

use crate::tokenizer::TokenizerConfig;
use bpeprep_core::Vocabulary;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Header line of a merges file.
pub const MERGES_HEADER: &str = "#version: 0.2";

/// File name of the single-file bundle.
pub const BUNDLE_FILE: &str = "tokenizer.json";

/// Format version written into bundles.
pub const FORMAT_VERSION: &str = "1.0";

/// Vocabulary entries as they appear in a file, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VocabEntries(pub Vec<(String, u32)>);

impl VocabEntries {
    /// Entries of `vocab` in id order.
    pub fn from_vocab(vocab: &Vocabulary) -> Self {
        Self(
            vocab
                .iter()
                .map(|(id, entry)| (entry.token.to_string(), id))
                .collect(),
        )
    }
}

impl Serialize for VocabEntries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (token, id) in &self.0 {
            map.serialize_entry(token, id)?;
        }
        map.end()
    }
}

struct VocabEntriesVisitor;

impl<'de> Visitor<'de> for VocabEntriesVisitor {
    type Value = VocabEntries;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of token strings to integer ids")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((token, id)) = access.next_entry::<String, u32>()? {
            entries.push((token, id));
        }
        Ok(VocabEntries(entries))
    }
}

impl<'de> Deserialize<'de> for VocabEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(VocabEntriesVisitor)
    }
}

/// Complete tokenizer serialization format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedTokenizer {
    /// Format version
    pub version: String,
    /// Settings the tokenizer was built with
    pub config: TokenizerConfig,
    /// Vocabulary in id order
    pub vocab: VocabEntries,
    /// Merge rules in rank order, as `"left right"`
    pub merges: Vec<String>,
}
