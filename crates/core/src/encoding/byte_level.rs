//! Byte-level BPE encoding.
//!
//! Text is treated as UTF-8 bytes. Each byte is shown as a printable
//! character from the GPT-2 byte/unicode table, so token strings in the
//! vocabulary and merge files never contain whitespace or control characters.
//! Merges are applied lowest rank first, which makes the result independent of
//! where in the word a pair happens to sit.

use crate::core::merges::MergeRules;
use crate::core::vocab::{TokenKind, Vocabulary};
use crate::error::{Result, TokenizerError};
use dary_heap::OctonaryHeap;
use std::cmp::Ordering;
use std::sync::Arc;

/// Number of characters covered by the inverse table (highest mapped char is U+0143).
const CHAR_TABLE_LEN: usize = 324;

static BYTE_TO_CHAR: [char; 256] = build_byte_to_char();
static CHAR_TO_BYTE: [Option<u8>; CHAR_TABLE_LEN] = build_char_to_byte();

const fn is_printable_byte(b: usize) -> bool {
    (b >= 0x21 && b <= 0x7E) || (b >= 0xA1 && b <= 0xAC) || (b >= 0xAE && b <= 0xFF)
}

/// Printable bytes map to themselves; the rest are shifted to U+0100 onwards
/// in byte order.
const fn build_byte_to_char() -> [char; 256] {
    let mut table = ['\0'; 256];
    let mut shifted = 0u32;
    let mut b = 0usize;

    while b < 256 {
        table[b] = if is_printable_byte(b) {
            b as u8 as char
        } else {
            let c = match char::from_u32(256 + shifted) {
                Some(c) => c,
                None => '\0',
            };
            shifted += 1;
            c
        };
        b += 1;
    }

    table
}

const fn build_char_to_byte() -> [Option<u8>; CHAR_TABLE_LEN] {
    let forward = build_byte_to_char();
    let mut table = [None; CHAR_TABLE_LEN];
    let mut b = 0usize;

    while b < 256 {
        table[forward[b] as usize] = Some(b as u8);
        b += 1;
    }

    table
}

/// Printable character standing in for a byte.
#[inline]
pub fn byte_to_char(byte: u8) -> char {
    BYTE_TO_CHAR[byte as usize]
}

/// Byte represented by a mapped character, if it is one.
#[inline]
pub fn char_to_byte(ch: char) -> Option<u8> {
    CHAR_TO_BYTE.get(ch as usize).copied().flatten()
}

/// Map raw bytes to their printable symbol string.
pub fn bytes_to_symbols(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| byte_to_char(b)).collect()
}

/// Map a symbol string back to raw bytes. Characters outside the table are
/// kept as their own UTF-8 bytes.
pub fn symbols_to_bytes(symbols: &str, out: &mut Vec<u8>) {
    for ch in symbols.chars() {
        match char_to_byte(ch) {
            Some(b) => out.push(b),
            None => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
}

/// Byte-level BPE encoder over a shared, read-only vocabulary and merge list.
///
/// Cloning is cheap: the vocabulary and merges sit behind `Arc`, so one
/// trained model can back any number of encoding threads.
#[derive(Debug, Clone)]
pub struct ByteLevelEncoder {
    vocab: Arc<Vocabulary>,
    merges: Arc<MergeRules>,
    /// Base symbol id per byte, resolved once
    byte_ids: [Option<u32>; 256],
}

/// Pending merge inside one word.
#[derive(Debug, PartialEq, Eq)]
struct MergeOp {
    rank: u32,
    pos: usize,
    new_id: u32,
}

// Max-heap order: lowest rank first, leftmost position on ties.
impl Ord for MergeOp {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .rank
            .cmp(&self.rank)
            .then_with(|| other.pos.cmp(&self.pos))
    }
}

impl PartialOrd for MergeOp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl ByteLevelEncoder {
    /// Create an encoder sharing the given vocabulary and merges.
    pub fn new(vocab: Arc<Vocabulary>, merges: Arc<MergeRules>) -> Self {
        let mut byte_ids = [None; 256];
        for (b, slot) in byte_ids.iter_mut().enumerate() {
            let symbol = byte_to_char(b as u8).to_string();
            *slot = vocab
                .get_id(&symbol)
                .filter(|&id| vocab.kind(id) == Some(TokenKind::Base));
        }

        Self {
            vocab,
            merges,
            byte_ids,
        }
    }

    /// The vocabulary this encoder reads.
    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    /// The merge rules this encoder applies.
    pub fn merges(&self) -> &MergeRules {
        &self.merges
    }

    /// Map a word to base symbol ids without applying any merge.
    ///
    /// A character with any byte missing from the base alphabet becomes a
    /// single unknown id, or fails with [`TokenizerError::UnknownSymbol`]
    /// when no unknown token is configured.
    pub fn base_symbols(&self, word: &str) -> Result<Vec<u32>> {
        let unk = self.vocab.special().unk();
        let mut symbols = Vec::with_capacity(word.len());

        for ch in word.chars() {
            let mut buf = [0u8; 4];
            let bytes = ch.encode_utf8(&mut buf).as_bytes();
            let start = symbols.len();
            let mut known = true;

            for &b in bytes {
                match self.byte_ids[b as usize] {
                    Some(id) => symbols.push(id),
                    None => {
                        known = false;
                        break;
                    }
                }
            }

            if !known {
                symbols.truncate(start);
                match unk {
                    Some(id) => symbols.push(id),
                    None => {
                        return Err(TokenizerError::UnknownSymbol {
                            symbol: ch.to_string(),
                        })
                    }
                }
            }
        }

        Ok(symbols)
    }

    /// Encode one pre-tokenized word.
    pub fn encode_word(&self, word: &str) -> Result<Vec<u32>> {
        let mut symbols = self.base_symbols(word)?;
        self.apply_merges(&mut symbols);
        Ok(symbols)
    }

    /// Apply merge rules until no adjacent pair has one.
    ///
    /// Always merges the lowest-rank pair present anywhere in the sequence
    /// (leftmost on ties), then re-examines the neighbours the merge created.
    pub fn apply_merges(&self, symbols: &mut Vec<u32>) {
        let n = symbols.len();
        if n < 2 || self.merges.is_empty() {
            return;
        }

        // Doubly linked list over the original positions
        let mut next: Vec<usize> = (1..=n).collect();
        let mut prev: Vec<Option<usize>> = (0..n).map(|i| i.checked_sub(1)).collect();
        let mut alive = vec![true; n];

        let mut heap = OctonaryHeap::with_capacity(n);
        for (pos, window) in symbols.windows(2).enumerate() {
            if let Some((rank, new_id)) = self.merges.get((window[0], window[1])) {
                heap.push(MergeOp { rank, pos, new_id });
            }
        }

        while let Some(op) = heap.pop() {
            let left = op.pos;
            if !alive[left] || next[left] >= n {
                continue;
            }
            let right = next[left];

            // The pair at this position may have changed since the push
            match self.merges.get((symbols[left], symbols[right])) {
                Some((rank, new_id)) if rank == op.rank && new_id == op.new_id => {}
                _ => continue,
            }

            symbols[left] = op.new_id;
            alive[right] = false;
            next[left] = next[right];
            if next[right] < n {
                prev[next[right]] = Some(left);
            }

            if let Some(p) = prev[left] {
                if let Some((rank, new_id)) = self.merges.get((symbols[p], symbols[left])) {
                    heap.push(MergeOp {
                        rank,
                        pos: p,
                        new_id,
                    });
                }
            }
            if next[left] < n {
                if let Some((rank, new_id)) = self.merges.get((symbols[left], symbols[next[left]]))
                {
                    heap.push(MergeOp {
                        rank,
                        pos: left,
                        new_id,
                    });
                }
            }
        }

        let mut write = 0;
        for read in 0..n {
            if alive[read] {
                symbols[write] = symbols[read];
                write += 1;
            }
        }
        symbols.truncate(write);
    }

    /// Decode token IDs back to raw bytes.
    pub fn decode_bytes(&self, ids: &[u32], skip_special_tokens: bool) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(ids.len() * 2);

        for &id in ids {
            let entry = self
                .vocab
                .get_entry(id)
                .ok_or(TokenizerError::UnknownTokenId(id))?;

            match entry.kind {
                TokenKind::Special if skip_special_tokens => {}
                TokenKind::Special => bytes.extend_from_slice(entry.token.as_bytes()),
                TokenKind::Base | TokenKind::Merged => symbols_to_bytes(&entry.token, &mut bytes),
            }
        }

        Ok(bytes)
    }

    /// Decode token IDs back to text. Invalid UTF-8 is replaced, since a
    /// truncated sequence can end in the middle of a character.
    pub fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String> {
        let bytes = self.decode_bytes(ids, skip_special_tokens)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder_for(text: &str, merges: &[(&str, &str)], specials: &[&str]) -> ByteLevelEncoder {
        let mut vocab = Vocabulary::new();
        vocab.add_special_tokens(specials).unwrap();
        if specials.contains(&"<unk>") {
            vocab.set_unknown_token("<unk>").unwrap();
        }

        let mut bytes: Vec<u8> = text.bytes().collect();
        bytes.sort_unstable();
        bytes.dedup();
        for b in bytes {
            vocab
                .add_token(&byte_to_char(b).to_string(), TokenKind::Base)
                .unwrap();
        }

        let mut rules = MergeRules::new();
        for (left, right) in merges {
            let l = vocab.get_id(left).unwrap();
            let r = vocab.get_id(right).unwrap();
            let id = vocab
                .add_token(&format!("{left}{right}"), TokenKind::Merged)
                .unwrap();
            rules.push((l, r), id).unwrap();
        }

        ByteLevelEncoder::new(Arc::new(vocab), Arc::new(rules))
    }

    #[test]
    fn test_byte_table() {
        assert_eq!(byte_to_char(b'a'), 'a');
        assert_eq!(byte_to_char(b' '), 'Ġ');
        assert_eq!(byte_to_char(b'\n'), 'Ċ');
        assert_eq!(byte_to_char(0), '\u{100}');

        for b in 0..=255u8 {
            assert_eq!(char_to_byte(byte_to_char(b)), Some(b));
        }
        assert_eq!(char_to_byte('ж'), None);
    }

    #[test]
    fn test_symbols_roundtrip() {
        let text = "Сәлем, world!\n";
        let symbols = bytes_to_symbols(text.as_bytes());
        assert!(!symbols.contains(' '));

        let mut bytes = Vec::new();
        symbols_to_bytes(&symbols, &mut bytes);
        assert_eq!(bytes, text.as_bytes());
    }

    #[test]
    fn test_base_symbols_without_merges() {
        let encoder = encoder_for("abc", &[], &[]);
        let ids = encoder.encode_word("cab").unwrap();
        let expected: Vec<u32> = ["c", "a", "b"]
            .iter()
            .map(|s| encoder.vocab().get_id(s).unwrap())
            .collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_lowest_rank_wins_over_position() {
        // (b, c) is learned first, so "abc" must become [a, bc] even though
        // (a, b) sits further left.
        let encoder = encoder_for("abc", &[("b", "c"), ("a", "b")], &[]);
        let ids = encoder.encode_word("abc").unwrap();
        let vocab = encoder.vocab();
        assert_eq!(
            ids,
            vec![vocab.get_id("a").unwrap(), vocab.get_id("bc").unwrap()]
        );
    }

    #[test]
    fn test_overlapping_pair_merges_left_to_right() {
        let encoder = encoder_for("aaab", &[("a", "a")], &[]);
        let ids = encoder.encode_word("aaab").unwrap();
        let vocab = encoder.vocab();
        assert_eq!(
            ids,
            vec![
                vocab.get_id("aa").unwrap(),
                vocab.get_id("a").unwrap(),
                vocab.get_id("b").unwrap()
            ]
        );
    }

    #[test]
    fn test_chained_merges() {
        let encoder = encoder_for("abcd", &[("a", "b"), ("c", "d"), ("ab", "cd")], &[]);
        let ids = encoder.encode_word("abcdab").unwrap();
        let vocab = encoder.vocab();
        assert_eq!(
            ids,
            vec![vocab.get_id("abcd").unwrap(), vocab.get_id("ab").unwrap()]
        );
    }

    #[test]
    fn test_merges_reach_fixed_point() {
        let encoder = encoder_for("abcd", &[("a", "b"), ("c", "d"), ("ab", "cd")], &[]);
        let mut symbols = encoder.base_symbols("dcabcdba").unwrap();
        encoder.apply_merges(&mut symbols);
        let once = symbols.clone();
        encoder.apply_merges(&mut symbols);
        assert_eq!(symbols, once);
    }

    #[test]
    fn test_unknown_symbol() {
        let encoder = encoder_for("ab", &[], &[]);
        let err = encoder.encode_word("abж").unwrap_err();
        assert!(matches!(err, TokenizerError::UnknownSymbol { symbol } if symbol == "ж"));

        let encoder = encoder_for("ab", &[], &["<pad>", "<unk>"]);
        let ids = encoder.encode_word("aжb").unwrap();
        let vocab = encoder.vocab();
        assert_eq!(
            ids,
            vec![
                vocab.get_id("a").unwrap(),
                vocab.special().unk().unwrap(),
                vocab.get_id("b").unwrap()
            ]
        );
    }

    #[test]
    fn test_decode_roundtrip_multibyte() {
        let text = "қазақ тілі";
        let encoder = encoder_for(text, &[], &["<s>"]);
        let ids = encoder.encode_word(text).unwrap();
        assert_eq!(ids.len(), text.len());
        assert_eq!(encoder.decode(&ids, false).unwrap(), text);

        let mut with_special = vec![0];
        with_special.extend(&ids);
        assert_eq!(encoder.decode(&with_special, false).unwrap(), format!("<s>{text}"));
        assert_eq!(encoder.decode(&with_special, true).unwrap(), text);
    }

    #[test]
    fn test_decode_unknown_id() {
        let encoder = encoder_for("a", &[], &[]);
        assert!(matches!(
            encoder.decode(&[42], false),
            Err(TokenizerError::UnknownTokenId(42))
        ));
    }
}
