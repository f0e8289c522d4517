//! Word and pair counting for BPE training.
//!
//! Distinct words are stored once, as symbol-id buffers in an arena indexed by
//! word id, next to their occurrence counts. Pair frequencies are the sum over
//! words of `pairs_in_word * word_count`, so both counting and the per-merge
//! rewrite split cleanly across rayon workers with an additive reduction.

use ahash::AHashMap;
use bpeprep_core::Pair;
use compact_str::CompactString;
use rayon::prelude::*;

/// Word -> number of occurrences in the corpus.
pub type WordCounts = AHashMap<CompactString, u64>;

/// Count occurrences of already pre-tokenized words.
pub fn count_words<'a, I>(words: I) -> WordCounts
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts = WordCounts::new();
    for word in words {
        add_word(&mut counts, word);
    }
    counts
}

/// Record one occurrence of `word`. Empty words are ignored.
#[inline]
pub fn add_word(counts: &mut WordCounts, word: &str) {
    if word.is_empty() {
        return;
    }
    match counts.get_mut(word) {
        Some(count) => *count += 1,
        None => {
            counts.insert(CompactString::new(word), 1);
        }
    }
}

/// Fold `other` into `acc`. Associative, so any reduction tree gives the same result.
pub fn merge_word_counts(mut acc: WordCounts, other: WordCounts) -> WordCounts {
    if acc.len() < other.len() {
        return merge_word_counts(other, acc);
    }
    for (word, count) in other {
        *acc.entry(word).or_insert(0) += count;
    }
    acc
}

/// Counter for BPE pair frequencies over a word arena.
pub struct PairCounter {
    /// Word id -> symbol ids
    words: Vec<Vec<u32>>,
    /// Word id -> frequency count
    word_counts: Vec<u64>,
}

impl PairCounter {
    /// Build the arena from word counts.
    ///
    /// Words are laid out in byte order so the arena is the same on every run.
    /// `byte_ids` maps each byte to its base symbol id; every byte occurring
    /// in `counts` must have one.
    pub fn new(counts: &WordCounts, byte_ids: &[Option<u32>; 256]) -> Self {
        let mut sorted: Vec<(&CompactString, u64)> = counts
            .iter()
            .filter(|(_, &count)| count > 0)
            .map(|(word, &count)| (word, count))
            .collect();
        sorted.sort_unstable_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

        let mut words = Vec::with_capacity(sorted.len());
        let mut word_counts = Vec::with_capacity(sorted.len());
        for (word, count) in sorted {
            let symbols: Vec<u32> = word
                .bytes()
                .filter_map(|b| byte_ids[b as usize])
                .collect();
            words.push(symbols);
            word_counts.push(count);
        }

        Self { words, word_counts }
    }

    /// Count all pairs in parallel.
    ///
    /// This returns a map of pair -> frequency count across all words.
    pub fn count_pairs_parallel(&self) -> AHashMap<Pair, u64> {
        self.words
            .par_iter()
            .zip(self.word_counts.par_iter())
            .fold(AHashMap::new, |mut acc, (word, &count)| {
                for window in word.windows(2) {
                    *acc.entry((window[0], window[1])).or_insert(0) += count;
                }
                acc
            })
            .reduce(AHashMap::new, |mut acc, pair_counts| {
                for (pair, count) in pair_counts {
                    *acc.entry(pair).or_insert(0) += count;
                }
                acc
            })
    }

    /// Count all pairs sequentially (for debugging or single-threaded use).
    pub fn count_pairs_sequential(&self) -> AHashMap<Pair, u64> {
        let mut pair_counts: AHashMap<Pair, u64> = AHashMap::new();

        for (word, &count) in self.words.iter().zip(self.word_counts.iter()) {
            for window in word.windows(2) {
                *pair_counts.entry((window[0], window[1])).or_insert(0) += count;
            }
        }

        pair_counts
    }

    /// Count all pairs, in parallel or not.
    pub fn count_pairs(&self, parallel: bool) -> AHashMap<Pair, u64> {
        if parallel {
            self.count_pairs_parallel()
        } else {
            self.count_pairs_sequential()
        }
    }

    /// Replace every non-overlapping occurrence of `pair` (scanning left to
    /// right) with `new_token_id` in all words.
    ///
    /// Returns the exact change in every affected pair count, already
    /// weighted by word frequency.
    pub fn merge_pair(
        &mut self,
        pair: Pair,
        new_token_id: u32,
        parallel: bool,
    ) -> AHashMap<Pair, i64> {
        if parallel {
            self.words
                .par_iter_mut()
                .zip(self.word_counts.par_iter())
                .fold(AHashMap::new, |mut acc, (word, &count)| {
                    merge_in_word(word, count, pair, new_token_id, &mut acc);
                    acc
                })
                .reduce(AHashMap::new, |mut acc, deltas| {
                    for (pair, delta) in deltas {
                        *acc.entry(pair).or_insert(0) += delta;
                    }
                    acc
                })
        } else {
            let mut deltas = AHashMap::new();
            for (word, &count) in self.words.iter_mut().zip(self.word_counts.iter()) {
                merge_in_word(word, count, pair, new_token_id, &mut deltas);
            }
            deltas
        }
    }

    /// Get the number of unique words.
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Get the total count of all word occurrences.
    pub fn total_word_occurrences(&self) -> u64 {
        self.word_counts.iter().sum()
    }

    /// Get a reference to the words.
    pub fn words(&self) -> &[Vec<u32>] {
        &self.words
    }

    /// Get a reference to the word counts.
    pub fn word_counts(&self) -> &[u64] {
        &self.word_counts
    }
}

/// Merge `pair` inside one word, recording pair-count deltas.
fn merge_in_word(
    word: &mut Vec<u32>,
    count: u64,
    pair: Pair,
    new_token_id: u32,
    deltas: &mut AHashMap<Pair, i64>,
) {
    if !word.windows(2).any(|w| (w[0], w[1]) == pair) {
        return;
    }

    let weight = count as i64;
    for w in word.windows(2) {
        *deltas.entry((w[0], w[1])).or_insert(0) -= weight;
    }

    let mut merged = Vec::with_capacity(word.len());
    let mut i = 0;
    while i < word.len() {
        if i + 1 < word.len() && (word[i], word[i + 1]) == pair {
            merged.push(new_token_id);
            i += 2;
        } else {
            merged.push(word[i]);
            i += 1;
        }
    }

    for w in merged.windows(2) {
        *deltas.entry((w[0], w[1])).or_insert(0) += weight;
    }

    *word = merged;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Byte ids for a lowercase ascii alphabet: 'a' -> 0, 'b' -> 1, ...
    fn letter_ids() -> [Option<u32>; 256] {
        let mut ids = [None; 256];
        for (i, b) in (b'a'..=b'z').enumerate() {
            ids[b as usize] = Some(i as u32);
        }
        ids
    }

    #[test]
    fn test_count_words() {
        let counts = count_words(["ab", "bc", "ab", ""]);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts.get("ab"), Some(&2));
        assert_eq!(counts.get("bc"), Some(&1));
    }

    #[test]
    fn test_merge_word_counts() {
        let a = count_words(["x", "y", "x"]);
        let b = count_words(["y", "z"]);
        let merged = merge_word_counts(a, b);
        assert_eq!(merged.get("x"), Some(&2));
        assert_eq!(merged.get("y"), Some(&2));
        assert_eq!(merged.get("z"), Some(&1));
    }

    #[test]
    fn test_arena_is_sorted() {
        let counts = count_words(["cab", "abc", "b"]);
        let counter = PairCounter::new(&counts, &letter_ids());

        assert_eq!(counter.word_count(), 3);
        assert_eq!(counter.words()[0].as_slice(), &[0, 1, 2]);
        assert_eq!(counter.words()[1].as_slice(), &[1]);
        assert_eq!(counter.words()[2].as_slice(), &[2, 0, 1]);
    }

    #[test]
    fn test_count_pairs_with_frequency() {
        let counts = count_words(["ab", "ab", "ab", "bc"]);
        let counter = PairCounter::new(&counts, &letter_ids());

        let pairs = counter.count_pairs_sequential();
        assert_eq!(pairs.get(&(0, 1)), Some(&3));
        assert_eq!(pairs.get(&(1, 2)), Some(&1));
        assert_eq!(counter.total_word_occurrences(), 4);
    }

    #[test]
    fn test_count_pairs_parallel_matches_sequential() {
        let counts = count_words(["abc", "bcd", "cde", "abcabc", "dd"]);
        let counter = PairCounter::new(&counts, &letter_ids());

        let parallel = counter.count_pairs_parallel();
        assert_eq!(parallel, counter.count_pairs_sequential());
        assert_eq!(parallel.get(&(1, 2)), Some(&4)); // (b,c)
        assert_eq!(parallel.get(&(2, 0)), Some(&1)); // (c,a)
    }

    #[test]
    fn test_merge_pair_overlapping() {
        let counts = count_words(["aaab"]);
        let mut counter = PairCounter::new(&counts, &letter_ids());

        let deltas = counter.merge_pair((0, 0), 26, false);
        assert_eq!(counter.words()[0].as_slice(), &[26, 0, 1]);
        assert_eq!(deltas.get(&(0, 0)), Some(&-2));
        assert_eq!(deltas.get(&(26, 0)), Some(&1));
        assert_eq!(deltas.get(&(0, 1)), Some(&0));
    }

    #[test]
    fn test_merge_pair_deltas_match_recount() {
        let counts = count_words(["abab", "ab", "bab", "abab", "cab"]);
        let mut counter = PairCounter::new(&counts, &letter_ids());
        let mut pairs = counter.count_pairs_sequential();

        let deltas = counter.merge_pair((0, 1), 26, true);
        for (pair, delta) in deltas {
            let current = pairs.get(&pair).copied().unwrap_or(0) as i64 + delta;
            if current > 0 {
                pairs.insert(pair, current as u64);
            } else {
                pairs.remove(&pair);
            }
        }

        assert_eq!(pairs, counter.count_pairs_sequential());
    }
}
