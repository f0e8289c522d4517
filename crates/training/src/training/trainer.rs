//! BPE trainer implementation.
//!
//! Learns merge rules by repeatedly merging the most frequent adjacent pair.
//! Pair counts are computed once and then kept exact with per-merge deltas;
//! a lazy max-heap picks the winner. Ties on count go to the smallest
//! `(left_id, right_id)`, which is a fixed order because base ids follow byte
//! order and merged ids follow learned order.

use super::counter::{count_words, PairCounter, WordCounts};
use ahash::AHashMap;
use bpeprep_core::{
    byte_to_char, char_to_byte, MergeRules, Pair, PairPriorityQueue, Result, TokenKind,
    TokenizerError, Vocabulary,
};
use log::{debug, info};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// How often the training loop reports progress.
const PROGRESS_EVERY: usize = 1_000;

/// Configuration for BPE training.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingConfig {
    /// Target vocabulary size, special tokens and base alphabet included
    pub vocab_size: usize,
    /// Minimum frequency for a pair to be merged
    pub min_frequency: u64,
    /// Reserved tokens, assigned ids `0..n` in this order
    pub special_tokens: Vec<String>,
    /// Whether to use parallel processing
    pub parallel: bool,
    /// Seed all 256 bytes instead of only the bytes seen in the corpus
    pub full_byte_alphabet: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            vocab_size: 15_000,
            min_frequency: 2,
            special_tokens: ["<s>", "<pad>", "</s>", "<unk>", "<mask>"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            parallel: true,
            full_byte_alphabet: false,
        }
    }
}

impl TrainingConfig {
    /// Reject contradictory settings before any work is done.
    pub fn validate(&self) -> Result<()> {
        if self.vocab_size <= self.special_tokens.len() {
            return Err(TokenizerError::InvalidConfig(format!(
                "vocab_size {} leaves no room beyond {} special tokens",
                self.vocab_size,
                self.special_tokens.len()
            )));
        }
        if self.min_frequency == 0 {
            return Err(TokenizerError::InvalidConfig(
                "min_frequency must be at least 1".to_string(),
            ));
        }
        // A single byte symbol would collide with the base alphabet
        let is_byte_symbol = |t: &&String| {
            let mut chars = t.chars();
            matches!((chars.next(), chars.next()), (Some(ch), None) if char_to_byte(ch).is_some())
        };
        if let Some(token) = self.special_tokens.iter().find(is_byte_symbol) {
            return Err(TokenizerError::InvalidConfig(format!(
                "special token {token:?} is also a base byte symbol"
            )));
        }
        if self.vocab_size > u32::MAX as usize {
            return Err(TokenizerError::InvalidConfig(format!(
                "vocab_size {} does not fit token ids",
                self.vocab_size
            )));
        }
        Ok(())
    }
}

/// Why the training loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The vocabulary reached `vocab_size`
    VocabSizeReached,
    /// The best remaining pair was below `min_frequency`
    BelowMinFrequency,
    /// Every word collapsed to a single symbol
    NoPairsLeft,
    /// The caller raised the cancellation flag
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            StopReason::VocabSizeReached => "vocabulary size reached",
            StopReason::BelowMinFrequency => "no pair meets the minimum frequency",
            StopReason::NoPairsLeft => "no pairs left to merge",
            StopReason::Cancelled => "cancelled",
        };
        f.write_str(reason)
    }
}

/// Result of a training run.
#[must_use]
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// Special tokens, base alphabet and merged tokens, in id order
    pub vocab: Vocabulary,
    /// Merge rules in learned order
    pub merges: MergeRules,
    pub stop_reason: StopReason,
}

/// BPE trainer.
///
/// Training is a pure function of the word counts and the configuration.
#[derive(Debug, Clone, Default)]
pub struct BpeTrainer {
    config: TrainingConfig,
}

impl BpeTrainer {
    /// Create a new BPE trainer with the given configuration.
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Create a new BPE trainer with default settings and the given size.
    pub fn with_vocab_size(vocab_size: usize) -> Self {
        Self::new(TrainingConfig {
            vocab_size,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train on whole units of text, each treated as a single word.
    pub fn train_units<'a, I>(&self, units: I) -> Result<TrainingOutcome>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.train(&count_words(units))
    }

    /// Train on pre-tokenized word counts.
    pub fn train(&self, words: &WordCounts) -> Result<TrainingOutcome> {
        let never = AtomicBool::new(false);
        self.train_with_cancel(words, &never)
    }

    /// Train on pre-tokenized word counts, checking `cancel` once per merge.
    ///
    /// When the flag is raised the rules learned so far are returned with
    /// [`StopReason::Cancelled`].
    pub fn train_with_cancel(
        &self,
        words: &WordCounts,
        cancel: &AtomicBool,
    ) -> Result<TrainingOutcome> {
        self.train_until(words, |_| cancel.load(Ordering::Relaxed))
    }

    /// Training loop. `should_stop` sees the number of merges learned so far
    /// and is asked once per merge, after the frequency check.
    fn train_until<F>(&self, words: &WordCounts, mut should_stop: F) -> Result<TrainingOutcome>
    where
        F: FnMut(usize) -> bool,
    {
        self.config.validate()?;
        let start = Instant::now();

        let mut vocab = Vocabulary::with_capacity(self.config.vocab_size);
        vocab.add_special_tokens(self.config.special_tokens.as_slice())?;

        let byte_ids = self.init_alphabet(words, &mut vocab)?;
        let base_len = vocab.len() - self.config.special_tokens.len();

        let mut counter = PairCounter::new(words, &byte_ids);
        info!(
            "training on {} distinct words ({} occurrences), base alphabet {} symbols",
            counter.word_count(),
            counter.total_word_occurrences(),
            base_len
        );

        let mut pair_counts = counter.count_pairs(self.config.parallel);
        let mut queue = PairPriorityQueue::with_capacity(pair_counts.len());
        for (&pair, &count) in &pair_counts {
            queue.update(pair, count);
        }

        let mut merges = MergeRules::with_capacity(self.config.vocab_size - vocab.len());

        let stop_reason = loop {
            if vocab.len() >= self.config.vocab_size {
                break StopReason::VocabSizeReached;
            }

            let candidate = match queue.pop() {
                Some(c) => c,
                None => break StopReason::NoPairsLeft,
            };

            if candidate.count < self.config.min_frequency {
                break StopReason::BelowMinFrequency;
            }

            if should_stop(merges.len()) {
                break StopReason::Cancelled;
            }

            let new_token = Self::merged_token(&vocab, candidate.pair);
            let new_token_id = vocab.add_token(&new_token, TokenKind::Merged)?;
            merges.push(candidate.pair, new_token_id)?;
            debug!(
                "merge {}: {:?} ({} occurrences) -> {}",
                merges.len(),
                new_token,
                candidate.count,
                new_token_id
            );

            let deltas = counter.merge_pair(candidate.pair, new_token_id, self.config.parallel);
            Self::apply_deltas(&mut pair_counts, &mut queue, deltas);

            if merges.len() % PROGRESS_EVERY == 0 {
                info!(
                    "{} merges learned, vocabulary {}/{}",
                    merges.len(),
                    vocab.len(),
                    self.config.vocab_size
                );
            }
        };

        info!(
            "training stopped ({}): {} merges, vocabulary {} in {:.2}s",
            stop_reason,
            merges.len(),
            vocab.len(),
            start.elapsed().as_secs_f64()
        );

        Ok(TrainingOutcome {
            vocab,
            merges,
            stop_reason,
        })
    }

    /// Add the base alphabet after the special tokens, in ascending byte
    /// order, and return the byte -> id table.
    fn init_alphabet(
        &self,
        words: &WordCounts,
        vocab: &mut Vocabulary,
    ) -> Result<[Option<u32>; 256]> {
        let mut seen = [false; 256];
        let mut any = false;
        for (word, &count) in words {
            if count == 0 {
                continue;
            }
            for b in word.bytes() {
                seen[b as usize] = true;
                any = true;
            }
        }

        if !any {
            return Err(TokenizerError::EmptyCorpus);
        }
        if self.config.full_byte_alphabet {
            seen = [true; 256];
        }

        let alphabet_len = seen.iter().filter(|&&s| s).count();
        let required = self.config.special_tokens.len() + alphabet_len;
        if required > self.config.vocab_size {
            return Err(TokenizerError::InvalidConfig(format!(
                "vocab_size {} is smaller than {} special tokens plus {} base symbols",
                self.config.vocab_size,
                self.config.special_tokens.len(),
                alphabet_len
            )));
        }

        let mut byte_ids = [None; 256];
        for (b, _) in seen.iter().enumerate().filter(|(_, &s)| s) {
            let id = vocab.add_token(&byte_to_char(b as u8).to_string(), TokenKind::Base)?;
            byte_ids[b] = Some(id);
        }

        Ok(byte_ids)
    }

    /// Get the token string for a merged pair.
    fn merged_token(vocab: &Vocabulary, pair: Pair) -> String {
        let left = vocab.get_token(pair.0).unwrap_or("");
        let right = vocab.get_token(pair.1).unwrap_or("");
        format!("{left}{right}")
    }

    /// Apply exact count changes after a merge and refresh the queue.
    fn apply_deltas(
        pair_counts: &mut AHashMap<Pair, u64>,
        queue: &mut PairPriorityQueue,
        deltas: AHashMap<Pair, i64>,
    ) {
        for (pair, delta) in deltas {
            if delta == 0 {
                continue;
            }
            let current = pair_counts.get(&pair).copied().unwrap_or(0) as i64;
            let new_count = (current + delta).max(0) as u64;

            if new_count > 0 {
                pair_counts.insert(pair, new_count);
            } else {
                pair_counts.remove(&pair);
            }
            queue.update(pair, new_count);
        }
    }
}
