//! Main tokenizer implementation.
//!
//! This module provides the high-level `Tokenizer` struct that ties the
//! pre-tokenizer, the trainer and the byte-level encoder together.

use crate::io::{LoadedModel, TokenizerLoader, TokenizerSaver};
use crate::pre_tokenizer::{Segment, SpecialTokenMatcher, SplitPattern, Splitter};
use bpeprep_core::{ByteLevelEncoder, MergeRules, Result, TokenizerError, Vocabulary};
use bpeprep_training::{
    add_word, merge_word_counts, BpeTrainer, StopReason, TrainingConfig, WordCounts,
};
use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Configuration for building a tokenizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    /// Target vocabulary size
    pub vocab_size: usize,
    /// Minimum frequency for merges during training
    pub min_frequency: u64,
    /// Reserved tokens, assigned ids `0..n` in this order
    pub special_tokens: Vec<String>,
    /// Keep at most this many ids per encoded text
    pub max_length: Option<usize>,
    /// Special token used for characters outside the base alphabet
    pub unknown_token: Option<String>,
    /// Pre-tokenization pattern
    pub split: SplitPattern,
    /// Whether to use parallel processing
    pub parallel: bool,
    /// Seed all 256 bytes into the base alphabet
    pub full_byte_alphabet: bool,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        let training = TrainingConfig::default();
        Self {
            vocab_size: training.vocab_size,
            min_frequency: training.min_frequency,
            special_tokens: training.special_tokens,
            max_length: None,
            unknown_token: None,
            split: SplitPattern::default(),
            parallel: training.parallel,
            full_byte_alphabet: training.full_byte_alphabet,
        }
    }
}

impl TokenizerConfig {
    /// The training half of the configuration.
    pub fn training_config(&self) -> TrainingConfig {
        TrainingConfig {
            vocab_size: self.vocab_size,
            min_frequency: self.min_frequency,
            special_tokens: self.special_tokens.clone(),
            parallel: self.parallel,
            full_byte_alphabet: self.full_byte_alphabet,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.training_config().validate()?;

        if let Some(unk) = &self.unknown_token {
            if !self.special_tokens.contains(unk) {
                return Err(TokenizerError::InvalidConfig(format!(
                    "unknown token {unk:?} is not one of the special tokens"
                )));
            }
        }
        if self.max_length == Some(0) {
            return Err(TokenizerError::InvalidConfig(
                "max_length must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for creating a tokenizer.
#[derive(Clone, Default)]
pub struct TokenizerBuilder {
    config: TokenizerConfig,
}

impl TokenizerBuilder {
    /// Create a new tokenizer builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target vocabulary size.
    pub fn vocab_size(mut self, size: usize) -> Self {
        self.config.vocab_size = size;
        self
    }

    /// Set the minimum frequency for merges.
    pub fn min_frequency(mut self, freq: u64) -> Self {
        self.config.min_frequency = freq;
        self
    }

    /// Set special tokens, in id order.
    pub fn special_tokens<S: AsRef<str>>(mut self, tokens: &[S]) -> Self {
        self.config.special_tokens = tokens.iter().map(|t| t.as_ref().to_string()).collect();
        self
    }

    /// Truncate encodings to at most `max_length` ids.
    pub fn max_length(mut self, max_length: usize) -> Self {
        self.config.max_length = Some(max_length);
        self
    }

    /// Map unencodable characters to this special token.
    pub fn unknown_token(mut self, token: &str) -> Self {
        self.config.unknown_token = Some(token.to_string());
        self
    }

    pub fn split(mut self, pattern: SplitPattern) -> Self {
        self.config.split = pattern;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    pub fn full_byte_alphabet(mut self, enabled: bool) -> Self {
        self.config.full_byte_alphabet = enabled;
        self
    }

    /// Build the tokenizer.
    pub fn build(self) -> Result<Tokenizer> {
        Tokenizer::new(self.config)
    }
}

/// Trained state: encoder plus the matcher for its special tokens.
#[derive(Debug, Clone)]
struct Model {
    encoder: ByteLevelEncoder,
    specials: SpecialTokenMatcher,
}

impl Model {
    fn new(vocab: Vocabulary, merges: MergeRules) -> Result<Self> {
        let specials = SpecialTokenMatcher::new(&vocab)?;
        let encoder = ByteLevelEncoder::new(Arc::new(vocab), Arc::new(merges));
        Ok(Self { encoder, specials })
    }
}

/// Main tokenizer struct.
///
/// Created untrained from a configuration; becomes usable after
/// [`Tokenizer::train`] or when loaded from disk. Encoding only reads shared
/// state, so a trained tokenizer can be used from many threads at once.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    config: TokenizerConfig,
    splitter: Splitter,
    model: Option<Model>,
}

impl Tokenizer {
    /// Create an untrained tokenizer with the given configuration.
    pub fn new(config: TokenizerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            splitter: Splitter::new(config.split),
            config,
            model: None,
        })
    }

    /// Create a tokenizer builder.
    pub fn builder() -> TokenizerBuilder {
        TokenizerBuilder::new()
    }

    pub fn config(&self) -> &TokenizerConfig {
        &self.config
    }

    /// Whether a vocabulary has been trained or loaded.
    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    /// Enable or change truncation.
    pub fn set_max_length(&mut self, max_length: Option<usize>) -> Result<()> {
        if max_length == Some(0) {
            return Err(TokenizerError::InvalidConfig(
                "max_length must be at least 1".to_string(),
            ));
        }
        self.config.max_length = max_length;
        Ok(())
    }

    /// Train on lines of text, replacing any previous vocabulary.
    pub fn train<S: AsRef<str> + Sync>(&mut self, lines: &[S]) -> Result<StopReason> {
        let never = AtomicBool::new(false);
        self.train_with_cancel(lines, &never)
    }

    /// Train on lines of text, stopping early when `cancel` is raised.
    ///
    /// A cancelled run still installs the merges learned so far.
    pub fn train_with_cancel<S: AsRef<str> + Sync>(
        &mut self,
        lines: &[S],
        cancel: &AtomicBool,
    ) -> Result<StopReason> {
        let words = self.count_words(lines)?;
        info!("counted {} distinct words in {} lines", words.len(), lines.len());

        let trainer = BpeTrainer::new(self.config.training_config());
        let outcome = trainer.train_with_cancel(&words, cancel)?;

        let mut vocab = outcome.vocab;
        if let Some(unk) = &self.config.unknown_token {
            vocab.set_unknown_token(unk)?;
        }
        info!(
            "training stopped ({}): {} tokens, {} merges",
            outcome.stop_reason,
            vocab.len(),
            outcome.merges.len()
        );

        self.model = Some(Model::new(vocab, outcome.merges)?);
        Ok(outcome.stop_reason)
    }

    /// Pre-tokenize every line and count words. Special-token strings are
    /// cut out and never counted.
    fn count_words<S: AsRef<str> + Sync>(&self, lines: &[S]) -> Result<WordCounts> {
        let mut specials = Vocabulary::new();
        specials.add_special_tokens(self.config.special_tokens.as_slice())?;
        let matcher = SpecialTokenMatcher::new(&specials)?;

        let count_line = |mut acc: WordCounts, line: &S| -> Result<WordCounts> {
            for piece in matcher.text_pieces(line.as_ref())? {
                for word in self.splitter.split(piece)? {
                    add_word(&mut acc, word);
                }
            }
            Ok(acc)
        };

        if self.config.parallel {
            lines
                .par_iter()
                .try_fold(WordCounts::new, count_line)
                .try_reduce(WordCounts::new, |a, b| Ok(merge_word_counts(a, b)))
        } else {
            lines.iter().try_fold(WordCounts::new(), count_line)
        }
    }

    fn model(&self) -> Result<&Model> {
        self.model.as_ref().ok_or(TokenizerError::VocabularyNotLoaded)
    }

    /// Encode text to token IDs.
    ///
    /// Special-token strings become their fixed ids; the rest is split and
    /// encoded word by word. With `max_length` set, the tail is dropped.
    pub fn encode(&self, text: &str) -> Result<Encoding> {
        let model = self.model()?;
        let mut ids = Vec::with_capacity(text.len() / 2 + 1);

        for segment in model.specials.split(text)? {
            match segment {
                Segment::Special(id) => ids.push(id),
                Segment::Text(piece) => {
                    for word in self.splitter.split(piece)? {
                        ids.extend(model.encoder.encode_word(word)?);
                    }
                }
            }
        }

        let mut truncated = false;
        if let Some(max) = self.config.max_length {
            if ids.len() > max {
                ids.truncate(max);
                truncated = true;
            }
        }

        Ok(Encoding { ids, truncated })
    }

    /// Encode a batch of texts (parallelized). Fails on the first error.
    pub fn encode_batch<S: AsRef<str> + Sync>(&self, texts: &[S]) -> Result<Vec<Encoding>> {
        texts
            .par_iter()
            .map(|text| self.encode(text.as_ref()))
            .collect()
    }

    /// Decode token IDs back to text.
    ///
    /// Special tokens are written literally unless `skip_special_tokens`.
    pub fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String> {
        self.model()?.encoder.decode(ids, skip_special_tokens)
    }

    /// Get the vocabulary size (0 before training).
    pub fn vocab_size(&self) -> usize {
        self.model
            .as_ref()
            .map_or(0, |model| model.encoder.vocab().len())
    }

    /// Get a reference to the vocabulary.
    pub fn vocab(&self) -> Result<&Vocabulary> {
        Ok(self.model()?.encoder.vocab())
    }

    /// Get a reference to the merge rules.
    pub fn merges(&self) -> Result<&MergeRules> {
        Ok(self.model()?.encoder.merges())
    }

    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.model.as_ref()?.encoder.vocab().get_id(token)
    }

    pub fn id_to_token(&self, id: u32) -> Option<&str> {
        self.model.as_ref()?.encoder.vocab().get_token(id)
    }

    /// Save the tokenizer to `dir/tokenizer.json`.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        let model = self.model()?;
        TokenizerSaver::new(model.encoder.vocab(), model.encoder.merges())
            .save_bundle(dir, &self.config)
    }

    /// Save `<prefix>-vocab.json` and `<prefix>-merges.txt` into `dir`.
    pub fn save_vocab_merges(&self, dir: &Path, prefix: &str) -> Result<(PathBuf, PathBuf)> {
        let model = self.model()?;
        TokenizerSaver::new(model.encoder.vocab(), model.encoder.merges())
            .save_vocab_merges(dir, prefix)
    }

    /// Load a tokenizer from `dir/tokenizer.json`.
    pub fn load(dir: &Path) -> Result<Self> {
        let (config, model) = TokenizerLoader::load_bundle(dir)?;
        Self::from_model(config, model)
    }

    /// Load a tokenizer from a vocabulary and merges file pair.
    ///
    /// `config` supplies everything the files do not record, in particular
    /// the special tokens.
    pub fn from_vocab_merges(
        vocab_path: &Path,
        merges_path: &Path,
        config: TokenizerConfig,
    ) -> Result<Self> {
        config.validate()?;
        let model = TokenizerLoader::load_vocab_merges(vocab_path, merges_path, &config)?;
        Self::from_model(config, model)
    }

    fn from_model(config: TokenizerConfig, loaded: LoadedModel) -> Result<Self> {
        let mut tokenizer = Self::new(config)?;
        tokenizer.model = Some(Model::new(loaded.vocab, loaded.merges)?);
        Ok(tokenizer)
    }
}

/// Result of encoding text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoding {
    /// Token IDs
    pub ids: Vec<u32>,
    /// Whether ids were dropped to honour `max_length`
    pub truncated: bool,
}

impl Encoding {
    /// Get the number of tokens.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Check if the encoding is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trained(lines: &[&str], builder: TokenizerBuilder) -> Tokenizer {
        let mut tokenizer = builder.build().unwrap();
        tokenizer.train(lines).unwrap();
        tokenizer
    }

    #[test]
    fn test_builder_validates() {
        assert!(Tokenizer::builder().vocab_size(5).build().is_err());
        assert!(Tokenizer::builder().unknown_token("<oov>").build().is_err());
        assert!(Tokenizer::builder().max_length(0).build().is_err());

        let tokenizer = Tokenizer::builder()
            .vocab_size(1000)
            .min_frequency(5)
            .unknown_token("<unk>")
            .build()
            .unwrap();
        assert!(!tokenizer.is_trained());
        assert_eq!(tokenizer.vocab_size(), 0);
    }

    #[test]
    fn test_encode_before_training() {
        let tokenizer = Tokenizer::builder().build().unwrap();
        assert!(matches!(
            tokenizer.encode("hello"),
            Err(TokenizerError::VocabularyNotLoaded)
        ));
        assert!(matches!(
            tokenizer.decode(&[0], false),
            Err(TokenizerError::VocabularyNotLoaded)
        ));
    }

    #[test]
    fn test_aaab_example() {
        let tokenizer = trained(&["aaab"], Tokenizer::builder().vocab_size(100));

        let merges = tokenizer.merges().unwrap();
        assert_eq!(merges.len(), 1);
        let aa = tokenizer.token_to_id("aa").unwrap();
        let a = tokenizer.token_to_id("a").unwrap();
        let b = tokenizer.token_to_id("b").unwrap();
        assert_eq!(merges.as_slice()[0].pair, (a, a));

        let encoding = tokenizer.encode("aaab").unwrap();
        assert_eq!(encoding.ids, vec![aa, a, b]);
        assert!(!encoding.truncated);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let lines = ["Сәлем әлем, қалайсың?", "әлем кең, әлем әдемі!"];
        let tokenizer = trained(&lines, Tokenizer::builder().vocab_size(120));

        for line in lines {
            let encoding = tokenizer.encode(line).unwrap();
            assert_eq!(tokenizer.decode(&encoding.ids, false).unwrap(), line);
        }
        assert!(tokenizer.vocab_size() <= 120);
    }

    #[test]
    fn test_special_tokens_in_text() {
        let tokenizer = trained(
            &["<s>ab ab ab</s>"],
            Tokenizer::builder().special_tokens(&["<s>", "</s>"]).vocab_size(50),
        );

        assert!(tokenizer.token_to_id("<s>a").is_none());
        assert!(tokenizer.token_to_id("<").is_none());

        let ids = tokenizer.encode("<s>ab</s>").unwrap().ids;
        assert_eq!(ids.first(), Some(&0));
        assert_eq!(ids.last(), Some(&1));
        assert_eq!(tokenizer.decode(&ids, false).unwrap(), "<s>ab</s>");
        assert_eq!(tokenizer.decode(&ids, true).unwrap(), "ab");
    }

    #[test]
    fn test_unknown_symbol_handling() {
        let strict = trained(&["abc abc"], Tokenizer::builder().vocab_size(50));
        assert!(matches!(
            strict.encode("abz"),
            Err(TokenizerError::UnknownSymbol { .. })
        ));

        let lenient = trained(
            &["abc abc"],
            Tokenizer::builder().vocab_size(50).unknown_token("<unk>"),
        );
        let ids = lenient.encode("z").unwrap().ids;
        assert_eq!(ids, vec![lenient.token_to_id("<unk>").unwrap()]);
    }

    #[test]
    fn test_truncation_is_prefix() {
        let mut tokenizer = trained(&["one two three four five"], Tokenizer::builder());
        let full = tokenizer.encode("one two three four five").unwrap();
        assert!(full.len() > 3);

        tokenizer.set_max_length(Some(3)).unwrap();
        let short = tokenizer.encode("one two three four five").unwrap();
        assert_eq!(short.len(), 3);
        assert!(short.truncated);
        assert_eq!(short.ids.as_slice(), &full.ids[..3]);

        assert!(tokenizer.set_max_length(Some(0)).is_err());
    }

    #[test]
    fn test_parallel_and_sequential_training_agree() {
        let lines: Vec<String> = (0..50)
            .map(|i| format!("line {} has words like word{} and more words", i, i % 7))
            .collect();

        let a = trained(
            &lines.iter().map(String::as_str).collect::<Vec<_>>(),
            Tokenizer::builder().vocab_size(200).parallel(true),
        );
        let b = trained(
            &lines.iter().map(String::as_str).collect::<Vec<_>>(),
            Tokenizer::builder().vocab_size(200).parallel(false),
        );

        assert_eq!(a.merges().unwrap().as_slice(), b.merges().unwrap().as_slice());
        assert_eq!(
            a.encode_batch(&lines).unwrap(),
            b.encode_batch(&lines).unwrap()
        );
    }

    #[test]
    fn test_train_cancelled_keeps_partial_model() {
        let mut tokenizer = Tokenizer::builder().vocab_size(100).build().unwrap();
        let cancel = AtomicBool::new(true);

        let reason = tokenizer.train_with_cancel(&["abab abab"], &cancel).unwrap();
        assert_eq!(reason, StopReason::Cancelled);
        assert!(tokenizer.merges().unwrap().is_empty());
        assert!(tokenizer.encode("ab").is_ok());
    }
}
