//! Save functionality for trained tokenizers.

use super::format::{
    SerializedTokenizer, VocabEntries, BUNDLE_FILE, FORMAT_VERSION, MERGES_HEADER,
};
use crate::tokenizer::TokenizerConfig;
use bpeprep_core::{MergeRules, Result, TokenizerError, Vocabulary};
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Tokenizer saver - writes a trained model to disk.
pub struct TokenizerSaver<'a> {
    vocab: &'a Vocabulary,
    merges: &'a MergeRules,
}

impl<'a> TokenizerSaver<'a> {
    pub fn new(vocab: &'a Vocabulary, merges: &'a MergeRules) -> Self {
        Self { vocab, merges }
    }

    /// Write `<prefix>-vocab.json` and `<prefix>-merges.txt` into `dir`.
    ///
    /// Returns the paths of the two files.
    pub fn save_vocab_merges(&self, dir: &Path, prefix: &str) -> Result<(PathBuf, PathBuf)> {
        create_dir(dir)?;
        let vocab_path = dir.join(format!("{prefix}-vocab.json"));
        let merges_path = dir.join(format!("{prefix}-merges.txt"));

        self.save_vocab(&vocab_path)?;
        self.save_merges(&merges_path)?;
        info!(
            "saved {} tokens to {} and {} merges to {}",
            self.vocab.len(),
            vocab_path.display(),
            self.merges.len(),
            merges_path.display()
        );

        Ok((vocab_path, merges_path))
    }

    /// Write the vocabulary as a JSON object in id order.
    pub fn save_vocab(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(create_file(path)?);
        serde_json::to_writer(&mut writer, &VocabEntries::from_vocab(self.vocab))?;
        writer.flush().map_err(|e| TokenizerError::io(path, e))
    }

    /// Write the merge rules, one `left right` line per rule in rank order.
    pub fn save_merges(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(create_file(path)?);
        let write_err = |e| TokenizerError::io(path, e);

        writeln!(writer, "{MERGES_HEADER}").map_err(write_err)?;
        for line in self.merge_lines()? {
            writeln!(writer, "{line}").map_err(write_err)?;
        }
        writer.flush().map_err(write_err)?;

        Ok(())
    }

    /// Write `tokenizer.json` into `dir` and return its path.
    pub fn save_bundle(&self, dir: &Path, config: &TokenizerConfig) -> Result<PathBuf> {
        create_dir(dir)?;
        let path = dir.join(BUNDLE_FILE);

        let bundle = SerializedTokenizer {
            version: FORMAT_VERSION.to_string(),
            config: config.clone(),
            vocab: VocabEntries::from_vocab(self.vocab),
            merges: self.merge_lines()?,
        };
        let mut writer = BufWriter::new(create_file(&path)?);
        serde_json::to_writer_pretty(&mut writer, &bundle)?;
        writer.flush().map_err(|e| TokenizerError::io(&path, e))?;

        Ok(path)
    }

    fn merge_lines(&self) -> Result<Vec<String>> {
        self.merges
            .iter()
            .map(|rule| {
                let left = self.token(rule.pair.0)?;
                let right = self.token(rule.pair.1)?;
                Ok(format!("{left} {right}"))
            })
            .collect()
    }

    fn token(&self, id: u32) -> Result<&str> {
        self.vocab
            .get_token(id)
            .ok_or(TokenizerError::UnknownTokenId(id))
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| TokenizerError::io(dir, e))
}

fn create_file(path: &Path) -> Result<File> {
    File::create(path).map_err(|e| TokenizerError::io(path, e))
}
