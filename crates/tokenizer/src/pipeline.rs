//! Corpus-to-tokens pipeline.
//!
//! Reads a raw corpus, writes the cleaned corpus, trains a tokenizer on it,
//! saves the vocabulary artifacts and finally writes every cleaned line's
//! token ids, concatenated in line order, as one flat JSON array.

use crate::pre_tokenizer::{Normalizer, NormalizerConfig};
use crate::tokenizer::{Tokenizer, TokenizerConfig};
use bpeprep_core::{Result, TokenizerError};
use bpeprep_training::StopReason;
use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// File name of the cleaned corpus inside the output directory.
pub const CLEAN_CORPUS_FILE: &str = "clean_corpus.txt";
/// File name of the token id array inside the output directory.
pub const TOKENS_FILE: &str = "tokens.json";

/// Truncation applied to each line unless configured otherwise.
pub const DEFAULT_MAX_LENGTH: usize = 256;

/// Everything a pipeline run needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Raw corpus, one document per line
    pub corpus: PathBuf,
    /// Directory receiving every artifact
    pub output_dir: PathBuf,
    /// Artifact name prefix; `kazakh_bpe_<vocab_size>` when unset
    pub prefix: Option<String>,
    pub tokenizer: TokenizerConfig,
    pub normalizer: NormalizerConfig,
    /// Skip lines that fail to encode instead of aborting
    pub skip_unencodable: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            corpus: PathBuf::from("data/corpus.txt"),
            output_dir: PathBuf::from("data"),
            prefix: None,
            tokenizer: TokenizerConfig {
                max_length: Some(DEFAULT_MAX_LENGTH),
                ..Default::default()
            },
            normalizer: NormalizerConfig::default(),
            skip_unencodable: true,
        }
    }
}

impl PipelineConfig {
    /// Read a JSON configuration file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| TokenizerError::io(path, e))?;
        let config = serde_json::from_reader(BufReader::new(file))?;
        Ok(config)
    }

    /// Artifact name prefix.
    pub fn prefix(&self) -> String {
        self.prefix
            .clone()
            .unwrap_or_else(|| format!("kazakh_bpe_{}", self.tokenizer.vocab_size))
    }
}

/// Summary of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Non-empty lines after cleaning
    pub lines: usize,
    /// Total ids written
    pub tokens: usize,
    pub vocab_size: usize,
    pub merges: usize,
    pub stop_reason: StopReason,
    /// Lines dropped because they could not be encoded
    pub skipped_lines: usize,
    /// Lines cut to `max_length`
    pub truncated_lines: usize,
    pub clean_corpus_path: PathBuf,
    pub vocab_path: PathBuf,
    pub merges_path: PathBuf,
    pub tokenizer_path: PathBuf,
    pub tokens_path: PathBuf,
}

/// Read a text file, replacing invalid UTF-8.
pub fn read_corpus(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| TokenizerError::io(path, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Normalize every line of `text` in parallel, keeping order and dropping
/// lines that end up empty.
pub fn clean_corpus(normalizer: &Normalizer, text: &str) -> Vec<String> {
    text.par_lines()
        .map(|line| normalizer.normalize(line))
        .filter(|line| !line.is_empty())
        .collect()
}

/// Write lines separated by `\n`.
pub fn write_lines<S: AsRef<str>>(path: &Path, lines: &[S]) -> Result<()> {
    let file = File::create(path).map_err(|e| TokenizerError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    for line in lines {
        writeln!(writer, "{}", line.as_ref()).map_err(|e| TokenizerError::io(path, e))?;
    }
    writer.flush().map_err(|e| TokenizerError::io(path, e))
}

/// Write ids as a flat JSON array.
pub fn write_tokens(path: &Path, ids: &[u32]) -> Result<()> {
    let file = File::create(path).map_err(|e| TokenizerError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, ids)?;
    writer.flush().map_err(|e| TokenizerError::io(path, e))
}

/// Read a flat JSON array of ids.
pub fn read_tokens(path: &Path) -> Result<Vec<u32>> {
    let file = File::open(path).map_err(|e| TokenizerError::io(path, e))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| TokenizerError::corrupt(path, e.to_string()))
}

/// Ids of many lines, concatenated in line order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedLines {
    pub ids: Vec<u32>,
    pub skipped_lines: usize,
    pub truncated_lines: usize,
}

/// Encode `lines` in parallel and concatenate their ids.
///
/// A line that fails to encode is skipped with a warning when
/// `skip_unencodable` is set; otherwise the first failure is returned.
pub fn encode_lines<S: AsRef<str> + Sync>(
    tokenizer: &Tokenizer,
    lines: &[S],
    skip_unencodable: bool,
) -> Result<EncodedLines> {
    let encoded: Vec<Result<_>> = lines
        .par_iter()
        .map(|line| tokenizer.encode(line.as_ref()))
        .collect();

    let mut out = EncodedLines::default();
    for (index, result) in encoded.into_iter().enumerate() {
        match result {
            Ok(encoding) => {
                out.truncated_lines += usize::from(encoding.truncated);
                out.ids.extend(encoding.ids);
            }
            Err(err) if skip_unencodable => {
                warn!("skipping line {}: {}", index + 1, err);
                out.skipped_lines += 1;
            }
            Err(err) => return Err(err),
        }
    }

    Ok(out)
}

/// Run the full pipeline.
pub fn run(config: &PipelineConfig) -> Result<PipelineReport> {
    let start = Instant::now();
    let out = config.output_dir.as_path();
    std::fs::create_dir_all(out).map_err(|e| TokenizerError::io(out, e))?;

    info!("cleaning {}", config.corpus.display());
    let raw = read_corpus(&config.corpus)?;
    let normalizer = Normalizer::new(config.normalizer.clone());
    let lines = clean_corpus(&normalizer, &raw);
    drop(raw);

    let clean_corpus_path = out.join(CLEAN_CORPUS_FILE);
    write_lines(&clean_corpus_path, &lines)?;
    info!(
        "clean corpus saved to {} ({} lines)",
        clean_corpus_path.display(),
        lines.len()
    );

    let mut tokenizer = Tokenizer::new(config.tokenizer.clone())?;
    let stop_reason = tokenizer.train(&lines)?;
    let (vocab_path, merges_path) = tokenizer.save_vocab_merges(out, &config.prefix())?;
    let tokenizer_path = tokenizer.save(out)?;

    info!("encoding {} lines", lines.len());
    let encoded = encode_lines(&tokenizer, &lines, config.skip_unencodable)?;

    let tokens_path = out.join(TOKENS_FILE);
    write_tokens(&tokens_path, &encoded.ids)?;
    info!(
        "{} tokens saved to {} in {:.2?}",
        encoded.ids.len(),
        tokens_path.display(),
        start.elapsed()
    );

    Ok(PipelineReport {
        lines: lines.len(),
        tokens: encoded.ids.len(),
        vocab_size: tokenizer.vocab_size(),
        merges: tokenizer.merges()?.len(),
        stop_reason,
        skipped_lines: encoded.skipped_lines,
        truncated_lines: encoded.truncated_lines,
        clean_corpus_path,
        vocab_path,
        merges_path,
        tokenizer_path,
        tokens_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_defaults_to_vocab_size() {
        let mut config = PipelineConfig::default();
        assert_eq!(config.prefix(), "kazakh_bpe_15000");
        config.prefix = Some("custom".to_string());
        assert_eq!(config.prefix(), "custom");
    }

    #[test]
    fn test_config_from_partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"corpus": "in.txt", "tokenizer": {"vocab_size": 500, "split": "whitespace"}}"#,
        )
        .unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.corpus, PathBuf::from("in.txt"));
        assert_eq!(config.output_dir, PathBuf::from("data"));
        assert_eq!(config.tokenizer.vocab_size, 500);
        assert_eq!(config.tokenizer.min_frequency, 2);
        assert_eq!(
            config.tokenizer.split,
            crate::pre_tokenizer::SplitPattern::Whitespace
        );
        assert!(config.skip_unencodable);
    }

    #[test]
    fn test_clean_corpus_keeps_line_order() {
        let normalizer = Normalizer::default();
        let lines = clean_corpus(&normalizer, "бір <b>екі</b>\n\n123\nүш [4] төрт\n");
        assert_eq!(lines, vec!["бір екі", "үш төрт"]);
    }

    #[test]
    fn test_tokens_roundtrip_and_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TOKENS_FILE);
        write_tokens(&path, &[5, 0, 42]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[5,0,42]");
        assert_eq!(read_tokens(&path).unwrap(), vec![5, 0, 42]);

        std::fs::write(&path, "[1, -2]").unwrap();
        assert!(matches!(
            read_tokens(&path),
            Err(TokenizerError::CorruptArtifact { .. })
        ));
    }

    fn trained_on_ab() -> Tokenizer {
        let mut tokenizer = Tokenizer::builder().parallel(false).build().unwrap();
        tokenizer.train(&["ab ab"]).unwrap();
        tokenizer
    }

    #[test]
    fn test_encode_lines_skips_unencodable() {
        let tokenizer = trained_on_ab();
        let lines = ["ab", "za", "ab ab"];

        let encoded = encode_lines(&tokenizer, &lines, true).unwrap();
        assert_eq!(encoded.skipped_lines, 1);
        assert_eq!(encoded.truncated_lines, 0);

        let mut expected = tokenizer.encode("ab").unwrap().ids;
        expected.extend(tokenizer.encode("ab ab").unwrap().ids);
        assert_eq!(encoded.ids, expected);
    }

    #[test]
    fn test_encode_lines_strict_fails() {
        let tokenizer = trained_on_ab();
        let err = encode_lines(&tokenizer, &["ab", "za"], false).unwrap_err();
        assert!(matches!(err, TokenizerError::UnknownSymbol { .. }));

        let encoded = encode_lines(&tokenizer, &["ab", "ab ab"], false).unwrap();
        assert_eq!(encoded.skipped_lines, 0);
        assert_eq!(encoded.ids.len(), 3);
    }

    #[test]
    fn test_run_missing_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            corpus: dir.path().join("absent.txt"),
            output_dir: dir.path().join("out"),
            ..Default::default()
        };
        assert!(matches!(run(&config), Err(TokenizerError::Io { .. })));
    }
}
