//! Train command implementation.

use anyhow::{Context, Result};
use bpeprep_tokenizer::pipeline::read_corpus;
use bpeprep_tokenizer::{SplitPattern, Tokenizer, TokenizerConfig};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Instant;

/// Train command arguments.
#[derive(Parser)]
pub struct TrainCommand {
    /// Cleaned training corpus, one document per line
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output directory for the trained model
    #[arg(short, long)]
    pub output: PathBuf,

    /// Target vocabulary size
    #[arg(long, default_value_t = 15_000)]
    pub vocab_size: usize,

    /// Minimum frequency for merges
    #[arg(long, default_value_t = 2)]
    pub min_frequency: u64,

    /// Special tokens, comma separated, in id order
    #[arg(long, value_delimiter = ',', default_value = "<s>,<pad>,</s>,<unk>,<mask>")]
    pub special_tokens: Vec<String>,

    /// Special token used for characters outside the base alphabet
    #[arg(long)]
    pub unknown_token: Option<String>,

    /// Artifact name prefix (default: kazakh_bpe_<vocab-size>)
    #[arg(long)]
    pub prefix: Option<String>,

    /// Pre-tokenization: byte_level, whitespace or no_split
    #[arg(long, default_value = "byte_level")]
    pub split: SplitPattern,

    /// Seed all 256 bytes into the base alphabet
    #[arg(long)]
    pub full_byte_alphabet: bool,

    /// Disable parallel training
    #[arg(long)]
    pub sequential: bool,
}

impl TrainCommand {
    pub fn tokenizer_config(&self) -> TokenizerConfig {
        TokenizerConfig {
            vocab_size: self.vocab_size,
            min_frequency: self.min_frequency,
            special_tokens: self.special_tokens.clone(),
            unknown_token: self.unknown_token.clone(),
            split: self.split,
            parallel: !self.sequential,
            full_byte_alphabet: self.full_byte_alphabet,
            ..Default::default()
        }
    }
}

pub fn run(cmd: TrainCommand) -> Result<()> {
    let start = Instant::now();
    let text = read_corpus(&cmd.input)
        .with_context(|| format!("failed to read corpus {}", cmd.input.display()))?;
    let lines: Vec<&str> = text.lines().filter(|line| !line.is_empty()).collect();
    info!("read {} lines ({} bytes) from {}", lines.len(), text.len(), cmd.input.display());

    let mut tokenizer =
        Tokenizer::new(cmd.tokenizer_config()).context("invalid tokenizer configuration")?;
    let stop_reason = tokenizer.train(&lines).context("training failed")?;

    let prefix = cmd
        .prefix
        .clone()
        .unwrap_or_else(|| format!("kazakh_bpe_{}", cmd.vocab_size));
    let (vocab_path, merges_path) = tokenizer
        .save_vocab_merges(&cmd.output, &prefix)
        .with_context(|| format!("failed to save tokenizer to {}", cmd.output.display()))?;
    let bundle_path = tokenizer
        .save(&cmd.output)
        .with_context(|| format!("failed to save tokenizer to {}", cmd.output.display()))?;

    info!(
        "trained {} tokens in {:.2?} ({})",
        tokenizer.vocab_size(),
        start.elapsed(),
        stop_reason
    );
    println!("{}", vocab_path.display());
    println!("{}", merges_path.display());
    println!("{}", bundle_path.display());

    Ok(())
}
