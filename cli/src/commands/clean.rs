//! Clean command implementation.

use anyhow::{Context, Result};
use bpeprep_tokenizer::pipeline::{clean_corpus, read_corpus, write_lines};
use bpeprep_tokenizer::{Normalizer, NormalizerConfig};
use clap::Parser;
use log::info;
use std::path::PathBuf;

/// Clean command arguments.
#[derive(Parser)]
pub struct CleanCommand {
    /// Raw corpus, one document per line
    #[arg(short, long)]
    pub input: PathBuf,

    /// Where to write the cleaned corpus
    #[arg(short, long)]
    pub output: PathBuf,

    /// Keep every character instead of the Cyrillic/Kazakh/Latin allow-list
    #[arg(long)]
    pub allow_all: bool,

    /// Keep `<...>` markup
    #[arg(long)]
    pub keep_markup: bool,

    /// Keep bracketed numeric references such as `[3]`
    #[arg(long)]
    pub keep_references: bool,

    /// Skip Unicode NFC normalization
    #[arg(long)]
    pub no_nfc: bool,
}

impl CleanCommand {
    fn normalizer_config(&self) -> NormalizerConfig {
        let defaults = NormalizerConfig::default();
        NormalizerConfig {
            allowed_chars: if self.allow_all {
                None
            } else {
                defaults.allowed_chars
            },
            strip_markup: !self.keep_markup,
            strip_references: !self.keep_references,
            nfc: !self.no_nfc,
        }
    }
}

pub fn run(cmd: CleanCommand) -> Result<()> {
    let raw = read_corpus(&cmd.input)
        .with_context(|| format!("failed to read corpus {}", cmd.input.display()))?;

    let normalizer = Normalizer::new(cmd.normalizer_config());
    let lines = clean_corpus(&normalizer, &raw);

    write_lines(&cmd.output, &lines)
        .with_context(|| format!("failed to write {}", cmd.output.display()))?;
    info!("{} clean lines written to {}", lines.len(), cmd.output.display());

    Ok(())
}
