//! Decode command implementation.

use anyhow::{Context, Result};
use bpeprep_tokenizer::pipeline::read_tokens;
use bpeprep_tokenizer::Tokenizer;
use clap::Parser;
use std::path::PathBuf;

/// Decode command arguments.
#[derive(Parser)]
pub struct DecodeCommand {
    /// Directory holding tokenizer.json
    #[arg(short, long)]
    pub tokenizer: PathBuf,

    /// Token IDs to decode (comma-separated)
    #[arg(long, conflicts_with = "file")]
    pub tokens: Option<String>,

    /// JSON array of token IDs, e.g. tokens.json
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Skip special tokens during decoding
    #[arg(short, long, default_value_t = false)]
    pub skip_special: bool,
}

pub fn run(cmd: DecodeCommand) -> Result<()> {
    let tokenizer = Tokenizer::load(&cmd.tokenizer)
        .with_context(|| format!("failed to load tokenizer from {}", cmd.tokenizer.display()))?;

    let ids: Vec<u32> = match (&cmd.tokens, &cmd.file) {
        (_, Some(path)) => {
            read_tokens(path).with_context(|| format!("failed to read {}", path.display()))?
        }
        (Some(tokens), None) => tokens
            .split(',')
            .map(|s| s.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .context("token IDs must be comma-separated integers")?,
        (None, None) => anyhow::bail!("either --tokens or --file is required"),
    };

    let text = tokenizer
        .decode(&ids, cmd.skip_special)
        .context("failed to decode")?;
    println!("{}", text);

    Ok(())
}
