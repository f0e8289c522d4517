//! Encode command implementation.

use anyhow::{Context, Result};
use bpeprep_tokenizer::pipeline::{read_corpus, write_tokens};
use bpeprep_tokenizer::Tokenizer;
use clap::Parser;
use log::info;
use std::io::Read;
use std::path::PathBuf;

/// Encode command arguments.
#[derive(Parser)]
pub struct EncodeCommand {
    /// Directory holding tokenizer.json
    #[arg(short, long)]
    pub tokenizer: PathBuf,

    /// Text to encode ("-" reads stdin)
    #[arg(short, long, conflicts_with = "file")]
    pub input: Option<String>,

    /// Encode every line of this file and concatenate the ids
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Truncate each encoding to this many ids
    #[arg(long)]
    pub max_length: Option<usize>,

    /// Write ids as a JSON array here instead of printing them
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(cmd: EncodeCommand) -> Result<()> {
    let mut tokenizer = Tokenizer::load(&cmd.tokenizer)
        .with_context(|| format!("failed to load tokenizer from {}", cmd.tokenizer.display()))?;
    if cmd.max_length.is_some() {
        tokenizer.set_max_length(cmd.max_length)?;
    }

    let ids: Vec<u32> = match (&cmd.input, &cmd.file) {
        (_, Some(path)) => {
            let text = read_corpus(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let lines: Vec<&str> = text.lines().filter(|line| !line.is_empty()).collect();
            tokenizer
                .encode_batch(&lines)
                .with_context(|| format!("failed to encode {}", path.display()))?
                .into_iter()
                .flat_map(|encoding| encoding.ids)
                .collect()
        }
        (Some(input), None) => {
            let text = if input == "-" {
                let mut buffer = String::new();
                std::io::stdin()
                    .read_to_string(&mut buffer)
                    .context("failed to read stdin")?;
                buffer
            } else {
                input.clone()
            };
            tokenizer.encode(&text).context("failed to encode input")?.ids
        }
        (None, None) => anyhow::bail!("either --input or --file is required"),
    };

    match &cmd.output {
        Some(path) => {
            write_tokens(path, &ids)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("encoded {} tokens to {}", ids.len(), path.display());
        }
        None => {
            println!("{}", serde_json::to_string(&ids)?);
        }
    }

    Ok(())
}
